/// Scalar Conversion Module
///
/// Implements the conversion matrix applied by `Database::get_var` to the
/// first value of a result column.

use crate::codec;
use crate::core::{Result, TbdbError};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::fmt;
use std::str::FromStr;

/// Leading numeric prefix accepted by the best-effort NUMBER and FLOAT conversions.
static NUMERIC_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?").expect("valid regex")
});

/// Target type for a scalar extracted by `get_var`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DbType {
    #[default]
    String,
    Number,
    Float,
    Serialized,
    Json,
    Bool,
}

impl DbType {
    /// Stable numeric code for the tag.
    pub fn code(self) -> i64 {
        match self {
            DbType::String => 100,
            DbType::Number => 200,
            DbType::Float => 300,
            DbType::Serialized => 400,
            DbType::Json => 500,
            DbType::Bool => 600,
        }
    }
}

impl TryFrom<i64> for DbType {
    type Error = TbdbError;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            100 => Ok(DbType::String),
            200 => Ok(DbType::Number),
            300 => Ok(DbType::Float),
            400 => Ok(DbType::Serialized),
            500 => Ok(DbType::Json),
            600 => Ok(DbType::Bool),
            other => Err(TbdbError::Argument(format!("unknown db type code {}", other))),
        }
    }
}

impl FromStr for DbType {
    type Err = TbdbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(DbType::String),
            "number" => Ok(DbType::Number),
            "float" => Ok(DbType::Float),
            "serialized" => Ok(DbType::Serialized),
            "json" => Ok(DbType::Json),
            "bool" => Ok(DbType::Bool),
            other => Err(TbdbError::Argument(format!("unknown db type '{}'", other))),
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbType::String => "STRING",
            DbType::Number => "NUMBER",
            DbType::Float => "FLOAT",
            DbType::Serialized => "SERIALIZED",
            DbType::Json => "JSON",
            DbType::Bool => "BOOL",
        };
        f.write_str(name)
    }
}

/// A converted scalar returned by `get_var`.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// The raw column value, returned for `DbType::String`
    Value(Value),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Json(serde_json::Value),
    Serialized(serde_json::Value),
}

impl Scalar {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) | Scalar::Value(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(f) | Scalar::Value(Value::Real(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Value(Value::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Renders the scalar as JSON for display.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Value(v) => value_to_json(v),
            Scalar::Integer(i) => serde_json::Value::from(*i),
            Scalar::Float(f) => serde_json::Value::from(*f),
            Scalar::Bool(b) => serde_json::Value::Bool(*b),
            Scalar::Json(v) | Scalar::Serialized(v) => v.clone(),
        }
    }
}

/// Converts a column value into the requested type.
pub fn convert(value: Value, db_type: DbType) -> Result<Scalar> {
    match db_type {
        DbType::String => Ok(Scalar::Value(value)),
        DbType::Bool => to_bool(&value).map(Scalar::Bool),
        DbType::Number => Ok(Scalar::Integer(to_i64(&value))),
        DbType::Float => Ok(Scalar::Float(to_f64(&value))),
        DbType::Serialized => {
            let text = text_of(&value).ok_or_else(|| {
                TbdbError::conversion(DbType::Serialized, format!("Cannot unserialize {}", describe(&value)))
            })?;
            codec::decode(&text).map(Scalar::Serialized).map_err(|e| {
                TbdbError::conversion(DbType::Serialized, format!("Cannot unserialize {}: {}", text, e))
            })
        }
        DbType::Json => {
            let text = text_of(&value).ok_or_else(|| {
                TbdbError::conversion(DbType::Json, format!("Cannot decode {}", describe(&value)))
            })?;
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(serde_json::Value::Null) => Err(TbdbError::conversion(
                    DbType::Json,
                    format!("Cannot decode {}", text),
                )),
                Ok(decoded) => Ok(Scalar::Json(decoded)),
                Err(e) => Err(TbdbError::conversion(
                    DbType::Json,
                    format!("Cannot decode {}: {}", text, e),
                )),
            }
        }
    }
}

/// Text form of a value; `None` for NULL.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s.clone()),
        Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

fn describe(value: &Value) -> String {
    text_of(value).unwrap_or_else(|| "NULL".to_string())
}

fn to_bool(value: &Value) -> Result<bool> {
    let parsed = match value {
        Value::Null => Some(false),
        Value::Integer(1) => Some(true),
        Value::Integer(0) => Some(false),
        Value::Integer(_) => None,
        other => text_of(other).and_then(|text| parse_bool(&text)),
    };
    parsed.ok_or_else(|| {
        TbdbError::conversion(DbType::Bool, format!("Cannot convert {} to boolean", describe(value)))
    })
}

/// Permissive boolean recognition; `None` when the text is neither truthy nor falsy.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

fn to_i64(value: &Value) -> i64 {
    match value {
        Value::Integer(i) => *i,
        Value::Real(f) => *f as i64,
        Value::Text(s) => parse_int_prefix(s),
        Value::Null | Value::Blob(_) => 0,
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Integer(i) => *i as f64,
        Value::Real(f) => *f,
        Value::Text(s) => parse_float_prefix(s),
        Value::Null | Value::Blob(_) => 0.0,
    }
}

/// Best-effort integer parse: the longest leading number, truncated, or 0.
pub fn parse_int_prefix(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let Some(m) = NUMERIC_PREFIX.find(trimmed) else {
        return 0;
    };
    let number = m.as_str();
    if let Ok(i) = number.parse::<i64>() {
        return i;
    }
    // float casts saturate at the i64 bounds
    number.parse::<f64>().map(|f| f as i64).unwrap_or(0)
}

/// Best-effort float parse: the longest leading number, or 0.0.
pub fn parse_float_prefix(text: &str) -> f64 {
    NUMERIC_PREFIX
        .find(text.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// JSON rendering of a raw column value. Blobs are summarized.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(b) => serde_json::Value::String(format!("<BLOB: {} bytes>", b.len())),
    }
}
