//! Length-prefixed typed text encoding used for `DbType::Serialized` columns.
//!
//! Grammar:
//!
//! ```text
//! value  := "N;" | "b:" ("0"|"1") ";" | "i:" int ";" | "d:" float ";"
//!         | "s:" len ":\"" bytes "\";" | "a:" count ":{" (key value)* "}"
//! key    := "i:" int ";" | "s:" len ":\"" bytes "\";"
//! ```
//!
//! String lengths count bytes, not characters. Arrays keyed `0..n` in order
//! decode to JSON arrays; any other keying decodes to a JSON object. Arrays
//! nest at most `MAX_DEPTH` levels deep.
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Deepest array nesting `decode` accepts.
pub const MAX_DEPTH: usize = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEnd(usize),

    #[error("unexpected byte {found:?} at byte {pos}, expected {expected}")]
    Unexpected {
        pos: usize,
        found: char,
        expected: &'static str,
    },

    #[error("invalid number at byte {0}")]
    InvalidNumber(usize),

    #[error("string at byte {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    #[error("arrays nested deeper than 128 levels at byte {0}")]
    TooDeep(usize),

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("cannot encode non-finite float")]
    NonFinite,
}

/// Decodes one value, rejecting trailing input.
pub fn decode(input: &str) -> Result<Value, CodecError> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    let rest = parser.bytes.len() - parser.pos;
    if rest > 0 {
        return Err(CodecError::TrailingBytes(rest));
    }
    Ok(value)
}

/// Encodes a JSON value. Objects keep their key order as iterated.
pub fn encode(value: &Value) -> Result<String, CodecError> {
    let mut out = String::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Null => out.push_str("N;"),
        Value::Bool(b) => out.push_str(if *b { "b:1;" } else { "b:0;" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.push_str(&format!("i:{};", i));
            } else {
                let f = n.as_f64().ok_or(CodecError::NonFinite)?;
                if !f.is_finite() {
                    return Err(CodecError::NonFinite);
                }
                out.push_str(&format!("d:{:?};", f));
            }
        }
        Value::String(s) => write_str(out, s),
        Value::Array(items) => {
            out.push_str(&format!("a:{}:{{", items.len()));
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("i:{};", i));
                write_value(out, item)?;
            }
            out.push('}');
        }
        Value::Object(map) => {
            out.push_str(&format!("a:{}:{{", map.len()));
            for (key, item) in map {
                write_str(out, key);
                write_value(out, item)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_str(out: &mut String, s: &str) {
    out.push_str(&format!("s:{}:\"{}\";", s.len(), s));
}

enum Key {
    Index(i64),
    Name(String),
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Result<u8, CodecError> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(CodecError::UnexpectedEnd(self.pos))
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), CodecError> {
        let found = self.peek()?;
        if found != byte {
            return Err(CodecError::Unexpected {
                pos: self.pos,
                found: found as char,
                expected,
            });
        }
        self.pos += 1;
        Ok(())
    }

    /// Reads up to (not including) `end` and consumes the terminator.
    fn until(&mut self, end: u8) -> Result<&'a str, CodecError> {
        let start = self.pos;
        let len = self.bytes[start..]
            .iter()
            .position(|&b| b == end)
            .ok_or(CodecError::UnexpectedEnd(self.bytes.len()))?;
        self.pos = start + len + 1;
        std::str::from_utf8(&self.bytes[start..start + len]).map_err(|_| CodecError::InvalidUtf8(start))
    }

    fn int(&mut self, end: u8) -> Result<i64, CodecError> {
        let start = self.pos;
        self.until(end)?
            .parse::<i64>()
            .map_err(|_| CodecError::InvalidNumber(start))
    }

    fn string_body(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        let len = usize::try_from(self.int(b':')?).map_err(|_| CodecError::InvalidNumber(start))?;
        self.expect(b'"', "'\"'")?;
        let body_start = self.pos;
        let body_end = body_start
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CodecError::UnexpectedEnd(self.bytes.len()))?;
        let body = std::str::from_utf8(&self.bytes[body_start..body_end])
            .map_err(|_| CodecError::InvalidUtf8(body_start))?;
        self.pos = body_end;
        self.expect(b'"', "'\"'")?;
        self.expect(b';', "';'")?;
        Ok(body.to_string())
    }

    fn tag(&mut self) -> Result<u8, CodecError> {
        let tag = self.peek()?;
        self.pos += 1;
        Ok(tag)
    }

    fn key(&mut self) -> Result<Key, CodecError> {
        let pos = self.pos;
        match self.tag()? {
            b'i' => {
                self.expect(b':', "':'")?;
                Ok(Key::Index(self.int(b';')?))
            }
            b's' => {
                self.expect(b':', "':'")?;
                Ok(Key::Name(self.string_body()?))
            }
            other => Err(CodecError::Unexpected {
                pos,
                found: other as char,
                expected: "array key",
            }),
        }
    }

    fn value(&mut self) -> Result<Value, CodecError> {
        let pos = self.pos;
        let tag = self.tag()?;
        if tag == b'N' {
            self.expect(b';', "';'")?;
            return Ok(Value::Null);
        }
        self.expect(b':', "':'")?;
        match tag {
            b'b' => match self.until(b';')? {
                "0" => Ok(Value::Bool(false)),
                "1" => Ok(Value::Bool(true)),
                _ => Err(CodecError::InvalidNumber(pos + 2)),
            },
            b'i' => Ok(Value::from(self.int(b';')?)),
            b'd' => {
                let start = self.pos;
                let f = self
                    .until(b';')?
                    .parse::<f64>()
                    .map_err(|_| CodecError::InvalidNumber(start))?;
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or(CodecError::InvalidNumber(start))
            }
            b's' => Ok(Value::String(self.string_body()?)),
            b'a' => {
                if self.depth == MAX_DEPTH {
                    return Err(CodecError::TooDeep(pos));
                }
                self.depth += 1;
                let array = self.array();
                self.depth -= 1;
                array
            }
            other => Err(CodecError::Unexpected {
                pos,
                found: other as char,
                expected: "value tag",
            }),
        }
    }

    fn array(&mut self) -> Result<Value, CodecError> {
        let start = self.pos;
        let count = usize::try_from(self.int(b':')?).map_err(|_| CodecError::InvalidNumber(start))?;
        self.expect(b'{', "'{'")?;

        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.key()?;
            let value = self.value()?;
            entries.push((key, value));
        }
        self.expect(b'}', "'}'")?;

        let sequential = entries
            .iter()
            .enumerate()
            .all(|(i, (key, _))| matches!(key, Key::Index(k) if *k == i as i64));
        if sequential {
            return Ok(Value::Array(entries.into_iter().map(|(_, v)| v).collect()));
        }

        let mut map = Map::new();
        for (key, value) in entries {
            let name = match key {
                Key::Index(i) => i.to_string(),
                Key::Name(s) => s,
            };
            map.insert(name, value);
        }
        Ok(Value::Object(map))
    }
}
