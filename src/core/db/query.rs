/// Query Execution Module
///
/// Statements, bind parameters and row fetching for the database facade.
/// Driver errors are returned as raw `rusqlite::Error` values here; the
/// facade translates them into `TbdbError::Database`.

use crate::core::db::convert::value_to_json;
use rusqlite::types::Value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;
use tracing::debug;

/// Driver options for `Database::prepare`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Reuse a statement from the connection's prepared statement cache
    pub cached: bool,
}

impl PrepareOptions {
    pub fn cached() -> Self {
        PrepareOptions { cached: true }
    }
}

enum StatementInner<'conn> {
    Plain(rusqlite::Statement<'conn>),
    Cached(rusqlite::CachedStatement<'conn>),
}

/// A statement prepared on a live connection.
///
/// The statement borrows the connection, so the connection cannot be closed
/// while the statement is alive.
pub struct Statement<'conn> {
    sql: String,
    inner: StatementInner<'conn>,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn plain(sql: &str, stmt: rusqlite::Statement<'conn>) -> Self {
        Statement {
            sql: sql.to_string(),
            inner: StatementInner::Plain(stmt),
        }
    }

    pub(crate) fn cached(sql: &str, stmt: rusqlite::CachedStatement<'conn>) -> Self {
        Statement {
            sql: sql.to_string(),
            inner: StatementInner::Cached(stmt),
        }
    }

    /// The SQL text this statement was prepared from.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of bind placeholders in the statement.
    pub fn parameter_count(&self) -> usize {
        match &self.inner {
            StatementInner::Plain(stmt) => stmt.parameter_count(),
            StatementInner::Cached(stmt) => stmt.parameter_count(),
        }
    }

    pub(crate) fn raw_mut(&mut self) -> &mut rusqlite::Statement<'conn> {
        match &mut self.inner {
            StatementInner::Plain(stmt) => stmt,
            StatementInner::Cached(stmt) => &mut **stmt,
        }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement").field("sql", &self.sql).finish()
    }
}

/// The query argument accepted by `get_results` and `get_var`.
#[derive(Debug)]
pub enum Query<'a, 'conn: 'a> {
    /// A one-shot query string, executed without bind parameters
    Raw(&'a str),
    /// A statement from `Database::prepare`
    Prepared(&'a mut Statement<'conn>),
}

impl<'a> From<&'a str> for Query<'a, 'static> {
    fn from(sql: &'a str) -> Self {
        Query::Raw(sql)
    }
}

impl<'a> From<&'a String> for Query<'a, 'static> {
    fn from(sql: &'a String) -> Self {
        Query::Raw(sql.as_str())
    }
}

impl<'a, 'conn> From<&'a mut Statement<'conn>> for Query<'a, 'conn> {
    fn from(stmt: &'a mut Statement<'conn>) -> Self {
        Query::Prepared(stmt)
    }
}

/// Bind values for a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Values for `?` placeholders, in order
    Positional(Vec<Value>),
    /// Values for `:name`, `@name` or `$name` placeholders
    Named(Vec<(String, Value)>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Binds every value onto the statement.
    ///
    /// Bindings from an earlier execution are cleared first. The number of
    /// values must match the statement's placeholder count, and a named set
    /// may bind each placeholder only once, so every placeholder ends up bound
    /// by this call.
    pub(crate) fn bind(&self, stmt: &mut rusqlite::Statement<'_>) -> rusqlite::Result<()> {
        stmt.clear_bindings();
        let expected = stmt.parameter_count();
        if self.len() != expected {
            return Err(rusqlite::Error::InvalidParameterCount(self.len(), expected));
        }

        match self {
            Params::Positional(values) => {
                for (i, value) in values.iter().enumerate() {
                    stmt.raw_bind_parameter(i + 1, value)?;
                }
            }
            Params::Named(pairs) => {
                let mut bound = HashSet::with_capacity(pairs.len());
                for (name, value) in pairs {
                    let name = placeholder_name(name);
                    let index = stmt
                        .parameter_index(&name)?
                        .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.clone()))?;
                    if !bound.insert(index) {
                        return Err(rusqlite::Error::InvalidParameterName(name));
                    }
                    stmt.raw_bind_parameter(index, value)?;
                }
            }
        }
        Ok(())
    }
}

/// Adds the `:` prefix to bare parameter names.
fn placeholder_name(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}

/// One result row: column names mapped to values, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Row { columns }
    }

    /// Value of the first column with this name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn into_values(self) -> Vec<Value> {
        self.columns.into_iter().map(|(_, value)| value).collect()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, &value_to_json(value))?;
        }
        map.end()
    }
}

/// Binds `params` (if any) and fetches every row.
pub(crate) fn fetch_rows(stmt: &mut rusqlite::Statement<'_>, params: Option<&Params>) -> rusqlite::Result<Vec<Row>> {
    let empty = Params::default();
    params.unwrap_or(&empty).bind(stmt)?;

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    debug!(columns = columns.len(), "executing query");

    let mut rows = stmt.raw_query();
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            values.push((name.clone(), row.get::<_, Value>(i)?));
        }
        result.push(Row::new(values));
    }
    Ok(result)
}

/// Binds `params` and runs a statement that returns no rows.
pub(crate) fn execute(stmt: &mut rusqlite::Statement<'_>, params: &Params) -> rusqlite::Result<usize> {
    params.bind(stmt)?;
    debug!(params = params.len(), "executing statement");
    stmt.raw_execute()
}
