/// Database Facade Module
///
/// `Database` owns one SQLite connection and exposes the four data
/// operations (`prepare`, `get_results`, `get_var`, `insert`). Every driver
/// failure goes through `handle_query_error`.

use crate::config::Config;
use crate::core::db::convert::{convert, DbType, Scalar};
use crate::core::db::query::{execute, fetch_rows, Params, PrepareOptions, Query, Row, Statement};
use crate::core::error::{UNEXPECTED_DATABASE_ERROR, UNKNOWN_ERROR_CODE};
use crate::core::{Result, TbdbError};
use rusqlite::{Batch, Connection, Transaction};
use tracing::{debug, error, info, warn};

/// The only driver backed by this crate.
pub const SQLITE_DRIVER: &str = "sqlite";

/// Rows to insert with `Database::insert`.
#[derive(Debug, Clone, PartialEq)]
pub enum Insert {
    /// Run every statement in the query as-is, without bind parameters
    Exec,
    /// Prepare the query and execute it once
    Single(Params),
    /// Prepare the query once and execute it per parameter set, in one transaction
    Multiple(Vec<Params>),
}

/// Facade over a single database connection.
#[derive(Debug)]
pub struct Database {
    config: Config,
    connection: Option<Connection>,
}

impl Database {
    /// Opens a connection described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `TbdbError::Database` with message "could not find driver" for
    /// any driver other than `sqlite`, `TbdbError::InvalidOption` for an
    /// unsupported charset, and the translated driver error if SQLite cannot
    /// open the file.
    pub fn connect(config: Config) -> Result<Self> {
        let connection = open(&config)?;
        info!(dsn = %config.dsn(), "connected to database");
        Ok(Database {
            config,
            connection: Some(connection),
        })
    }

    /// The configuration this facade was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the facade still holds an open connection.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Releases the connection. Later data calls fail with `Uninitialized`.
    ///
    /// Closing an already closed facade is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            connection
                .close()
                .map_err(|(_, err)| Self::handle_query_error(err))?;
            info!(dsn = %self.config.dsn(), "closed database connection");
        }
        Ok(())
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(TbdbError::Uninitialized)
    }

    /// Prepares `query` on the live connection.
    pub fn prepare(&self, query: &str, options: PrepareOptions) -> Result<Statement<'_>> {
        let connection = self.connection()?;
        debug!(sql = query, cached = options.cached, "preparing statement");
        let stmt = prepare_single(connection, query)?;
        if options.cached {
            drop(stmt);
            connection
                .prepare_cached(query)
                .map(|stmt| Statement::cached(query, stmt))
                .map_err(Self::handle_query_error)
        } else {
            Ok(Statement::plain(query, stmt))
        }
    }

    /// Executes `query` and returns every row.
    ///
    /// Substitutions are only accepted together with a prepared statement.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use tbdb::core::db::{Database, Params, PrepareOptions};
    /// # fn run(db: &Database) -> tbdb::core::Result<()> {
    /// let all = db.get_results("SELECT id, name FROM users", None)?;
    ///
    /// let mut stmt = db.prepare("SELECT name FROM users WHERE id = ?", PrepareOptions::default())?;
    /// let one = db.get_results(&mut stmt, Some(Params::positional([1i64])))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn get_results<'a, 'conn>(
        &self,
        query: impl Into<Query<'a, 'conn>>,
        substitutions: Option<Params>,
    ) -> Result<Vec<Row>>
    where
        'conn: 'a,
    {
        self.run(query.into(), substitutions)
    }

    /// Executes `query` and converts the first value of the first column.
    ///
    /// Returns `Ok(None)` when the query yields no rows.
    pub fn get_var<'a, 'conn>(
        &self,
        query: impl Into<Query<'a, 'conn>>,
        substitutions: Option<Params>,
        db_type: DbType,
    ) -> Result<Option<Scalar>>
    where
        'conn: 'a,
    {
        let rows = self.run(query.into(), substitutions)?;
        let first = rows
            .into_iter()
            .next()
            .and_then(|row| row.into_values().into_iter().next());

        match first {
            Some(value) => convert(value, db_type).map(Some),
            None => Ok(None),
        }
    }

    fn run(&self, query: Query<'_, '_>, substitutions: Option<Params>) -> Result<Vec<Row>> {
        match query {
            Query::Raw(sql) => {
                if substitutions.is_some() {
                    return Err(TbdbError::Argument(
                        "substitutions require a prepared statement; did you forget to call Database::prepare()?"
                            .to_string(),
                    ));
                }
                let connection = self.connection()?;
                debug!(sql, "running one-shot query");
                let mut stmt = prepare_single(connection, sql)?;
                fetch_rows(&mut stmt, None).map_err(Self::handle_query_error)
            }
            Query::Prepared(stmt) => {
                self.connection()?;
                debug!(sql = stmt.sql(), "running prepared statement");
                fetch_rows(stmt.raw_mut(), substitutions.as_ref()).map_err(Self::handle_query_error)
            }
        }
    }

    /// Inserts rows and returns the generated row ids in execution order.
    ///
    /// `Insert::Exec` reports the row id of the last insert in the text. The
    /// prepared forms accept exactly one statement.
    ///
    /// `Insert::Multiple` runs inside a transaction: if any row fails the
    /// whole batch is rolled back and the error is returned.
    pub fn insert(&self, query: &str, rows: Insert) -> Result<Vec<i64>> {
        let connection = self.connection()?;
        match rows {
            Insert::Exec => {
                debug!(sql = query, "executing insert");
                connection
                    .execute_batch(query)
                    .map_err(Self::handle_query_error)?;
                Ok(vec![connection.last_insert_rowid()])
            }
            Insert::Single(params) => {
                debug!(sql = query, "executing prepared insert");
                let mut stmt = prepare_single(connection, query)?;
                execute(&mut stmt, &params).map_err(Self::handle_query_error)?;
                Ok(vec![connection.last_insert_rowid()])
            }
            Insert::Multiple(batch) => {
                let mut stmt = prepare_single(connection, query)?;
                let tx = connection
                    .unchecked_transaction()
                    .map_err(Self::handle_query_error)?;
                match insert_batch(&tx, &mut stmt, &batch) {
                    Ok(ids) => {
                        tx.commit().map_err(Self::handle_query_error)?;
                        debug!(sql = query, rows = ids.len(), "committed batch insert");
                        Ok(ids)
                    }
                    Err(err) => {
                        warn!(sql = query, error = %err, "batch insert failed, rolling back");
                        if let Err(rollback_err) = tx.rollback() {
                            error!(error = %rollback_err, "rollback failed");
                        }
                        Err(Self::handle_query_error(err))
                    }
                }
            }
        }
    }

    /// Translates a driver error into `TbdbError::Database`.
    ///
    /// Uses SQLite's message and extended result code when present, otherwise
    /// the generic message and code -1. The driver error stays attached as
    /// the error source.
    fn handle_query_error(err: rusqlite::Error) -> TbdbError {
        let (message, code) = match &err {
            rusqlite::Error::SqliteFailure(failure, message) => (
                message.clone().unwrap_or_else(|| failure.to_string()),
                i64::from(failure.extended_code),
            ),
            _ => (UNEXPECTED_DATABASE_ERROR.to_string(), UNKNOWN_ERROR_CODE),
        };
        error!(code, message = %message, cause = %err, "database error");
        TbdbError::Database {
            message,
            code,
            source: Some(err),
        }
    }
}

fn insert_batch(
    tx: &Transaction<'_>,
    stmt: &mut rusqlite::Statement<'_>,
    batch: &[Params],
) -> rusqlite::Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(batch.len());
    for params in batch {
        execute(stmt, params)?;
        ids.push(tx.last_insert_rowid());
    }
    Ok(ids)
}

/// Prepares the single statement in `sql`.
///
/// Fails with `TbdbError::Argument` when more SQL follows the first
/// statement.
fn prepare_single<'conn>(connection: &'conn Connection, sql: &str) -> Result<rusqlite::Statement<'conn>> {
    let mut batch = Batch::new(connection, sql);
    let first = batch.next().map_err(Database::handle_query_error)?;
    if batch.next().map_err(Database::handle_query_error)?.is_some() {
        return Err(TbdbError::Argument(
            "query contains more than one statement; use Insert::Exec to run several".to_string(),
        ));
    }
    match first {
        Some(stmt) => Ok(stmt),
        None => connection.prepare(sql).map_err(Database::handle_query_error),
    }
}

fn open(config: &Config) -> Result<Connection> {
    if config.driver != SQLITE_DRIVER {
        warn!(driver = %config.driver, "unsupported database driver");
        return Err(TbdbError::database("could not find driver", UNKNOWN_ERROR_CODE));
    }
    let encoding = sqlite_encoding(&config.charset)?;

    let connection = if config.dbname.is_empty() || config.dbname == ":memory:" {
        Connection::open_in_memory()
    } else {
        Connection::open(&config.dbname)
    }
    .map_err(Database::handle_query_error)?;

    // encoding only takes effect on a database that has no content yet
    connection
        .execute_batch(&format!(
            "PRAGMA encoding = '{}'; PRAGMA foreign_keys = ON;",
            encoding
        ))
        .map_err(Database::handle_query_error)?;

    debug!(config = ?config, "opened sqlite connection");
    Ok(connection)
}

fn sqlite_encoding(charset: &str) -> Result<&'static str> {
    match charset.to_ascii_lowercase().as_str() {
        "utf8" | "utf8mb4" | "utf-8" => Ok("UTF-8"),
        "utf16" | "utf-16" => Ok("UTF-16"),
        other => Err(TbdbError::InvalidOption(format!(
            "charset '{}' is not supported by the sqlite driver",
            other
        ))),
    }
}
