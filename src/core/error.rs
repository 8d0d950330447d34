/// TBDB Error Module
///
/// This module defines the error taxonomy raised by the database facade.
/// Every failure is surfaced to the caller immediately; nothing here is
/// retried or swallowed.
use crate::core::db::DbType;
use thiserror::Error;

/// Message used when the driver reports a failure without any detail.
pub const UNEXPECTED_DATABASE_ERROR: &str = "Unexpected database error";

/// Error code used when the driver reports a failure without any code.
pub const UNKNOWN_ERROR_CODE: i64 = -1;

/// Error type for the database facade.
///
/// The variants group into four families:
/// - Configuration: unrecognized or mistyped options, unreadable config files
/// - Usage: substitutions without a prepared statement, calls before connecting
/// - Conversion: a scalar that cannot be coerced into the requested `DbType`
/// - Storage: the driver reported an execution failure
#[derive(Error, Debug)]
pub enum TbdbError {
    /// An option name outside the accepted set, or a value of the wrong type
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Configuration file loading and parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A call that combines arguments in an unsupported way
    #[error("Argument error: {0}")]
    Argument(String),

    /// A data call issued without a live connection
    #[error("Database connection is not initialized")]
    Uninitialized,

    /// A result that cannot be converted into the requested type
    #[error("Invalid conversion to {kind}: {message}")]
    InvalidConversion { kind: DbType, message: String },

    /// Driver-level failure with the driver's own message and code
    #[error("Database error ({code}): {message}")]
    Database {
        message: String,
        code: i64,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared state could not be locked
    #[error("State error: {0}")]
    State(String),
}

impl TbdbError {
    /// Builds a `Database` error that carries no underlying driver error.
    pub fn database(message: impl Into<String>, code: i64) -> Self {
        TbdbError::Database {
            message: message.into(),
            code,
            source: None,
        }
    }

    pub fn conversion(kind: DbType, message: impl Into<String>) -> Self {
        TbdbError::InvalidConversion {
            kind,
            message: message.into(),
        }
    }

    /// Driver error code for `Database` errors, `None` for everything else.
    pub fn code(&self) -> Option<i64> {
        match self {
            TbdbError::Database { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Type alias for Result to use TbdbError as the error type.
pub type Result<T> = std::result::Result<T, TbdbError>;
