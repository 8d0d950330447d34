/// Core Module for TBDB
///
/// This module contains the database facade and its supporting pieces:
/// connection lifecycle, query execution, scalar conversion and the error
/// taxonomy shared by all of them.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, TbdbError};
