// Core infrastructure modules
pub mod core;

pub mod codec;
pub mod config;

#[cfg(test)]
mod test_utils;

pub use crate::config::{Config, OptionValue};
pub use crate::core::db::{Database, DbType, Insert, Params, PrepareOptions, Query, Row, Scalar, Statement};
pub use crate::core::{Result, TbdbError};
