/// Database Module
///
/// The facade is split into focused submodules:
/// - **Connection Management** (`connection.rs`): opening connections and the process-wide instance
/// - **Query Execution** (`query.rs`): statements, bind parameters and row fetching
/// - **Scalar Conversion** (`convert.rs`): the `DbType` conversion matrix used by `get_var`
/// - **Facade** (`facade.rs`): the `Database` type tying the above together
///
/// ## Error Handling
///
/// Every driver failure is translated into `TbdbError::Database` by a single
/// routine, so callers see one error shape regardless of which call failed.
pub mod connection;
pub mod convert;
pub mod facade;
pub mod query;

pub use connection::{close, current_config, get_instance, init, init_from_file, reset, SharedDatabase};
pub use convert::{DbType, Scalar};
pub use facade::{Database, Insert};
pub use query::{Params, PrepareOptions, Query, Row, Statement};
