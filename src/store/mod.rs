//! Persistence layer: libSQL-backed storage for job applications.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, Direction, Field, Filter, FilterOp, FilterValue, OrderBy};
