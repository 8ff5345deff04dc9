//! SQLite storage layer.
//!
//! A storage driver backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod driver;
pub mod pool;

pub use driver::SqliteDriver;
pub use pool::DatabasePool;
