//! SQL execution backends
//!
//! The migration components depend only on [`SqlExecutor`]. PostgreSQL is the
//! production backend; the in-memory backend drives tests.

pub mod core;
pub mod memory;
pub mod postgres;

pub use self::core::{BatchFailure, SqlExecutor, SqlQuery, SqlRow, SqlValue};
pub use memory::MemoryExecutor;
pub use postgres::PostgresExecutor;
