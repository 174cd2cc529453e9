//! # roledir-migrate: Schema migrations for the roledir database
//!
//! Applies timestamp-ordered SQL migration files to PostgreSQL, rolls back
//! the latest one, reports status and scaffolds new migration pairs. The
//! migration components talk to the database only through
//! [`backends::SqlExecutor`].

pub mod backends;
pub mod config;
pub mod error;
pub mod migrations;

pub use backends::{MemoryExecutor, PostgresExecutor, SqlExecutor};
pub use config::*;
pub use error::*;
pub use migrations::*;
