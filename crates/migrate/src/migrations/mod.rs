//! Migration System
//!
//! Migrations are pairs of `<version>.up.sql` / `<version>.down.sql` files,
//! applied in ascending version order and tracked in a ledger table.

pub mod baseline;
pub mod definitions;
pub mod ledger;
pub mod rollback;
pub mod runner;
pub mod scaffold;
pub mod splitter;
pub mod status;
pub mod store;

pub use definitions::*;
pub use ledger::{LedgerSql, MigrationLedger, DEFAULT_MIGRATIONS_TABLE};
pub use rollback::MigrationRollback;
pub use runner::MigrationRunner;
pub use scaffold::MigrationScaffold;
pub use splitter::split_statements;
pub use store::MigrationFileStore;
