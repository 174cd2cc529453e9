//! Migration Rollback - Reverts the most recently applied migration
//!
//! Exactly one version is reverted per call. The ledger row is deleted only
//! after every statement of the down-file succeeded.

use crate::error::{MigrateError, MigrateResult};

use super::definitions::{ExecutionMode, MigrationDirection, RollbackOutcome};
use super::runner::MigrationRunner;
use super::splitter::split_statements;

/// Extension trait for MigrationRunner to add rollback functionality
pub trait MigrationRollback {
    /// Rollback the latest applied migration
    async fn rollback_latest(&self) -> MigrateResult<RollbackOutcome>;

    /// Rollback a specific recorded version
    async fn rollback_version(&self, version: &str) -> MigrateResult<()>;
}

impl MigrationRollback for MigrationRunner<'_> {
    async fn rollback_latest(&self) -> MigrateResult<RollbackOutcome> {
        let latest = self.ledger().latest().await?;

        let Some(record) = latest else {
            tracing::info!("No migrations to rollback");
            return Ok(RollbackOutcome::NothingToRollback);
        };

        self.rollback_version(&record.version).await?;

        Ok(RollbackOutcome::RolledBack {
            version: record.version,
        })
    }

    async fn rollback_version(&self, version: &str) -> MigrateResult<()> {
        let down_path = self.store().down_path(version);
        if !down_path.is_file() {
            return Err(MigrateError::MissingRollbackFile {
                version: version.to_string(),
                path: down_path,
            });
        }

        tracing::info!(version, "Rolling back migration");

        let sql = self.store().read(&down_path)?;
        let statements = split_statements(&sql);
        let ledger = self.ledger();

        match self.execution_mode() {
            ExecutionMode::PerStatement => {
                self.execute_statements(version, MigrationDirection::Down, &statements)
                    .await?;
                ledger.unrecord(version).await?;
            }
            ExecutionMode::Transactional => {
                let bookkeeping = ledger.unrecord_query(version);
                self.execute_atomically(version, MigrationDirection::Down, &statements, bookkeeping)
                    .await?;
            }
        }

        tracing::info!(version, "Migration rolled back");
        Ok(())
    }
}
