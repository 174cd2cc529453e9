//! Migration Runner - Applies pending migrations
//!
//! Diffs the file store against the ledger and executes pending up-files in
//! ascending version order. A migration is recorded only after every one of
//! its statements succeeded; the first failing statement aborts the run.

use std::collections::HashSet;

use crate::backends::{SqlExecutor, SqlQuery};
use crate::config::MigrateConfig;
use crate::error::{MigrateError, MigrateResult};

use super::definitions::{
    ApplyEvent, ApplyOutcome, ExecutionMode, MigrationDirection, MigrationVersion,
};
use super::ledger::MigrationLedger;
use super::splitter::split_statements;
use super::store::MigrationFileStore;

/// Migration runner that executes migration files against a database
pub struct MigrationRunner<'a> {
    store: MigrationFileStore,
    executor: &'a dyn SqlExecutor,
    table: String,
    mode: ExecutionMode,
}

impl<'a> MigrationRunner<'a> {
    /// Create a runner for the configured directory and tracking table
    pub fn new(config: &MigrateConfig, executor: &'a dyn SqlExecutor) -> Self {
        Self {
            store: MigrationFileStore::new(&config.migrations_dir),
            executor,
            table: config.migrations_table.clone(),
            mode: config.execution_mode,
        }
    }

    pub fn store(&self) -> &MigrationFileStore {
        &self.store
    }

    pub fn ledger(&self) -> MigrationLedger<'a> {
        MigrationLedger::new(self.executor, &self.table)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Apply every pending migration
    pub async fn run_migrations(&self) -> MigrateResult<ApplyOutcome> {
        self.run_migrations_with(|_| {}).await
    }

    /// Apply every pending migration, reporting each version to `on_event`
    /// as it is skipped, started and recorded. Versions recorded before a
    /// failure have already been reported when the error is returned.
    pub async fn run_migrations_with<F>(&self, mut on_event: F) -> MigrateResult<ApplyOutcome>
    where
        F: FnMut(ApplyEvent),
    {
        if !self.store.exists() {
            tracing::info!(dir = %self.store.dir().display(), "No migrations directory found");
            return Ok(ApplyOutcome::NoMigrationsDirectory);
        }

        let ledger = self.ledger();
        let applied: HashSet<String> = ledger
            .list_applied()
            .await?
            .into_iter()
            .map(|record| record.version)
            .collect();

        let files = self.store.list_up_files()?;
        if files.is_empty() {
            tracing::info!(dir = %self.store.dir().display(), "No migration files found");
            return Ok(ApplyOutcome::NoMigrationFiles);
        }

        // The whole batch is validated before any statement runs
        let versions = MigrationFileStore::parse_versions(&files)?;
        let duplicates = MigrationFileStore::find_duplicate_versions(&files);
        if !duplicates.is_empty() {
            return Err(MigrateError::DuplicateVersions { duplicates });
        }

        let mut newly_applied = Vec::new();
        let mut skipped = 0;

        for version in versions {
            if applied.contains(version.as_str()) {
                tracing::debug!(version = %version, "Migration already applied, skipping");
                on_event(ApplyEvent::Skipped { version });
                skipped += 1;
                continue;
            }

            tracing::info!(version = %version, "Applying migration");
            on_event(ApplyEvent::Applying {
                version: version.clone(),
            });
            self.apply_migration(&ledger, &version).await?;
            tracing::info!(version = %version, "Migration applied");
            on_event(ApplyEvent::Applied {
                version: version.clone(),
            });

            newly_applied.push(version);
        }

        if newly_applied.is_empty() {
            Ok(ApplyOutcome::AllApplied { skipped })
        } else {
            Ok(ApplyOutcome::Applied {
                versions: newly_applied,
                skipped,
            })
        }
    }

    /// Execute one up-file and record it
    async fn apply_migration(
        &self,
        ledger: &MigrationLedger<'_>,
        version: &MigrationVersion,
    ) -> MigrateResult<()> {
        let sql = self.store.read(&self.store.up_path(version))?;
        let statements = split_statements(&sql);
        let description = format!("Migration: {}", version.up_filename());

        match self.mode {
            ExecutionMode::PerStatement => {
                self.execute_statements(version.as_str(), MigrationDirection::Up, &statements)
                    .await?;
                ledger.record(version.as_str(), &description).await
            }
            ExecutionMode::Transactional => {
                let bookkeeping = ledger.record_query(version.as_str(), &description);
                self.execute_atomically(version.as_str(), MigrationDirection::Up, &statements, bookkeeping)
                    .await
            }
        }
    }

    /// Send statements one at a time, stopping at the first failure
    pub(crate) async fn execute_statements(
        &self,
        version: &str,
        direction: MigrationDirection,
        statements: &[String],
    ) -> MigrateResult<()> {
        for (index, statement) in statements.iter().enumerate() {
            tracing::debug!(version, statement = index + 1, sql = %statement, "Executing statement");
            self.executor
                .execute(statement, &[])
                .await
                .map_err(|e| MigrateError::ExecutionFailed {
                    version: version.to_string(),
                    direction,
                    statement: index + 1,
                    message: error_detail(e),
                })?;
        }
        Ok(())
    }

    /// Send statements plus the ledger write as one transaction
    pub(crate) async fn execute_atomically(
        &self,
        version: &str,
        direction: MigrationDirection,
        statements: &[String],
        bookkeeping: SqlQuery,
    ) -> MigrateResult<()> {
        let mut batch: Vec<SqlQuery> = statements.iter().map(SqlQuery::new).collect();
        batch.push(bookkeeping);

        self.executor
            .execute_in_transaction(&batch)
            .await
            .map_err(|failure| {
                // The last query of the batch is the ledger write
                if failure.index >= statements.len() {
                    MigrateError::LedgerWriteFailed {
                        version: version.to_string(),
                        direction,
                        message: failure.message,
                    }
                } else {
                    MigrateError::ExecutionFailed {
                        version: version.to_string(),
                        direction,
                        statement: failure.index + 1,
                        message: failure.message,
                    }
                }
            })
    }
}

/// The driver message without the "Database error:" wrapper
fn error_detail(err: MigrateError) -> String {
    match err {
        MigrateError::Database { message } => message,
        other => other.to_string(),
    }
}
