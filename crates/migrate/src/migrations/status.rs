//! Migration Status - Read-only view of files against the ledger

use std::collections::BTreeMap;

use crate::error::MigrateResult;

use super::definitions::{MigrationState, StatusEntry, StatusReport};
use super::runner::MigrationRunner;
use super::store::MigrationFileStore;

impl MigrationRunner<'_> {
    /// Applied or pending state for every up-file, ascending by version.
    /// Ledger versions with no up-file are appended as orphaned.
    pub async fn migration_status(&self) -> MigrateResult<StatusReport> {
        let files = self.store().list_up_files()?;
        let versions = MigrationFileStore::parse_versions(&files)?;

        if versions.is_empty() {
            return Ok(StatusReport::NoMigrationsFound);
        }

        let mut applied: BTreeMap<String, _> = self
            .ledger()
            .list_applied()
            .await?
            .into_iter()
            .map(|record| (record.version, record.applied_at))
            .collect();

        let mut entries: Vec<StatusEntry> = versions
            .into_iter()
            .map(|version| {
                let state = match applied.remove(version.as_str()) {
                    Some(applied_at) => MigrationState::Applied { applied_at },
                    None => MigrationState::Pending,
                };
                StatusEntry {
                    version: version.to_string(),
                    state,
                }
            })
            .collect();

        for (version, applied_at) in applied {
            tracing::warn!(version = %version, "Ledger records a version with no migration file");
            entries.push(StatusEntry {
                version,
                state: MigrationState::Orphaned { applied_at },
            });
        }

        Ok(StatusReport::Entries { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryExecutor;
    use crate::config::MigrateConfig;
    use crate::error::MigrateError;
    use crate::migrations::ledger::MigrationLedger;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_directory_reports_nothing_found() {
        let temp_dir = TempDir::new().unwrap();
        let config = MigrateConfig::new(temp_dir.path().join("migrations"));
        let executor = MemoryExecutor::new(&config.migrations_table);

        let report = MigrationRunner::new(&config, &executor).migration_status().await.unwrap();

        assert_eq!(report, StatusReport::NoMigrationsFound);
        assert!(report.entries().is_empty());
    }

    #[tokio::test]
    async fn test_reports_applied_and_pending() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["20240101000000_a", "20240102000000_b", "20240103000000_c"] {
            fs::write(temp_dir.path().join(format!("{name}.up.sql")), "SELECT 1;").unwrap();
        }
        let config = MigrateConfig::new(temp_dir.path());
        let executor = MemoryExecutor::new(&config.migrations_table);
        let ledger = MigrationLedger::new(&executor, &config.migrations_table);
        ledger.ensure_table().await.unwrap();
        ledger.record("20240101000000_a", "Migration: a").await.unwrap();
        ledger.record("20240102000000_b", "Migration: b").await.unwrap();

        let report = MigrationRunner::new(&config, &executor).migration_status().await.unwrap();
        let entries = report.entries();

        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0].state, MigrationState::Applied { applied_at: Some(_) }));
        assert!(matches!(entries[1].state, MigrationState::Applied { .. }));
        assert_eq!(entries[2].version, "20240103000000_c");
        assert_eq!(entries[2].state, MigrationState::Pending);
        assert_eq!(report.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_orphaned_ledger_rows_are_listed_last() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("20240102000000_b.up.sql"), "SELECT 1;").unwrap();
        let config = MigrateConfig::new(temp_dir.path());
        let executor = MemoryExecutor::new(&config.migrations_table);
        let ledger = MigrationLedger::new(&executor, &config.migrations_table);
        ledger.ensure_table().await.unwrap();
        ledger.record("20240101000000_gone", "Migration: gone").await.unwrap();

        let report = MigrationRunner::new(&config, &executor).migration_status().await.unwrap();
        let entries = report.entries();

        assert_eq!(entries[0].state, MigrationState::Pending);
        assert_eq!(entries[1].version, "20240101000000_gone");
        assert!(matches!(entries[1].state, MigrationState::Orphaned { .. }));
    }

    #[tokio::test]
    async fn test_invalid_filename_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("abc_bad.up.sql"), "SELECT 1;").unwrap();
        let config = MigrateConfig::new(temp_dir.path());
        let executor = MemoryExecutor::new(&config.migrations_table);

        let err = MigrationRunner::new(&config, &executor).migration_status().await.unwrap_err();

        assert!(matches!(err, MigrateError::InvalidFilename { .. }));
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let report = StatusReport::Entries {
            entries: vec![StatusEntry {
                version: "20240101000000_a".to_string(),
                state: MigrationState::Pending,
            }],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["result"], "entries");
        assert_eq!(json["entries"][0]["version"], "20240101000000_a");
        assert_eq!(json["entries"][0]["state"], "pending");
    }
}
