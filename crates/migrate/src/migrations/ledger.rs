//! Migration Ledger - The `schema_migrations` tracking table
//!
//! The ledger is the source of truth for "what has been applied". The table is
//! created lazily: every read path calls [`MigrationLedger::ensure_table`]
//! first, so there is no separate install step.

use crate::backends::{SqlExecutor, SqlQuery, SqlValue};
use crate::error::MigrateResult;

use super::definitions::LedgerRecord;

/// Default tracking table name
pub const DEFAULT_MIGRATIONS_TABLE: &str = "schema_migrations";

/// SQL text for every ledger operation against one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSql {
    pub create_table: String,
    pub list_applied: String,
    pub latest: String,
    pub exists: String,
    pub insert: String,
    pub delete: String,
}

impl LedgerSql {
    pub fn for_table(table: &str) -> Self {
        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {} (\n    \
                    version VARCHAR(255) PRIMARY KEY,\n    \
                    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n    \
                    description TEXT\n\
                )",
                table
            ),
            list_applied: format!("SELECT version, applied_at FROM {} ORDER BY version", table),
            latest: format!(
                "SELECT version, applied_at FROM {} ORDER BY applied_at DESC, version DESC LIMIT 1",
                table
            ),
            exists: format!("SELECT version FROM {} WHERE version = $1", table),
            insert: format!("INSERT INTO {} (version, description) VALUES ($1, $2)", table),
            delete: format!("DELETE FROM {} WHERE version = $1", table),
        }
    }
}

/// Typed access to the tracking table through a [`SqlExecutor`]
pub struct MigrationLedger<'a> {
    executor: &'a dyn SqlExecutor,
    sql: LedgerSql,
}

impl<'a> MigrationLedger<'a> {
    pub fn new(executor: &'a dyn SqlExecutor, table: &str) -> Self {
        Self {
            executor,
            sql: LedgerSql::for_table(table),
        }
    }

    pub fn sql(&self) -> &LedgerSql {
        &self.sql
    }

    /// Create the tracking table if it does not exist yet
    pub async fn ensure_table(&self) -> MigrateResult<()> {
        self.executor.execute(&self.sql.create_table, &[]).await?;
        Ok(())
    }

    /// Every applied version, ascending by version
    pub async fn list_applied(&self) -> MigrateResult<Vec<LedgerRecord>> {
        self.ensure_table().await?;
        let rows = self.executor.fetch_all(&self.sql.list_applied, &[]).await?;

        rows.iter()
            .map(|row| {
                Ok(LedgerRecord {
                    version: row.text("version")?,
                    applied_at: row.timestamp("applied_at")?,
                })
            })
            .collect()
    }

    /// The most recently applied record
    pub async fn latest(&self) -> MigrateResult<Option<LedgerRecord>> {
        self.ensure_table().await?;
        let row = self.executor.fetch_optional(&self.sql.latest, &[]).await?;

        row.map(|row| {
            Ok(LedgerRecord {
                version: row.text("version")?,
                applied_at: row.timestamp("applied_at")?,
            })
        })
        .transpose()
    }

    pub async fn is_recorded(&self, version: &str) -> MigrateResult<bool> {
        self.ensure_table().await?;
        let row = self
            .executor
            .fetch_optional(&self.sql.exists, &[SqlValue::from(version)])
            .await?;
        Ok(row.is_some())
    }

    /// Insert a record. Fails on a primary-key violation.
    pub async fn record(&self, version: &str, description: &str) -> MigrateResult<()> {
        self.executor
            .execute(
                &self.sql.insert,
                &[SqlValue::from(version), SqlValue::from(description)],
            )
            .await?;
        Ok(())
    }

    /// Delete a record; a missing version is not an error
    pub async fn unrecord(&self, version: &str) -> MigrateResult<()> {
        self.executor
            .execute(&self.sql.delete, &[SqlValue::from(version)])
            .await?;
        Ok(())
    }

    /// The insert as a query, for use inside a transactional batch
    pub fn record_query(&self, version: &str, description: &str) -> SqlQuery {
        SqlQuery::new(self.sql.insert.clone())
            .bind(version)
            .bind(description)
    }

    /// The delete as a query, for use inside a transactional batch
    pub fn unrecord_query(&self, version: &str) -> SqlQuery {
        SqlQuery::new(self.sql.delete.clone()).bind(version)
    }
}
