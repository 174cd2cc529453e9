//! Migration Baseline - Marks an existing migration as applied
//!
//! For databases whose schema was created outside the tool: the version is
//! written to the ledger without executing its SQL.

use crate::error::{MigrateError, MigrateResult};

use super::definitions::{BaselineOutcome, MigrationVersion};
use super::runner::MigrationRunner;

impl MigrationRunner<'_> {
    /// Record `version` as applied. Recording an already tracked version is
    /// a no-op.
    pub async fn baseline(&self, version: &str) -> MigrateResult<BaselineOutcome> {
        let version = MigrationVersion::parse(version)?;

        let up_path = self.store().up_path(&version);
        if !up_path.is_file() {
            return Err(MigrateError::MigrationFileNotFound {
                version: version.to_string(),
                path: up_path,
            });
        }

        let ledger = self.ledger();
        if ledger.is_recorded(version.as_str()).await? {
            tracing::info!(version = %version, "Version already tracked");
            return Ok(BaselineOutcome::AlreadyTracked { version });
        }

        let description = format!("Baseline: {}", version.up_filename());
        ledger.record(version.as_str(), &description).await?;
        tracing::info!(version = %version, "Version recorded as baseline");

        Ok(BaselineOutcome::Recorded { version })
    }
}
