//! Migration Definitions - Core types shared by the migration components
//!
//! Versions, ledger records and the outcome types returned by the applier,
//! rollback, status reporter, scaffold generator and baseline recorder.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::error::{MigrateError, MigrateResult};

/// Suffix of forward migration files
pub const UP_SUFFIX: &str = ".up.sql";
/// Suffix of rollback migration files
pub const DOWN_SUFFIX: &str = ".down.sql";
/// Width of the timestamp prefix of every version
pub const TIMESTAMP_LEN: usize = 14;

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{14}_[a-z0-9_]+$").expect("version pattern is valid"));

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("name pattern is valid"));

/// Identifier of one migration unit: `YYYYMMDDHHMMSS_<name>`
///
/// Ordering is plain string ordering, which is chronological because the
/// timestamp prefix has a fixed width.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MigrationVersion(String);

impl MigrationVersion {
    /// Parse and validate a version string
    pub fn parse(version: &str) -> MigrateResult<Self> {
        if VERSION_PATTERN.is_match(version) {
            Ok(Self(version.to_string()))
        } else {
            Err(MigrateError::InvalidVersion {
                version: version.to_string(),
            })
        }
    }

    /// Derive the version from an up-file name, validating the full grammar
    pub fn from_up_filename(filename: &str) -> MigrateResult<Self> {
        filename
            .strip_suffix(UP_SUFFIX)
            .filter(|version| VERSION_PATTERN.is_match(version))
            .map(|version| Self(version.to_string()))
            .ok_or_else(|| MigrateError::InvalidFilename {
                filename: filename.to_string(),
            })
    }

    /// The 14-digit timestamp prefix
    pub fn timestamp(&self) -> &str {
        &self.0[..TIMESTAMP_LEN]
    }

    /// The `<name>` part after the timestamp
    pub fn name(&self) -> &str {
        &self.0[TIMESTAMP_LEN + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn up_filename(&self) -> String {
        format!("{}{}", self.0, UP_SUFFIX)
    }

    pub fn down_filename(&self) -> String {
        format!("{}{}", self.0, DOWN_SUFFIX)
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a scaffold name against `[a-z0-9_]+`
pub fn is_valid_migration_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// A row of the tracking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRecord {
    pub version: String,
    pub applied_at: Option<NaiveDateTime>,
}

/// Which way a migration file is being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Apply the migration (run the `.up.sql` file)
    Up,
    /// Rollback the migration (run the `.down.sql` file)
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => f.write_str("up"),
            MigrationDirection::Down => f.write_str("down"),
        }
    }
}

/// How the statements of one migration file reach the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Each statement is sent on its own; a failure can leave earlier
    /// statements of the same file applied.
    #[default]
    PerStatement,
    /// The statements and the ledger write of one file share a transaction.
    Transactional,
}

/// Result of an `up` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The migrations directory does not exist
    NoMigrationsDirectory,
    /// The directory exists but holds no up-files
    NoMigrationFiles,
    /// Every up-file is already in the ledger
    AllApplied { skipped: usize },
    /// At least one pending migration was applied
    Applied {
        versions: Vec<MigrationVersion>,
        skipped: usize,
    },
}

impl ApplyOutcome {
    pub fn applied_count(&self) -> usize {
        match self {
            ApplyOutcome::Applied { versions, .. } => versions.len(),
            _ => 0,
        }
    }
}

/// Progress of an `up` run, reported as each version is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyEvent {
    /// Already in the ledger
    Skipped { version: MigrationVersion },
    Applying { version: MigrationVersion },
    /// Executed and recorded
    Applied { version: MigrationVersion },
}

/// Result of a `down` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The ledger is empty
    NothingToRollback,
    /// Exactly one version was reverted
    RolledBack { version: String },
}

/// Per-version state in a status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationState {
    Applied { applied_at: Option<NaiveDateTime> },
    Pending,
    /// Recorded in the ledger but the up-file is gone
    Orphaned { applied_at: Option<NaiveDateTime> },
}

/// One line of a status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub version: String,
    #[serde(flatten)]
    pub state: MigrationState,
}

/// Result of a `status` run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StatusReport {
    NoMigrationsFound,
    Entries { entries: Vec<StatusEntry> },
}

impl StatusReport {
    pub fn entries(&self) -> &[StatusEntry] {
        match self {
            StatusReport::NoMigrationsFound => &[],
            StatusReport::Entries { entries } => entries,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.state == MigrationState::Pending)
            .count()
    }
}

/// Files written by the scaffold generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldedMigration {
    pub version: MigrationVersion,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
}

/// Result of a `baseline` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineOutcome {
    AlreadyTracked { version: MigrationVersion },
    Recorded { version: MigrationVersion },
}
