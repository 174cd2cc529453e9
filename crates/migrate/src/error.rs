//! Error types for the migration system
//!
//! Every fatal condition names the artifact at fault (file, version or
//! environment variable) so an operator can act on the message alone.
//! "Nothing to do" outcomes are not errors; they are reported through the
//! outcome enums in [`crate::migrations::definitions`].

use std::path::PathBuf;
use thiserror::Error;

use crate::migrations::definitions::MigrationDirection;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("{var} environment variable is required")]
    MissingEnvVar { var: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid migration filename: {filename} (expected format: YYYYMMDDHHMMSS_name.up.sql)")]
    InvalidFilename { filename: String },

    #[error("Duplicate migration versions found: {}", format_duplicates(.duplicates))]
    DuplicateVersions { duplicates: Vec<(String, Vec<String>)> },

    #[error("Invalid migration name '{name}': name must be lowercase letters, digits and underscores only")]
    InvalidName { name: String },

    #[error("Invalid migration version '{version}': expected YYYYMMDDHHMMSS_name")]
    InvalidVersion { version: String },

    #[error("{direction} migration failed: {version} (statement {statement}): {message}")]
    ExecutionFailed {
        version: String,
        direction: MigrationDirection,
        statement: usize,
        message: String,
    },

    #[error("{direction} migration failed: {version} (recording in ledger): {message}")]
    LedgerWriteFailed {
        version: String,
        direction: MigrationDirection,
        message: String,
    },

    #[error("Rollback file not found: {version}.down.sql (looked in {})", .path.display())]
    MissingRollbackFile { version: String, path: PathBuf },

    #[error("Migration file not found for {version}: {}", .path.display())]
    MigrationFileNotFound { version: String, path: PathBuf },

    #[error("Refusing to overwrite existing migration file: {}", .path.display())]
    ScaffoldExists { path: PathBuf },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("IO error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Broad class of a [`MigrateError`], used by the CLI to pick a hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Execution,
    Rollback,
    Database,
    Io,
}

impl MigrateError {
    /// Wrap a driver-level failure
    pub fn database<E: std::fmt::Display>(err: E) -> Self {
        MigrateError::Database {
            message: err.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrateError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MigrateError::MissingEnvVar { .. } | MigrateError::Configuration { .. } => {
                ErrorCategory::Configuration
            }
            MigrateError::InvalidFilename { .. }
            | MigrateError::DuplicateVersions { .. }
            | MigrateError::InvalidName { .. }
            | MigrateError::InvalidVersion { .. }
            | MigrateError::MigrationFileNotFound { .. }
            | MigrateError::ScaffoldExists { .. } => ErrorCategory::Validation,
            MigrateError::ExecutionFailed { .. } | MigrateError::LedgerWriteFailed { .. } => {
                ErrorCategory::Execution
            }
            MigrateError::MissingRollbackFile { .. } => ErrorCategory::Rollback,
            MigrateError::Database { .. } => ErrorCategory::Database,
            MigrateError::Io { .. } => ErrorCategory::Io,
        }
    }
}

fn format_duplicates(duplicates: &[(String, Vec<String>)]) -> String {
    duplicates
        .iter()
        .map(|(timestamp, files)| format!("{} ({})", timestamp, files.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        MigrateError::database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_message_names_every_file() {
        let err = MigrateError::DuplicateVersions {
            duplicates: vec![(
                "20240101000000".to_string(),
                vec![
                    "20240101000000_a.up.sql".to_string(),
                    "20240101000000_b.up.sql".to_string(),
                ],
            )],
        };

        let message = err.to_string();
        assert!(message.contains("20240101000000 ("));
        assert!(message.contains("20240101000000_a.up.sql"));
        assert!(message.contains("20240101000000_b.up.sql"));
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_execution_failure_names_version() {
        let err = MigrateError::ExecutionFailed {
            version: "20240601120000_create_foo".to_string(),
            direction: MigrationDirection::Up,
            statement: 2,
            message: "relation \"foo\" already exists".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "up migration failed: 20240601120000_create_foo (statement 2): relation \"foo\" already exists"
        );
        assert_eq!(err.category(), ErrorCategory::Execution);
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = MigrateError::MissingEnvVar {
            var: "DATABASE_URL".to_string(),
        };
        assert_eq!(err.to_string(), "DATABASE_URL environment variable is required");
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_io_message_leaves_cause_to_source_chain() {
        let err = MigrateError::io(
            "migrations/20240101000000_a.up.sql",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
        );

        assert_eq!(err.to_string(), "IO error on migrations/20240101000000_a.up.sql");
        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("permission denied"));
    }

    #[test]
    fn test_ledger_write_failure_message() {
        let err = MigrateError::LedgerWriteFailed {
            version: "20240601120000_create_foo".to_string(),
            direction: MigrationDirection::Up,
            message: "duplicate key".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "up migration failed: 20240601120000_create_foo (recording in ledger): duplicate key"
        );
        assert_eq!(err.category(), ErrorCategory::Execution);
    }
}
