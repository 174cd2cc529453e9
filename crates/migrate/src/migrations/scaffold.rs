//! Migration Scaffold - Generates empty up/down migration files

use chrono::{DateTime, Local, SecondsFormat};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::{MigrateError, MigrateResult};

use super::definitions::{is_valid_migration_name, MigrationVersion, ScaffoldedMigration};
use super::store::MigrationFileStore;

/// Writes new migration file pairs into a store
pub struct MigrationScaffold {
    store: MigrationFileStore,
}

impl MigrationScaffold {
    pub fn new(store: MigrationFileStore) -> Self {
        Self { store }
    }

    /// Create a migration pair versioned with the current local time
    pub fn create_migration(&self, name: &str) -> MigrateResult<ScaffoldedMigration> {
        self.create_migration_at(name, Local::now())
    }

    /// Create a migration pair versioned with `now`
    pub fn create_migration_at(
        &self,
        name: &str,
        now: DateTime<Local>,
    ) -> MigrateResult<ScaffoldedMigration> {
        if !is_valid_migration_name(name) {
            return Err(MigrateError::InvalidName {
                name: name.to_string(),
            });
        }

        self.store.ensure_dir()?;

        let version = MigrationVersion::parse(&format!("{}_{}", now.format("%Y%m%d%H%M%S"), name))?;
        let up_path = self.store.up_path(&version);
        let down_path = self.store.down_path(version.as_str());

        // Same-second collisions are refused, never overwritten
        for path in [&up_path, &down_path] {
            if path.exists() {
                return Err(MigrateError::ScaffoldExists { path: path.clone() });
            }
        }

        let created = now.to_rfc3339_opts(SecondsFormat::Millis, false);
        write_new(&up_path, &up_template(name, &created))?;
        write_new(&down_path, &down_template(name, &created))?;

        tracing::info!(version = %version, "Created migration");

        Ok(ScaffoldedMigration {
            version,
            up_path,
            down_path,
        })
    }
}

fn write_new(path: &Path, content: &str) -> MigrateResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => MigrateError::ScaffoldExists {
                path: path.to_path_buf(),
            },
            _ => MigrateError::io(path, e),
        })?;

    file.write_all(content.as_bytes())
        .map_err(|e| MigrateError::io(path, e))
}

fn up_template(name: &str, created: &str) -> String {
    format!(
        "-- Up migration: {}\n\
         -- Created: {}\n\
         -- Add your SQL statements here\n\
         \n\
         -- Example:\n\
         -- CREATE TABLE IF NOT EXISTS example (\n\
         --   id SERIAL PRIMARY KEY,\n\
         --   name VARCHAR(255) NOT NULL,\n\
         --   created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP\n\
         -- );\n",
        name, created
    )
}

fn down_template(name: &str, created: &str) -> String {
    format!(
        "-- Down migration: {}\n\
         -- Created: {}\n\
         -- Add your rollback SQL statements here\n\
         \n\
         -- Example:\n\
         -- DROP TABLE IF EXISTS example;\n",
        name, created
    )
}
