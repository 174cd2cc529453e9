use anyhow::{bail, Result};
use roledir_migrate::{
    ApplyEvent, ApplyOutcome, BaselineOutcome, MigrateConfig, MigrationFileStore,
    MigrationRollback, MigrationRunner, MigrationScaffold, MigrationState, RollbackOutcome,
    SqlExecutor, StatusEntry, StatusReport,
};

pub async fn up(config: &MigrateConfig, executor: &dyn SqlExecutor) -> Result<()> {
    println!("📦 Applying migrations...\n");

    let runner = MigrationRunner::new(config, executor);
    let outcome = runner
        .run_migrations_with(|event| println!("{}", event_line(&event)))
        .await?;

    for line in apply_lines(&outcome) {
        println!("{}", line);
    }
    Ok(())
}

pub async fn down(config: &MigrateConfig, executor: &dyn SqlExecutor) -> Result<()> {
    println!("🔄 Rolling back last migration...\n");

    let runner = MigrationRunner::new(config, executor);
    match runner.rollback_latest().await? {
        RollbackOutcome::NothingToRollback => println!("ℹ️  No migrations to rollback"),
        RollbackOutcome::RolledBack { version } => println!("  ✅ {} rolled back\n", version),
    }
    Ok(())
}

pub async fn status(config: &MigrateConfig, executor: &dyn SqlExecutor, json: bool) -> Result<()> {
    let runner = MigrationRunner::new(config, executor);
    let report = runner.migration_status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n📊 Migration Status:\n");
    for line in status_lines(&report) {
        println!("{}", line);
    }
    println!();
    Ok(())
}

/// Scaffolding needs no database connection
pub fn create(config: &MigrateConfig, name: Option<&str>) -> Result<()> {
    let Some(name) = name else {
        bail!(
            "Migration name is required\n\nUsage:\n  roledir-migrate create <name>\n\n\
             Example:\n  roledir-migrate create create_users_table"
        );
    };

    let scaffold = MigrationScaffold::new(MigrationFileStore::new(&config.migrations_dir));
    let created = scaffold.create_migration(name)?;

    println!("✅ Created migration: {}", created.version);
    println!("   - {}", created.up_path.display());
    println!("   - {}", created.down_path.display());
    println!("\nNext steps:");
    println!("  1. Edit the .up.sql file with your schema changes");
    println!("  2. Edit the .down.sql file with the rollback logic");
    println!("  3. Run: roledir-migrate up");
    Ok(())
}

pub async fn baseline(
    config: &MigrateConfig,
    executor: &dyn SqlExecutor,
    version: &str,
) -> Result<()> {
    let runner = MigrationRunner::new(config, executor);
    match runner.baseline(version).await? {
        BaselineOutcome::AlreadyTracked { version } => {
            println!("✅ {} already tracked", version)
        }
        BaselineOutcome::Recorded { version } => {
            println!("✅ {} recorded as applied (no SQL executed)", version)
        }
    }
    Ok(())
}

fn event_line(event: &ApplyEvent) -> String {
    match event {
        ApplyEvent::Skipped { version } => format!("  ✓ {} (already applied)", version),
        ApplyEvent::Applying { version } => format!("  ⏳ Applying {}...", version),
        ApplyEvent::Applied { version } => format!("  ✅ {} applied", version),
    }
}

/// Per-version lines are printed as events; this is the closing summary
fn apply_lines(outcome: &ApplyOutcome) -> Vec<String> {
    match outcome {
        ApplyOutcome::NoMigrationsDirectory => {
            vec!["ℹ️  No migrations directory found. Nothing to apply.".to_string()]
        }
        ApplyOutcome::NoMigrationFiles => {
            vec!["ℹ️  No migration files found. Nothing to apply.".to_string()]
        }
        ApplyOutcome::AllApplied { .. } => vec!["✅ All migrations already applied".to_string()],
        ApplyOutcome::Applied { versions, .. } => {
            vec![format!("\n✅ Successfully applied {} migration(s)", versions.len())]
        }
    }
}

fn status_lines(report: &StatusReport) -> Vec<String> {
    match report {
        StatusReport::NoMigrationsFound => vec!["ℹ️  No migration files found".to_string()],
        StatusReport::Entries { entries } => entries.iter().map(status_line).collect(),
    }
}

fn status_line(entry: &StatusEntry) -> String {
    match &entry.state {
        MigrationState::Applied { applied_at } => {
            format!("  ✅ {} ({})", entry.version, applied_label(applied_at))
        }
        MigrationState::Pending => format!("  ❌ {} (pending)", entry.version),
        MigrationState::Orphaned { applied_at } => {
            format!("  ⚠️  {} ({}, file missing)", entry.version, applied_label(applied_at))
        }
    }
}

fn applied_label<T: std::fmt::Display>(applied_at: &Option<T>) -> String {
    match applied_at {
        Some(at) => format!("applied {}", at),
        None => "applied".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roledir_migrate::{MemoryExecutor, MigrationVersion};
    use std::fs;
    use tempfile::TempDir;

    fn entry(version: &str, state: MigrationState) -> StatusEntry {
        StatusEntry {
            version: version.to_string(),
            state,
        }
    }

    #[test]
    fn test_status_lines() {
        let report = StatusReport::Entries {
            entries: vec![
                entry("20240101000000_a", MigrationState::Applied { applied_at: None }),
                entry("20240102000000_b", MigrationState::Pending),
                entry("20231231000000_old", MigrationState::Orphaned { applied_at: None }),
            ],
        };

        assert_eq!(
            status_lines(&report),
            vec![
                "  ✅ 20240101000000_a (applied)",
                "  ❌ 20240102000000_b (pending)",
                "  ⚠️  20231231000000_old (applied, file missing)",
            ]
        );
        assert_eq!(
            status_lines(&StatusReport::NoMigrationsFound),
            vec!["ℹ️  No migration files found"]
        );
    }

    #[test]
    fn test_apply_lines_summarize_outcome() {
        let outcome = ApplyOutcome::Applied {
            versions: vec![MigrationVersion::parse("20240102000000_b").unwrap()],
            skipped: 1,
        };

        let lines = apply_lines(&outcome);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Successfully applied 1 migration(s)"));
        assert_eq!(
            apply_lines(&ApplyOutcome::AllApplied { skipped: 2 }),
            vec!["✅ All migrations already applied"]
        );
    }

    #[test]
    fn test_event_lines() {
        let version = MigrationVersion::parse("20240102000000_b").unwrap();

        assert_eq!(
            event_line(&ApplyEvent::Skipped { version: version.clone() }),
            "  ✓ 20240102000000_b (already applied)"
        );
        assert_eq!(
            event_line(&ApplyEvent::Applying { version: version.clone() }),
            "  ⏳ Applying 20240102000000_b..."
        );
        assert_eq!(
            event_line(&ApplyEvent::Applied { version }),
            "  ✅ 20240102000000_b applied"
        );
    }

    #[tokio::test]
    async fn test_up_failure_keeps_earlier_versions_applied() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("20240101000000_first.up.sql"), "CREATE TABLE first(id INT);")
            .unwrap();
        fs::write(temp_dir.path().join("20240102000000_second.up.sql"), "CREATE TABLE broken(id INT);")
            .unwrap();
        let config = MigrateConfig::new(temp_dir.path());
        let executor = MemoryExecutor::new(&config.migrations_table);
        executor.fail_on("broken");

        let err = up(&config, &executor).await.unwrap_err();

        assert!(err.to_string().contains("20240102000000_second"));
        assert_eq!(executor.recorded_versions(), vec!["20240101000000_first"]);
    }

    #[test]
    fn test_create_without_name_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = MigrateConfig::new(temp_dir.path().join("migrations"));

        let err = create(&config, None).unwrap_err();

        assert!(err.to_string().starts_with("Migration name is required"));
        assert!(!config.migrations_dir.exists());
    }

    #[test]
    fn test_create_writes_pair() {
        let temp_dir = TempDir::new().unwrap();
        let config = MigrateConfig::new(temp_dir.path().join("migrations"));

        create(&config, Some("add_users")).unwrap();

        let files: Vec<_> = fs::read_dir(&config.migrations_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|file| file.contains("_add_users.")));
    }

    #[tokio::test]
    async fn test_up_then_status() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("20240601120000_create_foo.up.sql"),
            "CREATE TABLE foo(id INT);",
        )
        .unwrap();
        let config = MigrateConfig::new(temp_dir.path());
        let executor = MemoryExecutor::new(&config.migrations_table);

        up(&config, &executor).await.unwrap();
        status(&config, &executor, true).await.unwrap();

        assert!(executor.has_table("foo"));
    }
}
