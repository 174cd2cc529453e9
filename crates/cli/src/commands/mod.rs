pub mod migrate;

use roledir_migrate::{ErrorCategory, MigrateError};

/// Print a failure with an operator hint on stderr
pub fn report_error(err: &anyhow::Error) {
    eprintln!("\n❌ {:#}", err);

    if let Some(migrate_err) = err.downcast_ref::<MigrateError>() {
        for line in hint_for(migrate_err) {
            eprintln!("   {}", line);
        }
    }
}

fn hint_for(err: &MigrateError) -> &'static [&'static str] {
    match err.category() {
        ErrorCategory::Configuration => &[
            "Set it in the environment or in .env.local, e.g.",
            "DATABASE_URL=\"postgresql://...\" roledir-migrate up",
        ],
        ErrorCategory::Validation => match err {
            MigrateError::InvalidName { .. } => &["Example: create_users_table"],
            MigrateError::ScaffoldExists { .. } => &["Wait a second and run create again."],
            _ => &["Expected format: YYYYMMDDHHMMSS_name.up.sql"],
        },
        ErrorCategory::Execution => &[
            "Migration was NOT recorded in the migrations table.",
            "Fix the error and run the command again.",
        ],
        ErrorCategory::Rollback => &["Cannot rollback without a .down.sql file."],
        ErrorCategory::Database => &["Check that the database is reachable and DATABASE_URL is correct."],
        ErrorCategory::Io => &[],
    }
}
