mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use commands::*;
use roledir_migrate::{
    is_production_url, mask_database_url, ExecutionMode, MigrateConfig, PostgresExecutor,
    DEFAULT_MIGRATIONS_DIR,
};

#[derive(Debug, Parser)]
#[command(name = "roledir-migrate")]
#[command(version, about = "Apply, roll back and inspect roledir schema migrations")]
struct Cli {
    /// Directory holding the migration files
    #[arg(long, global = true, env = "MIGRATIONS_DIR", default_value = DEFAULT_MIGRATIONS_DIR)]
    migrations_dir: PathBuf,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending migrations
    Up {
        /// Run each migration file and its ledger write in one transaction
        #[arg(long)]
        transactional: bool,
    },

    /// Rollback the last migration
    Down {
        /// Run the down-file and its ledger delete in one transaction
        #[arg(long)]
        transactional: bool,
    },

    /// Show migration status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create new migration files
    Create {
        /// Migration name (lowercase letters, digits and underscores)
        name: Option<String>,
    },

    /// Mark an existing migration as applied without running it
    Baseline {
        /// Version to record, e.g. 20240101000000_initial_schema
        version: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    if let Err(e) = logging::init_logging(logging::LoggingConfig::for_verbosity(cli.verbose)) {
        eprintln!("⚠️  Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = MigrateConfig::from_environment()?.with_migrations_dir(cli.migrations_dir);

    match cli.command {
        Commands::Create { name } => migrate::create(&config, name.as_deref()),
        Commands::Up { transactional } => {
            let config = config.with_execution_mode(execution_mode(transactional));
            let executor = connect(&config).await?;
            let result = migrate::up(&config, &executor).await;
            executor.close().await;
            result
        }
        Commands::Down { transactional } => {
            let config = config.with_execution_mode(execution_mode(transactional));
            let executor = connect(&config).await?;
            let result = migrate::down(&config, &executor).await;
            executor.close().await;
            result
        }
        Commands::Status { json } => {
            let executor = connect(&config).await?;
            let result = migrate::status(&config, &executor, json).await;
            executor.close().await;
            result
        }
        Commands::Baseline { version } => {
            let executor = connect(&config).await?;
            let result = migrate::baseline(&config, &executor, &version).await;
            executor.close().await;
            result
        }
    }
}

fn execution_mode(transactional: bool) -> ExecutionMode {
    if transactional {
        ExecutionMode::Transactional
    } else {
        ExecutionMode::PerStatement
    }
}

async fn connect(config: &MigrateConfig) -> Result<PostgresExecutor> {
    let database_url = config.require_database_url()?;

    if is_production_url(database_url) {
        eprintln!("⚠️  WARNING: Running against PRODUCTION database!");
        eprintln!("⚠️  DATABASE_URL: {}", mask_database_url(database_url));
        eprintln!();
    }

    tracing::debug!(url = %mask_database_url(database_url), "Connecting to database");
    Ok(PostgresExecutor::connect(database_url).await?)
}
