//! Logging setup for the migration binary
//!
//! Diagnostics go to stderr so `status --json` output on stdout stays
//! machine-readable. `RUST_LOG` overrides the level chosen here.

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration for the CLI
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset
    pub level: String,
    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Debug output for the migration library and binary, warnings for the rest
    pub fn verbose() -> Self {
        Self {
            level: "warn,roledir_migrate=debug".to_string(),
            include_location: true,
        }
    }

    pub fn for_verbosity(verbose: bool) -> Self {
        if verbose {
            Self::verbose()
        } else {
            Self::default()
        }
    }
}

/// Install the global subscriber
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            Layer::new()
                .with_writer(io::stderr)
                .with_target(false)
                .with_file(config.include_location)
                .with_line_number(config.include_location),
        )
        .try_init()?;

    Ok(())
}
