//! Logging system setup and configuration
//!
//! This module handles the initialization of the tracing-based logging
//! system used throughout the server for debugging, monitoring, and
//! diagnostic output.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Args, Config};

/// Initialize the logging system
///
/// Sets up structured logging using the tracing crate with configurable
/// output format and filtering levels. The logging level is taken from the
/// configuration file, overridden to debug by the `--debug` flag, and both
/// are overridden by the `RUST_LOG` environment variable.
///
/// # Arguments
/// * `args` - Command line arguments containing the debug flag
/// * `config` - Loaded configuration containing the logging settings
///
/// # Returns
/// * `Result<()>` - Success or error during logging setup
pub fn setup_logging(args: &Args, config: &Config) -> Result<()> {
    let (level, json_format) = match &config.logging {
        Some(logging) => (logging.level.as_str(), logging.json_format),
        None => ("info", false),
    };
    let level = if args.debug { "debug" } else { level };

    // Respect RUST_LOG when present, falling back to the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}
