//! Command-line argument parsing
//!
//! This module defines the command-line interface for the Lattice messenger
//! server using the clap crate for argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Lattice messenger server
///
/// These arguments allow users to override configuration file settings
/// and control server behavior from the command line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    ///
    /// Specifies the path to the TOML configuration file.
    /// If the file doesn't exist, a default configuration will be created.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Server listen address
    ///
    /// Override the listen address from the configuration file.
    /// Format: "IP:PORT" (e.g., "127.0.0.1:7313" or "0.0.0.0:7313")
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Enable debug logging
    ///
    /// When enabled, sets the logging level to debug, providing more
    /// detailed output for troubleshooting.
    #[arg(short, long)]
    pub debug: bool,

    /// Shared secret required from callers
    ///
    /// Override the shared secret from the configuration file. When set,
    /// every request must carry it as its "token" parameter.
    #[arg(long)]
    pub secret: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
            listen: None,
            debug: false,
            secret: None,
        }
    }
}
