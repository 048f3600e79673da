//! Configuration loading and command-line overrides.

pub mod args;
pub mod settings;

pub use args::Args;
pub use settings::{Config, LoggingSettings, ServerSettings};

use anyhow::Context;
use std::path::Path;
use tracing::info;

impl Config {
    /// Loads the configuration from `path`, creating the file with default
    /// settings when it does not exist yet.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))
        } else {
            let config = Config::default();
            let encoded = toml::to_string_pretty(&config)?;
            std::fs::write(path, encoded)
                .with_context(|| format!("failed to write default config {}", path.display()))?;
            info!("Created default configuration at {}", path.display());
            Ok(config)
        }
    }

    /// Applies command-line overrides on top of the file-based settings.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(listen) = &args.listen {
            self.server.listen_addr = listen.clone();
        }
        if let Some(secret) = &args.secret {
            self.server.shared_secret = Some(secret.clone());
        }
    }
}
