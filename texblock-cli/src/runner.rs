//! Shared command setup: settings file and logging.

use texblock::config::ConfigFile;
use texblock::logging::{init_logging, LoggingConfig, LoggingGuard};
use tracing::{debug, info};

use crate::error::CliError;

/// Loaded settings plus the logging guard, held for the whole command.
pub struct CliRunner {
    config: ConfigFile,
    _log_guard: LoggingGuard,
}

impl CliRunner {
    /// Loads settings (defaults if the file is missing or unreadable) and
    /// installs logging. `verbose` raises the level to `debug`.
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let (config, load_error) = match ConfigFile::load() {
            Ok(config) => (config, None),
            Err(e) => (ConfigFile::default(), Some(e)),
        };

        let mut logging = LoggingConfig::from(&config.logging);
        if verbose {
            logging = logging.with_level("debug");
        }
        let guard = init_logging(&logging)?;

        if let Some(e) = load_error {
            tracing::warn!(error = %e, "Ignoring unreadable config file");
        }
        debug!(?config, "Settings loaded");

        Ok(Self {
            config,
            _log_guard: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(command, version = env!("CARGO_PKG_VERSION"), "texblock starting");
    }
}
