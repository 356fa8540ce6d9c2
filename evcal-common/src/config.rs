//! Configuration loading and config file resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "EVCAL_CONFIG";

/// Default HTTP port for the sources service
pub const DEFAULT_PORT: u16 = 5780;

/// Default page size for paginated listings
pub const DEFAULT_PER_PAGE: i64 = 30;

/// Service configuration as read from `config.toml`
///
/// Every field is optional in the file; absent fields take compiled defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Interface to bind the HTTP listener to
    pub bind_addr: String,
    /// TCP port for the HTTP listener
    pub port: u16,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Reject the new-source form and imports with a warning
    pub import_disabled: bool,
    /// Rows per page on the hypertext source listing
    pub per_page: i64,
    /// Upper bound on a single feed fetch
    pub fetch_timeout_secs: u64,
    /// User-Agent header sent when fetching feeds
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            database_path: default_database_path(),
            import_disabled: false,
            per_page: DEFAULT_PER_PAGE,
            fetch_timeout_secs: 30,
            user_agent: format!("evcal/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or compiled defaults when the file is missing
    ///
    /// A missing file is not an error: the service starts with defaults and logs a warning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No config file found, using compiled defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!("Config file {} not found, using compiled defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.per_page < 1 {
            return Err(Error::Config(format!(
                "per_page must be at least 1 (got {})",
                self.per_page
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Config("fetch_timeout_secs must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Config file resolution, highest priority first:
/// 1. Command-line argument
/// 2. `EVCAL_CONFIG` environment variable
/// 3. Platform config directory (`~/.config/evcal/config.toml` on Linux)
///
/// Returns `None` when nothing applies; the caller falls back to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("evcal").join("config.toml"))
        .filter(|p| p.exists())
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("evcal"))
        .unwrap_or_else(|| PathBuf::from("./evcal_data"))
        .join("evcal.db")
}
