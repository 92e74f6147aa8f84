//! TOML configuration for the crowdtally binaries.
//!
//! ```toml
//! [database]
//! url = "postgres://localhost/crowdtally"
//! max_connections = 8
//!
//! [storage]
//! root = "/var/lib/crowdtally/exports"
//!
//! [tasks]
//! n_answers = 30
//! priority = 0.0
//! ```
//!
//! Every section is optional. `CROWDTALLY_DATABASE_URL` overrides
//! `database.url`. Task defaults are validated while parsing, so an
//! out-of-range redundancy or priority fails at load time.

use crate::task::services::TaskDefaults;
use camino::{Utf8Path, Utf8PathBuf};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Environment variable overriding the database URL.
pub const DATABASE_URL_ENV: &str = "CROWDTALLY_DATABASE_URL";

/// Errors raised while loading configuration or building resources from it.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },
    /// The configuration is not valid TOML or holds invalid values.
    #[error("invalid configuration: {0}")]
    Parse(Arc<toml::de::Error>),
    /// A required setting is missing or unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Database settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: Option<String>,
    /// Pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

const fn default_max_connections() -> u32 {
    8
}

/// Export artifact storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per owner container.
    pub root: Utf8PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("exports"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrowdtallyConfig {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Export artifact storage.
    pub storage: StorageConfig,
    /// Defaults for new tasks.
    pub tasks: TaskDefaults,
}

impl CrowdtallyConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, unknown keys or
    /// out-of-range task defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|err| ConfigError::Parse(Arc::new(err)))
    }

    /// Reads configuration from `path`, or uses the defaults when `path` is
    /// `None`, then applies the environment override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is invalid.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
                    path: path.to_owned(),
                    source: Arc::new(err),
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_override(std::env::var(DATABASE_URL_ENV).ok());
        Ok(config)
    }

    /// Replaces the database URL when `url` holds a non-blank value.
    pub fn apply_env_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|url| !url.trim().is_empty()) {
            self.database.url = Some(url);
        }
    }

    /// Returns the configured database URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when no URL is configured.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database.url.as_deref().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "database.url is not set; configure it or export {DATABASE_URL_ENV}"
            ))
        })
    }

    /// Builds the r2d2 connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the URL is missing, the pool
    /// size is zero or the pool cannot connect.
    pub fn build_pool(&self) -> Result<Pool<ConnectionManager<PgConnection>>, ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_owned(),
            ));
        }
        let manager = ConnectionManager::<PgConnection>::new(self.database_url()?);
        Pool::builder()
            .max_size(self.database.max_connections)
            .build(manager)
            .map_err(|err| ConfigError::Invalid(format!("database pool: {err}")))
    }
}
