//! Configuration module for mailpulse-server.
//!
//! Values come from the TOML file and CLI overrides; the API key comes
//! from the `MAILGUN_API_KEY` environment variable so the secret never
//! lives in the file. Everything is resolved once at startup into plain
//! values passed to constructors.

pub mod file;

use crate::config::file::FileConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid api base url: {0}")]
    ApiBase(#[from] url::ParseError),

    #[error("MAILGUN_API_KEY environment variable not set")]
    MissingApiKey,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub domain: String,
    pub api_base: url::Url,
    pub poll_interval: Duration,
    pub window_offset: Duration,
    pub window_width: Duration,
    pub fetch_timeout: Duration,
    pub retention: Duration,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Resolve durations into a [`LoadedConfig`]
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        let api_base = url::Url::parse(&file_config.mailgun.api_base)?;

        Ok(LoadedConfig {
            listen: file_config.server.listen,
            domain: file_config.mailgun.domain,
            api_base,
            poll_interval: Duration::from_secs(file_config.exporter.poll_interval_secs),
            window_offset: Duration::from_secs(file_config.exporter.window_offset_secs),
            window_width: Duration::from_secs(file_config.exporter.window_width_secs),
            fetch_timeout: Duration::from_secs(file_config.exporter.fetch_timeout_secs),
            retention: Duration::from_secs(file_config.exporter.retention_hours * 3600),
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.mailgun.domain.is_empty() {
        return Err(ConfigError::Validation(
            "mailgun.domain must not be empty".to_string(),
        ));
    }
    if config.exporter.poll_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "exporter.poll_interval_secs must be positive".to_string(),
        ));
    }
    if config.exporter.window_width_secs == 0 {
        return Err(ConfigError::Validation(
            "exporter.window_width_secs must be positive".to_string(),
        ));
    }
    if config.exporter.retention_hours == 0 {
        return Err(ConfigError::Validation(
            "exporter.retention_hours must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Get the Mailgun API key from the environment.
pub fn get_api_key() -> Result<String, ConfigError> {
    std::env::var("MAILGUN_API_KEY").map_err(|_| ConfigError::MissingApiKey)
}
