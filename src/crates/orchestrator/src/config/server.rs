//! Server configuration for storybook-server
//!
//! Loads `storybook-server.toml`. Every section and key is optional:
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! name = "storybook-server"
//!
//! [queue]
//! retention_secs = 3600
//! sweep_interval_secs = 600
//! # max_concurrent_tasks = 4
//!
//! [http]
//! max_attempts = 3
//! base_delay_ms = 3000
//! rate_limit_delay_ms = 5000
//! timeout_ms = 150000
//! # user_agent = "storybook/0.1"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use utils::{get_env, load_optional_config, load_toml_config, RetryPolicy, UtilsError};

/// Used when neither `--config` nor `CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/storybook-server.toml";

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<UtilsError> for ServerConfigError {
    fn from(err: UtilsError) -> Self {
        match err {
            UtilsError::IoError(e) => ServerConfigError::ReadError(e),
            UtilsError::ConfigError(message) | UtilsError::SerializationError(message) => {
                ServerConfigError::ParseError(message)
            }
            UtilsError::ClientError(message) => ServerConfigError::InvalidConfig(message),
        }
    }
}

/// Listener and identification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfoConfig {
    pub host: String,
    pub port: u16,
    /// Server name for identification in logs
    pub name: String,
}

impl Default for ServerInfoConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            name: "storybook-server".to_string(),
        }
    }
}

/// Task retention and admission control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// How long terminal tasks are kept after completion
    pub retention_secs: u64,
    /// How often expired tasks are swept
    pub sweep_interval_secs: u64,
    /// Concurrency limit; unbounded when absent
    pub max_concurrent_tasks: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            sweep_interval_secs: 600,
            max_concurrent_tasks: None,
        }
    }
}

impl QueueConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Outbound call policy for vendor requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Base delay after a 429
    pub rate_limit_delay_ms: u64,
    /// Per-attempt timeout
    pub timeout_ms: u64,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 3000,
            rate_limit_delay_ms: 5000,
            timeout_ms: 150_000,
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_rate_limit_delay(Duration::from_millis(self.rate_limit_delay_ms))
            .with_timeout(Duration::from_millis(self.timeout_ms))
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerInfoConfig,
    pub queue: QueueConfig,
    pub http: HttpConfig,
}

impl ServerConfig {
    /// Load configuration from a TOML file, whatever its extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServerConfigError> {
        Ok(load_toml_config(path)?)
    }

    /// Load configuration from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ServerConfigError> {
        toml::from_str(content).map_err(|e| ServerConfigError::ParseError(e.to_string()))
    }

    /// Which file to read: `explicit`, else `CONFIG_PATH`, else
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| get_env("CONFIG_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load, apply `HOST`/`PORT` from the environment, and validate.
    ///
    /// The format follows the extension (`.toml` or `.json`). A missing file
    /// falls back to defaults; a malformed one is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ServerConfigError> {
        let path = Self::resolve_path(explicit);
        let mut config = match load_optional_config::<Self>(&path)? {
            Some(config) => {
                tracing::info!("Loaded configuration from {}", path.display());
                config
            }
            None => {
                tracing::warn!(
                    "Configuration file {} not found. Using defaults.",
                    path.display()
                );
                Self::default()
            }
        };

        config.apply_overrides(get_env("HOST").ok(), get_env("PORT").ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override the listener address; blank values are ignored.
    pub fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<String>,
    ) -> Result<(), ServerConfigError> {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
        if let Some(port) = port.filter(|p| !p.trim().is_empty()) {
            self.server.port = port.trim().parse().map_err(|e| {
                ServerConfigError::InvalidConfig(format!("PORT must be a valid u16: {}", e))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ServerConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ServerConfigError::InvalidConfig("server.host is empty".to_string()));
        }
        if self.queue.sweep_interval_secs == 0 {
            return Err(ServerConfigError::InvalidConfig(
                "queue.sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.queue.max_concurrent_tasks == Some(0) {
            return Err(ServerConfigError::InvalidConfig(
                "queue.max_concurrent_tasks must be positive when set".to_string(),
            ));
        }
        if self.http.max_attempts == 0 {
            return Err(ServerConfigError::InvalidConfig(
                "http.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.http.timeout_ms == 0 {
            return Err(ServerConfigError::InvalidConfig(
                "http.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
