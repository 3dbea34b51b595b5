//! Configuration loading helpers.
//!
//! - Environment variable lookup
//! - TOML/JSON config files, format picked from the extension
//! - Optional config files that fall back to defaults when absent
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::config::load_optional_config;
//!
//! let config: ServerConfig = load_optional_config("config/storybook-server.toml")?
//!     .unwrap_or_default();
//! ```

use crate::error::{Result, UtilsError};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                UtilsError::ConfigError(format!("Unable to determine file extension for {:?}", path))
            })?;

        match extension.to_lowercase().as_str() {
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(UtilsError::ConfigError(format!(
                "Unsupported config file extension: {}",
                extension
            ))),
        }
    }
}

/// Get an environment variable as a string.
pub fn get_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|e| {
        UtilsError::ConfigError(format!("Environment variable '{}' not found: {}", key, e))
    })
}

/// Load configuration from a TOML file.
pub fn load_toml_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| {
        UtilsError::ConfigError(format!("Failed to parse TOML config from {:?}: {}", path, e))
    })
}

/// Load configuration from a JSON file.
pub fn load_json_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        UtilsError::ConfigError(format!("Failed to parse JSON config from {:?}: {}", path, e))
    })
}

/// Load configuration from a file, detecting the format from its extension.
pub fn load_config_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    match ConfigFormat::from_path(path)? {
        ConfigFormat::Toml => load_toml_config(path),
        ConfigFormat::Json => load_json_config(path),
    }
}

/// Load a config file if it exists.
///
/// Returns `Ok(None)` when nothing is at `path`; a file that exists but does
/// not parse is still an error.
pub fn load_optional_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Option<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize, PartialEq)]
    struct QueueSection {
        retention_secs: u64,
        sweep_interval_secs: u64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestConfig {
        name: String,
        port: u16,
        queue: QueueSection,
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    // ------------------------------------------------------------------------
    // Environment variables
    // ------------------------------------------------------------------------

    #[test]
    fn test_get_env_existing() {
        env::set_var("STORYBOOK_TEST_HOST", "0.0.0.0");
        assert_eq!(get_env("STORYBOOK_TEST_HOST").unwrap(), "0.0.0.0");
        env::remove_var("STORYBOOK_TEST_HOST");
    }

    #[test]
    fn test_get_env_missing() {
        let err = get_env("STORYBOOK_UNSET_VAR_2").unwrap_err();
        assert!(err.to_string().contains("STORYBOOK_UNSET_VAR_2"));
    }

    // ------------------------------------------------------------------------
    // Config files
    // ------------------------------------------------------------------------

    #[test]
    fn test_load_toml_config_valid() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "server.toml",
            r#"
name = "storybook"
port = 8080

[queue]
retention_secs = 3600
sweep_interval_secs = 600
"#,
        );

        let config: TestConfig = load_toml_config(&path).unwrap();
        assert_eq!(config.name, "storybook");
        assert_eq!(config.port, 8080);
        assert_eq!(config.queue.retention_secs, 3600);
    }

    #[test]
    fn test_load_toml_config_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "name = \"storybook\nport = ");

        let err = load_toml_config::<TestConfig>(&path).unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn test_load_json_config_valid() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "server.json",
            r#"{"name":"storybook","port":9000,"queue":{"retention_secs":60,"sweep_interval_secs":10}}"#,
        );

        let config: TestConfig = load_json_config(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.queue.sweep_interval_secs, 10);
    }

    #[test]
    fn test_load_json_config_wrong_structure() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "wrong.json", r#"{"unexpected": true}"#);

        assert!(load_json_config::<TestConfig>(&path).is_err());
    }

    #[test]
    fn test_load_config_file_detects_format() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "SERVER.TOML",
            "name = \"upper\"\nport = 1\n[queue]\nretention_secs = 1\nsweep_interval_secs = 1\n",
        );

        let config: TestConfig = load_config_file(&path).unwrap();
        assert_eq!(config.name, "upper");
    }

    #[test]
    fn test_load_config_file_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "server.yaml", "name: storybook");

        let err = load_config_file::<TestConfig>(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }

    #[test]
    fn test_load_config_file_no_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "server", "{}");

        let err = load_config_file::<TestConfig>(&path).unwrap_err();
        assert!(err.to_string().contains("extension"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result: Result<TestConfig> = load_config_file("/nonexistent/storybook/server.toml");
        assert!(matches!(result, Err(UtilsError::IoError(_))));
    }

    #[test]
    fn test_load_optional_config_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let config: Option<TestConfig> = load_optional_config(&path).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_load_optional_config_invalid_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.toml", "port = [");

        assert!(load_optional_config::<TestConfig>(&path).is_err());
    }
}
