//! Configuration module
//!
//! Handles loading and validating seghash configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::network::NetworkConfig;
use crate::protocol::DEFAULT_PORT;

/// Ports at or below this value are refused
pub const MIN_PORT_EXCLUSIVE: u16 = 1024;

/// Default log file, truncated on every run
pub const DEFAULT_LOG_FILE: &str = "clientLog.txt";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Server host is empty")]
    EmptyHost,

    #[error("Port number must be greater than {min}, got {0}", min = MIN_PORT_EXCLUSIVE)]
    InvalidPort(u16),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Hash server address
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hash server address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host name or IP address
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file path; `None` logs to the console only
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_LOG_FILE))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("seghash/config.toml")),
            Some(PathBuf::from("./seghash.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check the server address before any line is processed
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.server.port <= MIN_PORT_EXCLUSIVE {
            return Err(ConfigError::InvalidPort(self.server.port));
        }
        Ok(())
    }

    /// Network settings for the connector
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig::new(self.server.host.clone(), self.server.port)
    }
}

/// Sample configuration with every field filled in
pub fn sample_config() -> Config {
    Config {
        server: ServerConfig {
            host: "hash.example.internal".to_string(),
            port: 5050,
        },
        logging: LoggingConfig {
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            verbose: false,
        },
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    Ok(toml::to_string_pretty(&sample_config())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.logging.log_file, Some(PathBuf::from("clientLog.txt")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.server.port = 6001;
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 7000").unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.server.port, 7000);
        assert_eq!(loaded.server.host, "127.0.0.1");
        assert!(!loaded.logging.verbose);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/seghash.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_port_must_exceed_1024() {
        let mut config = Config::default();
        config.server.port = 1024;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPort(1024))));

        config.server.port = 1025;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut config = Config::default();
        config.server.host = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyHost)));
    }

    #[test]
    fn test_save_sample_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/seghash.toml");

        sample_config().save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), sample_config());
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.server.host, "hash.example.internal");
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.network().port, 5050);
    }
}
