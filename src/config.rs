use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub tourist: TouristConfig,
    pub page: PageConfig,
    pub app: AppConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Where the destination-management service lives, as seen by the detail page.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// How long a loaded destination is served from cache before it is refetched.
    pub revalidate_secs: u64,
    /// Unset means requests never time out.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TouristConfig {
    /// Identity used when a request carries no `x-tourist-id` header.
    pub default_id: i64,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PageConfig {
    /// Use the server-side add-if-absent endpoint instead of read-modify-write.
    pub atomic_upsert: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        Self::from_toml(&config_str)
    }

    /// Load configuration from the default config.toml file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("config.toml")
    }

    pub fn from_toml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RemoteConfig {
    pub fn revalidate(&self) -> Duration {
        Duration::from_secs(self.revalidate_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:./destinations.db".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            revalidate_secs: 3600,
            timeout_secs: None,
        }
    }
}

impl Default for TouristConfig {
    fn default() -> Self {
        Self { default_id: 1 }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "The Pearl Destinations".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            remote: RemoteConfig::default(),
            tourist: TouristConfig::default(),
            page: PageConfig::default(),
            app: AppConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.tourist.default_id, 1);
        assert_eq!(config.remote.revalidate(), Duration::from_secs(3600));
        assert!(config.remote.timeout().is_none());
        assert!(!config.page.atomic_upsert);
    }

    #[test]
    fn test_server_address() {
        let config = Config::default();
        assert_eq!(config.server_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [remote]
            base_url = "http://destinations.internal:9000"
            revalidate_secs = 60
            timeout_secs = 5

            [page]
            atomic_upsert = true
            "#,
        )
        .unwrap();

        assert_eq!(config.remote.base_url, "http://destinations.internal:9000");
        assert_eq!(config.remote.timeout(), Some(Duration::from_secs(5)));
        assert!(config.page.atomic_upsert);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.tourist.default_id, 1);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let err = Config::from_toml("[server]\nport = \"not a port\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
