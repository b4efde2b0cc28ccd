//! Configuration management for docbridge

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Main configuration structure for docbridge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Document store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Search defaults
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Default configuration adjusted for a deployment profile
    #[must_use]
    pub fn for_profile(profile: Profile) -> Self {
        let mut config = Self::default();
        match profile {
            Profile::Development | Profile::Testing => {
                config.server.debug = true;
                config.logging.level = "debug".to_string();
            }
            Profile::Production => {
                config.server.debug = false;
                config.logging.level = "warn".to_string();
            }
        }
        config
    }

    /// Load configuration from a TOML or JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::default().load_over(path).await
    }

    /// Overlay a TOML or JSON file onto this configuration.
    ///
    /// Settings absent from the file keep their current values.
    pub async fn load_over<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let overlay = Self::parse(path.as_ref(), &content)?;
        let mut merged = toml::Value::try_from(&self)
            .map_err(|e| Error::Config(format!("Failed to encode config: {}", e)))?;
        merge_tables(&mut merged, overlay);

        merged
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    fn parse(path: &Path, content: &str) -> Result<toml::Value> {
        if path.extension().map_or(false, |ext| ext == "json") {
            let json: serde_json::Value = serde_json::from_str(content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?;
            toml::Value::try_from(json)
                .map_err(|e| Error::Config(format!("Unsupported JSON config: {}", e)))
        } else {
            toml::from_str(content)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".to_string()));
        }
        if self.store.uri.trim().is_empty() {
            return Err(Error::Config("store.uri must not be empty".to_string()));
        }
        if self.query.default_limit == 0 {
            return Err(Error::Config("query.default_limit must be positive".to_string()));
        }
        if self.query.default_limit > self.query.max_limit {
            return Err(Error::Config(format!(
                "query.default_limit ({}) exceeds query.max_limit ({})",
                self.query.default_limit, self.query.max_limit
            )));
        }
        if self.query.default_sort_field.is_empty() {
            return Err(Error::Config("query.default_sort_field must not be empty".to_string()));
        }
        if !matches!(self.query.default_sort_direction, 1 | -1) {
            return Err(Error::Config(format!(
                "query.default_sort_direction must be 1 or -1, got {}",
                self.query.default_sort_direction
            )));
        }
        Ok(())
    }
}

fn merge_tables(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_tables(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Deployment profile, selected with `APP_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Testing,
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "default" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" => Ok(Self::Testing),
            other => Err(Error::Config(format!("unknown profile: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Number of worker threads (0 = one per core)
    pub workers: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Debug mode
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3333,
            workers: 0,
            cors_origins: vec!["*".to_string()],
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string; `memory://` selects the in-process store
    pub uri: String,
    /// Application name reported to the server
    pub app_name: String,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/".to_string(),
            app_name: "docbridge".to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size when `limit` is absent or unusable
    pub default_limit: u64,
    /// Records skipped when `skip` is absent or unusable
    pub default_skip: u64,
    /// Hard cap on `limit`
    pub max_limit: u64,
    /// Sort field when `sorts` is absent or malformed
    pub default_sort_field: String,
    /// 1 for ascending, -1 for descending
    pub default_sort_direction: i32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            default_skip: 0,
            max_limit: 1000,
            default_sort_field: "created_at".to_string(),
            default_sort_direction: -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!("unknown log format: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `docbridge=debug,actix_web=info`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}
