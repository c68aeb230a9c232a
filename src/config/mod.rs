//! Configuration module for R2 Uploader
//!
//! Configuration comes from environment variables (the usual deployment
//! path) or from a YAML file with environment variable expansion. Both paths
//! end in [`Config::validate`].

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

mod loader;

pub use loader::ConfigLoader;

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "r2-uploader";

/// API version reported by the health endpoint
pub const API_VERSION: &str = "v1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 3009;

/// Default payload ceiling (200 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 200 * 1024 * 1024;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// let result = expand_env_vars("prefix-${MY_VAR}-suffix");
/// assert_eq!(result, "prefix-value-suffix");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") else {
        return s.to_string();
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default: keep the placeholder as written
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Build configuration from defaults and environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the environment variables the service understands.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `PORT` | port of `server.address` |
    /// | `MAX_FILE_SIZE` | `upload.max_file_size` (bytes) |
    /// | `FETCH_TIMEOUT_SECS` | `upload.fetch_timeout_secs` |
    /// | `API_TOKEN` | `token.api_token` |
    /// | `TOKEN_FILE_PATH` | `token.token_file_path` |
    /// | `METRICS_ENABLED` | `metrics.enabled` |
    /// | `METRICS_ADDRESS` | `metrics.address` |
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = non_empty_env("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("Invalid PORT '{}'", port)))?;
            self.server.set_port(port)?;
        }

        if let Some(size) = non_empty_env("MAX_FILE_SIZE") {
            match size.parse::<u64>() {
                Ok(size) => self.upload.max_file_size = size,
                Err(_) => warn!(
                    value = %size,
                    default = DEFAULT_MAX_FILE_SIZE,
                    "Unable to parse MAX_FILE_SIZE, using default"
                ),
            }
        }

        if let Some(secs) = non_empty_env("FETCH_TIMEOUT_SECS") {
            self.upload.fetch_timeout_secs = secs.parse().map_err(|_| {
                ConfigError::ValidationError(format!("Invalid FETCH_TIMEOUT_SECS '{}'", secs))
            })?;
        }

        if let Some(token) = non_empty_env("API_TOKEN") {
            self.token.api_token = Some(token);
        }

        if let Some(path) = non_empty_env("TOKEN_FILE_PATH") {
            self.token.token_file_path = Some(PathBuf::from(path));
        }

        if let Some(enabled) = non_empty_env("METRICS_ENABLED") {
            self.metrics.enabled = matches!(enabled.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(address) = non_empty_env("METRICS_ADDRESS") {
            self.metrics.address = address;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .address
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ValidationError(format!("Invalid server address: {}", e)))?;

        if self.upload.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_file_size must be greater than zero".into(),
            ));
        }

        if self.upload.fetch_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "fetch_timeout_secs must be greater than zero".into(),
            ));
        }

        if let Some(path) = &self.token.token_file_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(
                    "token_file_path cannot be empty".into(),
                ));
            }
        }

        if self.metrics.enabled {
            self.metrics.address.parse::<SocketAddr>().map_err(|e| {
                ConfigError::ValidationError(format!("Invalid metrics address: {}", e))
            })?;
        }

        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
}

impl ServerConfig {
    /// Replace the port of the configured address, keeping the host
    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        let mut addr: SocketAddr = self
            .address
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("Invalid server address: {}", e)))?;
        addr.set_port(port);
        self.address = addr.to_string();
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    format!("0.0.0.0:{}", DEFAULT_PORT)
}

/// Upload pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Hard ceiling on payload size in bytes, for fetched and uploaded files alike
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Connect timeout and longest stall allowed while fetching a remote file
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Limit for the JSON body of `/R2api/upload`
    #[serde(default = "default_max_json_body")]
    pub max_json_body: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_json_body: default_max_json_body(),
        }
    }
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_fetch_timeout_secs() -> u64 {
    300
}

fn default_max_json_body() -> usize {
    1048576 // 1MB
}

/// Token persistence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token that overrides whatever is persisted
    #[serde(default)]
    pub api_token: Option<String>,
    /// Explicit location of the token file
    #[serde(default)]
    pub token_file_path: Option<PathBuf>,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}
