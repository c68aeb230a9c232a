//! Configuration loader with environment variable expansion

use super::{expand_env_vars, Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` placeholders are expanded before parsing,
    /// and the service environment variables (`PORT`, `API_TOKEN`, ...) are
    /// applied on top of the file contents.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML content after expanding environment placeholders
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        // An empty document deserializes to unit, not to a defaulted struct.
        if expanded.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(&expanded)?)
    }
}
