//! Configuration for the distribution orchestrator

use serde::{Deserialize, Serialize};

/// Distribution orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Maximum recipients per batch
    pub max_recipients: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "distribution".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            max_recipients: 100,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Reject configurations the orchestrator cannot operate under
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_recipients == 0 {
            return Err(crate::Error::Config(
                "max_recipients must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
