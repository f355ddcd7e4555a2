//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 fingerprint of the configuration for run reports.
    ///
    /// The destination password is excluded.
    pub fn hash(&self) -> String {
        let mut redacted = self.clone();
        redacted.destination.password.clear();
        let yaml = serde_yaml::to_string(&redacted).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl DestinationConfig {
    /// Human-readable location, without credentials.
    pub fn describe(&self) -> String {
        match self.r#type {
            DestinationType::Postgres => format!(
                "postgres://{}@{}:{}/{} (schema {})",
                self.user, self.host, self.port, self.database, self.schema
            ),
            DestinationType::Sqlite => format!("sqlite:{}", self.path.display()),
            DestinationType::Memory => "memory".to_string(),
        }
    }
}
