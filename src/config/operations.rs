//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{Result, TagLockError};
use crate::locks::MAX_LEASE_SECONDS;
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Errors
    ///
    /// * `TagLockError::UserError` - unreadable file, parse error or
    ///   validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            TagLockError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from `path`, or use the defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| TagLockError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            TagLockError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `resource_id` must be non-empty
    /// - `lease_seconds` must be between 1 and ten years
    /// - `backoff_initial_ms` must be positive and at most `backoff_max_ms`
    /// - `owner`, when set, must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.resource_id.trim().is_empty() {
            return Err(TagLockError::UserError(
                "config validation failed: resource_id must not be empty".to_string(),
            ));
        }

        if self.lease_seconds == 0 || self.lease_seconds > MAX_LEASE_SECONDS {
            return Err(TagLockError::UserError(format!(
                "config validation failed: lease_seconds must be between 1 and {}",
                MAX_LEASE_SECONDS
            )));
        }

        if self.backoff_initial_ms == 0 {
            return Err(TagLockError::UserError(
                "config validation failed: backoff_initial_ms must be greater than 0".to_string(),
            ));
        }

        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(TagLockError::UserError(format!(
                "config validation failed: backoff_max_ms ({}) must be at least backoff_initial_ms ({})",
                self.backoff_max_ms, self.backoff_initial_ms
            )));
        }

        if let Some(owner) = &self.owner
            && owner.trim().is_empty()
        {
            return Err(TagLockError::UserError(
                "config validation failed: owner must not be empty when set".to_string(),
            ));
        }

        Ok(())
    }
}
