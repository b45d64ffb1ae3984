//! Runtime context resolution for taglock commands.
//!
//! Merges the config file with command line overrides and builds the
//! collaborators every command needs: the tag store, the lock engine, the
//! owner identity and (optionally) the autoscaling client.

use crate::autoscaling::FileAutoscaling;
use crate::cli::GlobalArgs;
use crate::config::Config;
use crate::error::{Result, TagLockError};
use crate::locks::LockEngine;
use crate::owner::default_owner_id;
use crate::store::FileTagStore;
use tracing::debug;

/// Resolved settings for one command invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,

    /// Owner id written into lock records.
    pub owner: String,
}

impl Context {
    /// Load the config named by `global` and apply its overrides.
    pub fn resolve(global: &GlobalArgs) -> Result<Self> {
        let mut config = Config::load_or_default(&global.config)?;

        if let Some(resource) = &global.resource {
            config.resource_id = resource.clone();
        }
        if let Some(store_dir) = &global.store_dir {
            config.store_dir = store_dir.clone();
        }
        if let Some(owner) = &global.owner {
            config.owner = Some(owner.clone());
        }
        config.validate()?;

        debug!(
            config = %global.config.display(),
            resource = %config.resource_id,
            store_dir = %config.store_dir.display(),
            "resolved configuration"
        );
        Self::from_config(config)
    }

    /// Build a context from an already validated config.
    pub fn from_config(config: Config) -> Result<Self> {
        let owner = match &config.owner {
            Some(owner) => owner.clone(),
            None => default_owner_id(),
        };
        if owner.trim().is_empty() {
            return Err(TagLockError::UserError(
                "could not determine an owner id; pass --owner".to_string(),
            ));
        }
        Ok(Self { config, owner })
    }

    pub fn store(&self) -> FileTagStore {
        FileTagStore::new(&self.config.store_dir)
    }

    /// Lock engine over the configured resource, using the system clock.
    pub fn engine(&self) -> LockEngine<FileTagStore> {
        LockEngine::new(self.store(), &self.config.resource_id).with_backoff(self.config.backoff())
    }

    /// Autoscaling client, if an autoscaling document is configured.
    pub fn autoscaling(&self) -> Option<FileAutoscaling> {
        self.config.autoscaling_file.as_ref().map(FileAutoscaling::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_cli_overrides_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("taglock.yaml");
        std::fs::write(
            &config_path,
            "resource_id: i-from-file\nstore_dir: /from/file\nlease_seconds: 60\n",
        )
        .unwrap();

        let ctx = Context::resolve(&GlobalArgs {
            config: config_path,
            resource: Some("i-from-cli".to_string()),
            owner: Some("ci@runner".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(ctx.config.resource_id, "i-from-cli");
        assert_eq!(ctx.config.store_dir, PathBuf::from("/from/file"));
        assert_eq!(ctx.config.lease_seconds, 60);
        assert_eq!(ctx.owner, "ci@runner");
        assert_eq!(ctx.engine().resource_id(), "i-from-cli");
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = Context::resolve(&GlobalArgs {
            config: temp_dir.path().join("absent.yaml"),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(ctx.config.resource_id, "local");
        assert!(ctx.owner.contains('@'));
        assert!(ctx.autoscaling().is_none());
    }

    #[test]
    fn test_empty_override_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = Context::resolve(&GlobalArgs {
            config: temp_dir.path().join("absent.yaml"),
            resource: Some(String::new()),
            ..Default::default()
        });
        assert!(matches!(result, Err(TagLockError::UserError(_))));
    }
}
