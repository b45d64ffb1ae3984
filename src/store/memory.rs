//! In-process tag store.

use super::{TagStore, Tags};
use crate::error::{Result, TagLockError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Tag store held in memory.
///
/// Clones share the same underlying map, so several lock engines (standing in
/// for separate processes) can coordinate through one store.
#[derive(Debug, Clone, Default)]
pub struct MemoryTagStore {
    resources: Arc<Mutex<HashMap<String, Tags>>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a single tag, if set.
    pub fn get(&self, resource_id: &str, key: &str) -> Option<String> {
        self.lock()
            .ok()?
            .get(resource_id)
            .and_then(|tags| tags.get(key).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Tags>>> {
        self.resources
            .lock()
            .map_err(|_| TagLockError::Store("in-memory tag store is poisoned".to_string()))
    }
}

impl TagStore for MemoryTagStore {
    fn read(&self, resource_id: &str) -> Result<Tags> {
        Ok(self.lock()?.get(resource_id).cloned().unwrap_or_default())
    }

    fn write(&self, resource_id: &str, key: &str, value: &str) -> Result<()> {
        self.lock()?
            .entry(resource_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, resource_id: &str, key: &str) -> Result<()> {
        let mut resources = self.lock()?;
        if let Some(tags) = resources.get_mut(resource_id) {
            tags.remove(key);
            if tags.is_empty() {
                resources.remove(resource_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_unknown_resource_is_empty() {
        let store = MemoryTagStore::new();
        assert!(store.read("i-123").unwrap().is_empty());
    }

    #[test]
    fn test_write_overwrites_and_delete_removes() {
        let store = MemoryTagStore::new();
        store.write("i-123", "Name", "web-1").unwrap();
        store.write("i-123", "Name", "web-2").unwrap();
        store.write("i-123", "Stage", "prod").unwrap();

        let tags = store.read("i-123").unwrap();
        assert_eq!(tags.get("Name").map(String::as_str), Some("web-2"));
        assert_eq!(tags.len(), 2);

        store.delete("i-123", "Name").unwrap();
        store.delete("i-123", "Missing").unwrap();
        assert_eq!(store.get("i-123", "Name"), None);
        assert_eq!(store.get("i-123", "Stage").as_deref(), Some("prod"));
    }

    #[test]
    fn test_clones_share_state() {
        let a = MemoryTagStore::new();
        let b = a.clone();
        a.write("i-1", "k", "v").unwrap();
        assert_eq!(b.get("i-1", "k").as_deref(), Some("v"));
    }

    #[test]
    fn test_resources_are_isolated() {
        let store = MemoryTagStore::new();
        store.write("i-1", "k", "one").unwrap();
        store.write("i-2", "k", "two").unwrap();
        assert_eq!(store.get("i-1", "k").as_deref(), Some("one"));
        assert_eq!(store.get("i-2", "k").as_deref(), Some("two"));
    }
}
