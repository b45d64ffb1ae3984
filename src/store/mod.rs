//! Tag store clients.
//!
//! A tag store is a key-value metadata service keyed by resource identifier
//! and tag name. It offers read-all, write (create or overwrite a single key)
//! and delete. There is no compare-and-swap: concurrent writers race and the
//! last write wins. The lock engine builds mutual exclusion on top of exactly
//! these three primitives.

mod file;
mod memory;

pub use file::FileTagStore;
pub use memory::MemoryTagStore;

use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// All tags of one resource, keyed by tag name.
pub type Tags = BTreeMap<String, String>;

/// Minimal client for a shared tag store.
pub trait TagStore {
    /// Read every tag currently set on `resource_id`.
    ///
    /// A resource without tags yields an empty map, not an error.
    fn read(&self, resource_id: &str) -> Result<Tags>;

    /// Create or overwrite a single tag.
    fn write(&self, resource_id: &str, key: &str, value: &str) -> Result<()>;

    /// Delete a single tag. Deleting an absent tag succeeds.
    fn delete(&self, resource_id: &str, key: &str) -> Result<()>;
}

impl<T: TagStore + ?Sized> TagStore for &T {
    fn read(&self, resource_id: &str) -> Result<Tags> {
        (**self).read(resource_id)
    }

    fn write(&self, resource_id: &str, key: &str, value: &str) -> Result<()> {
        (**self).write(resource_id, key, value)
    }

    fn delete(&self, resource_id: &str, key: &str) -> Result<()> {
        (**self).delete(resource_id, key)
    }
}

impl<T: TagStore + ?Sized> TagStore for Box<T> {
    fn read(&self, resource_id: &str) -> Result<Tags> {
        (**self).read(resource_id)
    }

    fn write(&self, resource_id: &str, key: &str, value: &str) -> Result<()> {
        (**self).write(resource_id, key, value)
    }

    fn delete(&self, resource_id: &str, key: &str) -> Result<()> {
        (**self).delete(resource_id, key)
    }
}

impl<T: TagStore + ?Sized> TagStore for Arc<T> {
    fn read(&self, resource_id: &str) -> Result<Tags> {
        (**self).read(resource_id)
    }

    fn write(&self, resource_id: &str, key: &str, value: &str) -> Result<()> {
        (**self).write(resource_id, key, value)
    }

    fn delete(&self, resource_id: &str, key: &str) -> Result<()> {
        (**self).delete(resource_id, key)
    }
}
