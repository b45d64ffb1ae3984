//! Directory-backed tag store.
//!
//! Layout: `<root>/<resource>/<tag>`, one file per tag whose content is the
//! tag value. Resource and tag names are escaped into portable file names
//! (`%XX` for anything outside `[A-Za-z0-9_.-]`, and for a leading dot).
//! Writes use atomic replacement, which gives the same per-key
//! last-writer-wins semantics as a cloud tag API. Processes on one host, or
//! hosts sharing a filesystem, can coordinate through it.

use super::{TagStore, Tags};
use crate::error::{Result, TagLockError};
use crate::fs::atomic_write_file;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Tag store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileTagStore {
    root: PathBuf,
}

impl FileTagStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn resource_dir(&self, resource_id: &str) -> Result<PathBuf> {
        Ok(self.root.join(escape_name(resource_id)?))
    }
}

impl TagStore for FileTagStore {
    fn read(&self, resource_id: &str) -> Result<Tags> {
        let dir = self.resource_dir(resource_id)?;
        let mut tags = Tags::new();

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(tags),
            Err(e) => {
                return Err(TagLockError::Store(format!(
                    "failed to read tags of '{}' from '{}': {}",
                    resource_id,
                    dir.display(),
                    e
                )));
            }
        };

        for entry in entries {
            let entry = entry.map_err(|e| {
                TagLockError::Store(format!("failed to read tag directory entry: {}", e))
            })?;

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            // In-flight temporary files.
            if file_name.starts_with('.') {
                continue;
            }
            let Some(key) = unescape_name(file_name) else {
                continue;
            };

            match fs::read_to_string(entry.path()) {
                Ok(value) => {
                    tags.insert(key, value);
                }
                // Deleted between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(TagLockError::Store(format!(
                        "failed to read tag '{}' of '{}': {}",
                        key, resource_id, e
                    )));
                }
            }
        }

        Ok(tags)
    }

    fn write(&self, resource_id: &str, key: &str, value: &str) -> Result<()> {
        let path = self.resource_dir(resource_id)?.join(escape_name(key)?);
        atomic_write_file(&path, value)
    }

    fn delete(&self, resource_id: &str, key: &str) -> Result<()> {
        let path = self.resource_dir(resource_id)?.join(escape_name(key)?);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TagLockError::Store(format!(
                "failed to delete tag '{}' of '{}': {}",
                key, resource_id, e
            ))),
        }
    }
}

fn escape_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(TagLockError::UserError(
            "tag store names must not be empty".to_string(),
        ));
    }

    let mut escaped = String::with_capacity(name.len());
    for (i, byte) in name.bytes().enumerate() {
        let plain = byte.is_ascii_alphanumeric()
            || byte == b'_'
            || byte == b'-'
            || (byte == b'.' && i > 0);
        if plain {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{:02X}", byte));
        }
    }
    Ok(escaped)
}

fn unescape_name(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = escaped.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
