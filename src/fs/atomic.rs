//! Atomic file replacement for file-backed stores.
//!
//! All writes follow the same pattern:
//! 1. Write content to a uniquely named temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename it over the target
//!
//! Readers therefore see either the previous value or the new one, never a
//! partial write, and concurrent writers to the same target resolve as
//! last-writer-wins. Temporary files start with a dot so directory scans can
//! skip them.

use crate::error::{Result, TagLockError};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `{host}.{pid}.{start nanos}` for this process. Hosts sharing a filesystem
/// can run writers with equal pids, so the pid alone is not enough.
static WRITER_ID: LazyLock<String> = LazyLock::new(|| {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{}.{}.{}", sanitize(&host), std::process::id(), nanos)
});

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Atomically write bytes to a file, creating parent directories as needed.
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            TagLockError::Store(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_path = generate_temp_path(path, &WRITER_ID, seq)?;
    write_and_sync(&temp_path, content)?;
    atomic_replace(&temp_path, path)
}

/// Atomically write a string to a file.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Temp name is `.{filename}.{writer}.{seq}.tmp` so that concurrent writers,
/// in this process, others on this host or on other hosts, never share a
/// temp file.
fn generate_temp_path(target: &Path, writer: &str, seq: u64) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            TagLockError::Store(format!("invalid file path '{}'", target.display()))
        })?;

    let temp_name = format!(".{}.{}.{}.tmp", filename, writer, seq);
    Ok(parent.join(temp_name))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        TagLockError::Store(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        TagLockError::Store(format!("failed to write to temporary file: {}", e))
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        TagLockError::Store(format!("failed to sync temporary file to disk: {}", e))
    })?;

    Ok(())
}

/// `fs::rename` replaces an existing target on every supported platform.
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        TagLockError::Store(format!(
            "failed to atomically replace '{}': {}",
            target.display(),
            e
        ))
    })?;

    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_file_and_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a/b/value");

        atomic_write_file(&path, "hello").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("value");

        atomic_write_file(&path, "first").unwrap();
        atomic_write_file(&path, "second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("value");

        atomic_write_file(&path, "content").unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], "value");
    }

    #[test]
    fn test_temp_paths_are_unique() {
        let target = Path::new("/tmp/x/value");
        let a = generate_temp_path(target, &WRITER_ID, 0).unwrap();
        let b = generate_temp_path(target, &WRITER_ID, 1).unwrap();
        assert_ne!(a, b);
        assert!(
            a.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(".value.")
        );
    }

    #[test]
    fn test_writer_id_names_host_and_process() {
        let host = sanitize(&hostname::get().unwrap().to_string_lossy());
        let pid = std::process::id().to_string();
        let parts: Vec<&str> = WRITER_ID.rsplitn(3, '.').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], host);
        assert_eq!(parts[1], pid);
        assert!(!WRITER_ID.contains('/'));
    }

    #[test]
    fn test_writers_on_different_hosts_with_equal_pids_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("deploy");

        let from_a = generate_temp_path(&path, "host-a.1.0", 0).unwrap();
        let from_b = generate_temp_path(&path, "host-b.1.0", 0).unwrap();
        assert_ne!(from_a, from_b);

        write_and_sync(&from_a, b"A").unwrap();
        write_and_sync(&from_b, b"B").unwrap();
        atomic_replace(&from_a, &path).unwrap();
        atomic_replace(&from_b, &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "B");
        assert!(!from_a.exists());
        assert!(!from_b.exists());
    }
}
