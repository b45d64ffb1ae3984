use super::{AutoscalingClient, AutoscalingStatus};
use crate::error::{Result, TagLockError};
use crate::fs::atomic_write_file;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Autoscaling status kept in a JSON document on disk.
///
/// The document uses the field names of the cloud API
/// (`AutoScalingGroupName`, `HealthStatus`, ...). A missing file means the
/// instance is not in a group.
#[derive(Debug, Clone)]
pub struct FileAutoscaling {
    path: PathBuf,
}

impl FileAutoscaling {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, status: &AutoscalingStatus) -> Result<()> {
        let json = serde_json::to_string_pretty(status).map_err(|e| {
            TagLockError::Store(format!(
                "failed to encode autoscaling status for '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        atomic_write_file(&self.path, &format!("{}\n", json))
    }
}

impl AutoscalingClient for FileAutoscaling {
    fn status(&self) -> Result<Option<AutoscalingStatus>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TagLockError::Store(format!(
                    "failed to read autoscaling status '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            TagLockError::Store(format!(
                "invalid autoscaling status '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn set_protected(&self, protected: bool) -> Result<()> {
        let Some(mut status) = self.status()? else {
            return Err(TagLockError::Store(format!(
                "instance is not in an autoscaling group ('{}' does not exist)",
                self.path.display()
            )));
        };
        status.protected_from_scale_in = protected;
        self.write(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_means_no_group() {
        let temp_dir = TempDir::new().unwrap();
        let client = FileAutoscaling::new(temp_dir.path().join("asg.json"));

        assert_eq!(client.status().unwrap(), None);
        assert!(client.set_protected(true).is_err());
        assert!(!client.path().exists());
    }

    #[test]
    fn test_set_protected_rewrites_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("asg.json");
        fs::write(
            &path,
            r#"{"AutoScalingGroupName":"web-asg","HealthStatus":"Healthy","LifecycleState":"InService","ProtectedFromScaleIn":false}"#,
        )
        .unwrap();
        let client = FileAutoscaling::new(&path);

        client.set_protected(true).unwrap();

        let status = client.status().unwrap().unwrap();
        assert!(status.protected_from_scale_in);
        assert_eq!(status.auto_scaling_group_name, "web-asg");
        assert!(fs::read_to_string(&path).unwrap().contains("\"ProtectedFromScaleIn\": true"));
    }

    #[test]
    fn test_invalid_document_is_store_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("asg.json");
        fs::write(&path, "not json").unwrap();

        let err = FileAutoscaling::new(&path).status().unwrap_err();
        assert!(matches!(err, TagLockError::Store(_)));
    }
}
