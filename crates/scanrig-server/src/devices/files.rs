use std::{io, path::Path};

use async_trait::async_trait;

use super::{DeviceError, ProjectFiles};

/// Project directories on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProjectFiles;

#[async_trait]
impl ProjectFiles for LocalProjectFiles {
    async fn remove_all(&self, dir: &Path) -> Result<(), DeviceError> {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DeviceError::Filesystem(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn removes_tree() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("42");
        std::fs::create_dir_all(project.join("raw")).unwrap();
        std::fs::write(project.join("raw").join("0001.jpg"), b"jpg").unwrap();

        LocalProjectFiles.remove_all(&project).await.unwrap();

        assert!(!project.exists());
    }

    #[tokio::test]
    async fn missing_directory_counts_as_removed() {
        let dir = tempdir().unwrap();
        LocalProjectFiles.remove_all(&dir.path().join("nope")).await.unwrap();
    }

    #[tokio::test]
    async fn removing_a_file_reports_filesystem_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("7");
        std::fs::write(&file, b"not a dir").unwrap();

        let err = LocalProjectFiles.remove_all(&file).await.unwrap_err();
        assert!(matches!(err, DeviceError::Filesystem(_)));
    }
}
