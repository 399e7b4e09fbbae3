use crate::storage::error::StorageError;
use crate::storage::BlobStore;
use async_trait::async_trait;
use log::debug;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Blobs as files under a root directory; blob paths are relative to it.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a blob path to a file below the root. Absolute paths and `..`
    /// components are rejected so a path cannot escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let mut has_file = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_file = true,
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
        }
        if !has_file {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let file = self.resolve(path)?;
        match fs::read(&file).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::Io(file, e)),
        }
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io(parent.to_path_buf(), e))?;
        }
        fs::write(&file, &bytes)
            .await
            .map_err(|e| StorageError::Io(file.clone(), e))?;
        debug!("Wrote {} bytes to {:?}", bytes.len(), file);
        Ok(())
    }
}
