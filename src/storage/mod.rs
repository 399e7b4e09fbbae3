//! Path-addressed blob storage for datasets and model artifacts.

pub mod credentials;
pub mod error;
pub mod gcs;
pub mod local;
pub mod memory;

use crate::storage::credentials::{CredentialStrategy, Credentials};
use crate::storage::error::StorageError;
use crate::storage::gcs::GcsBlobStore;
use crate::storage::local::LocalBlobStore;
use crate::storage::memory::MemoryBlobStore;
use crate::utils::{default_data_dir, gunzip};
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Opaque-path byte storage. No versioning and no conditional writes: the
/// last `put` to a path wins.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
}

/// Reads a blob, gunzipping it when the path ends in `.gz`.
pub async fn read_blob(store: &dyn BlobStore, path: &str) -> Result<Vec<u8>, StorageError> {
    let bytes = store.get(path).await?;
    if path.ends_with(".gz") {
        return gunzip(&bytes)
            .await
            .map_err(|e| StorageError::Decompress(path.to_string(), e));
    }
    Ok(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Local,
    Memory,
    Gcs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Root of the local backend; the platform data directory when unset.
    pub local_root: Option<PathBuf>,
    pub bucket: Option<String>,
    pub credentials: CredentialStrategy,
    /// Variable holding the service-account key for the `env_*` strategies.
    pub credentials_env: String,
    /// Alternative API root for the GCS backend.
    pub endpoint: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_root: None,
            bucket: None,
            credentials: CredentialStrategy::Ambient,
            credentials_env: "GOOGLE_APPLICATION_CREDENTIALS_JSON".to_string(),
            endpoint: None,
        }
    }
}

/// Builds the store selected by `settings`.
pub fn open_store(settings: &StorageSettings) -> Result<Arc<dyn BlobStore>, StorageError> {
    match settings.backend {
        StorageBackend::Memory => {
            info!("Using in-memory blob store");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
        StorageBackend::Local => {
            let root = match &settings.local_root {
                Some(root) => root.clone(),
                None => default_data_dir().map_err(|e| StorageError::Config(e.to_string()))?,
            };
            info!("Using local blob store at {:?}", root);
            Ok(Arc::new(LocalBlobStore::new(root)))
        }
        StorageBackend::Gcs => {
            let bucket = settings
                .bucket
                .clone()
                .ok_or_else(|| StorageError::Config("gcs backend needs a bucket".to_string()))?;
            let credentials = Credentials::resolve(settings.credentials, &settings.credentials_env)?;
            info!(
                "Using GCS bucket {} with {:?} credentials",
                bucket, settings.credentials
            );
            let store = GcsBlobStore::new(bucket, credentials);
            Ok(Arc::new(match &settings.endpoint {
                Some(endpoint) => store.with_endpoint(endpoint.clone()),
                None => store,
            }))
        }
    }
}
