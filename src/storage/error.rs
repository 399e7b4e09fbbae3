use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Blob '{0}' not found")]
    NotFound(String),

    #[error("Invalid blob path '{0}'")]
    InvalidPath(String),

    #[error("I/O error on {0:?}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to decompress blob '{0}'")]
    Decompress(String, #[source] std::io::Error),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Storage backend misconfigured: {0}")]
    Config(String),

    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    #[error("Failed to parse service account credentials")]
    CredentialsJson(#[source] serde_json::Error),

    #[error("Failed to sign access token request")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
