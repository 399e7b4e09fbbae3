use crate::storage::credentials::{Credentials, TokenProvider};
use crate::storage::error::StorageError;
use crate::storage::BlobStore;
use async_trait::async_trait;
use log::{info, warn};
use reqwest::{Client, StatusCode, Url};

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Objects of one Google Cloud Storage bucket, through the JSON API.
#[derive(Debug)]
pub struct GcsBlobStore {
    bucket: String,
    endpoint: String,
    client: Client,
    tokens: TokenProvider,
}

impl GcsBlobStore {
    pub fn new(bucket: impl Into<String>, credentials: Credentials) -> Self {
        let client = Client::new();
        Self {
            bucket: bucket.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            tokens: TokenProvider::new(credentials, client.clone()),
            client,
        }
    }

    /// Points the store at another API root, e.g. a local emulator.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn download_url(&self, path: &str) -> Result<Url, StorageError> {
        let mut url = self.parse_endpoint()?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Config(format!("endpoint '{}' cannot be a base", self.endpoint)))?
            .extend(["storage", "v1", "b", &self.bucket, "o", path]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    fn upload_url(&self, path: &str) -> Result<Url, StorageError> {
        let mut url = self.parse_endpoint()?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Config(format!("endpoint '{}' cannot be a base", self.endpoint)))?
            .extend(["upload", "storage", "v1", "b", &self.bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", path);
        Ok(url)
    }

    fn parse_endpoint(&self) -> Result<Url, StorageError> {
        Url::parse(&self.endpoint)
            .map_err(|e| StorageError::Config(format!("invalid endpoint '{}': {}", self.endpoint, e)))
    }
}

fn status_error(url: &Url, response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    response.error_for_status().map_err(|e| match e.status() {
        Some(status) => StorageError::HttpStatus {
            url: url.to_string(),
            status,
            source: e,
        },
        None => StorageError::NetworkRequest(url.to_string(), e),
    })
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.download_url(path)?;
        let token = self.tokens.token().await?;
        info!("Downloading gs://{}/{}", self.bucket, path);
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StorageError::NetworkRequest(url.to_string(), e))?;
        if response.status() == StatusCode::NOT_FOUND {
            warn!("gs://{}/{} does not exist", self.bucket, path);
            return Err(StorageError::NotFound(path.to_string()));
        }
        let response = status_error(&url, response)?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::NetworkRequest(url.to_string(), e))?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let url = self.upload_url(path)?;
        let token = self.tokens.token().await?;
        let size = bytes.len();
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::NetworkRequest(url.to_string(), e))?;
        status_error(&url, response)?;
        info!("Uploaded {} bytes to gs://{}/{}", size, self.bucket, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_names_are_escaped() -> Result<(), Box<dyn std::error::Error>> {
        let store = GcsBlobStore::new("weather-aqi-data", Credentials::Metadata);
        assert_eq!(
            store.download_url("models/trained model.bin")?.as_str(),
            "https://storage.googleapis.com/storage/v1/b/weather-aqi-data/o/models%2Ftrained%20model.bin?alt=media"
        );
        assert_eq!(
            store.upload_url("models/trained_model.bin")?.as_str(),
            "https://storage.googleapis.com/upload/storage/v1/b/weather-aqi-data/o?uploadType=media&name=models%2Ftrained_model.bin"
        );
        Ok(())
    }

    #[test]
    fn test_custom_endpoint() -> Result<(), Box<dyn std::error::Error>> {
        let store = GcsBlobStore::new("b", Credentials::Metadata).with_endpoint("http://localhost:4443/");
        assert_eq!(
            store.download_url("x.csv")?.as_str(),
            "http://localhost:4443/storage/v1/b/b/o/x.csv?alt=media"
        );
        let broken = GcsBlobStore::new("b", Credentials::Metadata).with_endpoint("not a url");
        assert!(matches!(broken.download_url("x.csv"), Err(StorageError::Config(_))));
        Ok(())
    }
}
