//! Google Cloud credential resolution and OAuth access tokens.

use crate::storage::error::StorageError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Points at a credential file, as for every Google Cloud client library.
pub const CREDENTIALS_FILE_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const JWT_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where service credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStrategy {
    /// Service-account key JSON stored verbatim in an environment variable.
    EnvJson,
    /// Base64-encoded service-account key JSON in an environment variable.
    EnvBase64,
    /// The file named by `GOOGLE_APPLICATION_CREDENTIALS`, then the gcloud
    /// user credentials, then the compute metadata server of the host.
    #[default]
    Ambient,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// Refresh-token credentials written by `gcloud auth application-default login`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
    Metadata,
}

impl Credentials {
    /// Resolves credentials for `strategy`, reading the key from `env_var`.
    pub fn resolve(strategy: CredentialStrategy, env_var: &str) -> Result<Self, StorageError> {
        Self::from_value(strategy, env_var, std::env::var(env_var).ok())
    }

    /// Like [`Credentials::resolve`] with the variable's value already read.
    /// The ambient strategy ignores `value`.
    pub fn from_value(
        strategy: CredentialStrategy,
        env_var: &str,
        value: Option<String>,
    ) -> Result<Self, StorageError> {
        let missing = || StorageError::Credentials(format!("environment variable {} is not set", env_var));
        match strategy {
            CredentialStrategy::Ambient => Self::ambient(
                std::env::var_os(CREDENTIALS_FILE_ENV).map(PathBuf::from),
                gcloud_credentials_path(),
            ),
            CredentialStrategy::EnvJson => {
                let json = value.ok_or_else(missing)?;
                parse_key(json.as_bytes())
            }
            CredentialStrategy::EnvBase64 => {
                let encoded = value.ok_or_else(missing)?;
                let json = STANDARD.decode(encoded.trim()).map_err(|e| {
                    StorageError::Credentials(format!("{} is not valid base64: {}", env_var, e))
                })?;
                parse_key(&json)
            }
        }
    }

    /// The credential file at `explicit` when given, else the one at
    /// `well_known` if it exists, else the metadata server.
    pub fn ambient(explicit: Option<PathBuf>, well_known: Option<PathBuf>) -> Result<Self, StorageError> {
        if let Some(path) = explicit {
            return read_credential_file(&path);
        }
        match well_known.filter(|p| p.is_file()) {
            Some(path) => read_credential_file(&path),
            None => {
                debug!("No credential file found, using the metadata server");
                Ok(Credentials::Metadata)
            }
        }
    }
}

fn gcloud_credentials_path() -> Option<PathBuf> {
    let config = if cfg!(windows) {
        dirs::config_dir()
    } else {
        dirs::home_dir().map(|home| home.join(".config"))
    };
    config.map(|dir| dir.join("gcloud").join("application_default_credentials.json"))
}

fn read_credential_file(path: &Path) -> Result<Credentials, StorageError> {
    let json = std::fs::read(path).map_err(|e| StorageError::Io(path.to_path_buf(), e))?;
    let file: CredentialFile = serde_json::from_slice(&json).map_err(StorageError::CredentialsJson)?;
    info!("Using credentials from {}", path.display());
    Ok(match file {
        CredentialFile::ServiceAccount(key) => Credentials::ServiceAccount(key),
        CredentialFile::AuthorizedUser(key) => Credentials::AuthorizedUser(key),
    })
}

fn parse_key(json: &[u8]) -> Result<Credentials, StorageError> {
    let key: ServiceAccountKey =
        serde_json::from_slice(json).map_err(StorageError::CredentialsJson)?;
    Ok(Credentials::ServiceAccount(key))
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Hands out bearer tokens, fetching a new one only when the cached one is
/// about to expire.
#[derive(Debug)]
pub struct TokenProvider {
    credentials: Credentials,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, client: Client) -> Self {
        Self {
            credentials,
            client,
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, StorageError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let response = match &self.credentials {
            Credentials::ServiceAccount(key) => self.exchange_jwt(key).await?,
            Credentials::AuthorizedUser(key) => self.refresh_user_token(key).await?,
            Credentials::Metadata => self.metadata_token().await?,
        };
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!("Obtained access token valid for {}s", response.expires_in);
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }

    async fn exchange_jwt(&self, key: &ServiceAccountKey) -> Result<TokenResponse, StorageError> {
        let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let assertion = signed_assertion(key, token_uri, Utc::now().timestamp())?;
        info!("Requesting access token for {}", key.client_email);
        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StorageError::NetworkRequest(token_uri.to_string(), e))?;
        read_token(token_uri, response).await
    }

    async fn refresh_user_token(&self, key: &AuthorizedUserKey) -> Result<TokenResponse, StorageError> {
        info!("Refreshing user access token for client {}", key.client_id);
        let response = self
            .client
            .post(DEFAULT_TOKEN_URI)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", key.client_id.as_str()),
                ("client_secret", key.client_secret.as_str()),
                ("refresh_token", key.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StorageError::NetworkRequest(DEFAULT_TOKEN_URI.to_string(), e))?;
        read_token(DEFAULT_TOKEN_URI, response).await
    }

    async fn metadata_token(&self) -> Result<TokenResponse, StorageError> {
        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::NetworkRequest(METADATA_TOKEN_URL.to_string(), e))?;
        read_token(METADATA_TOKEN_URL, response).await
    }
}

fn signed_assertion(
    key: &ServiceAccountKey,
    token_uri: &str,
    now: i64,
) -> Result<String, StorageError> {
    let claims = Claims {
        iss: &key.client_email,
        scope: STORAGE_SCOPE,
        aud: token_uri,
        iat: now,
        exp: now + JWT_LIFETIME_SECS,
    };
    let signing_key =
        EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(StorageError::TokenSigning)?;
    encode(&Header::new(Algorithm::RS256), &claims, &signing_key).map_err(StorageError::TokenSigning)
}

async fn read_token(url: &str, response: reqwest::Response) -> Result<TokenResponse, StorageError> {
    let response = response.error_for_status().map_err(|e| match e.status() {
        Some(status) => StorageError::HttpStatus {
            url: url.to_string(),
            status,
            source: e,
        },
        None => StorageError::NetworkRequest(url.to_string(), e),
    })?;
    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| StorageError::NetworkRequest(url.to_string(), e))
}
