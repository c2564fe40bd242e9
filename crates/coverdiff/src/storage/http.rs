//! HTTP-backed object store.
//!
//! Objects live behind a blob-store gateway: `GET {base_url}/{key}` to
//! fetch, `DELETE {base_url}/{key}` to remove. An optional bearer token
//! is read from the environment at construction time.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CoverdiffError, StorageError};

use super::ObjectStore;

pub struct HttpObjectStore {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<SecretString>,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, auth_token_env: Option<&str>) -> Result<Self, CoverdiffError> {
        let auth_token = match auth_token_env {
            Some(var) if !var.is_empty() => {
                Some(crate::secrets::resolve_secret(None, None, Some(var))?)
            }
            _ => None,
        };

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CoverdiffError::Validation(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .authorize(self.http.get(self.object_url(key)))
            .send()
            .await
            .map_err(|e| StorageError::Fetch {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            return Err(StorageError::Fetch {
                key: key.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| StorageError::Fetch {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .authorize(self.http.delete(self.object_url(key)))
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        // Already gone counts as deleted.
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(StorageError::Delete {
            key: key.to_string(),
            reason: format!("HTTP {}", status),
        })
    }
}
