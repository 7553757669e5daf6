//! Object storage for generated artifacts.
//!
//! Artifacts live under a deterministic per-user path and are served via
//! time-bounded signed URLs. The production backend is Supabase Storage,
//! spoken to directly over HTTP with the service key.

use async_trait::async_trait;
use serde::Deserialize;

pub use crate::config::SupabaseConfig;

/// Longest signed-URL lifetime the storage provider allows; treated as the
/// design ceiling. Callers needing access beyond this re-issue.
pub const SIGNED_URL_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Transport(String),
    #[error("storage rejected {path}: {status}")]
    Rejected { path: String, status: u16 },
    #[error("object {0} not found")]
    NotFound(String),
}

/// Deterministic artifact path: `users/{user_id}/documents/{artifact_id}.{ext}`.
///
/// Collision freedom comes from UUID-strength artifact ids, not from the
/// path scheme itself.
pub fn artifact_path(user_id: &str, artifact_id: &str, extension: &str) -> String {
    format!("users/{user_id}/documents/{artifact_id}.{extension}")
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Persist a binary blob at `path`, overwriting any existing object.
    async fn persist(&self, path: &str, bytes: &[u8], content_type: &str)
        -> Result<(), StorageError>;

    /// Issue a fresh signed download URL. The store never auto-refreshes;
    /// expired URLs are replaced by calling this again.
    async fn signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, StorageError>;

    /// Fetch the raw bytes of a stored object.
    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Supabase Storage client over the shared HTTP client.
pub struct SupabaseStorage {
    config: SupabaseConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStorage {
    pub fn new(config: SupabaseConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.project_url, self.config.bucket, path
        )
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn persist(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.object_url(path))
            .bearer_auth(&self.config.service_key)
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::Rejected {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }
        log::debug!("Persisted {} bytes to {}", bytes.len(), path);
        Ok(())
    }

    async fn signed_url(&self, path: &str, ttl_secs: u64) -> Result<String, StorageError> {
        let sign_url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.config.project_url, self.config.bucket, path
        );
        let response = self
            .client
            .post(&sign_url)
            .bearer_auth(&self.config.service_key)
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(StorageError::NotFound(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::Rejected {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        // Supabase returns a path relative to /storage/v1
        Ok(format!(
            "{}/storage/v1{}",
            self.config.project_url, body.signed_url
        ))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(self.object_url(path))
            .bearer_auth(&self.config.service_key)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(StorageError::NotFound(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(StorageError::Rejected {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
