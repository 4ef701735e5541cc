// src/utils/storage.rs

use std::{
    collections::{HashMap, HashSet},
    error::Error,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use tokio::sync::Mutex;

use crate::{config::S3Config, error::AppError};

/// Object storage collaborator: private blobs addressed by key.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `key` and returns the key.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String, AppError>;

    /// Time-limited retrieval URL for a private key.
    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, AppError>;

    /// Removes the object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

/// Rejects keys that are empty, absolute or climb out of their prefix.
pub fn validate_key(key: &str) -> Result<(), AppError> {
    if key.is_empty() || key.len() > 500 {
        return Err(AppError::BadRequest("Storage key must be 1 to 500 characters".to_string()));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(AppError::BadRequest(format!("Invalid storage key '{}'", key)));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "s3",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.as_str())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String, AppError> {
        validate_key(key)?;
        tracing::debug!(key, size = bytes.len(), "putting object to s3");
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        request
            .send()
            .await
            .inspect_err(|error| tracing::error!(error = error as &dyn Error, key, "failed to put object"))
            .map_err(|e| AppError::DependencyFailure(format!("Upload of '{}' failed: {}", key, DisplayErrorContext(&e))))?;
        Ok(key.to_string())
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::DependencyFailure(format!("Presigning '{}' failed: {}", key, DisplayErrorContext(&e))))?;
        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        tracing::debug!(key, "deleting object from s3");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .inspect_err(|error| tracing::error!(error = error as &dyn Error, key, "failed to delete object"))
            .map_err(|e| AppError::DependencyFailure(format!("Deleting '{}' failed: {}", key, DisplayErrorContext(&e))))?;
        Ok(())
    }
}

/// In-process storage. Used when no S3 endpoint is configured and by the tests,
/// which can make deletes of chosen keys fail.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing_deletes: Arc<Mutex<HashSet<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later `delete(key)` fails with `DependencyFailure`.
    pub async fn fail_deletes_for(&self, key: &str) {
        self.failing_deletes.lock().await.insert(key.to_string());
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.lock().await.contains_key(key)
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: Option<&str>) -> Result<String, AppError> {
        validate_key(key)?;
        self.objects.lock().await.insert(key.to_string(), bytes);
        Ok(key.to_string())
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, AppError> {
        if !self.objects.lock().await.contains_key(key) {
            return Err(AppError::NotFound(format!("Object '{}' not found", key)));
        }
        Ok(format!("memory://{}?expires_in={}", key, ttl.as_secs()))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        if self.failing_deletes.lock().await.contains(key) {
            return Err(AppError::DependencyFailure(format!("Deleting '{}' failed", key)));
        }
        self.objects.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("pilots/1/thumbnail.png").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("pilots/../secrets").is_err());
    }

    #[tokio::test]
    async fn test_memory_storage_failing_delete_keeps_object() {
        let storage = MemoryStorage::new();
        storage.put("lessons/7/video.mp4", vec![1, 2, 3], None).await.unwrap();
        storage.fail_deletes_for("lessons/7/video.mp4").await;

        let err = storage.delete("lessons/7/video.mp4").await.unwrap_err();
        assert!(matches!(err, AppError::DependencyFailure(_)));
        assert!(storage.contains("lessons/7/video.mp4").await);
    }
}
