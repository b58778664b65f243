//! Upload of finished artifacts to S3-compatible object storage.

use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};

use s3::creds::Credentials;
use s3::{Bucket, Region};

use crate::config::{PublishConfig, Secrets};
use crate::error::PodcastError;

/// Destination for published artifacts.
pub trait ObjectStore {
    type Error: Display;

    fn bucket(&self) -> &str;

    fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

#[derive(Debug, thiserror::Error)]
pub enum S3StoreError {
    #[error("S3 error: {0}")]
    S3(#[from] s3::error::S3Error),
    #[error("Storage API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Bucket on S3 or any compatible service (Cloudflare R2, MinIO).
pub struct S3Store {
    bucket: Box<Bucket>,
    name: String,
}

impl S3Store {
    pub fn new(config: &PublishConfig, secrets: &Secrets) -> Result<Self, PodcastError> {
        let missing = |what: &str| PodcastError::ConfigError(format!("{} not set", what));

        let name = config.bucket.clone().ok_or_else(|| missing("R2_BUCKET_NAME"))?;
        let endpoint = config.endpoint.clone().ok_or_else(|| missing("R2_ENDPOINT_URL"))?;
        let access_key = secrets
            .storage_access_key
            .as_deref()
            .ok_or_else(|| missing("R2_ACCESS_KEY"))?;
        let secret_key = secrets
            .storage_secret_key
            .as_deref()
            .ok_or_else(|| missing("R2_SECRET_KEY"))?;

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| PodcastError::ConfigError(format!("Invalid storage credentials: {}", e)))?;
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint,
        };

        let bucket = Bucket::new(&name, region, credentials)
            .map_err(|e| PodcastError::ConfigError(format!("Invalid bucket: {}", e)))?
            .with_path_style();

        Ok(Self { bucket, name })
    }
}

impl ObjectStore for S3Store {
    type Error = S3StoreError;

    fn bucket(&self) -> &str {
        &self.name
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), Self::Error> {
        let response = self.bucket.put_object(key, &body).await?;
        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(S3StoreError::Api {
                status,
                message: response.as_str().unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }
}

/// Upload one local file keyed by its base filename. No retry.
pub async fn publish<O: ObjectStore>(store: &O, artifact: &Path) -> Result<String, PodcastError> {
    let upload_error = |reason: String| PodcastError::UploadError {
        path: artifact.to_path_buf(),
        reason,
    };

    let key = artifact
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| upload_error("Artifact has no file name".to_string()))?
        .to_string();
    let body = tokio::fs::read(artifact)
        .await
        .map_err(|e| upload_error(e.to_string()))?;

    store
        .put_object(&key, body)
        .await
        .inspect_err(|e| tracing::error!(error = %e, key = %key, "Upload failed"))
        .map_err(|e| upload_error(e.to_string()))?;

    tracing::info!(key = %key, bucket = store.bucket(), "Uploaded artifact");
    Ok(key)
}

/// Upload artifacts in order, stopping at the first failure.
pub async fn publish_all<O: ObjectStore>(
    store: &O,
    artifacts: &[PathBuf],
) -> Result<Vec<String>, PodcastError> {
    let mut keys = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        keys.push(publish(store, artifact).await?);
    }
    Ok(keys)
}
