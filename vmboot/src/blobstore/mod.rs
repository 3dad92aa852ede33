//! Content-addressed blob storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::utils::{fingerprint, generate_uuid};

#[async_trait]
pub trait Blobstore: Send + Sync {
    /// Store a copy of `file`, returning `(blob_id, fingerprint)`
    async fn create(&self, file: &Path) -> Result<(String, String), DeployError>;

    /// Path to a stored blob after checking its fingerprint
    async fn get(&self, blob_id: &str, fingerprint: &str) -> Result<PathBuf, DeployError>;

    async fn delete(&self, blob_id: &str) -> Result<(), DeployError>;
}

/// Blobstore keeping blobs as files in one directory
#[derive(Debug, Clone)]
pub struct LocalBlobstore {
    dir: Dir,
}

impl LocalBlobstore {
    pub fn new(dir: Dir) -> Self {
        Self { dir }
    }

    fn blob_path(&self, blob_id: &str) -> Result<PathBuf, DeployError> {
        if blob_id.is_empty() || blob_id.contains(['/', '\\']) || blob_id.starts_with('.') {
            return Err(DeployError::BlobstoreError(format!(
                "Invalid blob id '{}'",
                blob_id
            )));
        }
        Ok(self.dir.path().join(blob_id))
    }
}

#[async_trait]
impl Blobstore for LocalBlobstore {
    async fn create(&self, file: &Path) -> Result<(String, String), DeployError> {
        let contents = fs::read(file).await.map_err(|e| {
            DeployError::BlobstoreError(format!("Reading '{}': {}", file.display(), e))
        })?;
        let sha = fingerprint(&contents);

        self.dir.create().await?;
        let blob_id = generate_uuid();
        let target = self.blob_path(&blob_id)?;
        fs::write(&target, &contents).await.map_err(|e| {
            DeployError::BlobstoreError(format!("Writing blob '{}': {}", blob_id, e))
        })?;

        debug!("Stored {} as blob {} ({})", file.display(), blob_id, sha);
        Ok((blob_id, sha))
    }

    async fn get(&self, blob_id: &str, expected: &str) -> Result<PathBuf, DeployError> {
        let path = self.blob_path(blob_id)?;
        let contents = fs::read(&path).await.map_err(|e| {
            DeployError::BlobstoreError(format!("Reading blob '{}': {}", blob_id, e))
        })?;

        let actual = fingerprint(&contents);
        if actual != expected {
            return Err(DeployError::BlobstoreError(format!(
                "Blob '{}' fingerprint mismatch: expected '{}', got '{}'",
                blob_id, expected, actual
            )));
        }

        Ok(path)
    }

    async fn delete(&self, blob_id: &str) -> Result<(), DeployError> {
        let path = self.blob_path(blob_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
