//! Gzipped tarball packing and unpacking

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::DeployError;

#[async_trait]
pub trait Compressor: Send + Sync {
    /// Pack the contents of `dir` into a new tarball and return its path
    async fn compress_files_in_dir(&self, dir: &Path) -> Result<PathBuf, DeployError>;

    async fn decompress_file_to_dir(&self, tarball: &Path, dir: &Path) -> Result<(), DeployError>;

    /// Remove a tarball produced by `compress_files_in_dir`
    async fn clean_up(&self, tarball: &Path) -> Result<(), DeployError>;
}

/// Compressor writing `.tgz` files into a scratch directory
#[derive(Debug, Clone)]
pub struct TarballCompressor {
    temp_root: PathBuf,
}

impl TarballCompressor {
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
        }
    }
}

#[async_trait]
impl Compressor for TarballCompressor {
    async fn compress_files_in_dir(&self, dir: &Path) -> Result<PathBuf, DeployError> {
        tokio::fs::create_dir_all(&self.temp_root).await?;

        let tarball = self
            .temp_root
            .join(format!("tarball-{}.tgz", uuid::Uuid::new_v4()));
        let source = dir.to_path_buf();
        let target = tarball.clone();
        let temp_root = self.temp_root.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            // removed on drop unless persisted
            let temp = NamedTempFile::new_in(&temp_root)?;
            let mut builder = tar::Builder::new(GzEncoder::new(temp, Compression::default()));
            builder.append_dir_all(".", &source)?;
            let temp = builder.into_inner()?.finish()?;
            temp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await?
        .map_err(|e| DeployError::CompressError(format!("'{}': {}", dir.display(), e)))?;

        debug!("Compressed {} into {}", dir.display(), tarball.display());
        Ok(tarball)
    }

    async fn decompress_file_to_dir(&self, tarball: &Path, dir: &Path) -> Result<(), DeployError> {
        let source = tarball.to_path_buf();
        let target = dir.to_path_buf();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&target)?;
            let file = std::fs::File::open(&source)?;
            tar::Archive::new(GzDecoder::new(file)).unpack(&target)
        })
        .await?
        .map_err(|e| {
            DeployError::CompressError(format!(
                "Extracting '{}' to '{}': {}",
                tarball.display(),
                dir.display(),
                e
            ))
        })?;

        debug!("Decompressed {} into {}", tarball.display(), dir.display());
        Ok(())
    }

    async fn clean_up(&self, tarball: &Path) -> Result<(), DeployError> {
        match tokio::fs::remove_file(tarball).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
