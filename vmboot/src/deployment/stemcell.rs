//! Extracted stemcells

use std::path::{Path, PathBuf};

use agent_protocol::ApplySpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StemcellManifest {
    pub image_path: PathBuf,
    pub name: String,
    pub version: String,
    pub sha1: String,
    #[serde(default)]
    pub cloud_properties: Map<String, Value>,
}

/// A stemcell unpacked onto local disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedStemcell {
    pub manifest: StemcellManifest,
    /// Apply spec template shipped with the stemcell
    pub apply_spec: ApplySpec,
    pub extracted_path: PathBuf,
}

impl ExtractedStemcell {
    pub fn fingerprint(&self) -> &str {
        &self.manifest.sha1
    }

    pub async fn delete(&self) -> Result<(), DeployError> {
        debug!("Deleting extracted stemcell {}", self.extracted_path.display());
        Dir::new(&self.extracted_path).delete().await
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, tarball_path: &Path) -> Result<ExtractedStemcell, DeployError>;
}
