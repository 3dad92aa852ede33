//! Deployment idempotency record

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::deployment::stemcell::ExtractedStemcell;
use crate::errors::{DeployError, ResultExt};
use crate::filesys::file::File;
use crate::release::Release;
use crate::utils::{fingerprint, generate_uuid};

pub const DEPLOYMENT_STATE_FILE: &str = "deployment.json";

const DEFAULT_MANIFEST_STEM: &str = "manifest";

/// Location of the state file kept next to a deployment manifest
///
/// `manifest.yml` maps to `deployment.json`; any other manifest gets its own
/// `<stem>.deployment.json` so runs on different manifests never share a file.
pub fn deployment_state_path(manifest_path: &Path) -> PathBuf {
    let dir = manifest_path.parent().unwrap_or_else(|| Path::new(""));
    match manifest_path.file_stem().map(|s| s.to_string_lossy()) {
        Some(stem) if stem != DEFAULT_MANIFEST_STEM => {
            dir.join(format!("{}.{}", stem, DEPLOYMENT_STATE_FILE))
        }
        _ => dir.join(DEPLOYMENT_STATE_FILE),
    }
}

/// Inputs of the last successful deploy of one manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub manifest_sha1: String,
    pub cpi_release_fingerprint: String,
    pub stemcell_fingerprint: String,
    pub updated_at: DateTime<Utc>,
}

impl RecordEntry {
    fn matches(&self, manifest_sha1: &str, release_fp: &str, stemcell_fp: &str) -> bool {
        self.manifest_sha1 == manifest_sha1
            && self.cpi_release_fingerprint == release_fp
            && self.stemcell_fingerprint == stemcell_fp
    }
}

/// Persisted deployment state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Director UUID handed to the CPI
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub records: BTreeMap<String, RecordEntry>,
}

#[async_trait]
pub trait DeploymentRecord: Send + Sync {
    /// True when manifest, CPI release and stemcell all match the last deploy
    async fn is_deployed(
        &self,
        manifest_path: &Path,
        release: &Release,
        stemcell: &ExtractedStemcell,
    ) -> Result<bool, DeployError>;

    async fn update(
        &self,
        manifest_path: &Path,
        release: &Release,
        stemcell: &ExtractedStemcell,
    ) -> Result<(), DeployError>;
}

/// Deployment record stored in a state file beside the manifest
#[derive(Default)]
pub struct FileDeploymentRecord {
    // serializes read-modify-write of state files
    lock: Mutex<()>,
}

impl FileDeploymentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    async fn load(state_file: &File) -> Result<DeploymentState, DeployError> {
        Ok(state_file
            .read_json_opt::<DeploymentState>()
            .await
            .with_context(|| format!("Reading deployment state '{}'", state_file.path().display()))?
            .unwrap_or_default())
    }

    async fn save(state_file: &File, state: &DeploymentState) -> Result<(), DeployError> {
        state_file
            .write_json(state)
            .await
            .with_context(|| format!("Writing deployment state '{}'", state_file.path().display()))
    }

    async fn manifest_sha1(manifest_path: &Path) -> Result<String, DeployError> {
        let contents = File::new(manifest_path)
            .read_bytes()
            .await
            .with_context(|| format!("Reading deployment manifest '{}'", manifest_path.display()))?;
        Ok(fingerprint(&contents))
    }

    /// Deployment UUID for a manifest, generated and persisted on first use
    pub async fn deployment_uuid(&self, manifest_path: &Path) -> Result<String, DeployError> {
        let _guard = self.lock.lock().await;
        let state_file = File::new(deployment_state_path(manifest_path));
        let mut state = Self::load(&state_file).await?;

        if state.uuid.is_empty() {
            state.uuid = generate_uuid();
            Self::save(&state_file, &state).await?;
            info!("Generated deployment UUID {}", state.uuid);
        }
        Ok(state.uuid)
    }
}

#[async_trait]
impl DeploymentRecord for FileDeploymentRecord {
    async fn is_deployed(
        &self,
        manifest_path: &Path,
        release: &Release,
        stemcell: &ExtractedStemcell,
    ) -> Result<bool, DeployError> {
        let _guard = self.lock.lock().await;
        let state = Self::load(&File::new(deployment_state_path(manifest_path))).await?;

        let key = manifest_path.to_string_lossy();
        let Some(entry) = state.records.get(key.as_ref()) else {
            debug!("No deployment record for {}", key);
            return Ok(false);
        };

        let manifest_sha1 = Self::manifest_sha1(manifest_path).await?;
        Ok(entry.matches(
            &manifest_sha1,
            &release.fingerprint(),
            stemcell.fingerprint(),
        ))
    }

    async fn update(
        &self,
        manifest_path: &Path,
        release: &Release,
        stemcell: &ExtractedStemcell,
    ) -> Result<(), DeployError> {
        let manifest_sha1 = Self::manifest_sha1(manifest_path).await?;

        let _guard = self.lock.lock().await;
        let state_file = File::new(deployment_state_path(manifest_path));
        let mut state = Self::load(&state_file).await?;
        if state.uuid.is_empty() {
            state.uuid = generate_uuid();
        }

        state.records.insert(
            manifest_path.to_string_lossy().into_owned(),
            RecordEntry {
                manifest_sha1,
                cpi_release_fingerprint: release.fingerprint(),
                stemcell_fingerprint: stemcell.fingerprint().to_string(),
                updated_at: Utc::now(),
            },
        );
        Self::save(&state_file, &state).await?;

        info!("Updated deployment record for {}", manifest_path.display());
        Ok(())
    }
}
