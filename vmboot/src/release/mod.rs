//! Extracted release models

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::utils::fingerprint_parts;

/// A job shipped in a release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub sha1: String,
    /// Where the job's sources were unpacked
    #[serde(default)]
    pub extracted_path: PathBuf,
    /// Source template path (relative to the job) to rendered destination path
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
    #[serde(default)]
    pub package_names: Vec<String>,
}

impl Job {
    /// Key identifying the job's compiled templates
    pub fn key(&self) -> String {
        format!("{}/{}", self.name, self.fingerprint)
    }

    /// Whether one of the job's templates renders to `destination`
    pub fn renders(&self, destination: &str) -> bool {
        let destination = destination.trim_start_matches('/');
        self.templates
            .values()
            .any(|d| d.trim_start_matches('/') == destination)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub extracted_path: PathBuf,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A release unpacked onto local disk
///
/// The release owns `extracted_path` and removes it in `delete`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    pub version: String,
    pub jobs: Vec<Job>,
    pub packages: Vec<Package>,
    pub extracted_path: PathBuf,
}

impl Release {
    /// Content fingerprint over name, version, and job/package fingerprints
    pub fn fingerprint(&self) -> String {
        let mut jobs: Vec<String> = self
            .jobs
            .iter()
            .map(|j| format!("job:{}:{}", j.name, j.fingerprint))
            .collect();
        jobs.sort();

        let mut packages: Vec<String> = self
            .packages
            .iter()
            .map(|p| format!("package:{}:{}", p.name, p.fingerprint))
            .collect();
        packages.sort();

        let header = [self.name.clone(), self.version.clone()];
        fingerprint_parts(header.iter().chain(jobs.iter()).chain(packages.iter()))
    }

    /// Remove the extracted release from disk
    pub async fn delete(&self) -> Result<(), DeployError> {
        debug!("Deleting extracted release {}", self.extracted_path.display());
        Dir::new(&self.extracted_path).delete().await
    }
}
