//! Deployment manifests

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::DeployError;

/// A job declared in the deployment manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestJob {
    pub name: String,
    #[serde(default)]
    pub instances: u32,
    #[serde(default)]
    pub templates: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// The deployment being bootstrapped
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<ManifestJob>,
    #[serde(default)]
    pub networks: Map<String, Value>,
    #[serde(default)]
    pub cloud_properties: Map<String, Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// Registry the VM fetches its settings from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl Registry {
    /// True when no registry was configured
    pub fn is_empty(&self) -> bool {
        *self == Registry::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshTunnel {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub private_key: String,
}

impl SshTunnel {
    pub fn is_empty(&self) -> bool {
        *self == SshTunnel::default()
    }
}

/// The CPI section of the deployment manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpiDeploymentManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub registry: Registry,
    #[serde(default)]
    pub ssh_tunnel: SshTunnel,
    /// Agent endpoint, possibly carrying basic auth credentials
    #[serde(default)]
    pub mbus: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse_deployment(&self, path: &Path) -> Result<Manifest, DeployError>;

    async fn parse_cpi_deployment(&self, path: &Path)
        -> Result<CpiDeploymentManifest, DeployError>;
}

pub trait Validator: Send + Sync {
    fn validate(&self, manifest: &Manifest) -> Result<(), DeployError>;
}
