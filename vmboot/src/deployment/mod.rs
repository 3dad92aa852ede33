//! Deployment inputs, the idempotency record and the VM deployer

pub mod deployer;
pub mod manifest;
pub mod record;
pub mod stemcell;

pub use deployer::{Deployer, VmDeployer, VmDeployerOptions};
pub use manifest::{CpiDeploymentManifest, Manifest, ManifestJob, Registry, SshTunnel};
pub use record::{deployment_state_path, DeploymentRecord, DeploymentState, FileDeploymentRecord};
pub use stemcell::{ExtractedStemcell, StemcellManifest};
