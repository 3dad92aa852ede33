//! The deploy command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::cloud::Cloud;
use crate::cmd::fsm::{DeployEvent, DeployFsm, DeployState};
use crate::cpi::Installer;
use crate::deployment::manifest::{CpiDeploymentManifest, Manifest, Parser, Registry, Validator};
use crate::deployment::record::{deployment_state_path, DeploymentRecord};
use crate::deployment::stemcell::{ExtractedStemcell, Extractor};
use crate::deployment::Deployer;
use crate::errors::{DeployError, ResultExt};
use crate::eventlog::{track, EventLogger};
use crate::filesys::file::File;
use crate::registry::ServerManager;
use crate::release::Release;
use crate::storage::settings::UserConfig;
use crate::ui::Ui;

pub const SKIP_DEPLOY_MESSAGE: &str = "No deployment, stemcell or cpi release changes. Skipping deploy.";

/// Collaborators of [`DeployCmd`]
pub struct DeployCmdDeps {
    pub ui: Arc<dyn Ui>,
    pub parser: Arc<dyn Parser>,
    pub validator: Arc<dyn Validator>,
    pub cpi_installer: Arc<dyn Installer>,
    pub registry_server_manager: Arc<dyn ServerManager>,
    pub stemcell_extractor: Arc<dyn Extractor>,
    pub deployment_record: Arc<dyn DeploymentRecord>,
    pub deployer: Arc<dyn Deployer>,
    pub event_logger: Arc<dyn EventLogger>,
}

/// Manifests that passed validation
struct ValidatedInputs {
    manifest_path: PathBuf,
    manifest: Manifest,
    cpi_manifest: CpiDeploymentManifest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Deployed,
    Skipped,
}

/// Deploys the single VM described by the user's deployment manifest
pub struct DeployCmd {
    deps: DeployCmdDeps,
    user_config: UserConfig,
    fsm: RwLock<DeployFsm>,
}

impl DeployCmd {
    pub fn new(deps: DeployCmdDeps, user_config: UserConfig) -> Self {
        Self {
            deps,
            user_config,
            fsm: RwLock::new(DeployFsm::new()),
        }
    }

    /// Get the state of the current or last run
    pub async fn state(&self) -> DeployState {
        self.fsm.read().await.state()
    }

    /// Message of the failure that ended the last run
    pub async fn last_error(&self) -> Option<String> {
        self.fsm.read().await.error().map(str::to_string)
    }

    async fn transition(&self, event: DeployEvent) -> Result<(), DeployError> {
        self.fsm
            .write()
            .await
            .process(event)
            .map_err(DeployError::TransitionError)
    }

    /// Run the deploy pipeline for a CPI release and a stemcell tarball
    pub async fn run(
        &self,
        cpi_release_tarball: &Path,
        stemcell_tarball: &Path,
    ) -> Result<(), DeployError> {
        self.start().await.context("Running deploy cmd")?;

        match self.run_stages(cpi_release_tarball, stemcell_tarball).await {
            Ok(outcome) => {
                info!("Deploy finished: {:?}", outcome);
                Ok(())
            }
            Err(e) => {
                let e = e.wrap("Running deploy cmd");
                error!("{}", e);
                if let Err(fsm_err) = self.transition(DeployEvent::Fail(e.to_string())).await {
                    warn!("Failed to record deploy failure: {}", fsm_err);
                }
                Err(e)
            }
        }
    }

    async fn start(&self) -> Result<(), DeployError> {
        let mut fsm = self.fsm.write().await;
        if fsm.state().is_terminal() {
            fsm.process(DeployEvent::Reset)
                .map_err(DeployError::TransitionError)?;
        }
        fsm.process(DeployEvent::Start)
            .map_err(DeployError::TransitionError)
    }

    async fn run_stages(
        &self,
        cpi_release_tarball: &Path,
        stemcell_tarball: &Path,
    ) -> Result<Outcome, DeployError> {
        let manifest_path = self.deployment_manifest_path().await?;
        let inputs = self
            .validate(manifest_path, cpi_release_tarball, stemcell_tarball)
            .await?;
        self.transition(DeployEvent::Validated).await?;

        let release = self
            .deps
            .cpi_installer
            .extract(cpi_release_tarball)
            .await
            .context("Extracting CPI release")?;

        let result = self.with_release(&inputs, &release, stemcell_tarball).await;

        match release.delete().await {
            Ok(()) => {}
            Err(e) if result.is_err() => {
                warn!("Failed to delete extracted CPI release: {}", e);
            }
            Err(e) => return Err(e.wrap("Deleting extracted CPI release")),
        }

        let outcome = result?;
        if outcome == Outcome::Deployed {
            self.deps.ui.say(&format!(
                "Deployment manifest: '{}'",
                inputs.manifest_path.display()
            ));
            self.deps.ui.say(&format!(
                "Deployment state: '{}'",
                deployment_state_path(&inputs.manifest_path).display()
            ));
            self.transition(DeployEvent::Finalized).await?;
        }
        Ok(outcome)
    }

    async fn deployment_manifest_path(&self) -> Result<PathBuf, DeployError> {
        let path = match &self.user_config.deployment_manifest_path {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => {
                self.deps.ui.error("Deployment manifest not set");
                return Err(DeployError::ValidationError(
                    "Deployment manifest not set".to_string(),
                ));
            }
        };

        if !File::new(&path).exists().await {
            self.deps.ui.error("Deployment manifest does not exist");
            return Err(DeployError::ValidationError(format!(
                "Deployment manifest does not exist at '{}'",
                path.display()
            )));
        }
        Ok(path)
    }

    async fn validate(
        &self,
        manifest_path: PathBuf,
        cpi_release_tarball: &Path,
        stemcell_tarball: &Path,
    ) -> Result<ValidatedInputs, DeployError> {
        let mut stage = self.deps.event_logger.new_stage("validating");
        stage.start();

        let mut step = stage.new_step("Validating deployment manifest");
        step.start();
        let (manifest, cpi_manifest) =
            track(step.as_mut(), self.parse_manifests(&manifest_path).await)?;

        let mut step = stage.new_step("Validating cpi release");
        step.start();
        track(
            step.as_mut(),
            tarball_exists(cpi_release_tarball, "CPI release").await,
        )?;

        let mut step = stage.new_step("Validating stemcell");
        step.start();
        track(
            step.as_mut(),
            tarball_exists(stemcell_tarball, "stemcell").await,
        )?;

        stage.finish();
        Ok(ValidatedInputs {
            manifest_path,
            manifest,
            cpi_manifest,
        })
    }

    async fn parse_manifests(
        &self,
        manifest_path: &Path,
    ) -> Result<(Manifest, CpiDeploymentManifest), DeployError> {
        let manifest = self
            .deps
            .parser
            .parse_deployment(manifest_path)
            .await
            .context("Parsing deployment manifest")?;

        self.deps
            .validator
            .validate(&manifest)
            .context("Validating deployment manifest")?;

        let cpi_manifest = self
            .deps
            .parser
            .parse_cpi_deployment(manifest_path)
            .await
            .context("Parsing CPI deployment manifest")?;

        Ok((manifest, cpi_manifest))
    }

    /// Stages that need the extracted CPI release
    async fn with_release(
        &self,
        inputs: &ValidatedInputs,
        release: &Release,
        stemcell_tarball: &Path,
    ) -> Result<Outcome, DeployError> {
        let cloud = self
            .deps
            .cpi_installer
            .install(&inputs.cpi_manifest, release)
            .await
            .context("Installing CPI deployment")?;
        self.transition(DeployEvent::CpiInstalled).await?;

        let stemcell = self
            .deps
            .stemcell_extractor
            .extract(stemcell_tarball)
            .await
            .with_context(|| format!("Extracting stemcell from '{}'", stemcell_tarball.display()))?;

        let result = self.with_stemcell(inputs, release, &stemcell, cloud).await;

        match stemcell.delete().await {
            Ok(()) => {}
            Err(e) if result.is_err() => {
                warn!("Failed to delete extracted stemcell: {}", e);
            }
            Err(e) => return Err(e.wrap("Deleting extracted stemcell")),
        }
        result
    }

    /// Stages that need the extracted stemcell
    async fn with_stemcell(
        &self,
        inputs: &ValidatedInputs,
        release: &Release,
        stemcell: &ExtractedStemcell,
        cloud: Arc<dyn Cloud>,
    ) -> Result<Outcome, DeployError> {
        self.transition(DeployEvent::StemcellExtracted).await?;

        let deployed = self
            .deps
            .deployment_record
            .is_deployed(&inputs.manifest_path, release, stemcell)
            .await
            .context("Checking if deployment has changed")?;

        if deployed {
            self.deps.ui.say(SKIP_DEPLOY_MESSAGE);
            self.transition(DeployEvent::DeploymentUnchanged).await?;
            return Ok(Outcome::Skipped);
        }
        self.transition(DeployEvent::DeploymentChanged).await?;

        self.deploy(inputs, stemcell, cloud).await?;
        self.transition(DeployEvent::VmDeployed).await?;

        self.deps
            .deployment_record
            .update(&inputs.manifest_path, release, stemcell)
            .await
            .context("Updating deployment record")?;

        Ok(Outcome::Deployed)
    }

    /// Deploy the VM, running the registry around it when configured
    async fn deploy(
        &self,
        inputs: &ValidatedInputs,
        stemcell: &ExtractedStemcell,
        cloud: Arc<dyn Cloud>,
    ) -> Result<(), DeployError> {
        let configured = &inputs.cpi_manifest.registry;
        let (server, registry) = if configured.is_empty() {
            (None, configured.clone())
        } else {
            let server = self
                .deps
                .registry_server_manager
                .start(
                    &configured.username,
                    &configured.password,
                    &configured.host,
                    configured.port,
                )
                .await
                .context("Starting registry")?;
            // port 0 binds an ephemeral port
            let registry = Registry {
                port: server.local_addr().port(),
                ..configured.clone()
            };
            (Some(server), registry)
        };

        let result = self
            .deps
            .deployer
            .deploy(
                cloud,
                &inputs.manifest,
                stemcell,
                &registry,
                &inputs.cpi_manifest.ssh_tunnel,
                &inputs.cpi_manifest.mbus,
            )
            .await
            .context("Deploying Microbosh");

        if let Some(server) = server {
            match server.stop().await {
                Ok(()) => {}
                Err(e) if result.is_err() => warn!("Failed to stop registry: {}", e),
                Err(e) => return Err(e.wrap("Stopping registry")),
            }
        }
        result
    }
}

async fn tarball_exists(path: &Path, kind: &str) -> Result<(), DeployError> {
    if File::new(path).exists().await {
        Ok(())
    } else {
        Err(DeployError::ValidationError(format!(
            "Verifying that the {} '{}' exists",
            kind,
            path.display()
        )))
    }
}
