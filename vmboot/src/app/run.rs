//! Wiring of the deploy command from settings and collaborators

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::agentclient::HttpAgentClientFactory;
use crate::app::options::AppOptions;
use crate::blobstore::LocalBlobstore;
use crate::cmd::{DeployCmd, DeployCmdDeps};
use crate::cpi::{CpiInstaller, CpiInstallerDeps, PackageCompiler, ReleaseReader};
use crate::deployment::manifest::{Parser, Validator};
use crate::deployment::stemcell::Extractor;
use crate::deployment::{FileDeploymentRecord, VmDeployer};
use crate::errors::{DeployError, ResultExt};
use crate::eventlog::{ConsoleEventLogger, EventLogger};
use crate::filesys::file::File;
use crate::registry::HttpRegistryServerManager;
use crate::storage::settings::UserConfig;
use crate::system::{ExecCmdRunner, TarballCompressor};
use crate::templatescompiler::{FileTemplatesRepo, JobRenderer, TemplatesCompiler};
use crate::ui::Ui;
use crate::utils::generate_uuid;

/// Collaborators supplied by the embedding front end
pub struct Collaborators {
    pub ui: Arc<dyn Ui>,
    pub parser: Arc<dyn Parser>,
    pub validator: Arc<dyn Validator>,
    pub stemcell_extractor: Arc<dyn Extractor>,
    pub release_reader: Arc<dyn ReleaseReader>,
    pub package_compiler: Arc<dyn PackageCompiler>,
    pub job_renderer: Arc<dyn JobRenderer>,
}

/// Build a deploy command backed by the local filesystem, the CPI and the agent
pub async fn build_deploy_cmd(
    options: &AppOptions,
    user_config: UserConfig,
    collaborators: Collaborators,
) -> Result<DeployCmd, DeployError> {
    let layout = &options.layout;
    layout
        .setup()
        .await
        .with_context(|| format!("Setting up storage at '{}'", layout.base_dir.display()))?;

    let deployment_record = Arc::new(FileDeploymentRecord::new());
    let deployment_uuid = match &user_config.deployment_manifest_path {
        Some(path) if File::new(path).exists().await => {
            deployment_record.deployment_uuid(path).await?
        }
        // validation rejects the run before the CPI is ever called
        _ => generate_uuid(),
    };

    let compressor = Arc::new(TarballCompressor::new(layout.tmp_dir().path()));
    let blobstore = Arc::new(LocalBlobstore::new(layout.blobs_dir()));
    let templates_repo = Arc::new(FileTemplatesRepo::new(layout.templates_index_file()));
    let templates_compiler = Arc::new(TemplatesCompiler::new(
        collaborators.job_renderer,
        compressor.clone(),
        blobstore.clone(),
        templates_repo.clone(),
        layout.tmp_dir(),
    ));

    let cmd_runner = Arc::new(ExecCmdRunner::new(
        Some(options.settings.cpi_timeout()),
        options.cancel.clone(),
    ));

    let cpi_installer = CpiInstaller::new(
        CpiInstallerDeps {
            compressor,
            release_reader: collaborators.release_reader,
            package_compiler: collaborators.package_compiler,
            templates_compiler,
            templates_repo,
            blobstore,
            cmd_runner,
        },
        layout.tmp_dir(),
        layout.install_dir(),
        deployment_uuid,
    );

    let event_logger: Arc<dyn EventLogger> =
        Arc::new(ConsoleEventLogger::new(collaborators.ui.clone()));
    let agent_client_factory = HttpAgentClientFactory::new(
        options.settings.agent_client_options(),
        options.cancel.clone(),
    )?;
    let deployer = VmDeployer::new(
        Arc::new(agent_client_factory),
        event_logger.clone(),
        options.settings.deployer_options(),
    );

    info!("Using storage at {}", layout.base_dir.display());

    Ok(DeployCmd::new(
        DeployCmdDeps {
            ui: collaborators.ui,
            parser: collaborators.parser,
            validator: collaborators.validator,
            cpi_installer: Arc::new(cpi_installer),
            registry_server_manager: Arc::new(HttpRegistryServerManager::new()),
            stemcell_extractor: collaborators.stemcell_extractor,
            deployment_record,
            deployer: Arc::new(deployer),
            event_logger,
        },
        user_config,
    ))
}

/// Deploy with the user config stored in the layout
pub async fn deploy(
    options: &AppOptions,
    collaborators: Collaborators,
    cpi_release_tarball: &Path,
    stemcell_tarball: &Path,
) -> Result<(), DeployError> {
    let user_config = UserConfig::load(&options.layout.user_config_file()).await?;
    let cmd = build_deploy_cmd(options, user_config, collaborators).await?;
    cmd.run(cpi_release_tarball, stemcell_tarball).await
}
