//! Local CPI installation

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::blobstore::Blobstore;
use crate::cloud::{Cloud, CpiCloud, CpiJob, ExternalCpiCmdRunner};
use crate::deployment::manifest::CpiDeploymentManifest;
use crate::errors::{DeployError, ResultExt};
use crate::filesys::dir::Dir;
use crate::release::{Job, Release};
use crate::system::{CmdRunner, Compressor};
use crate::templatescompiler::{TemplatesCompiler, TemplatesRepo};
use crate::utils::generate_uuid;

/// Template destination identifying the CPI job
pub const CPI_EXECUTABLE: &str = "bin/cpi";

/// Reads the manifest of an unpacked release
#[async_trait]
pub trait ReleaseReader: Send + Sync {
    async fn read(&self, extracted_path: &Path) -> Result<Release, DeployError>;
}

/// Compiles a release's packages into the install packages dir
#[async_trait]
pub trait PackageCompiler: Send + Sync {
    async fn compile(&self, release: &Release, packages_dir: &Path) -> Result<(), DeployError>;
}

#[async_trait]
pub trait Installer: Send + Sync {
    async fn extract(&self, tarball_path: &Path) -> Result<Release, DeployError>;

    async fn install(
        &self,
        manifest: &CpiDeploymentManifest,
        release: &Release,
    ) -> Result<Arc<dyn Cloud>, DeployError>;
}

/// Collaborators of [`CpiInstaller`]
pub struct CpiInstallerDeps {
    pub compressor: Arc<dyn Compressor>,
    pub release_reader: Arc<dyn ReleaseReader>,
    pub package_compiler: Arc<dyn PackageCompiler>,
    pub templates_compiler: Arc<TemplatesCompiler>,
    pub templates_repo: Arc<dyn TemplatesRepo>,
    pub blobstore: Arc<dyn Blobstore>,
    pub cmd_runner: Arc<dyn CmdRunner>,
}

/// Installs a CPI release under `install_dir` and exposes it as a [`Cloud`]
pub struct CpiInstaller {
    deps: CpiInstallerDeps,
    temp_root: Dir,
    install_dir: Dir,
    deployment_uuid: String,
}

impl CpiInstaller {
    pub fn new(
        deps: CpiInstallerDeps,
        temp_root: Dir,
        install_dir: Dir,
        deployment_uuid: String,
    ) -> Self {
        Self {
            deps,
            temp_root,
            install_dir,
            deployment_uuid,
        }
    }

    pub fn jobs_dir(&self) -> Dir {
        self.install_dir.subdir("jobs")
    }

    pub fn packages_dir(&self) -> Dir {
        self.install_dir.subdir("packages")
    }

    async fn extract_into(&self, tarball_path: &Path, dir: &Dir) -> Result<Release, DeployError> {
        self.deps
            .compressor
            .decompress_file_to_dir(tarball_path, dir.path())
            .await?;

        let mut release = self
            .deps
            .release_reader
            .read(dir.path())
            .await
            .context("Reading release manifest")?;
        release.extracted_path = dir.path().to_path_buf();
        Ok(release)
    }

    async fn install_job(&self, job: &Job) -> Result<(), DeployError> {
        let record = self
            .deps
            .templates_repo
            .find(job)
            .await?
            .ok_or_else(|| {
                DeployError::TemplatesRepoError(format!(
                    "No compiled templates for job '{}'",
                    job.key()
                ))
            })?;

        let blob = self
            .deps
            .blobstore
            .get(&record.blob_id, &record.blob_sha1)
            .await?;

        let job_dir = self.jobs_dir().subdir(&job.name);
        job_dir.delete().await?;
        self.deps
            .compressor
            .decompress_file_to_dir(&blob, job_dir.path())
            .await?;

        debug!("Installed job {} into {}", job.name, job_dir.path().display());
        Ok(())
    }
}

#[async_trait]
impl Installer for CpiInstaller {
    async fn extract(&self, tarball_path: &Path) -> Result<Release, DeployError> {
        let dir = self
            .temp_root
            .subdir(&format!("cpi-release-{}", generate_uuid()));
        dir.create().await?;

        match self.extract_into(tarball_path, &dir).await {
            Ok(release) => {
                info!(
                    "Extracted CPI release {}/{} to {}",
                    release.name,
                    release.version,
                    dir.path().display()
                );
                Ok(release)
            }
            Err(e) => {
                if let Err(cleanup) = dir.delete().await {
                    warn!(
                        "Failed to delete {} after failed extraction: {}",
                        dir.path().display(),
                        cleanup
                    );
                }
                Err(e.wrap(format!(
                    "Extracting CPI release '{}'",
                    tarball_path.display()
                )))
            }
        }
    }

    async fn install(
        &self,
        manifest: &CpiDeploymentManifest,
        release: &Release,
    ) -> Result<Arc<dyn Cloud>, DeployError> {
        let packages_dir = self.packages_dir();
        packages_dir.create().await?;
        self.deps
            .package_compiler
            .compile(release, packages_dir.path())
            .await
            .context("Compiling packages")?;

        self.deps
            .templates_compiler
            .compile(&release.jobs, &manifest.name, &manifest.properties)
            .await
            .context("Compiling job templates")?;

        for job in &release.jobs {
            self.install_job(job)
                .await
                .with_context(|| format!("Installing job '{}'", job.name))?;
        }

        let cpi_job = release
            .jobs
            .iter()
            .find(|j| j.renders(CPI_EXECUTABLE))
            .ok_or_else(|| {
                DeployError::ReleaseError(format!(
                    "No job in release '{}' provides '{}'",
                    release.name, CPI_EXECUTABLE
                ))
            })?;

        info!("Installed CPI job {} from release {}", cpi_job.name, release.name);

        let runner = ExternalCpiCmdRunner::new(
            self.deps.cmd_runner.clone(),
            CpiJob {
                job_name: cpi_job.name.clone(),
                jobs_dir: self.jobs_dir().path().to_path_buf(),
                packages_dir: packages_dir.path().to_path_buf(),
            },
            self.deployment_uuid.clone(),
        );
        Ok(Arc::new(CpiCloud::new(Arc::new(runner))))
    }
}
