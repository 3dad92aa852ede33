//! Templates compilation pipeline

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::blobstore::Blobstore;
use crate::errors::{DeployError, ResultExt};
use crate::filesys::dir::Dir;
use crate::release::Job;
use crate::system::Compressor;
use crate::templatescompiler::renderer::JobRenderer;
use crate::templatescompiler::repo::{TemplateRecord, TemplatesRepo};

/// Renders, packages and uploads job templates
pub struct TemplatesCompiler {
    renderer: Arc<dyn JobRenderer>,
    compressor: Arc<dyn Compressor>,
    blobstore: Arc<dyn Blobstore>,
    repo: Arc<dyn TemplatesRepo>,
    temp_root: Dir,
}

impl TemplatesCompiler {
    pub fn new(
        renderer: Arc<dyn JobRenderer>,
        compressor: Arc<dyn Compressor>,
        blobstore: Arc<dyn Blobstore>,
        repo: Arc<dyn TemplatesRepo>,
        temp_root: Dir,
    ) -> Self {
        Self {
            renderer,
            compressor,
            blobstore,
            repo,
            temp_root,
        }
    }

    /// Compile every job in order, stopping at the first failure
    pub async fn compile(
        &self,
        jobs: &[Job],
        deployment_name: &str,
        properties: &Map<String, Value>,
    ) -> Result<(), DeployError> {
        for job in jobs {
            self.compile_job(job, deployment_name, properties)
                .await
                .with_context(|| format!("Compiling templates for job '{}'", job.name))?;
        }
        Ok(())
    }

    async fn compile_job(
        &self,
        job: &Job,
        deployment_name: &str,
        properties: &Map<String, Value>,
    ) -> Result<(), DeployError> {
        let compile_dir = self
            .temp_root
            .create_temp_dir("bosh-micro-cli-job-templates")
            .await
            .context("Creating temporary directory")?;

        debug!(
            "Rendering templates for job {} into {}",
            job.key(),
            compile_dir.path().display()
        );
        self.renderer
            .render(
                &job.extracted_path,
                compile_dir.path(),
                job,
                properties,
                deployment_name,
            )
            .await
            .context("Rendering templates")?;

        let tarball = self
            .compressor
            .compress_files_in_dir(compile_dir.path())
            .await
            .context("Compressing rendered job templates")?;

        let stored = self.store(job, &tarball).await;

        if let Err(e) = self.compressor.clean_up(&tarball).await {
            if stored.is_ok() {
                return Err(e.wrap("Cleaning up rendered job templates tarball"));
            }
            warn!("Failed to clean up tarball {}: {}", tarball.display(), e);
        }

        stored?;
        info!("Compiled templates for job {}", job.name);
        Ok(())
    }

    async fn store(&self, job: &Job, tarball: &std::path::Path) -> Result<(), DeployError> {
        let (blob_id, blob_sha1) = self
            .blobstore
            .create(tarball)
            .await
            .context("Creating blob")?;

        let record = TemplateRecord { blob_id, blob_sha1 };
        self.repo
            .save(job, record)
            .await
            .context("Saving job to templates repo")
    }
}
