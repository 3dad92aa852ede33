//! Compiled template records

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::release::Job;

/// Where a job's compiled templates were uploaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub blob_id: String,
    /// Content fingerprint of the uploaded blob
    pub blob_sha1: String,
}

impl TemplateRecord {
    pub fn is_valid(&self) -> bool {
        !self.blob_id.is_empty() && !self.blob_sha1.is_empty()
    }
}

#[async_trait]
pub trait TemplatesRepo: Send + Sync {
    async fn save(&self, job: &Job, record: TemplateRecord) -> Result<(), DeployError>;

    async fn find(&self, job: &Job) -> Result<Option<TemplateRecord>, DeployError>;
}

/// Templates repo persisted as a JSON index keyed by job name and fingerprint
pub struct FileTemplatesRepo {
    index_file: File,
    records: RwLock<Option<BTreeMap<String, TemplateRecord>>>,
}

impl FileTemplatesRepo {
    pub fn new(index_file: File) -> Self {
        Self {
            index_file,
            records: RwLock::new(None),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, TemplateRecord>, DeployError> {
        Ok(self
            .index_file
            .read_json_opt::<BTreeMap<String, TemplateRecord>>()
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl TemplatesRepo for FileTemplatesRepo {
    async fn save(&self, job: &Job, record: TemplateRecord) -> Result<(), DeployError> {
        if !record.is_valid() {
            return Err(DeployError::TemplatesRepoError(format!(
                "Refusing to save incomplete record for job '{}'",
                job.name
            )));
        }

        let mut guard = self.records.write().await;
        let mut records = match guard.take() {
            Some(records) => records,
            None => self.load().await?,
        };

        records.insert(job.key(), record);
        let written = self.index_file.write_json(&records).await;
        *guard = Some(records);
        written.map_err(|e| {
            DeployError::TemplatesRepoError(format!("Saving record for job '{}': {}", job.name, e))
        })?;

        debug!("Saved template record for job {}", job.key());
        Ok(())
    }

    async fn find(&self, job: &Job) -> Result<Option<TemplateRecord>, DeployError> {
        {
            let guard = self.records.read().await;
            if let Some(records) = guard.as_ref() {
                return Ok(records.get(&job.key()).cloned());
            }
        }

        let mut guard = self.records.write().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard.as_ref().and_then(|r| r.get(&job.key()).cloned()))
    }
}
