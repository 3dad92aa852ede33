//! Infrastructure operations backed by the CPI

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::cloud::cmd_runner::{CpiCmdRunner, CpiError};

/// Infrastructure primitives needed to bootstrap one VM
#[async_trait]
pub trait Cloud: Send + Sync {
    async fn create_stemcell(
        &self,
        image_path: &Path,
        cloud_properties: &Map<String, Value>,
    ) -> Result<String, CpiError>;

    async fn delete_stemcell(&self, stemcell_cid: &str) -> Result<(), CpiError>;

    async fn create_vm(
        &self,
        agent_id: &str,
        stemcell_cid: &str,
        cloud_properties: &Map<String, Value>,
        networks: &Map<String, Value>,
        env: &Map<String, Value>,
    ) -> Result<String, CpiError>;

    async fn delete_vm(&self, vm_cid: &str) -> Result<(), CpiError>;

    async fn has_vm(&self, vm_cid: &str) -> Result<bool, CpiError>;
}

/// `Cloud` implementation issuing one CPI command per operation
pub struct CpiCloud {
    runner: Arc<dyn CpiCmdRunner>,
}

impl CpiCloud {
    pub fn new(runner: Arc<dyn CpiCmdRunner>) -> Self {
        Self { runner }
    }

    async fn run_for_cid(&self, method: &str, arguments: Vec<Value>) -> Result<String, CpiError> {
        let output = self.runner.run(method, arguments).await?;
        match output.result {
            Value::String(cid) => Ok(cid),
            result => Err(CpiError::UnexpectedResult {
                method: method.to_string(),
                result,
            }),
        }
    }
}

#[async_trait]
impl Cloud for CpiCloud {
    async fn create_stemcell(
        &self,
        image_path: &Path,
        cloud_properties: &Map<String, Value>,
    ) -> Result<String, CpiError> {
        let cid = self
            .run_for_cid(
                "create_stemcell",
                vec![
                    json!(image_path.display().to_string()),
                    Value::Object(cloud_properties.clone()),
                ],
            )
            .await?;
        info!("Created stemcell: {}", cid);
        Ok(cid)
    }

    async fn delete_stemcell(&self, stemcell_cid: &str) -> Result<(), CpiError> {
        self.runner
            .run("delete_stemcell", vec![json!(stemcell_cid)])
            .await?;
        Ok(())
    }

    async fn create_vm(
        &self,
        agent_id: &str,
        stemcell_cid: &str,
        cloud_properties: &Map<String, Value>,
        networks: &Map<String, Value>,
        env: &Map<String, Value>,
    ) -> Result<String, CpiError> {
        let cid = self
            .run_for_cid(
                "create_vm",
                vec![
                    json!(agent_id),
                    json!(stemcell_cid),
                    Value::Object(cloud_properties.clone()),
                    Value::Object(networks.clone()),
                    json!([]),
                    Value::Object(env.clone()),
                ],
            )
            .await?;
        info!("Created VM: {}", cid);
        Ok(cid)
    }

    async fn delete_vm(&self, vm_cid: &str) -> Result<(), CpiError> {
        self.runner.run("delete_vm", vec![json!(vm_cid)]).await?;
        Ok(())
    }

    async fn has_vm(&self, vm_cid: &str) -> Result<bool, CpiError> {
        let output = self.runner.run("has_vm", vec![json!(vm_cid)]).await?;
        match output.result {
            Value::Bool(found) => Ok(found),
            result => Err(CpiError::UnexpectedResult {
                method: "has_vm".to_string(),
                result,
            }),
        }
    }
}
