//! Job template rendering

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::DeployError;
use crate::release::Job;

/// Renders a job's templates into a destination directory
///
/// Implementations evaluate each entry of `job.templates` against the
/// deployment properties and write the result to the mapped destination
/// below `destination_path`.
#[async_trait]
pub trait JobRenderer: Send + Sync {
    async fn render(
        &self,
        source_path: &Path,
        destination_path: &Path,
        job: &Job,
        properties: &Map<String, Value>,
        deployment_name: &str,
    ) -> Result<(), DeployError>;
}
