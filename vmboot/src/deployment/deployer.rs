//! VM creation and agent configuration

use std::sync::Arc;
use std::time::Duration;

use agent_protocol::ApplySpec;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::agentclient::{AgentClient, AgentClientFactory};
use crate::cloud::Cloud;
use crate::deployment::manifest::{Manifest, Registry, SshTunnel};
use crate::deployment::stemcell::ExtractedStemcell;
use crate::errors::{DeployError, ResultExt};
use crate::eventlog::{track, EventLogger, Stage};
use crate::utils::{calc_exp_backoff, generate_uuid, CooldownOptions};

pub const AGENT_RUNNING_STATE: &str = "running";

#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(
        &self,
        cloud: Arc<dyn Cloud>,
        manifest: &Manifest,
        stemcell: &ExtractedStemcell,
        registry: &Registry,
        ssh_tunnel: &SshTunnel,
        mbus_url: &str,
    ) -> Result<(), DeployError>;
}

/// VM deployer options
#[derive(Debug, Clone)]
pub struct VmDeployerOptions {
    /// Pings sent while the VM boots before giving up
    pub ping_attempts: u32,
    pub ping_backoff: CooldownOptions,
    pub state_poll_attempts: u32,
    pub state_poll_interval: Duration,
}

impl Default for VmDeployerOptions {
    fn default() -> Self {
        Self {
            ping_attempts: 30,
            ping_backoff: CooldownOptions::default(),
            state_poll_attempts: 60,
            state_poll_interval: Duration::from_secs(1),
        }
    }
}

/// Deployer creating the VM through the CPI and configuring it through its agent
pub struct VmDeployer {
    agent_client_factory: Arc<dyn AgentClientFactory>,
    event_logger: Arc<dyn EventLogger>,
    options: VmDeployerOptions,
}

impl VmDeployer {
    pub fn new(
        agent_client_factory: Arc<dyn AgentClientFactory>,
        event_logger: Arc<dyn EventLogger>,
        options: VmDeployerOptions,
    ) -> Self {
        Self {
            agent_client_factory,
            event_logger,
            options,
        }
    }

    async fn wait_for_agent(&self, agent: &dyn AgentClient) -> Result<(), DeployError> {
        let attempts = self.options.ping_attempts.max(1);
        let mut attempt = 0;
        loop {
            match agent.ping().await {
                Ok(reply) => {
                    debug!("Agent answered ping with '{}'", reply);
                    return Ok(());
                }
                Err(e) if attempt + 1 < attempts => {
                    let delay = calc_exp_backoff(&self.options.ping_backoff, attempt);
                    debug!(
                        "Agent not reachable yet (attempt {}/{}): {}. Retrying in {:?}",
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(DeployError::from(e)
                        .wrap(format!("Agent unreachable after {} attempts", attempts)))
                }
            }
        }
    }

    async fn apply_spec(&self, agent: &dyn AgentClient, spec: &ApplySpec) -> Result<(), DeployError> {
        agent.stop().await.context("Stopping agent")?;
        agent.apply(spec).await.context("Sending apply message")?;
        agent.start().await.context("Starting agent")?;
        Ok(())
    }

    async fn wait_until_running(&self, agent: &dyn AgentClient) -> Result<(), DeployError> {
        let attempts = self.options.state_poll_attempts.max(1);
        let mut last_state = String::new();
        for attempt in 0..attempts {
            let state = agent.get_state().await.context("Getting agent state")?;
            if state.job_state == AGENT_RUNNING_STATE {
                return Ok(());
            }
            debug!("Agent job state is '{}' (attempt {})", state.job_state, attempt + 1);
            last_state = state.job_state;
            tokio::time::sleep(self.options.state_poll_interval).await;
        }
        Err(DeployError::Internal(format!(
            "Agent job state is '{}' after {} attempts, expected '{}'",
            last_state, attempts, AGENT_RUNNING_STATE
        )))
    }
}

/// Environment handed to the VM so it can reach the registry and message bus
fn vm_env(registry: &Registry, mbus_url: &str) -> Map<String, Value> {
    let mut bosh = Map::new();
    bosh.insert("mbus".to_string(), json!({ "url": mbus_url }));
    if !registry.is_empty() {
        bosh.insert(
            "registry".to_string(),
            json!({
                "endpoint": format!("http://{}:{}", registry.host, registry.port),
                "username": registry.username,
                "password": registry.password,
            }),
        );
    }

    let mut env = Map::new();
    env.insert("bosh".to_string(), Value::Object(bosh));
    env
}

fn build_apply_spec(manifest: &Manifest, stemcell: &ExtractedStemcell) -> ApplySpec {
    let mut spec = stemcell.apply_spec.clone();
    spec.deployment = manifest.name.clone();
    spec.index = 0;
    if let Some(job) = manifest.jobs.first() {
        spec.job.name = job.name.clone();
    }
    spec.networks = manifest.networks.clone();
    spec.properties = manifest.properties.clone();
    spec
}

#[async_trait]
impl Deployer for VmDeployer {
    async fn deploy(
        &self,
        cloud: Arc<dyn Cloud>,
        manifest: &Manifest,
        stemcell: &ExtractedStemcell,
        registry: &Registry,
        ssh_tunnel: &SshTunnel,
        mbus_url: &str,
    ) -> Result<(), DeployError> {
        if !ssh_tunnel.is_empty() {
            warn!(
                "SSH tunnel to {} is not opened; contacting the agent directly",
                ssh_tunnel.host
            );
        }

        let mut stage: Box<dyn Stage> = self.event_logger.new_stage("deploying");
        stage.start();

        let mut step = stage.new_step("Uploading stemcell");
        step.start();
        let stemcell_cid = track(
            step.as_mut(),
            cloud
                .create_stemcell(
                    &stemcell.manifest.image_path,
                    &stemcell.manifest.cloud_properties,
                )
                .await
                .context("Uploading stemcell"),
        )?;

        let agent_id = generate_uuid();
        let mut step = stage.new_step("Creating VM from stemcell");
        step.start();
        let vm_cid = track(
            step.as_mut(),
            cloud
                .create_vm(
                    &agent_id,
                    &stemcell_cid,
                    &manifest.cloud_properties,
                    &manifest.networks,
                    &vm_env(registry, mbus_url),
                )
                .await
                .with_context(|| format!("Creating VM with agent ID '{}'", agent_id)),
        )?;
        info!("Created VM {} for agent {}", vm_cid, agent_id);

        let agent = self.agent_client_factory.new_agent_client(mbus_url)?;

        let mut step = stage.new_step("Waiting for the agent");
        step.start();
        track(
            step.as_mut(),
            self.wait_for_agent(agent.as_ref())
                .await
                .context("Waiting for the agent"),
        )?;

        let mut step = stage.new_step("Applying micro BOSH spec");
        step.start();
        let spec = build_apply_spec(manifest, stemcell);
        track(
            step.as_mut(),
            self.apply_spec(agent.as_ref(), &spec)
                .await
                .context("Applying micro BOSH spec"),
        )?;

        let mut step = stage.new_step("Waiting for the agent to be running");
        step.start();
        track(
            step.as_mut(),
            self.wait_until_running(agent.as_ref())
                .await
                .context("Waiting for the agent to be running"),
        )?;

        stage.finish();
        Ok(())
    }
}
