//! Agent client

use std::time::Duration;

use agent_protocol::{AgentState, ApplySpec, SimpleResponse, StateResponse, TaskResponse};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agentclient::request::{AgentClientError, AgentRequest};
use crate::http::HttpClient;
use crate::utils::generate_uuid;

/// Operations on the in-VM agent
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn ping(&self) -> Result<String, AgentClientError>;

    async fn stop(&self) -> Result<(), AgentClientError>;

    async fn apply(&self, spec: &ApplySpec) -> Result<(), AgentClientError>;

    async fn start(&self) -> Result<(), AgentClientError>;

    async fn get_state(&self) -> Result<AgentState, AgentClientError>;
}

/// Builds agent clients for an mbus URL
pub trait AgentClientFactory: Send + Sync {
    fn new_agent_client(&self, mbus_url: &str) -> Result<Box<dyn AgentClient>, AgentClientError>;
}

/// Agent client options
#[derive(Debug, Clone)]
pub struct AgentClientOptions {
    pub request_timeout: Duration,
    pub task_poll_interval: Duration,
    /// Give up on an async task after this many polls
    pub task_poll_attempts: u32,
}

impl Default for AgentClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            task_poll_interval: Duration::from_millis(500),
            task_poll_attempts: 600,
        }
    }
}

/// Agent client speaking JSON over HTTP
pub struct HttpAgentClient {
    request: AgentRequest,
    options: AgentClientOptions,
}

impl HttpAgentClient {
    pub fn new(request: AgentRequest, options: AgentClientOptions) -> Self {
        Self { request, options }
    }

    /// Send a method that the agent runs as a task and wait for it to finish
    async fn send_async_task(
        &self,
        method: &str,
        arguments: Vec<Value>,
    ) -> Result<Value, AgentClientError> {
        let mut response = TaskResponse::default();
        self.request.send(method, arguments, &mut response).await?;

        let Some(task_id) = response.task_id().map(str::to_string) else {
            return Ok(response.value);
        };

        let mut attempts = 0;
        while response.is_running() {
            if attempts >= self.options.task_poll_attempts {
                return Err(AgentClientError::TaskFailed {
                    task_id,
                    message: format!("still running after {} polls", attempts),
                });
            }
            attempts += 1;

            tokio::time::sleep(self.options.task_poll_interval).await;
            debug!("Polling agent task '{}' ({})", task_id, method);

            response = TaskResponse::default();
            self.request
                .send("get_task", vec![json!(task_id)], &mut response)
                .await?;
        }

        Ok(response.value)
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn ping(&self) -> Result<String, AgentClientError> {
        let mut response = SimpleResponse::default();
        self.request.send("ping", vec![], &mut response).await?;
        Ok(response.value)
    }

    async fn stop(&self) -> Result<(), AgentClientError> {
        self.send_async_task("stop", vec![]).await?;
        info!("Agent stopped services");
        Ok(())
    }

    async fn apply(&self, spec: &ApplySpec) -> Result<(), AgentClientError> {
        let spec = serde_json::to_value(spec).map_err(AgentClientError::Marshal)?;
        self.send_async_task("apply", vec![spec]).await?;
        info!("Agent applied spec");
        Ok(())
    }

    async fn start(&self) -> Result<(), AgentClientError> {
        let mut response = SimpleResponse::default();
        self.request.send("start", vec![], &mut response).await?;
        Ok(())
    }

    async fn get_state(&self) -> Result<AgentState, AgentClientError> {
        let mut response = StateResponse::default();
        self.request.send("get_state", vec![], &mut response).await?;
        Ok(response.value)
    }
}

/// Factory producing `HttpAgentClient`s that share one HTTP client
pub struct HttpAgentClientFactory {
    http_client: HttpClient,
    options: AgentClientOptions,
    cancel: CancellationToken,
}

impl HttpAgentClientFactory {
    pub fn new(
        options: AgentClientOptions,
        cancel: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        let http_client = HttpClient::new(options.request_timeout)?;
        Ok(Self {
            http_client,
            options,
            cancel,
        })
    }
}

impl AgentClientFactory for HttpAgentClientFactory {
    fn new_agent_client(&self, mbus_url: &str) -> Result<Box<dyn AgentClient>, AgentClientError> {
        let request = AgentRequest::new(
            mbus_url,
            self.http_client.clone(),
            generate_uuid(),
            self.cancel.clone(),
        )?;
        Ok(Box::new(HttpAgentClient::new(request, self.options.clone())))
    }
}
