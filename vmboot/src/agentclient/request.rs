//! Agent request over the message-bus HTTP endpoint

use agent_protocol::AgentRequestMessage;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::agentclient::response::Response;
use crate::http::HttpClient;

#[derive(Error, Debug)]
pub enum AgentClientError {
    #[error("Invalid agent endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },

    #[error("Marshaling agent request: {0}")]
    Marshal(#[source] serde_json::Error),

    #[error("Performing request to agent endpoint '{endpoint}': {source}")]
    Request {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("Agent responded with non-successful status code: {0}")]
    Status(u16),

    #[error("Reading agent response: {0}")]
    Read(#[source] reqwest::Error),

    #[error("Unmarshaling agent response: {0}")]
    Unmarshal(#[source] serde_json::Error),

    #[error("Agent responded with error: {0}")]
    Exception(String),

    #[error("Agent task '{task_id}' did not finish: {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("Timed out waiting for agent: {0}")]
    Timeout(String),

    #[error("Agent request cancelled")]
    Cancelled,
}

impl AgentClientError {
    pub fn is_timeout(&self) -> bool {
        match self {
            AgentClientError::Timeout(_) => true,
            AgentClientError::Request { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Sends requests to one agent with a fixed correlation id
#[derive(Debug, Clone)]
pub struct AgentRequest {
    endpoint: Url,
    http_client: HttpClient,
    uuid: String,
    cancel: CancellationToken,
}

impl AgentRequest {
    pub fn new(
        endpoint: &str,
        http_client: HttpClient,
        uuid: String,
        cancel: CancellationToken,
    ) -> Result<Self, AgentClientError> {
        let endpoint = Url::parse(endpoint).map_err(|source| AgentClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;

        Ok(Self {
            endpoint,
            http_client,
            uuid,
            cancel,
        })
    }

    pub fn reply_to(&self) -> &str {
        &self.uuid
    }

    /// Send `method` and decode the reply into `response`
    pub async fn send(
        &self,
        method: &str,
        arguments: Vec<Value>,
        response: &mut dyn Response,
    ) -> Result<(), AgentClientError> {
        let message = AgentRequestMessage {
            method: method.to_string(),
            arguments,
            reply_to: self.uuid.clone(),
        };
        let body = serde_json::to_vec(&message).map_err(AgentClientError::Marshal)?;

        debug!("Sending agent request '{}'", method);

        let http_response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AgentClientError::Cancelled),
            result = self.http_client.post(&self.endpoint, body) => {
                result.map_err(|source| AgentClientError::Request {
                    endpoint: redacted(&self.endpoint),
                    source,
                })?
            }
        };

        if http_response.status() != StatusCode::OK {
            return Err(AgentClientError::Status(http_response.status().as_u16()));
        }

        let response_body = tokio::select! {
            _ = self.cancel.cancelled() => return Err(AgentClientError::Cancelled),
            body = http_response.bytes() => body.map_err(AgentClientError::Read)?,
        };

        response
            .unmarshal(&response_body)
            .map_err(AgentClientError::Unmarshal)?;

        let exception = response.exception();
        if !exception.is_empty() {
            return Err(AgentClientError::Exception(exception.message));
        }

        Ok(())
    }
}

fn redacted(endpoint: &Url) -> String {
    crate::http::client::split_credentials(endpoint).0.to_string()
}
