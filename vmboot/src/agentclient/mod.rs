//! In-VM agent client

pub mod client;
pub mod request;
pub mod response;

pub use client::{
    AgentClient, AgentClientFactory, AgentClientOptions, HttpAgentClient, HttpAgentClientFactory,
};
pub use request::{AgentClientError, AgentRequest};
pub use response::Response;
