//! Agent wire protocol
//!
//! Messages posted to the in-VM agent's message-bus endpoint and the
//! per-method response bodies it sends back.

pub mod models;

pub use models::{
    AgentException, AgentRequestMessage, AgentState, ApplySpec, BlobRef, JobSpec,
    SimpleResponse, StateResponse, TaskResponse,
};
