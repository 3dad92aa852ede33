//! Agent message models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request posted to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequestMessage {
    pub method: String,
    pub arguments: Vec<Value>,
    pub reply_to: String,
}

/// Application-level failure reported by the agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentException {
    #[serde(default)]
    pub message: String,
}

impl AgentException {
    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }
}

/// Response whose value is a plain string (`ping`, `start`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleResponse {
    #[serde(default)]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<AgentException>,
}

/// Response of an asynchronous agent task (`stop`, `apply`, `get_task`)
///
/// While the task runs the value is `{"agent_task_id": .., "state": "running"}`;
/// once finished it is the task's result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    pub value: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<AgentException>,
}

impl TaskResponse {
    pub fn task_id(&self) -> Option<&str> {
        self.value.get("agent_task_id").and_then(Value::as_str)
    }

    pub fn task_state(&self) -> Option<&str> {
        self.value.get("state").and_then(Value::as_str)
    }

    pub fn is_running(&self) -> bool {
        self.task_state() == Some("running")
    }
}

/// Agent state as reported by `get_state`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub job_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateResponse {
    #[serde(default)]
    pub value: AgentState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<AgentException>,
}

/// Reference to a blob the agent downloads while applying a spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub blobstore_id: String,
    pub sha1: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(default)]
    pub templates: Vec<BlobRef>,
}

/// Spec applied by the agent to converge the VM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplySpec {
    #[serde(default)]
    pub deployment: String,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub job: JobSpec,
    #[serde(default)]
    pub packages: BTreeMap<String, BlobRef>,
    #[serde(default)]
    pub networks: Map<String, Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}
