//! CPI command models

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command request written to the CPI's stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmdInput {
    pub method: String,
    pub arguments: Vec<Value>,
    pub context: CmdContext,
}

/// Per-invocation context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdContext {
    pub director_uuid: String,
}

/// Error reported by the CPI itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(default)]
    pub ok_to_retry: bool,
}

impl fmt::Display for CmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "CmdError{}", json)
    }
}

/// Command response read from the CPI's stdout
///
/// `error` is the only failure signal; the process exit status is not part
/// of the contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CmdOutput {
    #[serde(default)]
    pub result: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CmdError>,

    #[serde(default)]
    pub log: String,
}
