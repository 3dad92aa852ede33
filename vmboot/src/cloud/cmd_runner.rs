//! External CPI command runner
//!
//! Every CPI call is one subprocess: the JSON request goes to stdin and a
//! single JSON response is read back from stdout. The `error` field of that
//! response is the only failure signal; the exit code is logged but never
//! interpreted.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cpi_protocol::{CmdContext, CmdError, CmdInput, CmdOutput};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::system::{CmdRunError, CmdRunner, Command};

/// Search path handed to every CPI process
pub const CPI_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Location of an installed CPI job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpiJob {
    pub job_name: String,
    pub jobs_dir: PathBuf,
    pub packages_dir: PathBuf,
}

impl CpiJob {
    pub fn executable_path(&self) -> PathBuf {
        self.jobs_dir.join(&self.job_name).join("bin").join("cpi")
    }
}

#[derive(Error, Debug)]
pub enum CpiError {
    #[error("Marshalling external CPI command input: {0}")]
    Marshal(#[source] serde_json::Error),

    #[error("Executing external CPI command: '{path}': {source}")]
    Execute {
        path: String,
        source: CmdRunError,
    },

    #[error("Unmarshalling external CPI command output: STDOUT: '{stdout}', STDERR: '{stderr}': {source}")]
    Unmarshal {
        stdout: String,
        stderr: String,
        source: serde_json::Error,
    },

    /// The CPI answered with a populated `error`; the decoded output rides along.
    #[error("External CPI command for method `{method}' returned an error: {error}")]
    Remote {
        method: String,
        error: CmdError,
        output: Box<CmdOutput>,
    },

    #[error("Unexpected result for CPI method `{method}': {result}")]
    UnexpectedResult { method: String, result: Value },
}

impl CpiError {
    /// Whether the CPI flagged the failure as safe to retry
    pub fn ok_to_retry(&self) -> bool {
        match self {
            CpiError::Remote { error, .. } => error.ok_to_retry,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CpiError::Execute {
                source: CmdRunError::Timeout { .. },
                ..
            }
        )
    }

    /// Decoded CPI output, when the CPI produced one
    pub fn output(&self) -> Option<&CmdOutput> {
        match self {
            CpiError::Remote { output, .. } => Some(&**output),
            _ => None,
        }
    }
}

#[async_trait]
pub trait CpiCmdRunner: Send + Sync {
    async fn run(&self, method: &str, arguments: Vec<Value>) -> Result<CmdOutput, CpiError>;
}

/// Runs the CPI executable of an installed CPI job
pub struct ExternalCpiCmdRunner {
    cmd_runner: Arc<dyn CmdRunner>,
    cpi_job: CpiJob,
    deployment_uuid: String,
}

impl ExternalCpiCmdRunner {
    pub fn new(cmd_runner: Arc<dyn CmdRunner>, cpi_job: CpiJob, deployment_uuid: String) -> Self {
        Self {
            cmd_runner,
            cpi_job,
            deployment_uuid,
        }
    }

    fn command(&self, input: Vec<u8>) -> Command {
        let mut env = BTreeMap::new();
        env.insert(
            "BOSH_PACKAGES_DIR".to_string(),
            self.cpi_job.packages_dir.display().to_string(),
        );
        env.insert(
            "BOSH_JOBS_DIR".to_string(),
            self.cpi_job.jobs_dir.display().to_string(),
        );
        env.insert("PATH".to_string(), CPI_PATH.to_string());

        Command {
            name: self.cpi_job.executable_path(),
            env,
            use_isolated_env: true,
            stdin: Some(input),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CpiCmdRunner for ExternalCpiCmdRunner {
    async fn run(&self, method: &str, arguments: Vec<Value>) -> Result<CmdOutput, CpiError> {
        let input = CmdInput {
            method: method.to_string(),
            arguments,
            context: CmdContext {
                director_uuid: self.deployment_uuid.clone(),
            },
        };
        let input_bytes = serde_json::to_vec(&input).map_err(CpiError::Marshal)?;

        let cmd = self.command(input_bytes);
        let cmd_path = cmd.name.display().to_string();
        let stdin = String::from_utf8_lossy(cmd.stdin.as_deref().unwrap_or_default()).to_string();

        let result = self.cmd_runner.run_complex_command(&cmd).await;
        match &result {
            Ok(res) => debug!(
                "Exit Code {} when executing external CPI command '{}'\nSTDIN: '{}'\nSTDOUT: '{}'\nSTDERR: '{}'",
                res.exit_code, cmd_path, stdin, res.stdout, res.stderr
            ),
            Err(e) => debug!(
                "Failed executing external CPI command '{}'\nSTDIN: '{}'\nERROR: '{}'",
                cmd_path, stdin, e
            ),
        }
        let result = result.map_err(|source| CpiError::Execute {
            path: cmd_path.clone(),
            source,
        })?;

        let output: CmdOutput =
            serde_json::from_str(&result.stdout).map_err(|source| CpiError::Unmarshal {
                stdout: result.stdout.clone(),
                stderr: result.stderr.clone(),
                source,
            })?;

        debug!("{}", output.log);

        if let Some(error) = output.error.clone() {
            return Err(CpiError::Remote {
                method: method.to_string(),
                error,
                output: Box::new(output),
            });
        }

        Ok(output)
    }
}
