//! Subprocess execution

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A command to execute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub name: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Start from an empty environment instead of inheriting ours
    pub use_isolated_env: bool,
    pub stdin: Option<Vec<u8>>,
    pub working_dir: Option<PathBuf>,
}

/// Captured process output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdResult {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, or -1 when the process was killed by a signal
    pub exit_code: i32,
}

#[derive(Error, Debug)]
pub enum CmdRunError {
    #[error("Starting command '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error("Waiting for command '{name}': {source}")]
    Wait {
        name: String,
        source: std::io::Error,
    },

    #[error("Command '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Command '{name}' was cancelled")]
    Cancelled { name: String },
}

/// Runs commands to completion, capturing their output
#[async_trait]
pub trait CmdRunner: Send + Sync {
    async fn run_complex_command(&self, cmd: &Command) -> Result<CmdResult, CmdRunError>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct ExecCmdRunner {
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl ExecCmdRunner {
    pub fn new(timeout: Option<Duration>, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }
}

#[async_trait]
impl CmdRunner for ExecCmdRunner {
    async fn run_complex_command(&self, cmd: &Command) -> Result<CmdResult, CmdRunError> {
        let name = cmd.name.display().to_string();

        let mut process = tokio::process::Command::new(&cmd.name);
        process
            .args(&cmd.args)
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if cmd.use_isolated_env {
            process.env_clear();
        }
        process.envs(&cmd.env);

        if let Some(dir) = &cmd.working_dir {
            process.current_dir(dir);
        }

        debug!("Running command: {} {:?}", name, cmd.args);

        let mut child = process.spawn().map_err(|source| CmdRunError::Spawn {
            name: name.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let input = cmd.stdin.clone();
        let feed_stdin = async move {
            if let (Some(mut stdin), Some(input)) = (stdin, input) {
                // The child may exit without reading its input.
                if let Err(e) = stdin.write_all(&input).await {
                    debug!("Writing command stdin: {}", e);
                }
            }
        };

        let run = async {
            let (_, output) = tokio::join!(feed_stdin, child.wait_with_output());
            output
        };

        let output = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(CmdRunError::Cancelled { name });
            }
            output = with_timeout(self.timeout, run) => match output {
                Some(output) => output.map_err(|source| CmdRunError::Wait {
                    name: name.clone(),
                    source,
                })?,
                None => {
                    return Err(CmdRunError::Timeout {
                        name,
                        timeout: self.timeout.unwrap_or_default(),
                    });
                }
            },
        };

        Ok(CmdResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Await `fut`, giving up after `timeout` when one is set
async fn with_timeout<F: std::future::Future>(
    timeout: Option<Duration>,
    fut: F,
) -> Option<F::Output> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fut).await.ok(),
        None => Some(fut.await),
    }
}
