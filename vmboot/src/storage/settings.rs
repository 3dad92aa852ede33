//! Settings and user config files

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agentclient::AgentClientOptions;
use crate::deployment::VmDeployerOptions;
use crate::errors::{DeployError, ResultExt};
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::utils::CooldownOptions;

/// Bootstrapper settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs to daily files under the layout's logs dir
    #[serde(default)]
    pub log_to_file: bool,

    /// Storage base directory; the default layout is used when unset
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Upper bound for one CPI invocation
    #[serde(default = "default_cpi_timeout")]
    pub cpi_timeout_secs: u64,

    #[serde(default)]
    pub agent: AgentSettings,
}

fn default_cpi_timeout() -> u64 {
    600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            base_dir: None,
            cpi_timeout_secs: default_cpi_timeout(),
            agent: AgentSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent
    pub async fn load(file: &File) -> Result<Self, DeployError> {
        Ok(file
            .read_json_opt::<Settings>()
            .await
            .with_context(|| format!("Loading settings '{}'", file.path().display()))?
            .unwrap_or_default())
    }

    pub fn cpi_timeout(&self) -> Duration {
        Duration::from_secs(self.cpi_timeout_secs)
    }

    pub fn agent_client_options(&self) -> AgentClientOptions {
        AgentClientOptions {
            request_timeout: Duration::from_secs(self.agent.request_timeout_secs),
            task_poll_interval: Duration::from_millis(self.agent.task_poll_interval_ms),
            task_poll_attempts: self.agent.task_poll_attempts,
        }
    }

    pub fn deployer_options(&self) -> VmDeployerOptions {
        VmDeployerOptions {
            ping_attempts: self.agent.ping_attempts,
            ping_backoff: CooldownOptions {
                base_delay: Duration::from_millis(self.agent.ping_base_delay_ms),
                max_delay: Duration::from_secs(self.agent.ping_max_delay_secs),
                ..Default::default()
            },
            state_poll_attempts: self.agent.state_poll_attempts,
            state_poll_interval: Duration::from_millis(self.agent.state_poll_interval_ms),
        }
    }
}

/// Agent communication settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Pings sent while the VM boots
    #[serde(default = "default_ping_attempts")]
    pub ping_attempts: u32,

    #[serde(default = "default_ping_base_delay")]
    pub ping_base_delay_ms: u64,

    #[serde(default = "default_ping_max_delay")]
    pub ping_max_delay_secs: u64,

    #[serde(default = "default_task_poll_interval")]
    pub task_poll_interval_ms: u64,

    #[serde(default = "default_task_poll_attempts")]
    pub task_poll_attempts: u32,

    #[serde(default = "default_state_poll_attempts")]
    pub state_poll_attempts: u32,

    #[serde(default = "default_state_poll_interval")]
    pub state_poll_interval_ms: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_ping_attempts() -> u32 {
    30
}

fn default_ping_base_delay() -> u64 {
    500
}

fn default_ping_max_delay() -> u64 {
    30
}

fn default_task_poll_interval() -> u64 {
    500
}

fn default_task_poll_attempts() -> u32 {
    600
}

fn default_state_poll_attempts() -> u32 {
    60
}

fn default_state_poll_interval() -> u64 {
    1000
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            ping_attempts: default_ping_attempts(),
            ping_base_delay_ms: default_ping_base_delay(),
            ping_max_delay_secs: default_ping_max_delay(),
            task_poll_interval_ms: default_task_poll_interval(),
            task_poll_attempts: default_task_poll_attempts(),
            state_poll_attempts: default_state_poll_attempts(),
            state_poll_interval_ms: default_state_poll_interval(),
        }
    }
}

/// Per-user state remembered between invocations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub deployment_manifest_path: Option<PathBuf>,
}

impl UserConfig {
    pub async fn load(file: &File) -> Result<Self, DeployError> {
        Ok(file
            .read_json_opt::<UserConfig>()
            .await
            .with_context(|| format!("Loading user config '{}'", file.path().display()))?
            .unwrap_or_default())
    }

    pub async fn save(&self, file: &File) -> Result<(), DeployError> {
        file.write_json(self)
            .await
            .with_context(|| format!("Saving user config '{}'", file.path().display()))
    }
}
