//! Finite state machine tracking a deploy run

use serde::{Deserialize, Serialize};

/// Deploy run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployState {
    /// Not started
    Pending,

    Validating,

    InstallingCpi,

    ExtractingStemcell,

    /// Consulting the deployment record
    CheckingDeployment,

    Deploying,

    /// Updating the record and cleaning up
    Finalizing,

    /// VM deployed and record updated
    Deployed,

    /// Nothing changed since the last deploy
    Skipped,

    Failed,
}

impl DeployState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeployState::Deployed | DeployState::Skipped | DeployState::Failed
        )
    }
}

/// Deploy run event
#[derive(Debug, Clone)]
pub enum DeployEvent {
    Start,

    Validated,

    CpiInstalled,

    StemcellExtracted,

    /// Deployment inputs differ from the last deploy
    DeploymentChanged,

    DeploymentUnchanged,

    VmDeployed,

    Finalized,

    /// A stage failed
    Fail(String),

    /// Return a finished run to pending
    Reset,
}

/// Deploy FSM
#[derive(Debug, Clone)]
pub struct DeployFsm {
    state: DeployState,
    error: Option<String>,
}

impl DeployFsm {
    pub fn new() -> Self {
        Self {
            state: DeployState::Pending,
            error: None,
        }
    }

    pub fn state(&self) -> DeployState {
        self.state
    }

    /// Message of the failure that moved the run to `Failed`
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeployEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (DeployState::Pending, DeployEvent::Start) => {
                self.error = None;
                DeployState::Validating
            }
            (DeployState::Validating, DeployEvent::Validated) => DeployState::InstallingCpi,
            (DeployState::InstallingCpi, DeployEvent::CpiInstalled) => {
                DeployState::ExtractingStemcell
            }
            (DeployState::ExtractingStemcell, DeployEvent::StemcellExtracted) => {
                DeployState::CheckingDeployment
            }
            (DeployState::CheckingDeployment, DeployEvent::DeploymentChanged) => {
                DeployState::Deploying
            }
            (DeployState::CheckingDeployment, DeployEvent::DeploymentUnchanged) => {
                DeployState::Skipped
            }
            (DeployState::Deploying, DeployEvent::VmDeployed) => DeployState::Finalizing,
            (DeployState::Finalizing, DeployEvent::Finalized) => DeployState::Deployed,

            // Any running stage may fail
            (state, DeployEvent::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                DeployState::Failed
            }

            (state, DeployEvent::Reset) if state.is_terminal() => {
                self.error = None;
                DeployState::Pending
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("{:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for DeployFsm {
    fn default() -> Self {
        Self::new()
    }
}
