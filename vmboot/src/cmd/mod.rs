//! Commands

pub mod deploy;
pub mod fsm;

pub use deploy::{DeployCmd, DeployCmdDeps, SKIP_DEPLOY_MESSAGE};
pub use fsm::{DeployEvent, DeployFsm, DeployState};
