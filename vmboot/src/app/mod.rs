//! Application wiring

pub mod options;
pub mod run;

pub use options::AppOptions;
pub use run::{build_deploy_cmd, deploy, Collaborators};
