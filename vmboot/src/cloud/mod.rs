//! CPI subprocess protocol and the cloud operations built on it

#[allow(clippy::module_inception)]
pub mod cloud;
pub mod cmd_runner;

pub use cloud::{Cloud, CpiCloud};
pub use cmd_runner::{CpiCmdRunner, CpiError, CpiJob, ExternalCpiCmdRunner, CPI_PATH};
