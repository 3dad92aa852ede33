//! CPI wire protocol
//!
//! Request and response documents exchanged with an external CPI executable
//! over stdin/stdout.

pub mod models;

pub use models::{CmdContext, CmdError, CmdInput, CmdOutput};
