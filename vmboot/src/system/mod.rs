//! Process and archive primitives

pub mod cmd_runner;
pub mod compressor;

pub use cmd_runner::{CmdResult, CmdRunError, CmdRunner, Command, ExecCmdRunner};
pub use compressor::{Compressor, TarballCompressor};
