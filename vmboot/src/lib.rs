//! vmboot library
//!
//! Bootstraps a single VM by driving an external CPI executable and the
//! agent running inside the new VM.

pub mod agentclient;
pub mod app;
pub mod blobstore;
pub mod cloud;
pub mod cmd;
pub mod cpi;
pub mod deployment;
pub mod errors;
pub mod eventlog;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod registry;
pub mod release;
pub mod storage;
pub mod system;
pub mod templatescompiler;
pub mod ui;
pub mod utils;

