//! Registry lifecycle

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::errors::DeployError;

pub mod server;

pub use server::{HttpRegistryServer, HttpRegistryServerManager};

#[async_trait]
pub trait ServerManager: Send + Sync {
    async fn start(
        &self,
        username: &str,
        password: &str,
        host: &str,
        port: u16,
    ) -> Result<Box<dyn Server>, DeployError>;
}

#[async_trait]
pub trait Server: Send {
    fn local_addr(&self) -> SocketAddr;

    /// Shut the server down and wait for it to exit
    async fn stop(self: Box<Self>) -> Result<(), DeployError>;
}
