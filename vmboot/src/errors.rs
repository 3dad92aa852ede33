//! Error types for the bootstrapper

use thiserror::Error;

use crate::agentclient::AgentClientError;
use crate::cloud::CpiError;

/// Main error type for the bootstrapper
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error(transparent)]
    Cpi(#[from] CpiError),

    #[error(transparent)]
    Agent(#[from] AgentClientError),

    /// Operator-facing validation failure; the message is shown verbatim.
    #[error("{0}")]
    ValidationError(String),

    #[error("Rendering templates: {0}")]
    RenderError(String),

    #[error("Compressing: {0}")]
    CompressError(String),

    #[error("Blobstore error: {0}")]
    BlobstoreError(String),

    #[error("Templates repo error: {0}")]
    TemplatesRepoError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Release error: {0}")]
    ReleaseError(String),

    #[error("Invalid transition: {0}")]
    TransitionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        source: Box<DeployError>,
    },
}

impl DeployError {
    /// Wrap this error with an outer context message
    pub fn wrap(self, context: impl Into<String>) -> Self {
        DeployError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping context layers
    pub fn root(&self) -> &DeployError {
        match self {
            DeployError::Wrapped { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<tokio::task::JoinError> for DeployError {
    fn from(err: tokio::task::JoinError) -> Self {
        DeployError::Internal(err.to_string())
    }
}

/// Context accumulation for fallible results
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, DeployError>;

    fn with_context<C, F>(self, f: F) -> Result<T, DeployError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<DeployError>,
{
    fn context(self, context: impl Into<String>) -> Result<T, DeployError> {
        self.map_err(|e| e.into().wrap(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, DeployError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().wrap(f()))
    }
}
