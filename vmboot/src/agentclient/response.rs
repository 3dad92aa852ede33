//! Agent response decoding

use agent_protocol::{AgentException, SimpleResponse, StateResponse, TaskResponse};

/// A method-specific response body
///
/// Callers hand a pre-constructed response to the request, which decodes the
/// body into it and then checks its exception.
pub trait Response: Send {
    fn unmarshal(&mut self, body: &[u8]) -> Result<(), serde_json::Error>;

    fn exception(&self) -> AgentException;
}

macro_rules! impl_response {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Response for $ty {
                fn unmarshal(&mut self, body: &[u8]) -> Result<(), serde_json::Error> {
                    *self = serde_json::from_slice(body)?;
                    Ok(())
                }

                fn exception(&self) -> AgentException {
                    self.exception.clone().unwrap_or_default()
                }
            }
        )*
    };
}

impl_response!(SimpleResponse, TaskResponse, StateResponse);
