//! Small helpers around `ureq` shared by the ranking providers and the messaging API.
use digest_common::{AgentError, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Build a blocking HTTP agent whose whole request is bounded by `timeout`.
pub fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

/// Convert a `ureq` failure into the workspace error type.
///
/// Non-success statuses keep their body so callers can inspect API error payloads.
pub fn map_error(error: ureq::Error) -> AgentError {
    match error {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            AgentError::Status(status, body)
        }
        ureq::Error::Transport(transport) => AgentError::Transport(transport.to_string()),
    }
}

/// Perform `request` and decode a JSON body.
pub fn get_json<T: DeserializeOwned>(request: ureq::Request) -> Result<T> {
    let response = request.call().map_err(map_error)?;
    let body = response.into_string()?;
    Ok(serde_json::from_str(&body)?)
}
