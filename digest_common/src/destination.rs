//! Delivery targets of digests and notices.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Addressable messaging target.
///
/// Serialized untagged so it can be used directly as a `chat_id` value: private
/// conversations are numeric ids, public channels are `@username` strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    /// An individual conversation.
    Chat(i64),
    /// A broadcast channel addressed by its public username.
    Channel(String),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Chat(id) => write!(f, "{}", id),
            Destination::Channel(name) => write!(f, "{}", name),
        }
    }
}

/// Parses a configured destination: numeric ids become `Chat`, anything else
/// must be an `@channel` username.
impl FromStr for Destination {
    type Err = AgentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Ok(Destination::Chat(id));
        }
        match trimmed.strip_prefix('@') {
            Some(name) if !name.is_empty() && !name.contains(char::is_whitespace) => {
                Ok(Destination::Channel(trimmed.to_string()))
            }
            _ => Err(AgentError::Format(format!(
                "destination must be a numeric id or an @channel name, got {:?}",
                raw
            ))),
        }
    }
}
