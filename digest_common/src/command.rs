//! Structured commands parsed from inbound chat messages.
//!
//! Raw message text is turned into a `CommandKind` once, at the stream boundary,
//! so the dispatcher only ever sees tagged variants. A command is the first
//! whitespace-separated token of a message, starting with `/`, optionally
//! addressed to a bot (`/start@SomeBot`).
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Supported bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CommandKind {
    /// Subscribe the conversation to recurring digests.
    Start,
    /// Cancel the conversation's subscription.
    Stop,
    /// Deliver one digest to the conversation right now.
    Prices,
    /// Deliver one digest to the broadcast channel right now.
    Channel,
}

impl CommandKind {
    /// Extract a command from free text. Returns `None` for plain messages and
    /// unknown commands.
    pub fn parse_text(text: &str) -> Option<CommandKind> {
        let token = text.split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        CommandKind::from_str(name).ok()
    }
}

/// A command received from a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Conversation the command was sent in; replies go here.
    pub conversation_id: i64,
    /// Sender's display name (first name), `User` when unknown.
    pub sender_name: String,
    /// Parsed command.
    pub kind: CommandKind,
}

impl CommandEvent {
    /// Builds an event from the raw message fields, or `None` if the text is not a
    /// supported command.
    pub fn from_message(conversation_id: i64, sender_name: Option<&str>, text: &str) -> Option<Self> {
        let kind = CommandKind::parse_text(text)?;
        let sender_name = sender_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("User");
        Some(CommandEvent {
            conversation_id,
            sender_name: String::from(sender_name),
            kind,
        })
    }
}
