//! Minimal Telegram Bot API client.
//!
//! Only the three methods the agent needs: `getMe` (token check at startup),
//! `sendMessage` (the `Messenger` implementation) and `getUpdates` (long polling,
//! consumed by the update poller). Every call goes through one envelope decoder
//! so `ok: false` answers surface as `AgentError::Api { code, description }`,
//! e.g. `409 Conflict: terminated by other getUpdates request`.

use crate::delivery::{Messenger, SendOptions};
use crate::http;
use digest_common::net::{LONG_POLL_SECS, TELEGRAM_API_URL};
use digest_common::{AgentError, CommandEvent, Destination, Result};
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

/// Timeout of regular (non long-poll) calls.
const CALL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

/// Account behind the bot token.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    /// Numeric bot id.
    pub id: i64,
    /// Bot username, without `@`.
    #[serde(default)]
    pub username: Option<String>,
}

/// One inbound update.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update id; the next poll starts at `update_id + 1`.
    pub update_id: i64,
    /// New message, if this update carries one.
    #[serde(default)]
    pub message: Option<Message>,
}

/// Chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Conversation the message was posted in.
    pub chat: Chat,
    /// Sender, absent for channel posts.
    #[serde(default)]
    pub from: Option<User>,
    /// Text body, absent for media messages.
    #[serde(default)]
    pub text: Option<String>,
}

/// Conversation reference.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Conversation id.
    pub id: i64,
}

/// Message sender.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Display name.
    #[serde(default)]
    pub first_name: Option<String>,
}

impl Update {
    /// The command carried by this update, if any.
    pub fn command_event(&self) -> Option<CommandEvent> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?;
        let sender = message.from.as_ref().and_then(|u| u.first_name.as_deref());
        CommandEvent::from_message(message.chat.id, sender, text)
    }
}

/// Blocking Bot API client.
pub struct TelegramApi {
    agent: ureq::Agent,
    base_url: String,
}

impl TelegramApi {
    /// Client for `token` against the public API.
    pub fn new(token: &str) -> Self {
        Self::with_base_url(TELEGRAM_API_URL, token)
    }

    /// Client for `token` against `base_url` (self-hosted Bot API servers, tests).
    pub fn with_base_url(base_url: &str, token: &str) -> Self {
        Self {
            agent: http::agent(Duration::from_secs(LONG_POLL_SECS) + CALL_TIMEOUT),
            base_url: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
        }
    }

    fn call<T: DeserializeOwned>(&self, method: &str, body: Value, timeout: Duration) -> Result<T> {
        debug!("Telegram call {}", method);
        let response = self
            .agent
            .post(&format!("{}/{}", self.base_url, method))
            .timeout(timeout)
            .send_json(body);

        let (status, text) = match response {
            Ok(response) => (response.status(), response.into_string()?),
            Err(e) => match http::map_error(e) {
                AgentError::Status(status, text) => (status, text),
                other => return Err(other),
            },
        };
        decode_envelope(status, &text)
    }

    /// Verify the token and return the bot account.
    pub fn get_me(&self) -> Result<BotUser> {
        self.call("getMe", json!({}), CALL_TIMEOUT)
    }

    /// Long-poll for updates starting at `offset`.
    pub fn get_updates(&self, offset: i64, long_poll_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({ "offset": offset, "timeout": long_poll_secs, "allowed_updates": ["message"] }),
            Duration::from_secs(long_poll_secs) + CALL_TIMEOUT,
        )
    }
}

impl Messenger for TelegramApi {
    fn send_message(&self, destination: &Destination, text: &str, options: SendOptions) -> Result<()> {
        let mut body = json!({
            "chat_id": destination,
            "text": text,
            "disable_web_page_preview": options.disable_link_preview,
        });
        if options.markdown {
            body["parse_mode"] = json!("Markdown");
        }
        let _: Value = self.call("sendMessage", body, CALL_TIMEOUT)?;
        Ok(())
    }
}

fn decode_envelope<T: DeserializeOwned>(status: u16, text: &str) -> Result<T> {
    let envelope: Envelope<T> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&status) => {
            return Err(AgentError::Status(status, text.to_string()));
        }
        Err(e) => return Err(AgentError::SerdeJson(e)),
    };

    match (envelope.ok, envelope.result) {
        (true, Some(result)) => Ok(result),
        _ => Err(AgentError::Api {
            code: envelope.error_code.unwrap_or(status),
            description: envelope
                .description
                .unwrap_or_else(|| String::from("request rejected")),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{http_response, serve_once};
    use digest_common::CommandKind;

    #[test]
    fn conflict_answer_becomes_api_error() {
        let body = r#"{"ok":false,"error_code":409,"description":"Conflict: terminated by other getUpdates request"}"#;
        let err = decode_envelope::<Vec<Update>>(409, body).unwrap_err();
        assert!(matches!(err, AgentError::Api { code: 409, .. }));
        assert!(err.to_string().contains("409 Conflict"));
    }

    #[test]
    fn non_json_error_keeps_status() {
        let err = decode_envelope::<BotUser>(502, "Bad Gateway").unwrap_err();
        assert!(matches!(err, AgentError::Status(502, _)));
    }

    #[test]
    fn updates_map_to_command_events() {
        let body = r#"{"ok":true,"result":[
            {"update_id":10,"message":{"chat":{"id":42},"from":{"first_name":"Ada"},"text":"/start"}},
            {"update_id":11,"message":{"chat":{"id":42},"text":"just chatting"}},
            {"update_id":12}
        ]}"#;
        let updates: Vec<Update> = decode_envelope(200, body).unwrap();
        assert_eq!(updates.len(), 3);

        let event = updates[0].command_event().unwrap();
        assert_eq!(event.conversation_id, 42);
        assert_eq!(event.sender_name, "Ada");
        assert_eq!(event.kind, CommandKind::Start);
        assert!(updates[1].command_event().is_none());
        assert!(updates[2].command_event().is_none());
    }

    #[test]
    fn get_me_over_http() {
        let url = serve_once(http_response(
            "200 OK",
            r#"{"ok":true,"result":{"id":7,"is_bot":true,"username":"digest_bot"}}"#,
        ));
        let api = TelegramApi::with_base_url(&url, "TOKEN");
        let me = api.get_me().unwrap();
        assert_eq!(me.id, 7);
        assert_eq!(me.username.as_deref(), Some("digest_bot"));
    }

    #[test]
    fn rejected_send_is_an_error() {
        let url = serve_once(http_response(
            "403 Forbidden",
            r#"{"ok":false,"error_code":403,"description":"Forbidden: bot is not a member of the channel chat"}"#,
        ));
        let api = TelegramApi::with_base_url(&url, "TOKEN");
        let err = api
            .send_message(&Destination::Channel("@news".into()), "hi", SendOptions::digest())
            .unwrap_err();
        assert!(matches!(err, AgentError::Api { code: 403, .. }));
    }
}
