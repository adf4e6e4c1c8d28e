//! Outbound message delivery.
//!
//! `Messenger` is the raw send capability of the messaging platform. The
//! `DeliveryChannel` wraps it with the delivery policy: a failed digest send is
//! followed by exactly one short fallback notice to the original requester, and a
//! failing fallback is logged and swallowed. Nothing here is fatal to the process.

use digest_common::{AgentError, Destination, Result};
use log::{error, info};
use std::sync::Arc;

/// Notice sent to the requester when a digest could not be delivered.
pub const FALLBACK_MESSAGE: &str = "❌ Error updating crypto prices. Will retry soon.";

/// Rendering flags passed with every send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Interpret `**bold**` and friends as Markdown.
    pub markdown: bool,
    /// Suppress link previews.
    pub disable_link_preview: bool,
}

impl SendOptions {
    /// Plain text.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Markdown text with link previews.
    pub fn markdown() -> Self {
        Self {
            markdown: true,
            disable_link_preview: false,
        }
    }

    /// Options used for digests.
    pub fn digest() -> Self {
        Self {
            markdown: true,
            disable_link_preview: true,
        }
    }
}

/// Raw outbound send of the messaging platform.
pub trait Messenger: Send + Sync {
    /// Send `text` to `destination`.
    fn send_message(&self, destination: &Destination, text: &str, options: SendOptions) -> Result<()>;
}

/// Outbound sends with the fallback policy applied.
#[derive(Clone)]
pub struct DeliveryChannel {
    messenger: Arc<dyn Messenger>,
}

impl DeliveryChannel {
    /// Wrap `messenger`.
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// Deliver a digest to `destination`.
    ///
    /// On failure, `requester` (when known) receives `FALLBACK_MESSAGE`; the
    /// original failure is returned as `AgentError::Delivery` either way.
    pub fn deliver(&self, destination: &Destination, text: &str, requester: Option<&Destination>) -> Result<()> {
        match self.messenger.send_message(destination, text, SendOptions::digest()) {
            Ok(()) => {
                info!("Digest delivered to {}", destination);
                Ok(())
            }
            Err(e) => {
                error!("Error sending digest to {}: {}", destination, e);
                if let Some(requester) = requester {
                    if let Err(fallback_err) =
                        self.messenger
                            .send_message(requester, FALLBACK_MESSAGE, SendOptions::plain())
                    {
                        error!("Failed to send error message to {}: {}", requester, fallback_err);
                    }
                }
                Err(AgentError::Delivery {
                    destination: destination.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Send a notice (welcome, acknowledgement, failure reply) without fallback.
    pub fn notify(&self, destination: &Destination, text: &str, options: SendOptions) -> Result<()> {
        self.messenger.send_message(destination, text, options)
    }
}
