//! Channel trait and the event types exchanged with the dispatcher.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::conversation::UiHint;
use crate::error::ChannelError;

/// What the user sent: a `/command` or plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// Command name without the leading slash, e.g. `start`.
    Command(String),
    Text(String),
}

/// A message received from a channel, tagged with the sender's id.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Name of the channel that received the message.
    pub channel: String,
    pub user_id: i64,
    pub kind: InboundKind,
    /// Channel-specific routing data (e.g. Telegram `chat_id`).
    pub metadata: serde_json::Value,
}

impl InboundEvent {
    pub fn new(channel: &str, user_id: i64, kind: InboundKind) -> Self {
        Self {
            channel: channel.to_string(),
            user_id,
            kind,
            metadata: serde_json::Value::Null,
        }
    }

    /// Build an event from raw message text, detecting `/commands`.
    pub fn from_text(channel: &str, user_id: i64, text: &str) -> Self {
        Self::new(channel, user_id, parse_inbound(text))
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A reply for the channel to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    pub reply: String,
    pub ui_hint: UiHint,
}

impl OutboundEvent {
    pub fn new(reply: impl Into<String>, ui_hint: UiHint) -> Self {
        Self {
            reply: reply.into(),
            ui_hint,
        }
    }

    pub fn text(reply: impl Into<String>) -> Self {
        Self::new(reply, UiHint::None)
    }
}

/// Stream of inbound events produced by [`Channel::start`].
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// A messaging gateway the dispatcher reads from and replies through.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver a reply to the sender of `msg`, applying the UI hint.
    async fn respond(&self, msg: &InboundEvent, response: OutboundEvent)
    -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}

/// Classify message text. `/name@botname args` becomes `Command("name")`.
pub fn parse_inbound(text: &str) -> InboundKind {
    if let Some(rest) = text.strip_prefix('/') {
        let word = rest.split_whitespace().next().unwrap_or_default();
        let name = word.split('@').next().unwrap_or_default();
        if !name.is_empty() {
            return InboundKind::Command(name.to_string());
        }
    }
    InboundKind::Text(text.to_string())
}
