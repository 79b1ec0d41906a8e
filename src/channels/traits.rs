use async_trait::async_trait;
use serde::Serialize;

/// Media kinds the Send API accepts as URL attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
}

/// Body of one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Attachment { kind: AttachmentKind, url: String },
}

impl Payload {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::Attachment {
            kind: AttachmentKind::Image,
            url: url.into(),
        }
    }

    pub fn audio(url: impl Into<String>) -> Self {
        Self::Attachment {
            kind: AttachmentKind::Audio,
            url: url.into(),
        }
    }

    /// Graph Send API `message` object for this payload.
    pub fn to_message_json(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::json!({ "text": text }),
            Self::Attachment { kind, url } => serde_json::json!({
                "attachment": {
                    "type": kind,
                    "payload": { "url": url, "is_reusable": true },
                }
            }),
        }
    }
}

/// A message to send through a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub recipient: String,
    pub payload: Payload,
}

impl SendMessage {
    pub fn new(payload: Payload, recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            payload,
        }
    }
}

/// What an inbound messaging event carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    Image { url: String },
    Text(String),
}

/// One inbound messaging event, already reduced to what the relay acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: String,
    pub kind: InboundKind,
}

/// Outbound side of a messaging platform.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &SendMessage) -> anyhow::Result<()>;

    /// Show the sender that their message was read.
    async fn mark_seen(&self, _recipient: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
