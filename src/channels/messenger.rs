use crate::channels::traits::{Channel, InboundEvent, InboundKind, SendMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Value of the webhook `object` field for Page subscriptions.
pub const PAGE_OBJECT: &str = "page";

/// Messenger Platform channel backed by the Graph Send API.
#[derive(Clone)]
pub struct MessengerChannel {
    client: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl MessengerChannel {
    pub fn new(client: reqwest::Client, api_url: &str, access_token: String) -> Self {
        Self {
            client,
            api_url: api_url.trim().trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/me/messages", self.api_url)
    }

    async fn post_messages(&self, body: &serde_json::Value, op: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.messages_url())
            .query(&[("access_token", self.access_token.as_str())])
            .json(body)
            .send()
            .await
            .with_context(|| format!("Messenger {op} request failed"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Messenger {op} failed ({status}): {}", body.trim());
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for MessengerChannel {
    fn name(&self) -> &str {
        "messenger"
    }

    async fn send(&self, message: &SendMessage) -> Result<()> {
        let recipient = message.recipient.trim();
        if recipient.is_empty() {
            anyhow::bail!("Messenger recipient id is required");
        }
        let body = serde_json::json!({
            "recipient": { "id": recipient },
            "message": message.payload.to_message_json(),
        });
        self.post_messages(&body, "send").await?;
        tracing::debug!(recipient, "Messenger message sent");
        Ok(())
    }

    async fn mark_seen(&self, recipient: &str) -> Result<()> {
        let body = serde_json::json!({
            "recipient": { "id": recipient },
            "sender_action": "mark_seen",
        });
        self.post_messages(&body, "mark_seen").await
    }

    async fn health_check(&self) -> bool {
        !self.access_token.is_empty()
    }
}

/// Top-level webhook body posted by the platform.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    pub sender: Option<Party>,
    pub message: Option<InboundMessage>,
}

#[derive(Debug, Deserialize)]
pub struct Party {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<InboundAttachment>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Deserialize)]
pub struct InboundAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    pub url: Option<String>,
}

impl WebhookPayload {
    pub fn is_page(&self) -> bool {
        self.object == PAGE_OBJECT
    }

    /// Flatten every messaging event of every entry into relay events.
    pub fn into_events(self) -> Vec<InboundEvent> {
        self.entry
            .into_iter()
            .flat_map(|entry| entry.messaging)
            .filter_map(MessagingEvent::into_inbound)
            .collect()
    }
}

impl MessagingEvent {
    fn into_inbound(self) -> Option<InboundEvent> {
        let sender = self.sender?.id;
        let message = self.message?;
        if message.is_echo {
            return None;
        }

        // Only the first attachment is considered, and only when it is an image.
        let image_url = message
            .attachments
            .into_iter()
            .next()
            .filter(|a| a.kind == "image")
            .and_then(|a| a.payload)
            .and_then(|p| p.url)
            .filter(|url| !url.trim().is_empty());

        let kind = match (image_url, message.text) {
            (Some(url), _) => InboundKind::Image { url },
            (None, Some(text)) if !text.is_empty() => InboundKind::Text(text),
            _ => {
                tracing::debug!(sender = %sender, "ignoring Messenger event without text or image");
                return None;
            }
        };

        Some(InboundEvent { sender, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::traits::Payload;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn parse(json: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn text_event_is_extracted() {
        let payload = parse(serde_json::json!({
            "object": "page",
            "entry": [{ "messaging": [{
                "sender": { "id": "psid-1" },
                "message": { "mid": "m1", "text": "hello" }
            }]}]
        }));
        assert!(payload.is_page());
        assert_eq!(
            payload.into_events(),
            vec![InboundEvent {
                sender: "psid-1".into(),
                kind: InboundKind::Text("hello".into()),
            }]
        );
    }

    #[test]
    fn image_attachment_wins_over_text() {
        let payload = parse(serde_json::json!({
            "object": "page",
            "entry": [{ "messaging": [{
                "sender": { "id": "psid-2" },
                "message": {
                    "text": "look",
                    "attachments": [{ "type": "image", "payload": { "url": "https://cdn.example/p.jpg" } }]
                }
            }]}]
        }));
        assert_eq!(
            payload.into_events()[0].kind,
            InboundKind::Image {
                url: "https://cdn.example/p.jpg".into()
            }
        );
    }

    #[test]
    fn non_image_first_attachment_falls_back_to_text() {
        let payload = parse(serde_json::json!({
            "object": "page",
            "entry": [{ "messaging": [
                {
                    "sender": { "id": "a" },
                    "message": {
                        "attachments": [
                            { "type": "audio", "payload": { "url": "https://cdn.example/a.mp4" } },
                            { "type": "image", "payload": { "url": "https://cdn.example/p.jpg" } }
                        ]
                    }
                },
                {
                    "sender": { "id": "b" },
                    "message": {
                        "text": "caption",
                        "attachments": [{ "type": "file", "payload": { "url": "https://cdn.example/f.pdf" } }]
                    }
                }
            ]}]
        }));
        let events = payload.into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sender, "b");
        assert_eq!(events[0].kind, InboundKind::Text("caption".into()));
    }

    #[test]
    fn every_messaging_event_in_an_entry_is_kept() {
        let payload = parse(serde_json::json!({
            "object": "page",
            "entry": [
                { "messaging": [
                    { "sender": { "id": "a" }, "message": { "text": "one" } },
                    { "sender": { "id": "b" }, "message": { "text": "two" } }
                ]},
                { "messaging": [
                    { "sender": { "id": "c" }, "message": { "text": "three" } }
                ]}
            ]
        }));
        let senders: Vec<String> = payload.into_events().into_iter().map(|e| e.sender).collect();
        assert_eq!(senders, vec!["a", "b", "c"]);
    }

    #[test]
    fn receipts_echoes_and_missing_senders_are_skipped() {
        let payload = parse(serde_json::json!({
            "object": "page",
            "entry": [{ "messaging": [
                { "sender": { "id": "a" }, "delivery": { "mids": ["m1"] } },
                { "sender": { "id": "page" }, "message": { "text": "echo", "is_echo": true } },
                { "message": { "text": "orphan" } },
                { "sender": { "id": "b" }, "message": { "text": "" } }
            ]}]
        }));
        assert!(payload.into_events().is_empty());
    }

    #[test]
    fn non_page_object_is_detected() {
        let payload = parse(serde_json::json!({ "object": "instagram", "entry": [] }));
        assert!(!payload.is_page());
    }

    #[tokio::test]
    async fn send_posts_text_to_graph_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .and(query_param("access_token", "page-token"))
            .and(body_json(serde_json::json!({
                "recipient": { "id": "psid-9" },
                "message": { "text": "hi there" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "recipient_id": "psid-9",
                "message_id": "mid.1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = MessengerChannel::new(reqwest::Client::new(), &server.uri(), "page-token".into());
        channel
            .send(&SendMessage::new(Payload::text("hi there"), "psid-9"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mark_seen_posts_sender_action() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .and(body_json(serde_json::json!({
                "recipient": { "id": "psid-9" },
                "sender_action": "mark_seen",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let channel = MessengerChannel::new(reqwest::Client::new(), &server.uri(), "t".into());
        channel.mark_seen("psid-9").await.unwrap();
    }

    #[tokio::test]
    async fn send_surfaces_graph_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"error\":\"bad token\"}"))
            .mount(&server)
            .await;

        let channel = MessengerChannel::new(reqwest::Client::new(), &server.uri(), "t".into());
        let err = channel
            .send(&SendMessage::new(Payload::text("x"), "psid"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn send_rejects_blank_recipient() {
        let channel = MessengerChannel::new(reqwest::Client::new(), "http://127.0.0.1:9", "t".into());
        assert!(channel
            .send(&SendMessage::new(Payload::text("x"), "  "))
            .await
            .is_err());
    }
}
