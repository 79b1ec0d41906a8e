//! In-memory channel used by unit tests across the crate.

use super::traits::{Channel, Payload, SendMessage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(tokio::time::Instant, SendMessage)>>,
    seen: Mutex<Vec<String>>,
    attempts: Mutex<usize>,
    fail_on_text: Option<String>,
    mark_seen_delay: Option<Duration>,
}

impl RecordingChannel {
    /// A channel whose send fails for text payloads equal to `text`.
    pub fn failing_on(text: &str) -> Self {
        Self {
            fail_on_text: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// A channel whose `mark_seen` takes `delay` to complete.
    pub fn with_slow_mark_seen(delay: Duration) -> Self {
        Self {
            mark_seen_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sent_with_times(&self) -> Vec<(tokio::time::Instant, SendMessage)> {
        self.sent.lock().clone()
    }

    pub fn payloads_for(&self, recipient: &str) -> Vec<Payload> {
        self.sent
            .lock()
            .iter()
            .filter(|(_, m)| m.recipient == recipient)
            .map(|(_, m)| m.payload.clone())
            .collect()
    }

    pub fn texts_for(&self, recipient: &str) -> Vec<String> {
        self.payloads_for(recipient)
            .into_iter()
            .filter_map(|p| match p {
                Payload::Text(text) => Some(text),
                Payload::Attachment { .. } => None,
            })
            .collect()
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, message: &SendMessage) -> anyhow::Result<()> {
        *self.attempts.lock() += 1;
        if let (Some(fail), Payload::Text(text)) = (&self.fail_on_text, &message.payload) {
            if fail == text {
                anyhow::bail!("simulated send failure");
            }
        }
        self.sent
            .lock()
            .push((tokio::time::Instant::now(), message.clone()));
        Ok(())
    }

    async fn mark_seen(&self, recipient: &str) -> anyhow::Result<()> {
        if let Some(delay) = self.mark_seen_delay {
            tokio::time::sleep(delay).await;
        }
        self.seen.lock().push(recipient.to_string());
        Ok(())
    }
}
