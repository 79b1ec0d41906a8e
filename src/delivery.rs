//! Ordered, paced outbound delivery.
//!
//! Replies are queued as jobs on one unbounded channel. A router task keeps a
//! lane per recipient: jobs for the same recipient go out strictly in enqueue
//! order, while different recipients are served concurrently. Payloads of one
//! job are separated by a fixed pause; a one-payload job goes out immediately.
//! A failed send is logged and the rest of the job continues.

use crate::channels::{Channel, Payload, SendMessage};
use crate::chunker;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Pause between consecutive segments of the same reply.
pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 1_000;

#[derive(Debug)]
struct DeliveryJob {
    recipient: String,
    payloads: Vec<Payload>,
}

/// Cheap, cloneable handle for queueing outbound messages.
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<DeliveryJob>,
    max_message_chars: usize,
}

pub struct DeliveryWorkerHandle {
    join: tokio::task::JoinHandle<()>,
}

impl DeliveryWorkerHandle {
    /// Wait until every queue handle is dropped and the backlog is sent.
    pub async fn finished(self) {
        if let Err(err) = self.join.await {
            tracing::warn!("delivery worker ended abnormally: {err}");
        }
    }

    /// Like [`finished`](Self::finished), but abort whatever is still queued
    /// once `grace` elapses.
    pub async fn drain(self, grace: Duration) {
        let abort = self.join.abort_handle();
        if tokio::time::timeout(grace, self.finished()).await.is_err() {
            tracing::warn!(
                "delivery backlog not drained after {}s; aborting",
                grace.as_secs()
            );
            abort.abort();
        }
    }
}

impl DeliveryQueue {
    pub fn spawn(
        channel: Arc<dyn Channel>,
        interval: Duration,
        max_message_chars: usize,
    ) -> (Self, DeliveryWorkerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(run_worker(channel, interval, rx));
        (
            Self {
                tx,
                max_message_chars: max_message_chars.max(1),
            },
            DeliveryWorkerHandle { join },
        )
    }

    /// Queue a text reply, chunking it when it exceeds the message limit.
    pub fn send_text(&self, recipient: &str, text: &str) {
        self.deliver(recipient, chunker::chunk(text, self.max_message_chars));
    }

    /// Queue already-split segments as one ordered job.
    pub fn deliver(&self, recipient: &str, segments: Vec<String>) {
        let payloads: Vec<Payload> = segments
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .map(Payload::Text)
            .collect();
        if payloads.is_empty() {
            tracing::debug!(recipient, "skipping empty reply");
            return;
        }
        self.enqueue(recipient, payloads);
    }

    pub fn send_payload(&self, recipient: &str, payload: Payload) {
        self.enqueue(recipient, vec![payload]);
    }

    fn enqueue(&self, recipient: &str, payloads: Vec<Payload>) {
        let job = DeliveryJob {
            recipient: recipient.to_string(),
            payloads,
        };
        if self.tx.send(job).is_err() {
            tracing::warn!(recipient, "delivery worker is gone; dropping reply");
        }
    }
}

async fn run_worker(
    channel: Arc<dyn Channel>,
    interval: Duration,
    mut rx: mpsc::UnboundedReceiver<DeliveryJob>,
) {
    // A key is present while its recipient has a job in flight; the value
    // holds that recipient's jobs still waiting their turn.
    let mut lanes: HashMap<String, VecDeque<Vec<Payload>>> = HashMap::new();
    let mut running: JoinSet<String> = JoinSet::new();
    let mut accepting = true;

    loop {
        tokio::select! {
            job = rx.recv(), if accepting => match job {
                Some(DeliveryJob { recipient, payloads }) => match lanes.entry(recipient) {
                    Entry::Occupied(mut lane) => lane.get_mut().push_back(payloads),
                    Entry::Vacant(lane) => {
                        running.spawn(send_job(
                            Arc::clone(&channel),
                            interval,
                            lane.key().clone(),
                            payloads,
                        ));
                        lane.insert(VecDeque::new());
                    }
                },
                None => accepting = false,
            },
            Some(done) = running.join_next(), if !running.is_empty() => match done {
                Ok(recipient) => {
                    if let Entry::Occupied(mut lane) = lanes.entry(recipient) {
                        match lane.get_mut().pop_front() {
                            Some(payloads) => {
                                running.spawn(send_job(
                                    Arc::clone(&channel),
                                    interval,
                                    lane.key().clone(),
                                    payloads,
                                ));
                            }
                            None => {
                                lane.remove();
                            }
                        }
                    }
                }
                Err(err) => tracing::warn!("delivery task ended abnormally: {err}"),
            },
            else => break,
        }
    }
    tracing::debug!("delivery worker stopped");
}

/// Send one job's payloads in order, pausing between them. Returns the
/// recipient so the router can start that recipient's next job.
async fn send_job(
    channel: Arc<dyn Channel>,
    interval: Duration,
    recipient: String,
    payloads: Vec<Payload>,
) -> String {
    let total = payloads.len();
    for (index, payload) in payloads.into_iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(interval).await;
        }
        let message = SendMessage::new(payload, recipient.as_str());
        if let Err(err) = channel.send(&message).await {
            tracing::warn!(
                recipient = %recipient,
                segment = index + 1,
                total,
                "{} delivery failed: {err:#}",
                channel.name()
            );
        }
    }
    recipient
}
