//! Per-sender memory of the most recently received image.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Fallback number of senders tracked when the configured capacity is zero.
pub const SESSION_CAPACITY_DEFAULT: usize = 10_000;

/// Last-image lookup shared by all inbound events.
pub trait SessionStore: Send + Sync {
    /// Last image URL received from `sender`, if any. Reading does not remove it.
    fn get(&self, sender: &str) -> Option<String>;

    /// Remember `image_url` as the latest image from `sender`, replacing any previous one.
    fn set(&self, sender: &str, image_url: &str);
}

#[derive(Debug)]
struct SessionEntry {
    image_url: String,
    stored_at: Instant,
    last_used: Instant,
}

/// Bounded store: least-recently-used sender is evicted at capacity, and
/// entries older than the optional TTL are treated as absent.
#[derive(Debug)]
pub struct LruSessionStore {
    capacity: usize,
    ttl: Option<Duration>,
    entries: Mutex<HashMap<String, SessionEntry>>,
}

impl LruSessionStore {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            capacity: if capacity == 0 {
                SESSION_CAPACITY_DEFAULT
            } else {
                capacity
            },
            ttl: ttl.filter(|d| !d.is_zero()),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(entry.stored_at) >= ttl)
    }
}

impl SessionStore for LruSessionStore {
    fn get(&self, sender: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let expired = match entries.get_mut(sender) {
            None => return None,
            Some(entry) if self.is_expired(entry, now) => true,
            Some(entry) => {
                entry.last_used = now;
                return Some(entry.image_url.clone());
            }
        };
        if expired {
            entries.remove(sender);
        }
        None
    }

    fn set(&self, sender: &str, image_url: &str) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if !entries.contains_key(sender) && entries.len() >= self.capacity {
            // Drop expired entries first, then the least recently used one.
            if self.ttl.is_some() {
                entries.retain(|_, entry| !self.is_expired(entry, now));
            }
            if entries.len() >= self.capacity {
                let evict_key = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(k, _)| k.clone());
                if let Some(evict_key) = evict_key {
                    entries.remove(&evict_key);
                }
            }
        }

        entries.insert(
            sender.to_owned(),
            SessionEntry {
                image_url: image_url.to_owned(),
                stored_at: now,
                last_used: now,
            },
        );
    }
}
