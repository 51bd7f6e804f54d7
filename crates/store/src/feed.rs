use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use telesink_core::model::TelemetryRecord;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

/// A stored record as seen by live subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedEvent {
    pub seq: u64,
    pub record: TelemetryRecord,
}

/// Publish side of the live record stream.
///
/// Every published record gets a sequence number. The broadcast channel
/// wakes subscribers immediately; the backlog keeps the most recent events
/// so a lagging or reconnecting subscriber can catch up without duplicates.
#[derive(Clone)]
pub struct Feed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    tx: broadcast::Sender<Arc<FeedEvent>>,
    backlog: Mutex<Backlog>,
}

struct Backlog {
    last_seq: u64,
    capacity: usize,
    events: VecDeque<Arc<FeedEvent>>,
}

impl Feed {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(FeedInner {
                tx,
                backlog: Mutex::new(Backlog {
                    last_seq: 0,
                    capacity,
                    events: VecDeque::with_capacity(capacity),
                }),
            }),
        }
    }

    fn backlog(&self) -> std::sync::MutexGuard<'_, Backlog> {
        self.inner.backlog.lock().expect("feed mutex poisoned")
    }

    pub fn publish(&self, record: TelemetryRecord) -> u64 {
        let mut backlog = self.backlog();
        backlog.last_seq += 1;
        let event = Arc::new(FeedEvent {
            seq: backlog.last_seq,
            record,
        });
        if backlog.events.len() == backlog.capacity {
            backlog.events.pop_front();
        }
        backlog.events.push_back(event.clone());
        // Sent under the lock so channel order matches sequence order.
        let _ = self.inner.tx.send(event);
        backlog.last_seq
    }

    pub fn last_seq(&self) -> u64 {
        self.backlog().last_seq
    }

    /// Retained events newer than `seq`, oldest first.
    pub fn since(&self, seq: u64) -> Vec<Arc<FeedEvent>> {
        self.backlog()
            .events
            .iter()
            .filter(|e| e.seq > seq)
            .cloned()
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    /// Starts a subscription. With `last_seen` the retained events after it
    /// are replayed first; without it only records published from now on
    /// are delivered.
    pub fn subscribe(&self, last_seen: Option<u64>) -> Subscription {
        let backlog = self.backlog();
        let rx = self.inner.tx.subscribe();
        let (cursor, pending) = match last_seen {
            Some(seen) => {
                let seen = seen.min(backlog.last_seq);
                let replay = backlog
                    .events
                    .iter()
                    .filter(|e| e.seq > seen)
                    .cloned()
                    .collect::<VecDeque<_>>();
                (seen, replay)
            }
            None => (backlog.last_seq, VecDeque::new()),
        };
        drop(backlog);

        Subscription {
            feed: self.clone(),
            rx,
            cursor,
            pending,
        }
    }
}

/// Receive side of the feed. Yields each sequence number at most once.
pub struct Subscription {
    feed: Feed,
    rx: broadcast::Receiver<Arc<FeedEvent>>,
    cursor: u64,
    pending: VecDeque<Arc<FeedEvent>>,
}

impl Subscription {
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    fn admit(&mut self, event: Arc<FeedEvent>) -> Option<Arc<FeedEvent>> {
        if event.seq <= self.cursor {
            return None;
        }
        self.cursor = event.seq;
        Some(event)
    }

    /// Next unseen event, or `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<Arc<FeedEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if let Some(event) = self.admit(event) {
                    return Some(event);
                }
                continue;
            }

            match self.rx.recv().await {
                Ok(event) => {
                    if let Some(event) = self.admit(event) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    let missed = self.feed.since(self.cursor);
                    let first = missed.first().map(|e| e.seq).unwrap_or(self.cursor + 1);
                    if first > self.cursor + 1 {
                        warn!(
                            skipped,
                            lost = first - self.cursor - 1,
                            "feed subscriber fell behind the backlog"
                        );
                    }
                    self.pending.extend(missed);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
