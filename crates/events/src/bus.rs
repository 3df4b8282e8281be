//! In-process topic bus.
//!
//! [`TopicBus`] keeps one list of subscriber senders per topic. Messages
//! published while a topic has no live subscriber are held in a bounded
//! per-topic backlog and handed to the next subscriber, so a worker that
//! subscribes after its list was published still receives it. A publisher
//! starting a new exchange on a topic clears that backlog with
//! [`MessageChannel::discard_pending`].
//!
//! Designed to be shared via `Arc<TopicBus>` between the coordinator and the
//! worker tasks.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::channel::{ChannelError, MessageChannel, Subscription};

/// Default number of undelivered messages kept per topic.
const DEFAULT_BACKLOG_CAPACITY: usize = 1024;

#[derive(Default)]
struct TopicState {
    subscribers: Vec<mpsc::UnboundedSender<Vec<u8>>>,
    backlog: VecDeque<Vec<u8>>,
}

/// In-process publish/subscribe hub keyed by topic name.
pub struct TopicBus {
    topics: RwLock<HashMap<String, TopicState>>,
    backlog_capacity: usize,
    closed: RwLock<bool>,
}

impl TopicBus {
    /// Create a bus that keeps up to `backlog_capacity` messages per topic
    /// while nobody is subscribed. When the backlog is full the oldest
    /// message is dropped.
    pub fn new(backlog_capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            backlog_capacity,
            closed: RwLock::new(false),
        }
    }

    /// Number of live subscriptions on `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map_or(0, |state| state.subscribers.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Number of messages waiting for a subscriber on `topic`.
    pub async fn backlog_len(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map_or(0, |state| state.backlog.len())
    }

    /// Refuse further traffic and end every open subscription.
    pub async fn close(&self) {
        *self.closed.write().await = true;
        let mut topics = self.topics.write().await;
        let count: usize = topics.values().map(|state| state.subscribers.len()).sum();
        topics.clear();
        tracing::info!(count, "Closed all topic subscriptions");
    }

    async fn ensure_open(&self) -> Result<(), ChannelError> {
        if *self.closed.read().await {
            return Err(ChannelError::Closed);
        }
        Ok(())
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG_CAPACITY)
    }
}

#[async_trait]
impl MessageChannel for TopicBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ChannelError> {
        self.ensure_open().await?;

        let mut topics = self.topics.write().await;
        let state = topics.entry(topic.to_string()).or_default();

        // Senders whose receiver was dropped are pruned here.
        state
            .subscribers
            .retain(|tx| tx.send(payload.clone()).is_ok());

        if state.subscribers.is_empty() && self.backlog_capacity > 0 {
            if state.backlog.len() >= self.backlog_capacity {
                state.backlog.pop_front();
                tracing::warn!(
                    topic,
                    capacity = self.backlog_capacity,
                    "Topic backlog full, dropped oldest message"
                );
            }
            state.backlog.push_back(payload);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError> {
        self.ensure_open().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.topics.write().await;
        let state = topics.entry(topic.to_string()).or_default();

        let replayed = state.backlog.len();
        for payload in state.backlog.drain(..) {
            // The receiver is still in scope, so this cannot fail.
            let _ = tx.send(payload);
        }
        state.subscribers.push(tx);

        tracing::debug!(topic, replayed, "Subscribed");
        Ok(Subscription::new(topic, rx))
    }

    async fn discard_pending(&self, topic: &str) -> Result<usize, ChannelError> {
        self.ensure_open().await?;

        let mut topics = self.topics.write().await;
        let discarded = topics.get_mut(topic).map_or(0, |state| {
            let count = state.backlog.len();
            state.backlog.clear();
            count
        });
        if discarded > 0 {
            tracing::debug!(topic, discarded, "Discarded backlog");
        }
        Ok(discarded)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
