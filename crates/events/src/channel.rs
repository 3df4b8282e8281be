//! The message channel contract shared by the coordinator and the workers.
//!
//! A channel moves opaque byte payloads between named topics. Publishing is
//! acknowledged (an `Err` means the message was not accepted); delivery to
//! subscribers is at-least-once and unordered across publishers.

use async_trait::async_trait;
use fleet_core::CoreError;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// ChannelError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel is closed")]
    Closed,

    #[error("Publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },
}

impl From<ChannelError> for CoreError {
    fn from(err: ChannelError) -> Self {
        CoreError::ChannelUnavailable(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Receiving end of one topic subscription.
///
/// Dropping it unsubscribes: the channel notices the closed receiver on its
/// next publish to the topic and stops delivering to it.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, receiver: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            receiver,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next payload, or `None` once the channel has shut the topic down.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }

    /// Next payload if one is already queued.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// MessageChannel
// ---------------------------------------------------------------------------

/// Topic-based publish/subscribe transport.
///
/// Implementations must accept concurrent publishers and must deliver every
/// accepted message to each subscription that existed when it was published.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ChannelError>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError>;

    /// Drop messages the channel is still holding for `topic` on behalf of
    /// future subscribers, returning how many were discarded. Channels that
    /// retain nothing keep the default.
    async fn discard_pending(&self, _topic: &str) -> Result<usize, ChannelError> {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn channel_errors_become_channel_unavailable() {
        let err: CoreError = ChannelError::Publish {
            topic: "fleet/results".into(),
            reason: "broker down".into(),
        }
        .into();
        assert_matches!(err, CoreError::ChannelUnavailable(msg) if msg.contains("broker down"));
    }

    #[tokio::test]
    async fn subscription_yields_queued_payloads() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new("t", rx);
        tx.send(b"one".to_vec()).unwrap();
        assert_eq!(sub.try_recv().as_deref(), Some(&b"one"[..]));
        assert!(sub.try_recv().is_none());

        drop(tx);
        assert!(sub.recv().await.is_none());
        assert_eq!(sub.topic(), "t");
    }
}
