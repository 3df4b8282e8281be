//! Bounded publish retry shared by the coordinator and the workers.

use std::time::Duration;

use crate::channel::{ChannelError, MessageChannel};

/// Attempts per publish before giving up.
pub const DEFAULT_PUBLISH_ATTEMPTS: u32 = 3;

/// Pause between two publish attempts.
pub const DEFAULT_PUBLISH_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishRetry {
    /// Total attempts, first one included. Zero is treated as one.
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for PublishRetry {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_PUBLISH_ATTEMPTS,
            backoff: DEFAULT_PUBLISH_BACKOFF,
        }
    }
}

/// Publish `payload`, retrying on failure. Returns the last error once the
/// attempts are used up.
pub async fn publish_with_retry(
    channel: &dyn MessageChannel,
    topic: &str,
    payload: Vec<u8>,
    retry: PublishRetry,
) -> Result<(), ChannelError> {
    let attempts = retry.attempts.max(1);
    let mut attempt = 1;
    loop {
        match channel.publish(topic, payload.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                tracing::warn!(topic, attempt, error = %e, "Publish failed, retrying");
                attempt += 1;
                tokio::time::sleep(retry.backoff).await;
            }
            Err(e) => {
                tracing::error!(topic, attempts, error = %e, "Publish failed");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Subscription;
    use crate::TopicBus;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Rejecting {
        inner: TopicBus,
        failures: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl MessageChannel for Rejecting {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ChannelError::Publish {
                    topic: topic.to_string(),
                    reason: "no ack".into(),
                });
            }
            self.inner.publish(topic, payload).await
        }

        async fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError> {
            self.inner.subscribe(topic).await
        }
    }

    fn rejecting(failures: u32) -> Rejecting {
        Rejecting {
            inner: TopicBus::default(),
            failures: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    const QUICK: PublishRetry = PublishRetry {
        attempts: 3,
        backoff: Duration::ZERO,
    };

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let channel = rejecting(2);
        publish_with_retry(&channel, "t", b"x".to_vec(), QUICK).await.unwrap();
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
        assert_eq!(channel.inner.backlog_len("t").await, 1);
    }

    #[tokio::test]
    async fn gives_up_after_the_last_attempt() {
        let channel = rejecting(u32::MAX);
        let result = publish_with_retry(&channel, "t", b"x".to_vec(), QUICK).await;
        assert_matches!(result, Err(ChannelError::Publish { .. }));
        assert_eq!(channel.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let channel = rejecting(0);
        let retry = PublishRetry {
            attempts: 0,
            ..QUICK
        };
        publish_with_retry(&channel, "t", b"x".to_vec(), retry).await.unwrap();
        assert_eq!(channel.calls.load(Ordering::SeqCst), 1);
    }
}
