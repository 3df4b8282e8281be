//! Fleet messaging layer.
//!
//! - [`MessageChannel`]: the publish/subscribe contract the coordinator and
//!   workers talk through.
//! - [`TopicBus`]: in-process implementation keyed by topic name.
//! - [`topics`]: topic naming for dispatch and result traffic.
//! - [`messages`]: JSON encoding of task lists, the end-of-stream sentinel
//!   and results.
//! - [`retry`]: bounded publish retry used by every publisher.

pub mod bus;
pub mod channel;
pub mod messages;
pub mod retry;
pub mod topics;

pub use bus::TopicBus;
pub use channel::{ChannelError, MessageChannel, Subscription};
pub use messages::DispatchMessage;
pub use retry::{publish_with_retry, PublishRetry};
pub use topics::{task_topic, RESULTS_TOPIC};
