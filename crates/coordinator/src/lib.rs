//! Fleet dispatch coordinator.
//!
//! - [`config`]: environment-driven batch settings.
//! - [`dispatch`]: publishes per-worker task lists and gathers results under
//!   a deadline.
//! - [`summary`]: payoff accounting over one batch.
//! - [`batch`]: wires optimizer, workers and coordinator together in one
//!   process.

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod summary;

pub use batch::{run_batch, run_batch_with_options, BatchReport};
pub use config::FleetConfig;
pub use dispatch::{Coordinator, DispatchOptions};
pub use summary::{Summary, TaskOutcome};
