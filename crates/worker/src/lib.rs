//! Simulated fleet worker.
//!
//! A [`WorkerExecutor`] consumes task lists from its dispatch topic, pretends
//! to run each task for its [`WorkCost`], draws a stochastic outcome and
//! reports one result per task on the shared results topic.

pub mod config;
pub mod executor;

pub use config::{WorkCost, WorkerConfig};
pub use executor::{StopReason, WorkerExecutor, WorkerReport};
