//! Fleet tasking domain core.
//!
//! Holds everything that does not touch a transport:
//!
//! - [`types`]: task and result records shared by every crate.
//! - [`catalog`]: loading and validating one batch of tasks.
//! - [`assignment`]: the worker → task-list partition and its constraint checks.
//! - [`optimizer`]: bounded-time search for a payoff-maximizing, balanced,
//!   resource-exclusive assignment.
//! - [`error`]: the shared [`CoreError`](error::CoreError) taxonomy.

pub mod assignment;
pub mod catalog;
pub mod error;
pub mod optimizer;
pub mod types;

pub use assignment::Assignment;
pub use catalog::TaskCatalog;
pub use error::CoreError;
pub use optimizer::{solve, AvgLoadPolicy, Optimizer, SolverConfig};
pub use types::{ResourceId, Task, TaskResult, Timestamp, WorkerId};
