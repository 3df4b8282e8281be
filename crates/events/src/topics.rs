//! Topic names.

use fleet_core::WorkerId;

/// Shared topic every worker publishes its results on.
pub const RESULTS_TOPIC: &str = "fleet/results";

/// Prefix of the per-worker dispatch topics.
pub const TASK_TOPIC_PREFIX: &str = "fleet/tasks/worker";

/// Dispatch topic of one worker, e.g. `fleet/tasks/worker/3`.
pub fn task_topic(worker_id: WorkerId) -> String {
    format!("{TASK_TOPIC_PREFIX}/{worker_id}")
}
