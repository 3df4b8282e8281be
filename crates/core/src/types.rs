//! Shared identifiers and the task/result model used across the fleet.

use serde::{Deserialize, Serialize};

/// Workers are numbered `1..=N` for the duration of one batch.
pub type WorkerId = u32;

/// A contended capability (sensor, antenna, bay, ...) that a worker may not
/// double-book.
pub type ResourceId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A schedulable unit of work.
///
/// Identity is `name`, which is unique within a batch. `resources` is kept
/// sorted and free of duplicates so exclusivity checks can treat it as a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub payoff: f64,
    pub resources: Vec<ResourceId>,
    /// Declared execution cost in abstract time units, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
}

impl Task {
    /// Create a task with no declared execution cost.
    pub fn new(
        name: impl Into<String>,
        payoff: f64,
        resources: impl IntoIterator<Item = ResourceId>,
    ) -> Self {
        let mut resources: Vec<ResourceId> = resources.into_iter().collect();
        resources.sort_unstable();
        resources.dedup();
        Self {
            name: name.into(),
            payoff,
            resources,
            execution_time: None,
        }
    }

    /// Attach a declared execution cost.
    pub fn with_execution_time(mut self, execution_time: u64) -> Self {
        self.execution_time = Some(execution_time);
        self
    }

    /// Whether this task needs `resource`.
    pub fn requires(&self, resource: ResourceId) -> bool {
        self.resources.binary_search(&resource).is_ok()
    }

    /// Whether this task and `other` need at least one common resource.
    pub fn conflicts_with(&self, other: &Task) -> bool {
        let (mut a, mut b) = (self.resources.iter(), other.resources.iter());
        let (mut x, mut y) = (a.next(), b.next());
        while let (Some(l), Some(r)) = (x, y) {
            match l.cmp(r) {
                std::cmp::Ordering::Less => x = a.next(),
                std::cmp::Ordering::Greater => y = b.next(),
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// TaskResult
// ---------------------------------------------------------------------------

/// Outcome reported by a worker for one dispatched task.
///
/// Carries the original task payload so the collector can account for it
/// without a catalog lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub worker_id: WorkerId,
    pub task_name: String,
    pub success: bool,
    pub task: Task,
}

impl TaskResult {
    pub fn new(worker_id: WorkerId, task: Task, success: bool) -> Self {
        Self {
            worker_id,
            task_name: task.name.clone(),
            success,
            task,
        }
    }
}
