//! Per-worker settings.

use std::time::Duration;

use fleet_core::{CoreError, Task, WorkerId};
use fleet_events::PublishRetry;

/// Simulated execution time when nothing else is configured.
pub const DEFAULT_WORK_DURATION: Duration = Duration::from_millis(100);

/// Probability that a simulated task fails.
pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.1;

// ---------------------------------------------------------------------------
// WorkCost
// ---------------------------------------------------------------------------

/// How long a worker sleeps to simulate one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkCost {
    /// Same duration for every task.
    Fixed(Duration),
    /// `execution_time × unit` for tasks that declare a cost, `fallback`
    /// for the rest.
    PerTask { unit: Duration, fallback: Duration },
}

impl WorkCost {
    pub fn duration_for(&self, task: &Task) -> Duration {
        match *self {
            WorkCost::Fixed(duration) => duration,
            WorkCost::PerTask { unit, fallback } => match task.execution_time {
                Some(units) => unit.saturating_mul(u32::try_from(units).unwrap_or(u32::MAX)),
                None => fallback,
            },
        }
    }
}

impl Default for WorkCost {
    fn default() -> Self {
        WorkCost::Fixed(DEFAULT_WORK_DURATION)
    }
}

// ---------------------------------------------------------------------------
// WorkerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub worker_id: WorkerId,
    pub failure_probability: f64,
    pub work_cost: WorkCost,
    /// Seed for the outcome draws. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Retry applied to every result publish.
    pub publish_retry: PublishRetry,
}

impl WorkerConfig {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            failure_probability: DEFAULT_FAILURE_PROBABILITY,
            work_cost: WorkCost::default(),
            seed: None,
            publish_retry: PublishRetry::default(),
        }
    }

    pub fn with_failure_probability(mut self, probability: f64) -> Self {
        self.failure_probability = probability;
        self
    }

    pub fn with_work_cost(mut self, work_cost: WorkCost) -> Self {
        self.work_cost = work_cost;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_publish_retry(mut self, retry: PublishRetry) -> Self {
        self.publish_retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(CoreError::Validation(format!(
                "Failure probability for worker {} must be within [0, 1], got {}",
                self.worker_id, self.failure_probability
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn fixed_cost_ignores_declared_time() {
        let task = Task::new("t", 1.0, []).with_execution_time(9);
        assert_eq!(WorkCost::default().duration_for(&task), DEFAULT_WORK_DURATION);
    }

    #[test]
    fn per_task_cost_scales_declared_time() {
        let cost = WorkCost::PerTask {
            unit: Duration::from_millis(10),
            fallback: Duration::from_millis(3),
        };
        let declared = Task::new("t", 1.0, []).with_execution_time(7);
        let undeclared = Task::new("u", 1.0, []);
        assert_eq!(cost.duration_for(&declared), Duration::from_millis(70));
        assert_eq!(cost.duration_for(&undeclared), Duration::from_millis(3));
    }

    #[test]
    fn probability_must_be_within_unit_interval() {
        assert!(WorkerConfig::new(1).validate().is_ok());
        assert!(WorkerConfig::new(1).with_failure_probability(1.0).validate().is_ok());
        assert_matches!(
            WorkerConfig::new(2).with_failure_probability(1.5).validate(),
            Err(CoreError::Validation(msg)) if msg.contains("worker 2")
        );
        assert_matches!(
            WorkerConfig::new(2).with_failure_probability(f64::NAN).validate(),
            Err(CoreError::Validation(_))
        );
    }
}
