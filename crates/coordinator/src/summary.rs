//! Payoff accounting for one dispatched batch.
//!
//! A [`Summary`] is a pure function of the dispatched assignment, the
//! collected results and the collection window. Outcomes are keyed by task
//! name and the last report for a task wins, so duplicate deliveries never
//! inflate the achieved payoff.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use fleet_core::{Assignment, TaskResult, Timestamp, WorkerId};
use serde::Serialize;

/// Final state of one dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded,
    Failed,
    Missing,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskOutcome::Succeeded => "SUCCESS",
            TaskOutcome::Failed => "FAIL",
            TaskOutcome::Missing => "MISSING",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task_name: String,
    pub payoff: f64,
    pub assigned_worker: WorkerId,
    /// Worker named in the winning result, if any arrived.
    pub reported_by: Option<WorkerId>,
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStats {
    pub worker_id: WorkerId,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub missing: usize,
    pub achieved_payoff: f64,
}

impl WorkerStats {
    fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            missing: 0,
            achieved_payoff: 0.0,
        }
    }
}

/// When and how result collection ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionWindow {
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub timed_out: bool,
    /// Undecodable result messages that were dropped.
    pub invalid_payloads: usize,
}

impl CollectionWindow {
    /// A window that opened and closed now, for batches with nothing to wait on.
    pub fn empty() -> Self {
        let now = chrono::Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            timed_out: false,
            invalid_payloads: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub tasks_dispatched: usize,
    pub results_received: usize,
    /// Dispatched count minus received count, floored at zero.
    pub missing_results: usize,
    /// Dispatched tasks that ended `Missing`. Duplicate or unexpected
    /// results can hide these from `missing_results`.
    pub tasks_without_result: usize,
    pub theoretical_payoff: f64,
    pub achieved_payoff: f64,
    pub failed_payoff: f64,
    pub undelivered_payoff: f64,
    pub lost_payoff: f64,
    pub tasks: Vec<TaskReport>,
    pub workers: Vec<WorkerStats>,
    /// Names carried by results for tasks that were never dispatched.
    pub unexpected_results: Vec<String>,
    #[serde(flatten)]
    pub window: CollectionWindow,
}

impl Summary {
    pub fn compute(
        assignment: &Assignment,
        results: &[TaskResult],
        window: CollectionWindow,
    ) -> Self {
        let mut latest: HashMap<&str, &TaskResult> = HashMap::new();
        let mut unexpected: Vec<String> = Vec::new();
        for result in results {
            if assignment.worker_of(&result.task_name).is_some() {
                latest.insert(result.task_name.as_str(), result);
            } else if !unexpected.contains(&result.task_name) {
                unexpected.push(result.task_name.clone());
            }
        }

        let mut workers: BTreeMap<WorkerId, WorkerStats> = assignment
            .worker_ids()
            .map(|id| (id, WorkerStats::new(id)))
            .collect();
        let mut tasks = Vec::with_capacity(assignment.assigned_count());
        let (mut theoretical, mut achieved, mut failed, mut undelivered) = (0.0, 0.0, 0.0, 0.0);

        for (worker_id, list) in assignment.iter() {
            let stats = workers
                .entry(worker_id)
                .or_insert_with(|| WorkerStats::new(worker_id));
            for task in list {
                theoretical += task.payoff;
                stats.dispatched += 1;

                let report = latest.get(task.name.as_str());
                let outcome = match report {
                    Some(result) if result.success => {
                        achieved += task.payoff;
                        stats.succeeded += 1;
                        stats.achieved_payoff += task.payoff;
                        TaskOutcome::Succeeded
                    }
                    Some(_) => {
                        failed += task.payoff;
                        stats.failed += 1;
                        TaskOutcome::Failed
                    }
                    None => {
                        undelivered += task.payoff;
                        stats.missing += 1;
                        TaskOutcome::Missing
                    }
                };

                tasks.push(TaskReport {
                    task_name: task.name.clone(),
                    payoff: task.payoff,
                    assigned_worker: worker_id,
                    reported_by: report.map(|result| result.worker_id),
                    outcome,
                });
            }
        }

        let tasks_dispatched = tasks.len();
        let tasks_without_result = tasks
            .iter()
            .filter(|report| report.outcome == TaskOutcome::Missing)
            .count();
        Self {
            tasks_dispatched,
            results_received: results.len(),
            missing_results: tasks_dispatched.saturating_sub(results.len()),
            tasks_without_result,
            theoretical_payoff: theoretical,
            achieved_payoff: achieved,
            failed_payoff: failed,
            undelivered_payoff: undelivered,
            lost_payoff: failed + undelivered,
            tasks,
            workers: workers.into_values().collect(),
            unexpected_results: unexpected,
            window,
        }
    }

    pub fn outcome_of(&self, task_name: &str) -> Option<TaskOutcome> {
        self.tasks
            .iter()
            .find(|report| report.task_name == task_name)
            .map(|report| report.outcome)
    }

    pub fn is_complete(&self) -> bool {
        self.tasks_without_result == 0
    }

    /// True when results fell short by count or some task never reported.
    pub fn has_shortfall(&self) -> bool {
        self.missing_results > 0 || self.tasks_without_result > 0
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== FINAL SUMMARY ===")?;
        writeln!(
            f,
            "Assigned: {}, Theoretical payoff: {}",
            self.tasks_dispatched, self.theoretical_payoff
        )?;
        writeln!(
            f,
            "Achieved payoff: {}, Lost payoff: {} (failed {}, undelivered {})",
            self.achieved_payoff, self.lost_payoff, self.failed_payoff, self.undelivered_payoff
        )?;
        write!(
            f,
            "Results: {} received, {} missing, {} tasks without a result",
            self.results_received, self.missing_results, self.tasks_without_result
        )?;
        if self.window.timed_out {
            write!(f, " (deadline reached)")?;
        }
        writeln!(f)?;
        for worker in &self.workers {
            writeln!(
                f,
                "Worker {}: dispatched {}, succeeded {}, failed {}, missing {}, payoff {}",
                worker.worker_id,
                worker.dispatched,
                worker.succeeded,
                worker.failed,
                worker.missing,
                worker.achieved_payoff
            )?;
        }
        for task in &self.tasks {
            writeln!(
                f,
                " - {}: worker {} -> {}",
                task.task_name, task.assigned_worker, task.outcome
            )?;
        }
        if !self.unexpected_results.is_empty() {
            writeln!(f, "Unexpected results: {}", self.unexpected_results.join(", "))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
