//! Bounded-time assignment optimizer.
//!
//! Maximizes `Σ payoff − λ · Σ_w (load(w) − avg)²` subject to:
//!
//! 1. each task on at most one worker;
//! 2. per worker and resource, at most one assigned task needs it.
//!
//! Several [`SearchStrategy`] objects race on the rayon pool against a shared
//! [`SearchBudget`]. The best candidate wins; an exhausted branch-and-bound
//! proves optimality and stops the others early. On a single-thread pool the
//! strategies simply run one after another.

mod branch_and_bound;
mod greedy;
mod local_search;
mod objective;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::assignment::Assignment;
use crate::error::CoreError;
use crate::types::{Task, WorkerId};

pub use branch_and_bound::BranchAndBound;
pub use greedy::Greedy;
pub use local_search::LocalSearch;
pub use objective::{AvgLoadPolicy, Objective};
pub use state::{Placement, Problem};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default wall-clock ceiling for one solve call.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(5);

/// Default λ for the imbalance penalty.
pub const DEFAULT_BALANCE_WEIGHT: f64 = 1.0;

/// Number of annealing runs raced next to branch and bound.
pub const DEFAULT_LOCAL_SEARCH_SEEDS: usize = 3;

/// Non-improving moves after which an annealing run gives up.
pub const DEFAULT_MAX_STALE_ITERATIONS: u64 = 20_000;

/// Scores closer than this are treated as equal.
pub(crate) const SCORE_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub time_limit: Duration,
    pub balance_weight: f64,
    pub avg_load_policy: AvgLoadPolicy,
    pub local_search_seeds: usize,
    pub max_stale_iterations: u64,
    /// Base seed for the annealing runs; run `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: DEFAULT_TIME_LIMIT,
            balance_weight: DEFAULT_BALANCE_WEIGHT,
            avg_load_policy: AvgLoadPolicy::default(),
            local_search_seeds: DEFAULT_LOCAL_SEARCH_SEEDS,
            max_stale_iterations: DEFAULT_MAX_STALE_ITERATIONS,
            seed: 0,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.balance_weight.is_finite() || self.balance_weight < 0.0 {
            return Err(CoreError::Validation(format!(
                "Balance weight must be a non-negative number, got {}",
                self.balance_weight
            )));
        }
        Ok(())
    }

    /// The objective a solve call over `task_count` tasks would use.
    pub fn objective(&self, task_count: usize, worker_count: u32) -> Objective {
        Objective::new(
            self.balance_weight,
            self.avg_load_policy.average_load(task_count, worker_count),
        )
    }
}

// ---------------------------------------------------------------------------
// Search plumbing
// ---------------------------------------------------------------------------

/// Shared wall-clock ceiling plus a cooperative stop flag.
#[derive(Debug)]
pub struct SearchBudget {
    deadline: Option<Instant>,
    stop: AtomicBool,
}

impl SearchBudget {
    pub fn new(limit: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(limit),
            stop: AtomicBool::new(false),
        }
    }

    /// True once the ceiling has passed or a strategy requested a stop.
    pub fn expired(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Ask every strategy sharing this budget to return what it has.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// A feasible placement and its objective value.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub placement: Placement,
    pub score: f64,
    pub proven_optimal: bool,
}

impl Candidate {
    pub fn new(problem: &Problem<'_>, placement: Placement, proven_optimal: bool) -> Self {
        let score = placement.score(problem);
        Self {
            placement,
            score,
            proven_optimal,
        }
    }
}

/// An interchangeable way of searching for an assignment.
///
/// Implementations must only return exclusivity-respecting placements, must
/// return `None` when the budget is already spent on entry, and should poll
/// [`SearchBudget::expired`] often enough to honour the ceiling.
pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn search(&self, problem: &Problem<'_>, budget: &SearchBudget) -> Option<Candidate>;
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

pub struct Optimizer {
    config: SolverConfig,
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl Optimizer {
    /// Branch and bound plus `local_search_seeds` annealing runs.
    pub fn new(config: SolverConfig) -> Self {
        let mut strategies: Vec<Box<dyn SearchStrategy>> = vec![Box::new(BranchAndBound)];
        for i in 0..config.local_search_seeds {
            strategies.push(Box::new(LocalSearch::new(
                config.seed.wrapping_add(i as u64),
                config.max_stale_iterations,
            )));
        }
        Self { config, strategies }
    }

    /// Use an explicit strategy set. Earlier strategies win ties.
    pub fn with_strategies(config: SolverConfig, strategies: Vec<Box<dyn SearchStrategy>>) -> Self {
        Self { config, strategies }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Compute an assignment of `tasks` to workers `1..=worker_count`.
    ///
    /// Returns [`CoreError::Infeasible`] when there are tasks but no workers,
    /// or when the ceiling expires before any strategy records a solution.
    pub fn solve(&self, tasks: &[Task], worker_count: u32) -> Result<Assignment, CoreError> {
        self.config.validate()?;

        if worker_count == 0 {
            if tasks.is_empty() {
                return Ok(Assignment::empty(0));
            }
            return Err(CoreError::Infeasible(format!(
                "{} tasks but no workers to assign them to",
                tasks.len()
            )));
        }
        if tasks.is_empty() {
            return Ok(Assignment::empty(worker_count));
        }

        let started = Instant::now();
        let problem = Problem::new(
            tasks,
            worker_count as usize,
            self.config.objective(tasks.len(), worker_count),
        );
        let budget = SearchBudget::new(self.config.time_limit);

        let candidates: Vec<(usize, Candidate)> = self
            .strategies
            .par_iter()
            .enumerate()
            .filter_map(|(index, strategy)| {
                let candidate = strategy.search(&problem, &budget)?;
                tracing::debug!(
                    strategy = strategy.name(),
                    score = candidate.score,
                    proven_optimal = candidate.proven_optimal,
                    "Strategy returned a candidate"
                );
                Some((index, candidate))
            })
            .collect();

        let mut best: Option<(usize, Candidate)> = None;
        for (index, candidate) in candidates {
            let better = match &best {
                None => true,
                Some((_, incumbent)) => candidate.score > incumbent.score + SCORE_EPSILON,
            };
            if better {
                best = Some((index, candidate));
            }
        }

        let Some((index, candidate)) = best else {
            return Err(CoreError::Infeasible(format!(
                "search budget of {:?} expired before any feasible assignment was found",
                self.config.time_limit
            )));
        };

        let mut assignment = Assignment::empty(worker_count);
        for (task_index, task) in tasks.iter().enumerate() {
            if let Some(worker) = candidate.placement.worker_of(task_index) {
                assignment.push(worker as WorkerId + 1, task.clone());
            }
        }

        tracing::info!(
            strategy = self.strategies[index].name(),
            score = candidate.score,
            proven_optimal = candidate.proven_optimal,
            assigned = assignment.assigned_count(),
            tasks = tasks.len(),
            workers = worker_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Assignment computed"
        );

        Ok(assignment)
    }
}

/// Solve with the default configuration.
pub fn solve(tasks: &[Task], worker_count: u32) -> Result<Assignment, CoreError> {
    Optimizer::new(SolverConfig::default()).solve(tasks, worker_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn zero_workers_with_tasks_is_infeasible() {
        let tasks = vec![Task::new("a", 1.0, [1])];
        assert_matches!(solve(&tasks, 0), Err(CoreError::Infeasible(_)));
    }

    #[test]
    fn zero_workers_without_tasks_is_empty() {
        let assignment = solve(&[], 0).unwrap();
        assert_eq!(assignment.worker_count(), 0);
    }

    #[test]
    fn no_tasks_gives_empty_lists_for_every_worker() {
        let assignment = solve(&[], 3).unwrap();
        assert_eq!(assignment.worker_count(), 3);
        assert_eq!(assignment.assigned_count(), 0);
    }

    #[test]
    fn zero_budget_is_infeasible() {
        let config = SolverConfig {
            time_limit: Duration::ZERO,
            ..SolverConfig::default()
        };
        let tasks = vec![Task::new("a", 1.0, [1])];
        assert_matches!(Optimizer::new(config).solve(&tasks, 1), Err(CoreError::Infeasible(_)));
    }

    #[test]
    fn negative_balance_weight_is_rejected() {
        let config = SolverConfig {
            balance_weight: -1.0,
            ..SolverConfig::default()
        };
        let tasks = vec![Task::new("a", 1.0, [1])];
        assert_matches!(Optimizer::new(config).solve(&tasks, 1), Err(CoreError::Validation(_)));
    }

    #[test]
    fn worker_ids_are_one_based() {
        let tasks = vec![Task::new("a", 1.0, [1]), Task::new("b", 1.0, [1])];
        let assignment = solve(&tasks, 2).unwrap();
        assert_eq!(assignment.worker_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(assignment.tasks_for(1).len(), 1);
        assert_eq!(assignment.tasks_for(2).len(), 1);
    }

    #[test]
    fn custom_strategy_set_is_used() {
        let tasks = vec![Task::new("a", 1.0, [1])];
        let optimizer = Optimizer::with_strategies(SolverConfig::default(), vec![Box::new(Greedy)]);
        let assignment = optimizer.solve(&tasks, 1).unwrap();
        assert_eq!(assignment.assigned_count(), 1);
    }
}
