//! Simulated annealing over relocate / unassign / swap moves.
//!
//! Starts from the greedy seed and only ever visits feasible placements, so
//! every state it reports satisfies exclusivity. Runs until the budget
//! expires, another strategy asks it to stop, or `max_stale_iterations`
//! moves pass without improving the best score.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::greedy::greedy_placement;
use super::state::{Placement, Problem};
use super::{Candidate, SearchBudget, SearchStrategy, SCORE_EPSILON};

/// How many iterations run between two clock reads.
const CLOCK_CHECK_INTERVAL: u64 = 64;

/// Probability of proposing a swap instead of a relocation.
const SWAP_PROBABILITY: f64 = 0.2;

const MIN_TEMPERATURE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct LocalSearch {
    pub seed: u64,
    pub max_stale_iterations: u64,
    pub initial_temperature: f64,
    pub cooling: f64,
}

impl LocalSearch {
    pub fn new(seed: u64, max_stale_iterations: u64) -> Self {
        Self {
            seed,
            max_stale_iterations,
            initial_temperature: 1.0,
            cooling: 0.9995,
        }
    }
}

impl SearchStrategy for LocalSearch {
    fn name(&self) -> &'static str {
        "local_search"
    }

    fn search(&self, problem: &Problem<'_>, budget: &SearchBudget) -> Option<Candidate> {
        if budget.expired() {
            return None;
        }

        let mut current = greedy_placement(problem);
        let mut current_score = current.score(problem);
        let mut best = current.clone();
        let mut best_score = current_score;

        if problem.task_count() == 0 || problem.worker_count() == 0 {
            return Some(Candidate::new(problem, best, false));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut temperature = self.initial_temperature;
        let mut stale: u64 = 0;
        let mut iterations: u64 = 0;

        while stale < self.max_stale_iterations {
            if iterations % CLOCK_CHECK_INTERVAL == 0 && budget.expired() {
                break;
            }
            iterations += 1;

            let delta = if rng.random_bool(SWAP_PROBABILITY) {
                try_swap(problem, &mut current, &mut rng)
            } else {
                try_relocate(problem, &mut current, &mut rng, temperature)
            };

            if let Some(delta) = delta {
                current_score += delta;
            }
            temperature = (temperature * self.cooling).max(MIN_TEMPERATURE);

            if current_score > best_score + SCORE_EPSILON {
                // Re-anchor on the exact score so rounding never accumulates.
                current_score = current.score(problem);
                best_score = current_score;
                best = current.clone();
                stale = 0;
            } else {
                stale += 1;
            }
        }

        tracing::debug!(
            strategy = self.name(),
            seed = self.seed,
            iterations,
            score = best_score,
            "Local search finished"
        );

        Some(Candidate::new(problem, best, false))
    }
}

/// Move one task to another worker, into the assignment, or out of it.
/// Tasks on the target worker that hold a needed resource are ejected
/// (left unassigned). Returns the score delta when the move was applied.
fn try_relocate(
    problem: &Problem<'_>,
    placement: &mut Placement,
    rng: &mut StdRng,
    temperature: f64,
) -> Option<f64> {
    let task = rng.random_range(0..problem.task_count());
    // worker_count means "unassigned"
    let target = rng.random_range(0..=problem.worker_count());
    let from = placement.worker_of(task);
    let to = (target < problem.worker_count()).then_some(target);
    if from == to {
        return None;
    }

    let objective = problem.objective();
    let tasks = problem.tasks();
    let loads = placement.loads();
    let ejected = match to {
        Some(worker) => placement.holders(problem, task, worker),
        None => Vec::new(),
    };

    let mut delta = 0.0;
    if from.is_none() {
        delta += tasks[task].payoff;
    }
    if to.is_none() {
        delta -= tasks[task].payoff;
    }
    delta -= ejected.iter().map(|&e| tasks[e].payoff).sum::<f64>();

    if let Some(f) = from {
        delta -= objective.penalty(loads[f] - 1) - objective.penalty(loads[f]);
    }
    if let Some(w) = to {
        let new_load = loads[w] + 1 - ejected.len();
        delta -= objective.penalty(new_load) - objective.penalty(loads[w]);
    }

    let accept = delta >= 0.0 || rng.random::<f64>() < (delta / temperature).exp();
    if !accept {
        return None;
    }

    placement.remove(problem, task);
    for &e in &ejected {
        placement.remove(problem, e);
    }
    if let Some(worker) = to {
        placement.place(problem, task, worker);
    }
    Some(delta)
}

/// Exchange two tasks held by different workers. Loads and payoff are
/// unchanged, so the move is always accepted when feasible; it exists to
/// unlock relocations blocked by resource conflicts.
fn try_swap(problem: &Problem<'_>, placement: &mut Placement, rng: &mut StdRng) -> Option<f64> {
    let a = rng.random_range(0..problem.task_count());
    let b = rng.random_range(0..problem.task_count());
    let (wa, wb) = (placement.worker_of(a)?, placement.worker_of(b)?);
    if wa == wb {
        return None;
    }
    if !placement.can_place_ignoring(problem, a, wb, Some(b))
        || !placement.can_place_ignoring(problem, b, wa, Some(a))
    {
        return None;
    }

    placement.remove(problem, a);
    placement.remove(problem, b);
    placement.place(problem, a, wb);
    placement.place(problem, b, wa);
    Some(0.0)
}
