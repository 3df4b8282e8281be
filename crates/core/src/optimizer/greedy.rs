//! Greedy construction: highest payoff first, least-loaded feasible worker.

use super::state::{Placement, Problem};
use super::{Candidate, SearchBudget, SearchStrategy};

/// Build the greedy seed every strategy starts from.
///
/// A task is skipped when no worker can take it or when the balance penalty of
/// adding it outweighs its payoff.
pub(crate) fn greedy_placement(problem: &Problem<'_>) -> Placement {
    let mut placement = Placement::new(problem);
    let objective = problem.objective();

    for &task in problem.by_payoff() {
        let target = (0..problem.worker_count())
            .filter(|&worker| placement.can_place(problem, task, worker))
            .min_by_key(|&worker| (placement.loads()[worker], worker));

        if let Some(worker) = target {
            let load = placement.loads()[worker];
            if problem.tasks()[task].payoff >= objective.marginal_penalty(load) {
                placement.place(problem, task, worker);
            }
        }
    }
    placement
}

/// The greedy seed on its own, as a strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct Greedy;

impl SearchStrategy for Greedy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn search(&self, problem: &Problem<'_>, budget: &SearchBudget) -> Option<Candidate> {
        if budget.expired() {
            return None;
        }
        Some(Candidate::new(problem, greedy_placement(problem), false))
    }
}
