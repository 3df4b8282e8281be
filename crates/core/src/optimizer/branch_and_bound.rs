//! Exhaustive depth-first search with an admissible upper bound.
//!
//! Tasks are decided in descending payoff order; each decision places the task
//! on one feasible worker or leaves it out. A subtree is pruned when
//! `payoff so far + payoff still undecided − imbalance floor` cannot beat the
//! incumbent. Empty workers are interchangeable, so only the first one is
//! branched on.
//!
//! When the tree is exhausted inside the budget the incumbent is optimal and
//! the strategy asks the others to stop.

use super::greedy::greedy_placement;
use super::state::{Placement, Problem};
use super::{Candidate, SearchBudget, SearchStrategy, SCORE_EPSILON};

#[derive(Debug, Default, Clone, Copy)]
pub struct BranchAndBound;

struct Frame {
    depth: usize,
    base_payoff: f64,
    choices: Vec<Option<usize>>,
    next: usize,
    applied: Option<Option<usize>>,
}

impl SearchStrategy for BranchAndBound {
    fn name(&self) -> &'static str {
        "branch_and_bound"
    }

    fn search(&self, problem: &Problem<'_>, budget: &SearchBudget) -> Option<Candidate> {
        if budget.expired() {
            return None;
        }

        let order = problem.by_payoff();
        let task_count = order.len();
        let objective = problem.objective();

        // remaining[d] = payoff of tasks order[d..]
        let mut remaining = vec![0.0; task_count + 1];
        for d in (0..task_count).rev() {
            remaining[d] = remaining[d + 1] + problem.tasks()[order[d]].payoff;
        }

        let mut best = greedy_placement(problem);
        let mut best_score = best.score(problem);
        let mut state = Placement::new(problem);
        let mut nodes: u64 = 0;
        let mut exhausted = true;

        let mut stack = Vec::with_capacity(task_count);
        if task_count > 0
            && remaining[0] - objective.imbalance_floor(state.loads()) > best_score + SCORE_EPSILON
        {
            stack.push(Frame {
                depth: 0,
                base_payoff: 0.0,
                choices: choices(problem, &state, order[0]),
                next: 0,
                applied: None,
            });
        }

        while let Some(frame) = stack.last_mut() {
            let task = order[frame.depth];
            if let Some(Some(worker)) = frame.applied.take() {
                debug_assert_eq!(state.worker_of(task), Some(worker));
                state.remove(problem, task);
            }
            if frame.next == frame.choices.len() {
                stack.pop();
                continue;
            }
            if budget.expired() {
                exhausted = false;
                break;
            }
            nodes += 1;

            let choice = frame.choices[frame.next];
            frame.next += 1;
            frame.applied = Some(choice);

            let mut payoff = frame.base_payoff;
            if let Some(worker) = choice {
                state.place(problem, task, worker);
                payoff += problem.tasks()[task].payoff;
            }

            let depth = frame.depth + 1;
            if depth == task_count {
                let score = objective.score(payoff, state.loads());
                if score > best_score + SCORE_EPSILON {
                    best_score = score;
                    best = state.clone();
                }
                continue;
            }

            let bound = payoff + remaining[depth] - objective.imbalance_floor(state.loads());
            if bound > best_score + SCORE_EPSILON {
                let next_task = order[depth];
                stack.push(Frame {
                    depth,
                    base_payoff: payoff,
                    choices: choices(problem, &state, next_task),
                    next: 0,
                    applied: None,
                });
            }
        }

        tracing::debug!(
            strategy = self.name(),
            nodes,
            exhausted,
            score = best_score,
            "Branch and bound finished"
        );

        if exhausted {
            budget.stop();
        }
        Some(Candidate::new(problem, best, exhausted))
    }
}

/// Feasible workers for `task` (least loaded first, at most one empty worker),
/// followed by "leave unassigned".
fn choices(problem: &Problem<'_>, state: &Placement, task: usize) -> Vec<Option<usize>> {
    let mut workers: Vec<usize> = Vec::new();
    let mut seen_empty = false;
    for worker in 0..problem.worker_count() {
        if state.loads()[worker] == 0 {
            if seen_empty {
                continue;
            }
            seen_empty = true;
        }
        if state.can_place(problem, task, worker) {
            workers.push(worker);
        }
    }
    workers.sort_by_key(|&worker| (state.loads()[worker], worker));

    let mut choices: Vec<Option<usize>> = workers.into_iter().map(Some).collect();
    choices.push(None);
    choices
}
