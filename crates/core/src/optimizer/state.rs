//! Search-side view of a solve call: the indexed problem and a mutable
//! partial placement with O(resources) feasibility checks.

use std::collections::HashMap;

use crate::types::{ResourceId, Task};

use super::objective::Objective;

/// Tasks, worker count and objective for one solve call.
///
/// Workers are addressed by zero-based index inside the search; the
/// optimizer maps index `w` to worker id `w + 1` when building the result.
#[derive(Debug)]
pub struct Problem<'a> {
    tasks: &'a [Task],
    worker_count: usize,
    objective: Objective,
    by_payoff: Vec<usize>,
}

impl<'a> Problem<'a> {
    pub fn new(tasks: &'a [Task], worker_count: usize, objective: Objective) -> Self {
        let mut by_payoff: Vec<usize> = (0..tasks.len()).collect();
        by_payoff.sort_by(|&a, &b| tasks[b].payoff.total_cmp(&tasks[a].payoff).then(a.cmp(&b)));
        Self {
            tasks,
            worker_count,
            objective,
            by_payoff,
        }
    }

    pub fn tasks(&self) -> &'a [Task] {
        self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Task indices by descending payoff, ties by catalog position.
    pub fn by_payoff(&self) -> &[usize] {
        &self.by_payoff
    }
}

/// A partial function task → worker that never violates exclusivity.
#[derive(Debug, Clone)]
pub struct Placement {
    slots: Vec<Option<usize>>,
    loads: Vec<usize>,
    held: Vec<HashMap<ResourceId, usize>>,
}

impl Placement {
    /// Nothing placed.
    pub fn new(problem: &Problem<'_>) -> Self {
        Self {
            slots: vec![None; problem.task_count()],
            loads: vec![0; problem.worker_count()],
            held: vec![HashMap::new(); problem.worker_count()],
        }
    }

    pub fn worker_of(&self, task: usize) -> Option<usize> {
        self.slots[task]
    }

    pub fn loads(&self) -> &[usize] {
        &self.loads
    }

    pub fn assigned(&self) -> usize {
        self.loads.iter().sum()
    }

    pub fn can_place(&self, problem: &Problem<'_>, task: usize, worker: usize) -> bool {
        self.can_place_ignoring(problem, task, worker, None)
    }

    /// Feasibility of `task` on `worker` as if `ignore` were not there
    /// (used by swap moves).
    pub fn can_place_ignoring(
        &self,
        problem: &Problem<'_>,
        task: usize,
        worker: usize,
        ignore: Option<usize>,
    ) -> bool {
        problem.tasks[task]
            .resources
            .iter()
            .all(|resource| match self.held[worker].get(resource) {
                None => true,
                Some(&holder) => holder == task || Some(holder) == ignore,
            })
    }

    /// Tasks on `worker` that hold a resource `task` needs.
    pub fn holders(&self, problem: &Problem<'_>, task: usize, worker: usize) -> Vec<usize> {
        let mut holders: Vec<usize> = problem.tasks[task]
            .resources
            .iter()
            .filter_map(|resource| self.held[worker].get(resource).copied())
            .filter(|&holder| holder != task)
            .collect();
        holders.sort_unstable();
        holders.dedup();
        holders
    }

    /// Place an unplaced task. Callers check [`can_place`](Self::can_place) first.
    pub fn place(&mut self, problem: &Problem<'_>, task: usize, worker: usize) {
        debug_assert!(self.slots[task].is_none(), "task {task} placed twice");
        debug_assert!(self.can_place(problem, task, worker));
        self.slots[task] = Some(worker);
        self.loads[worker] += 1;
        for &resource in &problem.tasks[task].resources {
            self.held[worker].insert(resource, task);
        }
    }

    /// Unplace a task, returning the worker it was on.
    pub fn remove(&mut self, problem: &Problem<'_>, task: usize) -> Option<usize> {
        let worker = self.slots[task].take()?;
        self.loads[worker] -= 1;
        for resource in &problem.tasks[task].resources {
            if self.held[worker].get(resource) == Some(&task) {
                self.held[worker].remove(resource);
            }
        }
        Some(worker)
    }

    /// Sum of payoff over placed tasks, accumulated in catalog order.
    pub fn payoff(&self, problem: &Problem<'_>) -> f64 {
        self.slots
            .iter()
            .zip(problem.tasks)
            .filter(|(slot, _)| slot.is_some())
            .map(|(_, task)| task.payoff)
            .sum()
    }

    pub fn score(&self, problem: &Problem<'_>) -> f64 {
        problem.objective.score(self.payoff(problem), &self.loads)
    }
}
