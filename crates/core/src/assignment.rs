//! Worker → task-list partition produced by the optimizer.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::error::CoreError;
use crate::types::{ResourceId, Task, WorkerId};

/// Mapping from worker id to the ordered tasks that worker will execute.
///
/// Every worker id of the batch is present, possibly with an empty list, so
/// each worker receives exactly one dispatch message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Assignment {
    lists: BTreeMap<WorkerId, Vec<Task>>,
}

impl Assignment {
    /// An assignment for workers `1..=worker_count` with no tasks.
    pub fn empty(worker_count: u32) -> Self {
        Self {
            lists: (1..=worker_count).map(|id| (id, Vec::new())).collect(),
        }
    }

    /// Wrap explicit per-worker lists. Use [`check_constraints`](Self::check_constraints)
    /// when the lists did not come from the optimizer.
    pub fn from_lists(lists: BTreeMap<WorkerId, Vec<Task>>) -> Self {
        Self { lists }
    }

    pub(crate) fn push(&mut self, worker: WorkerId, task: Task) {
        self.lists.entry(worker).or_default().push(task);
    }

    pub fn worker_count(&self) -> usize {
        self.lists.len()
    }

    /// Worker ids in ascending order.
    pub fn worker_ids(&self) -> impl Iterator<Item = WorkerId> + '_ {
        self.lists.keys().copied()
    }

    /// Tasks for one worker; empty for unknown ids.
    pub fn tasks_for(&self, worker: WorkerId) -> &[Task] {
        self.lists.get(&worker).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (WorkerId, &[Task])> + '_ {
        self.lists.iter().map(|(id, tasks)| (*id, tasks.as_slice()))
    }

    /// Total number of dispatched tasks (the number of results to await).
    pub fn assigned_count(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    /// Sum of payoff over all assigned tasks.
    pub fn total_payoff(&self) -> f64 {
        self.lists.values().flatten().map(|t| t.payoff).sum()
    }

    pub fn loads(&self) -> BTreeMap<WorkerId, usize> {
        self.lists.iter().map(|(id, tasks)| (*id, tasks.len())).collect()
    }

    /// Worker a task was placed on, if any.
    pub fn worker_of(&self, task_name: &str) -> Option<WorkerId> {
        self.lists
            .iter()
            .find(|(_, tasks)| tasks.iter().any(|t| t.name == task_name))
            .map(|(id, _)| *id)
    }

    /// Catalog tasks that were left out of the assignment.
    pub fn unassigned<'a>(&self, catalog: &'a [Task]) -> Vec<&'a Task> {
        let placed: HashSet<&str> = self
            .lists
            .values()
            .flatten()
            .map(|t| t.name.as_str())
            .collect();
        catalog.iter().filter(|t| !placed.contains(t.name.as_str())).collect()
    }

    /// Verify at-most-once placement and per-worker resource exclusivity.
    pub fn check_constraints(&self) -> Result<(), CoreError> {
        let mut placed: HashMap<&str, WorkerId> = HashMap::new();
        for (&worker, tasks) in &self.lists {
            let mut held: HashMap<ResourceId, &str> = HashMap::new();
            for task in tasks {
                if let Some(previous) = placed.insert(task.name.as_str(), worker) {
                    return Err(CoreError::Validation(format!(
                        "Task \"{}\" is assigned to both worker {previous} and worker {worker}",
                        task.name
                    )));
                }
                for &resource in &task.resources {
                    if let Some(holder) = held.insert(resource, task.name.as_str()) {
                        return Err(CoreError::Validation(format!(
                            "Worker {worker} holds resource {resource} \
                             for both \"{holder}\" and \"{}\"",
                            task.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample() -> Assignment {
        let mut assignment = Assignment::empty(3);
        assignment.push(1, Task::new("a", 4.0, [1]));
        assignment.push(1, Task::new("b", 2.0, [2]));
        assignment.push(2, Task::new("c", 1.0, [1]));
        assignment
    }

    #[test]
    fn empty_assignment_lists_every_worker() {
        let assignment = Assignment::empty(3);
        assert_eq!(assignment.worker_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(assignment.assigned_count(), 0);
        assert!(assignment.tasks_for(2).is_empty());
    }

    #[test]
    fn statistics() {
        let assignment = sample();
        assert_eq!(assignment.assigned_count(), 3);
        assert!((assignment.total_payoff() - 7.0).abs() < f64::EPSILON);
        assert_eq!(
            assignment.loads().into_iter().collect::<Vec<_>>(),
            vec![(1, 2), (2, 1), (3, 0)]
        );
        assert_eq!(assignment.worker_of("c"), Some(2));
        assert_eq!(assignment.worker_of("zzz"), None);
    }

    #[test]
    fn unassigned_lists_missing_catalog_tasks() {
        let catalog = vec![
            Task::new("a", 4.0, [1]),
            Task::new("d", 9.0, [3]),
            Task::new("c", 1.0, [1]),
        ];
        let missing = sample().unassigned(&catalog);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "d");
    }

    #[test]
    fn same_resource_on_different_workers_is_allowed() {
        assert!(sample().check_constraints().is_ok());
    }

    #[test]
    fn resource_conflict_on_one_worker_is_rejected() {
        let mut assignment = sample();
        assignment.push(2, Task::new("e", 1.0, [1, 5]));
        assert_matches!(
            assignment.check_constraints(),
            Err(CoreError::Validation(msg)) if msg.contains("resource 1")
        );
    }

    #[test]
    fn double_placement_is_rejected() {
        let mut assignment = sample();
        assignment.push(3, Task::new("a", 4.0, [9]));
        assert_matches!(
            assignment.check_constraints(),
            Err(CoreError::Validation(msg)) if msg.contains("\"a\"")
        );
    }
}
