//! Full in-process batches: catalog file → optimizer → workers → summary.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use fleet_coordinator::{run_batch, FleetConfig, TaskOutcome};
use fleet_core::{CoreError, SolverConfig, TaskCatalog};
use fleet_events::{task_topic, MessageChannel, TopicBus};
use fleet_worker::WorkCost;

fn config(worker_count: u32, failure_probability: f64) -> FleetConfig {
    FleetConfig {
        worker_count,
        failure_probabilities: vec![failure_probability; worker_count as usize],
        results_deadline: Duration::from_secs(10),
        solver: SolverConfig {
            time_limit: Duration::from_secs(1),
            ..SolverConfig::default()
        },
        work_cost: WorkCost::Fixed(Duration::ZERO),
        rng_seed: Some(5),
        ..FleetConfig::default()
    }
}

fn catalog_file(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

fn bus() -> (Arc<TopicBus>, Arc<dyn MessageChannel>) {
    let bus = Arc::new(TopicBus::default());
    let channel: Arc<dyn MessageChannel> = bus.clone();
    (bus, channel)
}

// ---------------------------------------------------------------------------
// Test: single worker, two tasks sharing a resource
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_worker_picks_higher_payoff_of_conflicting_pair() {
    let file = catalog_file(
        r#"[
            {"name": "A", "payoff": 10, "resources": [1]},
            {"name": "B", "payoff": "5", "resources": [1]}
        ]"#,
    );
    let catalog = TaskCatalog::from_path(file.path()).unwrap();
    let (_bus, channel) = bus();

    let report = run_batch(&config(1, 0.0), catalog, channel).await.unwrap();

    assert_eq!(report.assignment.tasks_for(1).len(), 1);
    assert_eq!(report.assignment.tasks_for(1)[0].name, "A");
    assert_eq!(report.summary.tasks_dispatched, 1);
    assert_eq!(report.summary.theoretical_payoff, 10.0);
    assert_eq!(report.summary.achieved_payoff, 10.0);
    assert_eq!(report.summary.outcome_of("A"), Some(TaskOutcome::Succeeded));
    assert_eq!(report.summary.outcome_of("B"), None);
}

// ---------------------------------------------------------------------------
// Test: independent tasks are balanced and all succeed
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn independent_tasks_are_spread_and_completed() {
    let catalog = TaskCatalog::from_json_str(
        r#"[
            {"name": "t1", "payoff": 1, "resources": [1]},
            {"name": "t2", "payoff": 1, "resources": [2]},
            {"name": "t3", "payoff": 1, "resources": [3]},
            {"name": "t4", "payoff": 1, "resources": [4]}
        ]"#,
    )
    .unwrap();
    let (_bus, channel) = bus();

    let report = run_batch(&config(2, 0.0), catalog, channel).await.unwrap();

    let loads = report.assignment.loads();
    assert!(loads[&1].abs_diff(loads[&2]) <= 1);
    assert_eq!(report.summary.achieved_payoff, 4.0);
    assert!(report.summary.is_complete());
    assert_eq!(report.workers.len(), 2);
}

// ---------------------------------------------------------------------------
// Test: certain failure loses every payoff
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certain_failure_loses_all_payoff() {
    let catalog = TaskCatalog::from_json_str(
        r#"[
            {"name": "A", "payoff": 3, "resources": []},
            {"name": "B", "payoff": 4, "resources": []}
        ]"#,
    )
    .unwrap();
    let (_bus, channel) = bus();

    let report = run_batch(&config(2, 1.0), catalog, channel).await.unwrap();
    assert_eq!(report.summary.achieved_payoff, 0.0);
    assert_eq!(report.summary.failed_payoff, 7.0);
    assert_eq!(report.summary.lost_payoff, 7.0);
}

// ---------------------------------------------------------------------------
// Test: payoff monotonicity under random failures
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn achieved_never_exceeds_theoretical_or_catalog_total() {
    let json = serde_json::to_string(
        &(0..12)
            .map(|i| {
                serde_json::json!({"name": format!("t{i}"), "payoff": i + 1, "resources": [i % 4]})
            })
            .collect::<Vec<_>>(),
    )
    .unwrap();
    let catalog = TaskCatalog::from_json_str(&json).unwrap();
    let catalog_total = catalog.total_payoff();
    let (_bus, channel) = bus();

    let report = run_batch(&config(3, 0.5), catalog, channel).await.unwrap();
    let summary = &report.summary;
    assert!(summary.achieved_payoff <= summary.theoretical_payoff);
    assert!(summary.theoretical_payoff <= catalog_total);
    let accounted = summary.achieved_payoff + summary.lost_payoff;
    assert!((accounted - summary.theoretical_payoff).abs() < 1e-9);
    report.assignment.check_constraints().unwrap();
}

// ---------------------------------------------------------------------------
// Test: fatal conditions publish nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_workers_with_tasks_is_infeasible() {
    let catalog =
        TaskCatalog::from_json_str(r#"[{"name": "A", "payoff": 1, "resources": [1]}]"#).unwrap();
    let (_bus, channel) = bus();
    let result = run_batch(&config(0, 0.0), catalog, channel).await;
    assert_matches!(result, Err(CoreError::Infeasible(_)));
}

#[tokio::test]
async fn exhausted_search_budget_publishes_nothing() {
    let catalog =
        TaskCatalog::from_json_str(r#"[{"name": "A", "payoff": 1, "resources": [1]}]"#).unwrap();
    let (bus, channel) = bus();
    let mut config = config(1, 0.0);
    config.solver.time_limit = Duration::ZERO;

    let result = run_batch(&config, catalog, channel).await;
    assert_matches!(result, Err(CoreError::Infeasible(_)));
    assert_eq!(bus.backlog_len(&task_topic(1)).await, 0);
    assert_eq!(bus.subscriber_count(&task_topic(1)).await, 0);
}

#[tokio::test]
async fn mismatched_probability_list_is_rejected() {
    let catalog = TaskCatalog::from_json_str("[]").unwrap();
    let (_bus, channel) = bus();
    let mut config = config(2, 0.0);
    config.failure_probabilities = vec![0.1];

    let result = run_batch(&config, catalog, channel).await;
    assert_matches!(result, Err(CoreError::Validation(_)));
}

#[test]
fn malformed_catalog_reports_record_index() {
    let file = catalog_file(
        r#"[{"name": "A", "payoff": 1, "resources": [1]}, {"name": "B", "resources": [1]}]"#,
    );
    assert_matches!(
        TaskCatalog::from_path(file.path()),
        Err(CoreError::MalformedTask { index: 1, .. })
    );
}
