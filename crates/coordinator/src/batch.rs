//! One complete batch in a single process: solve, start workers, dispatch,
//! collect, stop workers.

use std::sync::Arc;

use fleet_core::{Assignment, CoreError, Optimizer, TaskCatalog};
use fleet_events::MessageChannel;
use fleet_worker::{WorkerExecutor, WorkerReport};
use tokio_util::sync::CancellationToken;

use crate::config::FleetConfig;
use crate::dispatch::{Coordinator, DispatchOptions};
use crate::summary::Summary;

/// Everything a batch produced.
#[derive(Debug)]
pub struct BatchReport {
    pub assignment: Assignment,
    pub summary: Summary,
    /// One report per worker that exited cleanly. Workers still running
    /// when collection ends are cancelled.
    pub workers: Vec<WorkerReport>,
}

/// Run `catalog` through the optimizer, then dispatch it to freshly started
/// in-process workers over `channel`.
///
/// Every fatal condition (bad worker settings, infeasible assignment) is
/// detected before anything is published.
pub async fn run_batch(
    config: &FleetConfig,
    catalog: TaskCatalog,
    channel: Arc<dyn MessageChannel>,
) -> Result<BatchReport, CoreError> {
    run_batch_with_options(config, catalog, channel, DispatchOptions::default()).await
}

pub async fn run_batch_with_options(
    config: &FleetConfig,
    catalog: TaskCatalog,
    channel: Arc<dyn MessageChannel>,
    options: DispatchOptions,
) -> Result<BatchReport, CoreError> {
    let executors = config
        .worker_configs()?
        .into_iter()
        .map(WorkerExecutor::new)
        .collect::<Result<Vec<_>, CoreError>>()?;

    let optimizer = Optimizer::new(config.solver.clone());
    let worker_count = config.worker_count;
    let tasks = catalog.into_tasks();
    let assignment = tokio::task::spawn_blocking(move || optimizer.solve(&tasks, worker_count))
        .await
        .map_err(|e| CoreError::Internal(format!("Optimizer task failed: {e}")))??;
    assignment.check_constraints()?;

    tracing::info!(
        assigned = assignment.assigned_count(),
        payoff = assignment.total_payoff(),
        workers = worker_count,
        "Assignment ready for dispatch"
    );

    let cancel = CancellationToken::new();
    let handles: Vec<_> = executors
        .into_iter()
        .map(|executor| executor.spawn(Arc::clone(&channel), cancel.clone()))
        .collect();

    let coordinator = Coordinator::with_options(Arc::clone(&channel), options);
    let outcome = coordinator.run(&assignment, config.results_deadline).await;

    // Workers still running past collection have nothing left that counts.
    cancel.cancel();
    let mut workers = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Ok(report)) => workers.push(report),
            Ok(Err(e)) => tracing::warn!(error = %e, "Worker exited with an error"),
            Err(e) => tracing::warn!(error = %e, "Worker task panicked or was aborted"),
        }
    }

    let summary = outcome?;
    Ok(BatchReport {
        assignment,
        summary,
        workers,
    })
}
