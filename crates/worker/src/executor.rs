//! Worker receive loop.
//!
//! Subscribes to the worker's dispatch topic and handles each message in
//! arrival order until the end-of-stream sentinel, cancellation, or the
//! channel shutting the topic down. Every task in a list yields exactly one
//! published result.

use std::sync::Arc;

use fleet_core::{CoreError, Task, TaskResult, WorkerId};
use fleet_events::messages::{decode_dispatch, encode_result};
use fleet_events::{publish_with_retry, task_topic, DispatchMessage, MessageChannel, RESULTS_TOPIC};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

/// Why the receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
    ChannelClosed,
}

/// Counters collected over one run of the receive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: WorkerId,
    pub lists_received: usize,
    pub tasks_executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub invalid_payloads: usize,
    pub publish_failures: usize,
    pub stop_reason: StopReason,
}

impl WorkerReport {
    fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            lists_received: 0,
            tasks_executed: 0,
            succeeded: 0,
            failed: 0,
            invalid_payloads: 0,
            publish_failures: 0,
            stop_reason: StopReason::ChannelClosed,
        }
    }
}

pub struct WorkerExecutor {
    config: WorkerConfig,
    rng: StdRng,
}

impl WorkerExecutor {
    pub fn new(config: WorkerConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run the receive loop on its own tokio task.
    pub fn spawn(
        self,
        channel: Arc<dyn MessageChannel>,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<WorkerReport, CoreError>> {
        tokio::spawn(self.run(channel, cancel))
    }

    /// Subscribe to this worker's topic and process messages until stopped.
    ///
    /// Fails only when the subscription itself cannot be set up; anything
    /// that goes wrong afterwards is logged and counted in the report.
    pub async fn run(
        mut self,
        channel: Arc<dyn MessageChannel>,
        cancel: CancellationToken,
    ) -> Result<WorkerReport, CoreError> {
        let worker_id = self.config.worker_id;
        let topic = task_topic(worker_id);
        let mut subscription = channel.subscribe(&topic).await?;
        let mut report = WorkerReport::new(worker_id);

        tracing::info!(
            worker_id,
            %topic,
            failure_probability = self.config.failure_probability,
            "Worker started"
        );

        loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => {
                    report.stop_reason = StopReason::Cancelled;
                    break;
                }
                payload = subscription.recv() => payload,
            };

            let Some(payload) = payload else {
                report.stop_reason = StopReason::ChannelClosed;
                break;
            };

            match decode_dispatch(&payload) {
                Ok(DispatchMessage::EndOfStream) => {
                    report.stop_reason = StopReason::EndOfStream;
                    break;
                }
                Ok(DispatchMessage::Tasks(tasks)) => {
                    report.lists_received += 1;
                    tracing::info!(worker_id, tasks = tasks.len(), "Task list received");
                    if !self.execute_list(channel.as_ref(), tasks, &cancel, &mut report).await {
                        report.stop_reason = StopReason::Cancelled;
                        break;
                    }
                }
                Err(e) => {
                    report.invalid_payloads += 1;
                    tracing::warn!(worker_id, error = %e, "Dropping undecodable task list");
                }
            }
        }

        tracing::info!(
            worker_id,
            executed = report.tasks_executed,
            succeeded = report.succeeded,
            failed = report.failed,
            stop_reason = ?report.stop_reason,
            "Worker stopped"
        );
        Ok(report)
    }

    /// Execute one list in order. Returns `false` if cancelled part way.
    async fn execute_list(
        &mut self,
        channel: &dyn MessageChannel,
        tasks: Vec<Task>,
        cancel: &CancellationToken,
        report: &mut WorkerReport,
    ) -> bool {
        let worker_id = self.config.worker_id;

        for task in tasks {
            let work = self.config.work_cost.duration_for(&task);
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(work) => {}
            }

            let success = !self.rng.random_bool(self.config.failure_probability);
            report.tasks_executed += 1;
            if success {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
            tracing::debug!(worker_id, task = %task.name, success, "Task executed");

            let result = TaskResult::new(worker_id, task, success);
            let published = match encode_result(&result) {
                Ok(payload) => {
                    let retry = self.config.publish_retry;
                    publish_with_retry(channel, RESULTS_TOPIC, payload, retry)
                        .await
                        .map_err(CoreError::from)
                }
                Err(e) => Err(e),
            };
            if let Err(e) = published {
                report.publish_failures += 1;
                tracing::warn!(
                    worker_id,
                    task = %result.task_name,
                    error = %e,
                    "Failed to publish result"
                );
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
