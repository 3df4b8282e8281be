//! Publish per-worker task lists and gather results under a deadline.
//!
//! The coordinator owns the only receiver of the results subscription for
//! the length of one [`Coordinator::run`]; workers only ever push into it.

use std::sync::Arc;
use std::time::Duration;

use fleet_core::{Assignment, CoreError, TaskResult};
use fleet_events::messages::{decode_result, encode_end_of_stream, encode_task_list};
use fleet_events::retry::{DEFAULT_PUBLISH_ATTEMPTS, DEFAULT_PUBLISH_BACKOFF};
use fleet_events::{
    publish_with_retry, task_topic, MessageChannel, PublishRetry, Subscription, RESULTS_TOPIC,
};
use tokio::time::Instant;

use crate::summary::{CollectionWindow, Summary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Attempts per publish before giving up with `ChannelUnavailable`.
    pub publish_attempts: u32,
    pub publish_backoff: Duration,
    /// Follow every list with the end-of-stream sentinel.
    pub send_end_of_stream: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            publish_attempts: DEFAULT_PUBLISH_ATTEMPTS,
            publish_backoff: DEFAULT_PUBLISH_BACKOFF,
            send_end_of_stream: true,
        }
    }
}

pub struct Coordinator {
    channel: Arc<dyn MessageChannel>,
    options: DispatchOptions,
}

impl Coordinator {
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self::with_options(channel, DispatchOptions::default())
    }

    pub fn with_options(channel: Arc<dyn MessageChannel>, options: DispatchOptions) -> Self {
        Self { channel, options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Dispatch `assignment` and wait up to `deadline` for its results.
    ///
    /// A shortfall is not an error: it shows up as missing results in the
    /// returned [`Summary`]. Only channel failures while subscribing or
    /// publishing are fatal.
    pub async fn run(
        &self,
        assignment: &Assignment,
        deadline: Duration,
    ) -> Result<Summary, CoreError> {
        self.channel.discard_pending(RESULTS_TOPIC).await?;
        let mut subscription = self.channel.subscribe(RESULTS_TOPIC).await?;

        // Nothing of this batch is published yet, so anything queued belongs
        // to an earlier one.
        let mut stale = 0;
        while subscription.try_recv().is_some() {
            stale += 1;
        }
        if stale > 0 {
            tracing::debug!(stale, "Discarded results left over from an earlier batch");
        }

        for (worker_id, tasks) in assignment.iter() {
            let topic = task_topic(worker_id);
            self.channel.discard_pending(&topic).await?;
            self.publish(&topic, encode_task_list(tasks)?).await?;
            if self.options.send_end_of_stream {
                self.publish(&topic, encode_end_of_stream()).await?;
            }
            tracing::info!(worker_id, %topic, tasks = tasks.len(), "Published task list");
        }

        let expected = assignment.assigned_count();
        if expected == 0 {
            tracing::info!("Nothing dispatched, skipping result collection");
            return Ok(Summary::compute(assignment, &[], CollectionWindow::empty()));
        }

        let (results, window) = collect(subscription, expected, deadline).await;

        let summary = Summary::compute(assignment, &results, window);
        if summary.has_shortfall() {
            tracing::warn!(
                expected,
                collected = summary.results_received,
                missing = summary.missing_results,
                without_result = summary.tasks_without_result,
                timed_out = summary.window.timed_out,
                "Result shortfall"
            );
        }
        tracing::info!(
            expected,
            collected = summary.results_received,
            achieved_payoff = summary.achieved_payoff,
            lost_payoff = summary.lost_payoff,
            "Collection finished"
        );
        Ok(summary)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), CoreError> {
        let retry = PublishRetry {
            attempts: self.options.publish_attempts,
            backoff: self.options.publish_backoff,
        };
        publish_with_retry(self.channel.as_ref(), topic, payload, retry).await?;
        Ok(())
    }
}

/// Drain `subscription` until `expected` results arrive or `deadline`
/// passes, then drop it. Later arrivals are discarded by the next run.
async fn collect(
    mut subscription: Subscription,
    expected: usize,
    deadline: Duration,
) -> (Vec<TaskResult>, CollectionWindow) {
    let started_at = chrono::Utc::now();
    // A deadline past the clock's range means waiting until every result is in.
    let deadline_at = Instant::now().checked_add(deadline);
    let mut results: Vec<TaskResult> = Vec::with_capacity(expected);
    let mut invalid_payloads = 0;
    let mut timed_out = false;

    while results.len() < expected {
        let next = match deadline_at {
            Some(at) => tokio::time::timeout_at(at, subscription.recv()).await,
            None => Ok(subscription.recv().await),
        };
        match next {
            Err(_) => {
                timed_out = true;
                break;
            }
            Ok(None) => {
                tracing::warn!("Results subscription closed by the channel");
                break;
            }
            Ok(Some(payload)) => match decode_result(&payload) {
                Ok(result) => {
                    tracing::debug!(
                        worker_id = result.worker_id,
                        task = %result.task_name,
                        success = result.success,
                        collected = results.len() + 1,
                        expected,
                        "Result received"
                    );
                    results.push(result);
                }
                Err(e) => {
                    invalid_payloads += 1;
                    tracing::warn!(error = %e, "Dropping undecodable result");
                }
            },
        }
    }
    drop(subscription);

    let window = CollectionWindow {
        started_at,
        finished_at: chrono::Utc::now(),
        timed_out,
        invalid_payloads,
    };
    (results, window)
}
