use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::event::{EventError, EventSink, WorkflowEvent};
use super::function::WorkflowFunction;
use super::step::{StepContext, StepError};
use super::store::{RunStatus, StoreError, WorkflowRun, WorkflowStore};

const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_LEASE_MINUTES: i64 = 10;

/// Exponential backoff applied when a step fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Delay before attempt `attempts + 1`, given `attempts` failures so far.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        let factor = i32::try_from(self.multiplier.saturating_pow(exponent)).unwrap_or(i32::MAX);
        let delay = self
            .initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff);
        delay.min(self.max_backoff)
    }

    pub fn should_retry(&self, error: &StepError, attempts: u32) -> bool {
        error.is_retryable() && attempts < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::seconds(30),
            max_backoff: Duration::hours(1),
            multiplier: 4,
        }
    }
}

/// Counts of what a single [`StepRunner::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub processed: usize,
    pub completed: usize,
    pub sleeping: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Persists events as runs of the subscribed functions and drives those runs forward.
pub struct StepRunner<S> {
    store: Arc<S>,
    functions: BTreeMap<&'static str, Arc<dyn WorkflowFunction>>,
    retry: RetryPolicy,
    batch_size: usize,
    lease: Duration,
    wake: Notify,
}

impl<S> StepRunner<S>
where
    S: WorkflowStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            functions: BTreeMap::new(),
            retry: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            lease: Duration::minutes(DEFAULT_LEASE_MINUTES),
            wake: Notify::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// How long a claimed run may stay `Running` before another worker takes it over.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    pub fn register(&mut self, function: Arc<dyn WorkflowFunction>) {
        info!(
            function = function.id(),
            trigger = function.trigger(),
            "registering workflow function"
        );
        self.functions.insert(function.id(), function);
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn function_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// Requeues runs whose claim is older than the lease, i.e. runs abandoned by a
    /// crashed worker or by a tick that failed halfway. Live claims are left alone.
    pub fn recover(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let requeued = self.store.requeue_stalled_runs(now - self.lease, now)?;
        if requeued > 0 {
            warn!(requeued, "requeued workflow runs with expired claims");
        }
        Ok(requeued)
    }

    /// Executes every run that is due at `now`, up to the batch size.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, StoreError> {
        let mut report = TickReport::default();
        for run in self.store.due_runs(now, self.batch_size)? {
            if !self.store.claim_run(&run.id, now)? {
                debug!(run_id = %run.id, "run claimed elsewhere");
                continue;
            }
            report.processed += 1;
            match self.execute_run(run, now)? {
                Outcome::Completed => report.completed += 1,
                Outcome::Sleeping => report.sleeping += 1,
                Outcome::Retrying => report.retried += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        Ok(report)
    }

    fn execute_run(&self, mut run: WorkflowRun, now: DateTime<Utc>) -> Result<Outcome, StoreError> {
        let Some(function) = self.functions.get(run.function_id.as_str()).cloned() else {
            warn!(run_id = %run.id, function = %run.function_id, "no workflow function registered");
            run.status = RunStatus::Failed;
            run.last_error = Some(format!("unknown function '{}'", run.function_id));
            run.updated_at = now;
            self.store.update_run(&run)?;
            return Ok(Outcome::Failed);
        };

        let run_id = run.id.clone();
        let result = {
            let mut step =
                StepContext::new(self.store.as_ref(), &run_id, run.event.timestamp, now);
            let attempt = AssertUnwindSafe(|| function.execute(&run.event, &mut step));
            panic::catch_unwind(attempt).unwrap_or_else(|payload| {
                Err(StepError::Panicked(panic_message(payload.as_ref())))
            })
        };

        let outcome = match result {
            Ok(output) => {
                info!(run_id = %run.id, function = %run.function_id, "workflow run completed");
                run.status = RunStatus::Completed;
                run.output = Some(output);
                run.last_error = None;
                Outcome::Completed
            }
            Err(StepError::Suspended { until }) => {
                debug!(run_id = %run.id, function = %run.function_id, %until, "workflow run sleeping");
                run.status = RunStatus::Sleeping;
                run.wake_at = until;
                Outcome::Sleeping
            }
            Err(err) => {
                run.attempts += 1;
                run.last_error = Some(err.to_string());
                if self.retry.should_retry(&err, run.attempts) {
                    let delay = self.retry.backoff(run.attempts);
                    warn!(
                        run_id = %run.id,
                        function = %run.function_id,
                        attempts = run.attempts,
                        retry_in_secs = delay.num_seconds(),
                        error = %err,
                        "workflow step failed; retrying"
                    );
                    run.status = RunStatus::Queued;
                    run.wake_at = now + delay;
                    Outcome::Retrying
                } else {
                    error!(
                        run_id = %run.id,
                        function = %run.function_id,
                        attempts = run.attempts,
                        error = %err,
                        "workflow run failed permanently"
                    );
                    run.status = RunStatus::Failed;
                    Outcome::Failed
                }
            }
        };

        run.updated_at = now;
        self.store.update_run(&run)?;
        Ok(outcome)
    }

    /// Background loop: reclaims expired claims and ticks on every poll interval and
    /// whenever a new event arrives.
    pub async fn run_until_cancelled(
        self: Arc<Self>,
        poll_interval: StdDuration,
        shutdown: CancellationToken,
    ) {
        info!(
            functions = self.functions.len(),
            poll_secs = poll_interval.as_secs(),
            "starting workflow step runner"
        );

        loop {
            let runner = Arc::clone(&self);
            let poll = tokio::task::spawn_blocking(move || {
                let now = Utc::now();
                runner.recover(now)?;
                runner.tick(now)
            });
            match poll.await {
                Ok(Ok(report)) if report.processed > 0 => {
                    info!(
                        processed = report.processed,
                        completed = report.completed,
                        sleeping = report.sleeping,
                        retried = report.retried,
                        failed = report.failed,
                        "workflow tick finished"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => error!(error = %err, "workflow tick failed"),
                Err(err) => error!(error = %err, "workflow tick panicked"),
            }

            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = self.wake.notified() => {
                    debug!("workflow runner woken by new event");
                }
                _ = shutdown.cancelled() => {
                    info!("workflow step runner stopping");
                    break;
                }
            }
        }
    }
}

impl<S> EventSink for StepRunner<S>
where
    S: WorkflowStore + 'static,
{
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        let mut scheduled = 0usize;
        for function in self.functions.values() {
            if function.trigger() != event.name {
                continue;
            }
            let run = WorkflowRun::queued(function.id(), event.clone(), event.timestamp);
            self.store.insert_run(&run)?;
            debug!(run_id = %run.id, function = function.id(), event = %event.name, "workflow run queued");
            scheduled += 1;
        }

        if scheduled == 0 {
            debug!(event = %event.name, "no workflow function subscribed to event");
        } else {
            self.wake.notify_one();
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "workflow function panicked".to_string())
}

enum Outcome {
    Completed,
    Sleeping,
    Retrying,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::seconds(30));
        assert_eq!(policy.backoff(2), Duration::seconds(120));
        assert_eq!(policy.backoff(3), Duration::seconds(480));
        assert_eq!(policy.backoff(10), Duration::hours(1));
    }

    #[test]
    fn only_transient_errors_are_retried() {
        let policy = RetryPolicy::default();
        let failed = StepError::Failed {
            step: "send-email".to_string(),
            message: "timeout".to_string(),
        };
        assert!(policy.should_retry(&failed, 1));
        assert!(policy.should_retry(&failed, 3));
        assert!(!policy.should_retry(&failed, 4));
        assert!(!policy.should_retry(&StepError::InvalidPayload("bad".to_string()), 1));
    }
}
