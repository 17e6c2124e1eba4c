//! Memoised step execution.
//!
//! A workflow function is re-entered from the top every time its run is picked up.
//! Completed steps replay their stored output instead of executing again, and a
//! sleep that has not elapsed suspends the whole run until its wake time.
//!
//! Sleeps are laid out on the run's own timeline, which starts at the triggering
//! event's timestamp: the first sleep wakes `duration` after the event and every
//! later sleep wakes `duration` after the previous one. A late tick therefore
//! never stretches a schedule.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::store::{RunId, StepRecord, StoreError, WorkflowStore};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("run suspended until {until}")]
    Suspended { until: DateTime<Utc> },
    #[error("step '{step}' failed: {message}")]
    Failed { step: String, message: String },
    #[error("step '{step}' output could not be (de)serialized: {message}")]
    Serialization { step: String, message: String },
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
    #[error("workflow function panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StepError {
    /// Whether another attempt of the run could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StepError::Failed { .. } | StepError::Store(_))
    }
}

pub struct StepContext<'a> {
    store: &'a dyn WorkflowStore,
    run_id: &'a RunId,
    timeline: DateTime<Utc>,
    now: DateTime<Utc>,
    occurrences: HashMap<String, u32>,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        store: &'a dyn WorkflowStore,
        run_id: &'a RunId,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            run_id,
            timeline: started_at,
            now,
            occurrences: HashMap::new(),
        }
    }

    pub fn run_id(&self) -> &RunId {
        self.run_id
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Repeated names inside a loop get `name`, `name:2`, `name:3`, ... as keys.
    fn key_for(&mut self, name: &str) -> String {
        let count = self.occurrences.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 {
            name.to_string()
        } else {
            format!("{name}:{count}")
        }
    }

    /// Durable sleep. Returns `Ok(())` once the wake time has passed.
    pub fn sleep(&mut self, name: &str, duration: Duration) -> Result<(), StepError> {
        let key = self.key_for(name);
        let wake_at = match self.store.step(self.run_id, &key)? {
            Some(record) if record.is_complete() => {
                if let Some(wake_at) = record.wake_at {
                    self.timeline = wake_at;
                }
                return Ok(());
            }
            Some(record) => record.wake_at.unwrap_or(self.timeline + duration),
            None => {
                let wake_at = self.timeline + duration;
                self.store
                    .save_step(self.run_id, &StepRecord::sleeping(&key, wake_at))?;
                wake_at
            }
        };

        if wake_at <= self.now {
            self.store
                .save_step(self.run_id, &StepRecord::woke(&key, wake_at, self.now))?;
            self.timeline = wake_at;
            Ok(())
        } else {
            Err(StepError::Suspended { until: wake_at })
        }
    }

    /// Executes `work` at most once per successful completion and replays its output
    /// on later entries. A failure is not recorded, so the step runs again on retry.
    pub fn run<T, E, F>(&mut self, name: &str, work: F) -> Result<T, StepError>
    where
        T: Serialize + DeserializeOwned,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        let key = self.key_for(name);
        if let Some(record) = self.store.step(self.run_id, &key)? {
            if record.is_complete() {
                let output = record.output.unwrap_or(Value::Null);
                return serde_json::from_value(output).map_err(|err| StepError::Serialization {
                    step: key,
                    message: err.to_string(),
                });
            }
        }

        let value = work().map_err(|err| StepError::Failed {
            step: key.clone(),
            message: err.to_string(),
        })?;
        let output = serde_json::to_value(&value).map_err(|err| StepError::Serialization {
            step: key.clone(),
            message: err.to_string(),
        })?;
        self.store
            .save_step(self.run_id, &StepRecord::completed(&key, output, self.now))?;
        Ok(value)
    }
}
