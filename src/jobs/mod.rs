// src/jobs/mod.rs

//! Background job supervision.
//!
//! A [`JobHandle`] owns one named job slot: its progress, message and
//! collected records live behind a mutex that serializes status polls
//! against the crawl's callbacks. The orchestrator never sees this
//! module; it only talks to the sink interface the handle implements.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::harvest::HarvestSink;
use crate::models::Record;

#[derive(Debug, Default)]
struct JobState {
    running: bool,
    progress: usize,
    total: usize,
    message: String,
    results: Vec<Record>,
    cancel: Option<CancellationToken>,
}

/// Snapshot returned by status polls.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub running: bool,
    pub progress: usize,
    pub total: usize,
    pub message: String,
    pub count: usize,
}

/// One named job slot; at most one run is active at a time.
#[derive(Clone)]
pub struct JobHandle {
    name: String,
    state: Arc<Mutex<JobState>>,
}

impl JobHandle {
    /// Create an idle job slot.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(JobState::default())),
        }
    }

    /// Slot name, used in conflict errors and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Claim the slot for a new run.
    ///
    /// Rejects with [`AppError::JobRunning`] while a run is active;
    /// otherwise resets the state and returns a fresh cancellation
    /// token for the run.
    pub fn begin(&self, total_hint: usize) -> Result<CancellationToken> {
        let mut state = self.lock();
        if state.running {
            return Err(AppError::JobRunning(self.name.clone()));
        }

        let token = CancellationToken::new();
        state.running = true;
        state.progress = 0;
        state.total = total_hint;
        state.message = "Starting...".to_string();
        state.results.clear();
        state.cancel = Some(token.clone());
        Ok(token)
    }

    /// Request a cooperative stop. No-op when the slot is idle.
    pub fn stop(&self) {
        let mut state = self.lock();
        if state.running {
            if let Some(token) = &state.cancel {
                token.cancel();
            }
            state.message = "Stopping...".to_string();
        }
    }

    /// Finish the run, replacing the incrementally collected records
    /// with the final (possibly detail-enriched) sequence.
    pub fn complete(&self, results: Vec<Record>) {
        let mut state = self.lock();
        let cancelled = state
            .cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false);
        state.message = if cancelled {
            format!("Stopped: kept {} records", results.len())
        } else {
            format!("Done! {} records collected", results.len())
        };
        state.results = results;
        state.running = false;
        state.cancel = None;
    }

    /// Status snapshot for polling.
    pub fn status(&self) -> JobStatus {
        let state = self.lock();
        JobStatus {
            running: state.running,
            progress: state.progress,
            total: state.total,
            message: state.message.clone(),
            count: state.results.len(),
        }
    }

    /// Copy of the collected records.
    pub fn results(&self) -> Vec<Record> {
        self.lock().results.clone()
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().expect("job state lock poisoned")
    }
}

impl HarvestSink for JobHandle {
    fn progress(&self, current: usize, total: usize, message: &str) {
        let mut state = self.lock();
        state.progress = current;
        state.total = total;
        state.message = message.to_string();
    }

    fn records(&self, batch: Vec<Record>) {
        self.lock().results.extend(batch);
    }
}
