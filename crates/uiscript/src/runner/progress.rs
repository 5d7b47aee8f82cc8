//! Progress callback for reporting run progress.
//!
//! Receives events while a script executes; the CLI uses it to drive a
//! spinner, tests use it to observe step ordering.

use crate::model::{StepStatus, TestStatus};

/// Event emitted during script execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted {
        script_name: String,
        total_steps: usize,
    },
    StepStarted {
        /// Zero-based step index.
        step_index: usize,
        command: String,
        description: Option<String>,
    },
    StepCompleted {
        step_index: usize,
        command: String,
        status: StepStatus,
        duration_ms: u64,
        error_message: Option<String>,
    },
    RunCompleted {
        script_name: String,
        status: TestStatus,
        duration_ms: u64,
    },
}

/// Trait for receiving progress events during execution.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// A progress callback that discards all events.
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// A progress callback that keeps every event it receives.
#[derive(Default)]
pub struct CollectingProgress {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressCallback for CollectingProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
