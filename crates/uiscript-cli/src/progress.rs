//! Step-by-step run progress on stderr using indicatif.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::Mutex;
use uiscript::runner::{ProgressCallback, ProgressEvent};
use uiscript::{StepStatus, TestStatus};

/// Progress callback that draws a spinner per step and a line per outcome.
#[derive(Default)]
pub struct VerboseProgress {
    spinner: Mutex<Option<ProgressBar>>,
    total_steps: Mutex<usize>,
}

impl VerboseProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_spinner(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressCallback for VerboseProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                script_name,
                total_steps,
            } => {
                if let Ok(mut ts) = self.total_steps.lock() {
                    *ts = *total_steps;
                }
                let _ = writeln!(
                    std::io::stderr(),
                    "run started: {script_name} ({total_steps} steps)"
                );
            }
            ProgressEvent::StepStarted {
                step_index,
                command,
                description,
            } => {
                let total = self.total_steps.lock().map(|g| *g).unwrap_or(0);
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                let label = description.as_deref().unwrap_or(command);
                pb.set_message(format!("[{}/{total}] {label}", step_index + 1));
                pb.enable_steady_tick(std::time::Duration::from_millis(100));

                if let Ok(mut spinner) = self.spinner.lock() {
                    *spinner = Some(pb);
                }
            }
            ProgressEvent::StepCompleted {
                step_index,
                command,
                status,
                duration_ms,
                error_message,
            } => {
                self.clear_spinner();

                let status_icon = match status {
                    StepStatus::Passed => "\x1b[32m✓\x1b[0m",
                    StepStatus::Failed => "\x1b[31m✗\x1b[0m",
                    StepStatus::Skipped => "\x1b[33m-\x1b[0m",
                    StepStatus::Pending | StepStatus::Running => "\x1b[33m?\x1b[0m",
                };
                let _ = writeln!(
                    std::io::stderr(),
                    "  {status_icon} #{} {command} ({duration_ms}ms)",
                    step_index + 1
                );
                if let Some(message) = error_message {
                    let _ = writeln!(std::io::stderr(), "      {message}");
                }
            }
            ProgressEvent::RunCompleted {
                script_name,
                status,
                duration_ms,
            } => {
                self.clear_spinner();
                let status_msg = match status {
                    TestStatus::Passed => "\x1b[32mpassed\x1b[0m",
                    TestStatus::PartiallyPassed => "\x1b[33mpartially passed\x1b[0m",
                    TestStatus::Failed => "\x1b[31mfailed\x1b[0m",
                    TestStatus::NotRun | TestStatus::Running => "not run",
                };
                let _ = writeln!(
                    std::io::stderr(),
                    "{script_name} {status_msg}: {duration_ms}ms total"
                );
            }
        }
    }
}
