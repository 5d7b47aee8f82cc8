use crate::model::script::Step;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Overall outcome of a script run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    #[default]
    NotRun,
    Running,
    Passed,
    Failed,
    PartiallyPassed,
}

/// Outcome of a single step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

/// Execution record for one step, carrying a snapshot of the step as declared.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_index: usize,
    pub step: Step,
    pub status: StepStatus,
    #[serde(default)]
    pub actual_value: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl StepResult {
    /// A step that has just started running.
    #[must_use]
    pub fn running(step_index: usize, step: Step) -> Self {
        let now = Utc::now();
        Self {
            step_index,
            step,
            status: StepStatus::Running,
            actual_value: None,
            error_message: None,
            start_time: now,
            end_time: now,
        }
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        elapsed_ms(self.start_time, self.end_time)
    }
}

/// Result of one script run.
///
/// Pass/fail/skip counts and the duration are derived from `step_results` on
/// demand. They are written into the serialized document for readers but are
/// never read back.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub script_name: String,
    pub status: TestStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub step_results: Vec<StepResult>,
    pub total_steps: usize,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

impl TestResult {
    /// A result in the `Running` state, started now.
    #[must_use]
    pub fn started(script_name: impl Into<String>, total_steps: usize) -> Self {
        let now = Utc::now();
        Self {
            script_name: script_name.into(),
            status: TestStatus::Running,
            start_time: now,
            end_time: now,
            step_results: Vec::new(),
            total_steps,
            error_message: None,
            screenshots: Vec::new(),
        }
    }

    #[must_use]
    pub fn passed_steps(&self) -> usize {
        self.count(StepStatus::Passed)
    }

    #[must_use]
    pub fn failed_steps(&self) -> usize {
        self.count(StepStatus::Failed)
    }

    #[must_use]
    pub fn skipped_steps(&self) -> usize {
        self.count(StepStatus::Skipped)
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        elapsed_ms(self.start_time, self.end_time)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.step_results
            .iter()
            .filter(|result| result.status == status)
            .count()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestResultDocument<'a> {
    script_name: &'a str,
    status: TestStatus,
    start_time: &'a DateTime<Utc>,
    end_time: &'a DateTime<Utc>,
    duration_ms: u64,
    step_results: &'a [StepResult],
    total_steps: usize,
    passed_steps: usize,
    failed_steps: usize,
    skipped_steps: usize,
    error_message: &'a Option<String>,
    screenshots: &'a [String],
}

impl Serialize for TestResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TestResultDocument {
            script_name: &self.script_name,
            status: self.status,
            start_time: &self.start_time,
            end_time: &self.end_time,
            duration_ms: self.duration_ms(),
            step_results: &self.step_results,
            total_steps: self.total_steps,
            passed_steps: self.passed_steps(),
            failed_steps: self.failed_steps(),
            skipped_steps: self.skipped_steps(),
            error_message: &self.error_message,
            screenshots: &self.screenshots,
        }
        .serialize(serializer)
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}
