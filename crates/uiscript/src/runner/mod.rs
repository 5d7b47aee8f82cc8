//! Script execution.
//!
//! A [`Runner`] walks a script's steps in order against one automation
//! backend. Each step has its parameters resolved against the live variable
//! store, is dispatched by type and command, and produces a [`StepResult`].
//! A failed step stops the run unless it sets `continueOnFailure`; steps that
//! were never reached do not appear in the result.

pub mod actions;
pub mod progress;

use crate::assertions::{self, AssertionHandler};
use crate::automation::AutomationBackend;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{Script, Step, StepResult, StepStatus, StepType, TestResult, TestStatus};
use crate::variables::{ResolvedParams, VariableStore};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

pub use actions::{selector_from_params, ActionHandler, ElementCache, StepContext};
pub use progress::{CollectingProgress, NoopProgress, ProgressCallback, ProgressEvent};

#[derive(Clone)]
pub struct RunnerOptions {
    /// Duration of a `wait` step without a `duration` param.
    pub default_wait_ms: u64,
    /// Timeout of `wait_for_element` without a `timeoutMs` param.
    pub element_timeout_ms: u64,
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for RunnerOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            default_wait_ms: config.default_wait_ms,
            element_timeout_ms: config.element_timeout_ms,
            progress: None,
        }
    }
}

impl RunnerOptions {
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl fmt::Debug for RunnerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerOptions")
            .field("default_wait_ms", &self.default_wait_ms)
            .field("element_timeout_ms", &self.element_timeout_ms)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Outcome of dispatching one step, before it is turned into a [`StepResult`].
enum Verdict {
    Passed { actual: Option<String> },
    Failed { actual: String, message: String },
}

/// Executes scripts against a borrowed automation backend.
pub struct Runner<'b, B: AutomationBackend> {
    backend: &'b mut B,
    options: RunnerOptions,
    elements: ElementCache<B::Element>,
    variables: VariableStore,
    actions: HashMap<String, ActionHandler<B>>,
    assertions: HashMap<String, AssertionHandler<B>>,
}

impl<'b, B: AutomationBackend> Runner<'b, B> {
    pub fn new(backend: &'b mut B, options: RunnerOptions) -> Self {
        let mut runner = Self {
            backend,
            options,
            elements: ElementCache::default(),
            variables: VariableStore::new(),
            actions: HashMap::new(),
            assertions: HashMap::new(),
        };
        for (name, handler) in actions::default_actions::<B>() {
            runner.register_action(name, handler);
        }
        for (name, handler) in assertions::default_assertions::<B>() {
            runner.register_assertion(name, handler);
        }
        runner
    }

    /// Add or replace an action command. Names match case-insensitively.
    pub fn register_action(&mut self, name: &str, handler: ActionHandler<B>) {
        self.actions.insert(name.to_ascii_lowercase(), handler);
    }

    /// Add or replace an assertion command. Names match case-insensitively.
    pub fn register_assertion(&mut self, name: &str, handler: AssertionHandler<B>) {
        self.assertions.insert(name.to_ascii_lowercase(), handler);
    }

    /// Variables as they stood at the end of the last run.
    #[must_use]
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Run `script`, with `overrides` taking precedence over its declared variables.
    ///
    /// Step failures are recorded in the returned result rather than returned
    /// as errors.
    pub fn run(&mut self, script: &Script, overrides: Option<&BTreeMap<String, String>>) -> TestResult {
        self.elements.clear();
        self.variables = VariableStore::seeded(&script.variables, overrides);

        let mut result = TestResult::started(script.name.clone(), script.steps.len());
        info!(script = %script.name, steps = script.steps.len(), "starting script run");
        self.emit(ProgressEvent::RunStarted {
            script_name: script.name.clone(),
            total_steps: script.steps.len(),
        });

        for (index, step) in script.steps.iter().enumerate() {
            self.emit(ProgressEvent::StepStarted {
                step_index: index,
                command: step.command.clone(),
                description: step.description.clone(),
            });
            let step_result = self.execute_step(index, step, &mut result.screenshots);
            self.emit(ProgressEvent::StepCompleted {
                step_index: index,
                command: step.command.clone(),
                status: step_result.status,
                duration_ms: step_result.duration_ms(),
                error_message: step_result.error_message.clone(),
            });

            let abort = step_result.status == StepStatus::Failed && !step.continue_on_failure;
            let error = step_result.error_message.clone();
            result.step_results.push(step_result);
            if abort {
                info!(script = %script.name, step = index, "stopping run after failed step");
                result.error_message = error;
                break;
            }
        }

        result.end_time = Utc::now();
        result.status = determine_status(&result);
        info!(
            script = %script.name,
            status = ?result.status,
            passed = result.passed_steps(),
            failed = result.failed_steps(),
            "script run finished"
        );
        self.emit(ProgressEvent::RunCompleted {
            script_name: script.name.clone(),
            status: result.status,
            duration_ms: result.duration_ms(),
        });
        result
    }

    fn execute_step(&mut self, index: usize, step: &Step, screenshots: &mut Vec<String>) -> StepResult {
        let mut record = StepResult::running(index, step.clone());
        let params = self.variables.resolve_params(&step.params);
        debug!(step = index, step_type = %step.step_type, command = %step.command, "executing step");

        match self.dispatch(step, &params, screenshots) {
            Ok(Verdict::Passed { actual }) => {
                record.status = StepStatus::Passed;
                record.actual_value = actual;
            }
            Ok(Verdict::Failed { actual, message }) => {
                record.status = StepStatus::Failed;
                record.actual_value = Some(actual);
                record.error_message = Some(message);
            }
            Err(err) => {
                record.status = StepStatus::Failed;
                record.error_message = Some(err.message);
            }
        }
        record.end_time = Utc::now();
        debug!(step = index, status = ?record.status, "step finished");
        record
    }

    fn dispatch(
        &mut self,
        step: &Step,
        params: &ResolvedParams,
        screenshots: &mut Vec<String>,
    ) -> EngineResult<Verdict> {
        match &step.step_type {
            StepType::Action => {
                let handler = *self
                    .actions
                    .get(&step.command.to_ascii_lowercase())
                    .ok_or_else(|| {
                        EngineError::invalid_argument(format!("Unknown action command: {}", step.command))
                    })?;
                let value = {
                    let mut ctx = StepContext {
                        backend: &mut *self.backend,
                        elements: &mut self.elements,
                        options: &self.options,
                        screenshots,
                    };
                    handler(&mut ctx, params)?
                };
                if let (Some(variable), Some(value)) = (step.store_result.as_deref(), value) {
                    if !variable.is_empty() {
                        debug!(variable, value = %value, "storing step result");
                        self.variables.set(variable, value);
                    }
                }
                Ok(Verdict::Passed { actual: None })
            }
            StepType::Assertion => {
                let handler = *self
                    .assertions
                    .get(&step.command.to_ascii_lowercase())
                    .ok_or_else(|| {
                        EngineError::invalid_argument(format!(
                            "Unknown assertion command: {}",
                            step.command
                        ))
                    })?;
                let observation = {
                    let mut ctx = StepContext {
                        backend: &mut *self.backend,
                        elements: &mut self.elements,
                        options: &self.options,
                        screenshots,
                    };
                    handler(&mut ctx, params)?
                };
                let matched = match assertions::evaluate(&observation, step.expected.as_ref()) {
                    Ok(matched) => matched,
                    Err(err) => {
                        return Ok(Verdict::Failed {
                            actual: observation.actual,
                            message: err.message,
                        })
                    }
                };
                if matched {
                    Ok(Verdict::Passed {
                        actual: Some(observation.actual),
                    })
                } else {
                    let message = step.message.clone().unwrap_or_else(|| {
                        assertions::failure_message(
                            &step.command,
                            step.expected.as_ref(),
                            &observation.actual,
                        )
                    });
                    Ok(Verdict::Failed {
                        actual: observation.actual,
                        message,
                    })
                }
            }
            StepType::Wait => {
                let duration = params.u64_or("duration", self.options.default_wait_ms);
                thread::sleep(Duration::from_millis(duration));
                Ok(Verdict::Passed { actual: None })
            }
            StepType::Other(other) => Err(EngineError::invalid_argument(format!(
                "Unknown step type: {other}"
            ))),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = &self.options.progress {
            progress.on_progress(&event);
        }
    }
}

/// Overall status from the recorded step outcomes.
///
/// Mixed outcomes are `PartiallyPassed`; any failure alone is `Failed`; a
/// run whose every declared step passed is `Passed`. Anything else, including
/// a script with no steps, is `NotRun`.
#[must_use]
pub fn determine_status(result: &TestResult) -> TestStatus {
    let passed = result.passed_steps();
    let failed = result.failed_steps();
    if failed > 0 && passed > 0 {
        TestStatus::PartiallyPassed
    } else if failed > 0 {
        TestStatus::Failed
    } else if passed == result.total_steps && passed > 0 {
        TestStatus::Passed
    } else {
        TestStatus::NotRun
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::automation::{ElementSpec, SimulatedDesktop};
    use serde_json::json;

    fn desktop() -> SimulatedDesktop {
        SimulatedDesktop::new()
            .with_element(ElementSpec::with_automation_id("okButton").named("OK"))
            .with_element(ElementSpec::with_automation_id("status").value("ready"))
    }

    #[test]
    fn empty_script_is_not_run() {
        let mut backend = desktop();
        let mut runner = Runner::new(&mut backend, RunnerOptions::default());
        let result = runner.run(&Script::new("empty", ""), None);
        assert_eq!(result.status, TestStatus::NotRun);
        assert_eq!(result.total_steps, 0);
        assert!(result.step_results.is_empty());
    }

    #[test]
    fn commands_and_types_match_case_insensitively() {
        let mut backend = desktop();
        let mut step = Step::action("FIND_ELEMENT").param("automationId", "okButton");
        step.step_type = StepType::from("Action");
        let script = Script::new("case", "").with_step(step.store_result("ok"));
        let mut runner = Runner::new(&mut backend, RunnerOptions::default());
        let result = runner.run(&script, None);
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(runner.variables().get("ok"), Some("elem_0"));
    }

    #[test]
    fn unknown_type_and_command_fail_with_named_errors() {
        let mut backend = desktop();
        let mut odd = Step::action("click_element");
        odd.step_type = StepType::from("gesture");
        let script = Script::new("odd", "")
            .with_step(odd.continue_on_failure())
            .with_step(Step::action("drag").continue_on_failure())
            .with_step(Step::assertion("looks_right", true));
        let mut runner = Runner::new(&mut backend, RunnerOptions::default());
        let result = runner.run(&script, None);
        let errors: Vec<_> = result
            .step_results
            .iter()
            .map(|step| step.error_message.clone().unwrap_or_default())
            .collect();
        assert_eq!(
            errors,
            vec![
                "Unknown step type: gesture",
                "Unknown action command: drag",
                "Unknown assertion command: looks_right",
            ]
        );
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error_message.as_deref(), Some("Unknown assertion command: looks_right"));
    }

    #[test]
    fn non_boolean_expected_keeps_the_observed_value() {
        let mut backend = desktop();
        let script = Script::new("bad-expected", "")
            .with_step(Step::assertion("element_exists", "maybe").param("automationId", "okButton"));
        let result = Runner::new(&mut backend, RunnerOptions::default()).run(&script, None);

        let step = &result.step_results[0];
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.actual_value.as_deref(), Some("true"));
        assert_eq!(
            step.error_message.as_deref(),
            Some("Expected value 'maybe' is not a boolean")
        );
        assert_eq!(result.status, TestStatus::Failed);
    }

    #[test]
    fn registered_action_is_dispatched() {
        fn echo(
            _ctx: &mut StepContext<'_, SimulatedDesktop>,
            params: &ResolvedParams,
        ) -> EngineResult<Option<String>> {
            Ok(Some(params.string("text").to_uppercase()))
        }

        let mut backend = desktop();
        let mut runner = Runner::new(&mut backend, RunnerOptions::default());
        runner.register_action("Echo", echo);
        let script = Script::new("custom", "")
            .with_step(Step::action("echo").param("text", "hi").store_result("shout"));
        let result = runner.run(&script, None);
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(runner.variables().get("shout"), Some("HI"));
    }

    #[test]
    fn progress_events_bracket_each_step() {
        let progress = Arc::new(CollectingProgress::new());
        let options = RunnerOptions::default().with_progress(progress.clone());
        let mut backend = desktop();
        let script = Script::new("progress", "")
            .with_step(Step::action("find_element").param("automationId", "status").store_result("s"))
            .with_step(
                Step::assertion("get_element_value", json!("ready")).param("elementId", "{{s}}"),
            );
        let result = Runner::new(&mut backend, options).run(&script, None);
        assert_eq!(result.status, TestStatus::Passed);

        let events = progress.events();
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], ProgressEvent::RunStarted { total_steps: 2, .. }));
        assert!(matches!(
            events[4],
            ProgressEvent::StepCompleted { step_index: 1, status: StepStatus::Passed, .. }
        ));
        assert!(matches!(
            events[5],
            ProgressEvent::RunCompleted { status: TestStatus::Passed, .. }
        ));
    }
}
