//! Session context tying the repository, runner, recorder and backend together.
//!
//! A [`TestSession`] is what a command dispatcher (the CLI, or any other
//! transport) talks to. It owns one automation backend, remembers the last
//! result it produced, and keeps the recorder's in-progress script between
//! calls.

use crate::automation::AutomationBackend;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::model::{Script, Step, TestResult};
use crate::recorder::{Recorder, RecordingBackend};
use crate::report;
use crate::repository::ScriptRepository;
use crate::runner::{ProgressCallback, Runner, RunnerOptions};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TestSession<B: AutomationBackend> {
    config: EngineConfig,
    repository: ScriptRepository,
    backend: B,
    recorder: Recorder<B::Element>,
    last_result: Option<TestResult>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl<B: AutomationBackend> TestSession<B> {
    /// Open a session whose repository lives under `config.home`.
    pub fn new(config: EngineConfig, backend: B) -> EngineResult<Self> {
        let repository = ScriptRepository::open(config.home.clone())?;
        Ok(Self {
            config,
            repository,
            backend,
            recorder: Recorder::new(),
            last_result: None,
            progress: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn repository(&self) -> &ScriptRepository {
        &self.repository
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub fn last_result(&self) -> Option<&TestResult> {
        self.last_result.as_ref()
    }

    pub fn create_script(&self, name: &str, description: &str) -> EngineResult<Script> {
        let mut script = Script::new(name, description);
        self.repository.save(&mut script)?;
        Ok(script)
    }

    /// Append `step` to a stored script and return the new step's index.
    pub fn add_step(&self, script_name: &str, step: Step) -> EngineResult<usize> {
        let mut script = self
            .repository
            .load(script_name)?
            .ok_or_else(|| script_not_found(script_name))?;
        let index = script.push_step(step);
        self.repository.save(&mut script)?;
        Ok(index)
    }

    pub fn load_script(&self, name: &str) -> EngineResult<Option<Script>> {
        self.repository.load(name)
    }

    /// Save `script`, returning it with its advanced `modified` stamp.
    pub fn save_script(&self, mut script: Script) -> EngineResult<Script> {
        self.repository.save(&mut script)?;
        Ok(script)
    }

    /// Save a script given as a JSON document.
    pub fn save_script_json(&self, json: &str) -> EngineResult<Script> {
        let script: Script = serde_json::from_str(json).map_err(|err| {
            EngineError::new(
                ErrorCode::InvalidArgument,
                "Invalid script JSON",
                serde_json::json!({ "source": err.to_string() }),
            )
        })?;
        self.save_script(script)
    }

    pub fn list_scripts(&self) -> EngineResult<Vec<Script>> {
        self.repository.list()
    }

    pub fn delete_script(&self, name: &str) -> EngineResult<bool> {
        self.repository.delete(name)
    }

    /// Run a stored script, remember its result as the last result and persist it.
    ///
    /// A result that cannot be written is still returned and kept in memory.
    pub fn run_script(
        &mut self,
        name: &str,
        overrides: Option<&BTreeMap<String, String>>,
    ) -> EngineResult<TestResult> {
        let script = self
            .repository
            .load(name)?
            .ok_or_else(|| script_not_found(name))?;

        let mut options = RunnerOptions::from(&self.config);
        options.progress = self.progress.clone();
        let result = Runner::new(&mut self.backend, options).run(&script, overrides);

        self.last_result = Some(result.clone());
        if let Err(err) = self.repository.save_result(&result) {
            warn!(script = %name, error = %err, "test result was not persisted");
        }
        Ok(result)
    }

    /// Stored results for `name`, newest first; without a name, the last result
    /// produced by this session.
    pub fn get_results(&self, name: Option<&str>, max_results: Option<usize>) -> EngineResult<Vec<TestResult>> {
        match name.filter(|name| !name.is_empty()) {
            Some(name) => self
                .repository
                .get_results(name, max_results.unwrap_or(self.config.max_results)),
            None => self
                .last_result
                .clone()
                .map(|result| vec![result])
                .ok_or_else(|| EngineError::not_found("No test results available")),
        }
    }

    /// Write an HTML report for the latest result of `name` (or the session's
    /// last result) and return its path.
    pub fn export_result_to_report(&self, name: Option<&str>) -> EngineResult<PathBuf> {
        let result = match name.filter(|name| !name.is_empty()) {
            Some(name) => self.repository.latest_result(name)?,
            None => self.last_result.clone(),
        }
        .ok_or_else(|| EngineError::not_found("No test results found"))?;

        let path = self.repository.report_path(&result)?;
        report::write_report(&result, &path)?;
        Ok(path)
    }

    pub fn start_recording(&mut self, name: &str, description: &str) -> EngineResult<()> {
        if name.trim().is_empty() {
            return Err(EngineError::invalid_argument("recording name must not be empty"));
        }
        self.recorder.start(name, description)
    }

    /// Stop recording and persist the recorded script.
    pub fn stop_recording(&mut self) -> EngineResult<Script> {
        let mut script = self
            .recorder
            .stop()
            .ok_or_else(|| EngineError::recording("No active recording"))?;
        self.repository.save(&mut script)?;
        info!(script = %script.name, steps = script.steps.len(), "recording saved");
        Ok(script)
    }

    pub fn pause_recording(&mut self) -> EngineResult<()> {
        self.recorder.pause()
    }

    pub fn resume_recording(&mut self) -> EngineResult<()> {
        self.recorder.resume()
    }

    #[must_use]
    pub fn recorder(&self) -> &Recorder<B::Element> {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder<B::Element> {
        &mut self.recorder
    }

    /// The session backend, with interactions fed to the recorder.
    pub fn recording_backend(&mut self) -> RecordingBackend<'_, B> {
        RecordingBackend::new(&mut self.backend, &mut self.recorder)
    }
}

fn script_not_found(name: &str) -> EngineError {
    EngineError::not_found(format!("Script not found: {name}"))
}
