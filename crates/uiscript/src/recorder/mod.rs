//! Turns observed automation calls into a replayable script.
//!
//! Each element seen while recording gets a logical id (`element1`,
//! `element2`, ...). The recorded `find_element` step stores its cache id in
//! a variable of that name, and later click/type steps refer to the element
//! through the `{{elementN}}` placeholder, so a replay resolves references
//! against its own lookups.

mod backend;

pub use backend::RecordingBackend;

use crate::automation::{ClickOptions, Selector};
use crate::error::{EngineError, EngineResult};
use crate::model::{Script, Step, StepParams, StepType};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const TYPED_TEXT_PREVIEW: usize = 20;

/// Logical ids for elements, keyed by handle identity.
///
/// Handles passed through [`ElementArena::retain`] are kept alive for the
/// whole recording so their addresses cannot be reused by other elements.
#[derive(Debug)]
struct ElementArena<E> {
    handles: HashMap<String, Arc<E>>,
    ids: HashMap<usize, String>,
    next_id: usize,
}

impl<E> Default for ElementArena<E> {
    fn default() -> Self {
        Self {
            handles: HashMap::new(),
            ids: HashMap::new(),
            next_id: 1,
        }
    }
}

impl<E> ElementArena<E> {
    fn retain(&mut self, element: &Arc<E>) -> String {
        let id = self.id_for(element.as_ref());
        self.handles
            .entry(id.clone())
            .or_insert_with(|| Arc::clone(element));
        id
    }

    fn handle(&self, id: &str) -> Option<&Arc<E>> {
        self.handles.get(id)
    }

    fn id_for(&mut self, element: &E) -> String {
        let next_id = &mut self.next_id;
        self.ids
            .entry(address(element))
            .or_insert_with(|| {
                let id = format!("element{next_id}");
                *next_id += 1;
                id
            })
            .clone()
    }
}

fn address<E>(element: &E) -> usize {
    std::ptr::from_ref(element) as usize
}

/// Recording state machine: idle, recording, or paused with a script in progress.
#[derive(Debug)]
pub struct Recorder<E> {
    script: Option<Script>,
    recording: bool,
    elements: ElementArena<E>,
}

impl<E> Default for Recorder<E> {
    fn default() -> Self {
        Self {
            script: None,
            recording: false,
            elements: ElementArena::default(),
        }
    }
}

impl<E> Recorder<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Paused: a script is in progress but calls are not being recorded.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        !self.recording && self.script.is_some()
    }

    #[must_use]
    pub fn current_script(&self) -> Option<&Script> {
        self.script.as_ref()
    }

    /// Element found during this recording under the logical id `elementN`.
    #[must_use]
    pub fn element(&self, id: &str) -> Option<&Arc<E>> {
        self.elements.handle(id)
    }

    pub fn start(&mut self, name: &str, description: &str) -> EngineResult<()> {
        if self.recording {
            return Err(EngineError::recording("Already recording"));
        }
        self.script = Some(Script::new(name, description));
        self.elements = ElementArena::default();
        self.recording = true;
        debug!(script = name, "recording started");
        Ok(())
    }

    /// Finish recording and hand over the script.
    ///
    /// Returns `None` when not actively recording. A paused recording stays
    /// in progress and can still be resumed.
    pub fn stop(&mut self) -> Option<Script> {
        if !self.recording {
            return None;
        }
        self.recording = false;
        self.elements = ElementArena::default();
        let script = self.script.take();
        debug!(steps = script.as_ref().map_or(0, |s| s.steps.len()), "recording stopped");
        script
    }

    pub fn pause(&mut self) -> EngineResult<()> {
        if !self.recording {
            return Err(EngineError::recording("Not recording"));
        }
        self.recording = false;
        Ok(())
    }

    pub fn resume(&mut self) -> EngineResult<()> {
        if self.script.is_none() {
            return Err(EngineError::recording("No script to resume"));
        }
        self.recording = true;
        Ok(())
    }

    pub fn record_find_element(&mut self, element: &Arc<E>, selector: &Selector) {
        if !self.recording {
            return;
        }
        let id = self.elements.retain(element);
        let step = Step::action("find_element")
            .param(selector.param_key(), selector.value())
            .store_result(id)
            .describe(format!("Find element: {}", selector.value()));
        self.push(step);
    }

    pub fn record_click(&mut self, element: &E, options: ClickOptions) {
        if !self.recording {
            return;
        }
        let id = self.elements.id_for(element);
        let kind = if options.right_click {
            "right"
        } else if options.double_click {
            "double"
        } else {
            "single"
        };
        let mut step = Step::action("click_element").param("elementId", placeholder(&id));
        if options.double_click {
            step = step.param("doubleClick", true);
        }
        if options.right_click {
            step = step.param("rightClick", true);
        }
        self.push(step.describe(format!("Click element ({kind})")));
    }

    pub fn record_type_text(&mut self, element: &E, text: &str, clear_first: bool) {
        if !self.recording {
            return;
        }
        let id = self.elements.id_for(element);
        let mut step = Step::action("type_text")
            .param("elementId", placeholder(&id))
            .param("text", text);
        if clear_first {
            step = step.param("clearFirst", true);
        }
        let preview: String = text.chars().take(TYPED_TEXT_PREVIEW).collect();
        self.push(step.describe(format!("Type text: {preview}")));
    }

    pub fn record_wait(&mut self, duration_ms: u64) {
        if !self.recording {
            return;
        }
        self.push(Step::wait(duration_ms).describe(format!("Wait for {duration_ms}ms")));
    }

    /// Record an assertion. Without a `message`, failures report `Assert <command>`.
    pub fn record_assertion(
        &mut self,
        command: &str,
        params: StepParams,
        expected: Value,
        message: Option<String>,
    ) {
        if !self.recording {
            return;
        }
        let step = Step {
            step_type: StepType::Assertion,
            command: command.to_string(),
            params,
            expected: Some(expected),
            message: Some(
                message
                    .clone()
                    .unwrap_or_else(|| format!("Assert {command}")),
            ),
            description: message,
            ..Step::default()
        };
        self.push(step);
    }

    pub fn add_variable(&mut self, name: &str, value: &str) -> EngineResult<()> {
        let script = self
            .script
            .as_mut()
            .ok_or_else(|| EngineError::recording("No active script"))?;
        script.variables.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn add_tag(&mut self, tag: &str) -> EngineResult<()> {
        let script = self
            .script
            .as_mut()
            .ok_or_else(|| EngineError::recording("No active script"))?;
        script.tags.insert(tag.to_string());
        Ok(())
    }

    fn push(&mut self, step: Step) {
        if let Some(script) = self.script.as_mut() {
            debug!(command = %step.command, "recorded step");
            script.steps.push(step);
        }
    }
}

fn placeholder(id: &str) -> String {
    format!("{{{{{id}}}}}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn state_machine_rejects_misuse() {
        let mut recorder: Recorder<u8> = Recorder::new();
        assert_eq!(recorder.pause().unwrap_err().code, ErrorCode::Recording);
        assert_eq!(recorder.resume().unwrap_err().message, "No script to resume");
        assert!(recorder.stop().is_none());

        recorder.start("login", "").unwrap();
        assert_eq!(recorder.start("again", "").unwrap_err().message, "Already recording");
        recorder.pause().unwrap();
        assert!(recorder.is_paused());
        assert!(recorder.stop().is_none());
        recorder.resume().unwrap();
        recorder.resume().unwrap();
        assert!(recorder.stop().is_some());
        assert!(!recorder.is_recording());
    }

    #[test]
    fn same_element_keeps_its_logical_id() {
        let mut recorder = Recorder::new();
        recorder.start("ids", "").unwrap();
        let ok = Arc::new(1_u8);
        let cancel = Arc::new(2_u8);
        recorder.record_find_element(&ok, &Selector::AutomationId("ok".into()));
        recorder.record_find_element(&cancel, &Selector::Name("Cancel".into()));
        recorder.record_click(&ok, ClickOptions::default());
        recorder.record_click(
            &cancel,
            ClickOptions {
                double_click: true,
                right_click: false,
            },
        );

        let script = recorder.stop().unwrap();
        let steps = &script.steps;
        assert_eq!(steps[0].store_result.as_deref(), Some("element1"));
        assert_eq!(steps[1].store_result.as_deref(), Some("element2"));
        assert_eq!(steps[1].description.as_deref(), Some("Find element: Cancel"));
        assert_eq!(steps[2].params["elementId"], json!("{{element1}}"));
        assert!(!steps[2].params.contains_key("doubleClick"));
        assert_eq!(steps[3].params["elementId"], json!("{{element2}}"));
        assert_eq!(steps[3].params["doubleClick"], json!(true));
        assert_eq!(steps[3].description.as_deref(), Some("Click element (double)"));
    }

    #[test]
    fn logical_ids_resolve_to_the_found_handles() {
        let mut recorder = Recorder::new();
        recorder.start("lookup", "").unwrap();
        let ok = Arc::new(7_u8);
        recorder.record_find_element(&ok, &Selector::AutomationId("ok".into()));
        recorder.record_find_element(&ok, &Selector::Name("OK".into()));

        assert!(Arc::ptr_eq(recorder.element("element1").unwrap(), &ok));
        assert!(recorder.element("element2").is_none());
        assert_eq!(Arc::strong_count(&ok), 2);

        recorder.stop().unwrap();
        assert!(recorder.element("element1").is_none());
        assert_eq!(Arc::strong_count(&ok), 1);
    }

    #[test]
    fn typed_text_description_is_truncated() {
        let mut recorder = Recorder::new();
        recorder.start("typing", "").unwrap();
        let field = Arc::new(0_u8);
        recorder.record_type_text(&field, "abcdefghijklmnopqrstuvwxyz", true);
        let script = recorder.stop().unwrap();
        let step = &script.steps[0];
        assert_eq!(step.description.as_deref(), Some("Type text: abcdefghijklmnopqrst"));
        assert_eq!(step.params["clearFirst"], json!(true));
    }

    #[test]
    fn paused_recorder_ignores_calls() {
        let mut recorder: Recorder<u8> = Recorder::new();
        recorder.start("paused", "").unwrap();
        recorder.record_wait(250);
        recorder.pause().unwrap();
        recorder.record_wait(999);
        recorder.resume().unwrap();
        let script = recorder.stop().unwrap();
        assert_eq!(script.steps.len(), 1);
        assert_eq!(script.steps[0].step_type, StepType::Wait);
        assert_eq!(script.steps[0].description.as_deref(), Some("Wait for 250ms"));
    }

    #[test]
    fn assertion_message_defaults_to_command() {
        let mut recorder: Recorder<u8> = Recorder::new();
        recorder.start("asserts", "").unwrap();
        recorder.record_assertion("element_exists", StepParams::new(), json!(true), None);
        let script = recorder.stop().unwrap();
        assert_eq!(script.steps[0].message.as_deref(), Some("Assert element_exists"));
        assert_eq!(script.steps[0].description, None);
    }

    #[test]
    fn variables_and_tags_need_a_script() {
        let mut recorder: Recorder<u8> = Recorder::new();
        assert!(recorder.add_variable("user", "ada").is_err());
        recorder.start("vars", "").unwrap();
        recorder.add_variable("user", "ada").unwrap();
        recorder.add_tag("smoke").unwrap();
        recorder.add_tag("smoke").unwrap();
        let script = recorder.stop().unwrap();
        assert_eq!(script.variables["user"], "ada");
        assert_eq!(script.tags.len(), 1);
    }
}
