//! In-memory desktop used for dry runs and tests.
//!
//! The desktop is described by a [`DesktopModel`] (JSON or YAML): a flat list
//! of elements with their selectors and initial state. Interactions mutate
//! that state the way a real application would respond to input, and disabled
//! elements refuse clicks and typing.

use super::{AutomationBackend, AutomationError, AutomationResult, ClickOptions, ElementProperty, Selector};
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const FIRST_PID: u32 = 4000;

/// Declarative description of a simulated desktop.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopModel {
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
}

/// One element of a [`DesktopModel`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSpec {
    #[serde(default)]
    pub automation_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub offscreen: bool,
}

const fn default_enabled() -> bool {
    true
}

impl ElementSpec {
    #[must_use]
    pub fn with_automation_id(automation_id: impl Into<String>) -> Self {
        Self {
            automation_id: Some(automation_id.into()),
            name: None,
            class_name: None,
            value: None,
            text: None,
            enabled: true,
            offscreen: false,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    #[must_use]
    pub fn offscreen(mut self) -> Self {
        self.offscreen = true;
        self
    }
}

/// Identity of a simulated element. Mutable state lives in the desktop.
#[derive(Debug, PartialEq, Eq)]
pub struct SimElement {
    index: usize,
    pub automation_id: Option<String>,
    pub name: Option<String>,
    pub class_name: Option<String>,
}

impl SimElement {
    fn matches(&self, selector: &Selector) -> bool {
        let field = match selector {
            Selector::AutomationId(_) => self.automation_id.as_deref(),
            Selector::Name(_) => self.name.as_deref(),
            Selector::ClassName(_) => self.class_name.as_deref(),
        };
        field == Some(selector.value())
    }

    fn label(&self) -> String {
        self.automation_id
            .clone()
            .or_else(|| self.name.clone())
            .or_else(|| self.class_name.clone())
            .unwrap_or_else(|| format!("#{}", self.index))
    }
}

#[derive(Clone, Debug)]
struct ElementState {
    value: Option<String>,
    text: Option<String>,
    enabled: bool,
    offscreen: bool,
    clicks: u32,
}

#[derive(Clone, Debug, Serialize)]
struct LaunchedApp {
    path: String,
    args: String,
    cwd: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ElementCapture<'a> {
    automation_id: Option<&'a str>,
    name: Option<&'a str>,
    class_name: Option<&'a str>,
    value: Option<&'a str>,
    enabled: bool,
}

/// [`AutomationBackend`] over an in-memory element table.
#[derive(Debug)]
pub struct SimulatedDesktop {
    elements: Vec<Arc<SimElement>>,
    states: Vec<ElementState>,
    processes: BTreeMap<u32, LaunchedApp>,
    next_pid: u32,
}

impl Default for SimulatedDesktop {
    fn default() -> Self {
        Self::from_model(DesktopModel::default())
    }
}

impl SimulatedDesktop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_model(model: DesktopModel) -> Self {
        let mut desktop = Self {
            elements: Vec::new(),
            states: Vec::new(),
            processes: BTreeMap::new(),
            next_pid: FIRST_PID,
        };
        for spec in model.elements {
            desktop.add_element(spec);
        }
        desktop
    }

    /// Load a desktop description from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let data = fs::read_to_string(path)
            .map_err(|err| EngineError::io("failed to read desktop description", err))?;
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        let model: DesktopModel = if is_yaml {
            serde_yml::from_str(&data)
                .map_err(|err| EngineError::protocol("failed to parse desktop yaml", err))?
        } else {
            serde_json::from_str(&data)
                .map_err(|err| EngineError::protocol("failed to parse desktop json", err))?
        };
        Ok(Self::from_model(model))
    }

    #[must_use]
    pub fn with_element(mut self, spec: ElementSpec) -> Self {
        self.add_element(spec);
        self
    }

    pub fn add_element(&mut self, spec: ElementSpec) {
        let index = self.elements.len();
        self.elements.push(Arc::new(SimElement {
            index,
            automation_id: spec.automation_id,
            name: spec.name,
            class_name: spec.class_name,
        }));
        self.states.push(ElementState {
            value: spec.value,
            text: spec.text,
            enabled: spec.enabled,
            offscreen: spec.offscreen,
            clicks: 0,
        });
    }

    /// Current value of the first element with this automation id.
    #[must_use]
    pub fn value_of(&self, automation_id: &str) -> Option<&str> {
        let element = self.lookup(&Selector::AutomationId(automation_id.to_string()))?;
        self.states.get(element.index)?.value.as_deref()
    }

    /// Number of clicks delivered to the first element with this automation id.
    #[must_use]
    pub fn click_count(&self, automation_id: &str) -> u32 {
        self.lookup(&Selector::AutomationId(automation_id.to_string()))
            .and_then(|element| self.states.get(element.index))
            .map_or(0, |state| state.clicks)
    }

    #[must_use]
    pub fn running_processes(&self) -> Vec<u32> {
        self.processes.keys().copied().collect()
    }

    fn lookup(&self, selector: &Selector) -> Option<&Arc<SimElement>> {
        self.elements.iter().find(|element| element.matches(selector))
    }

    fn state_mut(&mut self, element: &SimElement) -> AutomationResult<&mut ElementState> {
        self.states
            .get_mut(element.index)
            .ok_or_else(|| AutomationError::ElementNotFound(element.label()))
    }

    fn interactive_state(&mut self, element: &SimElement) -> AutomationResult<&mut ElementState> {
        let state = self.state_mut(element)?;
        if state.enabled {
            Ok(state)
        } else {
            Err(AutomationError::ElementNotEnabled(element.label()))
        }
    }

    fn capture<'a>(&'a self, element: &'a SimElement) -> Option<ElementCapture<'a>> {
        let state = self.states.get(element.index)?;
        Some(ElementCapture {
            automation_id: element.automation_id.as_deref(),
            name: element.name.as_deref(),
            class_name: element.class_name.as_deref(),
            value: state.value.as_deref(),
            enabled: state.enabled,
        })
    }
}

impl AutomationBackend for SimulatedDesktop {
    type Element = SimElement;

    fn find_element(&mut self, selector: &Selector) -> AutomationResult<Option<Arc<SimElement>>> {
        let found = self.lookup(selector).cloned();
        debug!(%selector, found = found.is_some(), "simulated find");
        Ok(found)
    }

    fn click(&mut self, element: &SimElement, options: ClickOptions) -> AutomationResult<()> {
        let state = self.interactive_state(element)?;
        state.clicks += if options.double_click { 2 } else { 1 };
        Ok(())
    }

    fn type_text(&mut self, element: &SimElement, text: &str, clear_first: bool) -> AutomationResult<()> {
        let state = self.interactive_state(element)?;
        let mut value = if clear_first {
            String::new()
        } else {
            state.value.take().unwrap_or_default()
        };
        value.push_str(text);
        state.value = Some(value);
        Ok(())
    }

    fn set_value(&mut self, element: &SimElement, value: &str) -> AutomationResult<()> {
        let state = self.interactive_state(element)?;
        state.value = Some(value.to_string());
        Ok(())
    }

    fn read_property(
        &mut self,
        element: &SimElement,
        property: ElementProperty,
    ) -> AutomationResult<Option<String>> {
        let name = element.name.clone();
        let state = self.state_mut(element)?;
        Ok(match property {
            ElementProperty::Name => name,
            ElementProperty::Value => state.value.clone(),
            ElementProperty::Text => state.text.clone(),
            ElementProperty::IsEnabled => Some(state.enabled.to_string()),
            ElementProperty::IsOffscreen => Some(state.offscreen.to_string()),
        })
    }

    fn wait_for_element(&mut self, selector: &Selector, _timeout_ms: u64) -> AutomationResult<bool> {
        // The simulated tree never changes on its own, so the first probe is final.
        Ok(self.lookup(selector).is_some())
    }

    fn launch_app(&mut self, path: &str, args: &str, cwd: Option<&str>) -> AutomationResult<u32> {
        if path.is_empty() {
            return Err(AutomationError::InvalidArgument("application path is empty".to_string()));
        }
        let pid = self.next_pid;
        self.next_pid += 1;
        self.processes.insert(
            pid,
            LaunchedApp {
                path: path.to_string(),
                args: args.to_string(),
                cwd: cwd.map(str::to_string),
            },
        );
        debug!(pid, path, "simulated launch");
        Ok(pid)
    }

    fn close_app(&mut self, pid: u32, _force: bool) -> AutomationResult<()> {
        self.processes
            .remove(&pid)
            .map(|_| ())
            .ok_or(AutomationError::ProcessNotFound(pid))
    }

    fn take_screenshot(&mut self, path: &Path, element: Option<&SimElement>) -> AutomationResult<()> {
        let captured: Vec<ElementCapture<'_>> = match element {
            Some(element) => self.capture(element).into_iter().collect(),
            None => self
                .elements
                .iter()
                .filter(|element| {
                    self.states
                        .get(element.index)
                        .is_some_and(|state| !state.offscreen)
                })
                .filter_map(|element| self.capture(element))
                .collect(),
        };
        let data = serde_json::to_vec_pretty(&captured)
            .map_err(|err| AutomationError::PlatformError(err.to_string()))?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| AutomationError::PlatformError(err.to_string()))?;
        }
        fs::write(path, data).map_err(|err| AutomationError::PlatformError(err.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn desktop() -> SimulatedDesktop {
        SimulatedDesktop::new()
            .with_element(ElementSpec::with_automation_id("userName").class("TextBox"))
            .with_element(ElementSpec::with_automation_id("okButton").named("OK").class("Button"))
            .with_element(ElementSpec::with_automation_id("locked").disabled())
    }

    #[test]
    fn repeated_finds_return_the_same_handle() {
        let mut desktop = desktop();
        let first = desktop
            .find_element(&Selector::Name("OK".into()))
            .unwrap()
            .unwrap();
        let second = desktop
            .find_element(&Selector::AutomationId("okButton".into()))
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn typing_appends_unless_cleared() {
        let mut desktop = desktop();
        let field = desktop
            .find_element(&Selector::AutomationId("userName".into()))
            .unwrap()
            .unwrap();
        desktop.type_text(&field, "ad", false).unwrap();
        desktop.type_text(&field, "a", false).unwrap();
        assert_eq!(desktop.value_of("userName"), Some("ada"));
        desktop.type_text(&field, "bob", true).unwrap();
        assert_eq!(desktop.value_of("userName"), Some("bob"));
    }

    #[test]
    fn disabled_elements_refuse_input() {
        let mut desktop = desktop();
        let locked = desktop
            .find_element(&Selector::AutomationId("locked".into()))
            .unwrap()
            .unwrap();
        let err = desktop.click(&locked, ClickOptions::default()).unwrap_err();
        assert_eq!(err, AutomationError::ElementNotEnabled("locked".into()));
    }

    #[test]
    fn closing_unknown_process_fails() {
        let mut desktop = desktop();
        let pid = desktop.launch_app("notepad.exe", "", None).unwrap();
        assert_eq!(desktop.running_processes(), vec![pid]);
        desktop.close_app(pid, false).unwrap();
        assert_eq!(
            desktop.close_app(pid, true).unwrap_err(),
            AutomationError::ProcessNotFound(pid)
        );
    }

    #[test]
    fn screenshot_of_one_element_describes_only_that_element() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("field.json");
        let mut desktop = desktop();
        let field = desktop
            .find_element(&Selector::AutomationId("userName".into()))
            .unwrap()
            .unwrap();
        desktop.set_value(&field, "ada").unwrap();

        desktop.take_screenshot(&path, Some(&field)).unwrap();

        let captured: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            captured,
            serde_json::json!([{
                "automationId": "userName",
                "name": null,
                "className": "TextBox",
                "value": "ada",
                "enabled": true
            }])
        );
    }
}
