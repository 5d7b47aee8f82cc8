use super::Recorder;
use crate::automation::{AutomationBackend, AutomationResult, ClickOptions, ElementProperty, Selector};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Backend decorator that feeds successful find, click and type calls to a
/// [`Recorder`]. Calls made while the recorder is idle or paused pass
/// through unrecorded.
pub struct RecordingBackend<'a, B: AutomationBackend> {
    inner: &'a mut B,
    recorder: &'a mut Recorder<B::Element>,
}

impl<'a, B: AutomationBackend> RecordingBackend<'a, B> {
    pub fn new(inner: &'a mut B, recorder: &'a mut Recorder<B::Element>) -> Self {
        Self { inner, recorder }
    }

    /// Sleep for `duration_ms` and record the pause as a `wait` step.
    pub fn wait(&mut self, duration_ms: u64) {
        thread::sleep(Duration::from_millis(duration_ms));
        self.recorder.record_wait(duration_ms);
    }

    #[must_use]
    pub fn recorder(&self) -> &Recorder<B::Element> {
        self.recorder
    }
}

impl<B: AutomationBackend> AutomationBackend for RecordingBackend<'_, B> {
    type Element = B::Element;

    fn find_element(&mut self, selector: &Selector) -> AutomationResult<Option<Arc<B::Element>>> {
        let found = self.inner.find_element(selector)?;
        if let Some(element) = &found {
            self.recorder.record_find_element(element, selector);
        }
        Ok(found)
    }

    fn click(&mut self, element: &B::Element, options: ClickOptions) -> AutomationResult<()> {
        self.inner.click(element, options)?;
        self.recorder.record_click(element, options);
        Ok(())
    }

    fn type_text(&mut self, element: &B::Element, text: &str, clear_first: bool) -> AutomationResult<()> {
        self.inner.type_text(element, text, clear_first)?;
        self.recorder.record_type_text(element, text, clear_first);
        Ok(())
    }

    fn set_value(&mut self, element: &B::Element, value: &str) -> AutomationResult<()> {
        self.inner.set_value(element, value)
    }

    fn read_property(
        &mut self,
        element: &B::Element,
        property: ElementProperty,
    ) -> AutomationResult<Option<String>> {
        self.inner.read_property(element, property)
    }

    fn element_exists(&mut self, selector: &Selector) -> AutomationResult<bool> {
        self.inner.element_exists(selector)
    }

    fn wait_for_element(&mut self, selector: &Selector, timeout_ms: u64) -> AutomationResult<bool> {
        self.inner.wait_for_element(selector, timeout_ms)
    }

    fn launch_app(&mut self, path: &str, args: &str, cwd: Option<&str>) -> AutomationResult<u32> {
        self.inner.launch_app(path, args, cwd)
    }

    fn close_app(&mut self, pid: u32, force: bool) -> AutomationResult<()> {
        self.inner.close_app(pid, force)
    }

    fn take_screenshot(&mut self, path: &Path, element: Option<&B::Element>) -> AutomationResult<()> {
        self.inner.take_screenshot(path, element)
    }
}
