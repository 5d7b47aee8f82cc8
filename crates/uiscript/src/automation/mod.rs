//! The automation capability the engine drives but does not implement.
//!
//! A backend hands out elements as `Arc<Element>`; two handles refer to the
//! same UI element exactly when they point at the same allocation.

pub mod simulated;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub use simulated::{DesktopModel, ElementSpec, SimElement, SimulatedDesktop};

/// Failure reported by an automation backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element is not enabled: {0}")]
    ElementNotEnabled(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(u32),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),
}

pub type AutomationResult<T> = Result<T, AutomationError>;

/// How to locate an element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Selector {
    AutomationId(String),
    Name(String),
    ClassName(String),
}

impl Selector {
    /// Parameter key used for this selector in step params.
    #[must_use]
    pub const fn param_key(&self) -> &'static str {
        match self {
            Self::AutomationId(_) => "automationId",
            Self::Name(_) => "name",
            Self::ClassName(_) => "className",
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::AutomationId(value) | Self::Name(value) | Self::ClassName(value) => value,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.param_key(), self.value())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClickOptions {
    pub double_click: bool,
    pub right_click: bool,
}

/// Readable element properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementProperty {
    /// Displayed name (label) of the element.
    Name,
    /// Value pattern content, e.g. text box contents.
    Value,
    /// Text pattern content.
    Text,
    IsEnabled,
    IsOffscreen,
}

impl ElementProperty {
    /// Case-insensitive property lookup (`IsEnabled`, `isoffscreen`, ...).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "name" => Some(Self::Name),
            "value" => Some(Self::Value),
            "text" => Some(Self::Text),
            "isenabled" => Some(Self::IsEnabled),
            "isoffscreen" => Some(Self::IsOffscreen),
            _ => None,
        }
    }
}

/// Desktop automation primitives used by script steps.
pub trait AutomationBackend {
    /// Backend-native element. Handles are shared as `Arc<Self::Element>`.
    type Element: fmt::Debug;

    fn find_element(&mut self, selector: &Selector) -> AutomationResult<Option<Arc<Self::Element>>>;

    fn click(&mut self, element: &Self::Element, options: ClickOptions) -> AutomationResult<()>;

    fn type_text(
        &mut self,
        element: &Self::Element,
        text: &str,
        clear_first: bool,
    ) -> AutomationResult<()>;

    fn set_value(&mut self, element: &Self::Element, value: &str) -> AutomationResult<()>;

    /// Read a property; `Ok(None)` when the element does not expose it.
    fn read_property(
        &mut self,
        element: &Self::Element,
        property: ElementProperty,
    ) -> AutomationResult<Option<String>>;

    fn element_exists(&mut self, selector: &Selector) -> AutomationResult<bool> {
        Ok(self.find_element(selector)?.is_some())
    }

    /// Block until the element appears or `timeout_ms` elapses.
    fn wait_for_element(&mut self, selector: &Selector, timeout_ms: u64) -> AutomationResult<bool>;

    fn launch_app(&mut self, path: &str, args: &str, cwd: Option<&str>) -> AutomationResult<u32>;

    fn close_app(&mut self, pid: u32, force: bool) -> AutomationResult<()>;

    fn take_screenshot(
        &mut self,
        path: &Path,
        element: Option<&Self::Element>,
    ) -> AutomationResult<()>;
}
