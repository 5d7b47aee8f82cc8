use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Format version written into newly created scripts.
pub const SCRIPT_VERSION: &str = "1.0";

/// Parameters attached to a step. Values are strings or JSON primitives.
pub type StepParams = BTreeMap<String, Value>;

/// A named, ordered sequence of steps plus declared variables and metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified: DateTime<Utc>,
    #[serde(default = "default_author")]
    pub author: String,
    /// Declared variable defaults, overridable at run time.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Script {
    /// Create an empty script stamped with the current time and user.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: description.into(),
            version: default_version(),
            created: now,
            modified: now,
            author: default_author(),
            variables: BTreeMap::new(),
            steps: Vec::new(),
            tags: BTreeSet::new(),
            enabled: true,
        }
    }

    /// Append a step and return its index.
    pub fn push_step(&mut self, step: Step) -> usize {
        self.steps.push(step);
        self.steps.len() - 1
    }

    /// Builder-style variant of [`Script::push_step`].
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Advance `modified` to now. The stamp always moves forward, even when the
    /// clock reads the same instant as the previous stamp.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.modified = if now > self.modified {
            now
        } else {
            self.modified + Duration::microseconds(1)
        };
    }
}

fn default_version() -> String {
    SCRIPT_VERSION.to_string()
}

fn default_author() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

const fn default_enabled() -> bool {
    true
}

/// Kind of a step. Unknown kinds are preserved verbatim so that they fail at
/// execution time rather than when the script is loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepType {
    #[default]
    Action,
    Assertion,
    Wait,
    Other(String),
}

impl From<String> for StepType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "action" => Self::Action,
            "assertion" => Self::Assertion,
            "wait" => Self::Wait,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for StepType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<StepType> for String {
    fn from(value: StepType) -> Self {
        match value {
            StepType::Action => "action".to_string(),
            StepType::Assertion => "assertion".to_string(),
            StepType::Wait => "wait".to_string(),
            StepType::Other(other) => other,
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => f.write_str("action"),
            Self::Assertion => f.write_str("assertion"),
            Self::Wait => f.write_str("wait"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// One unit of a script: an action, an assertion or a wait.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(rename = "type", default)]
    pub step_type: StepType,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub params: StepParams,
    /// Variable that receives the action's result value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    /// Failure message used instead of the synthesized one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub continue_on_failure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Step {
    #[must_use]
    pub fn action(command: impl Into<String>) -> Self {
        Self {
            step_type: StepType::Action,
            command: command.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn assertion(command: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self {
            step_type: StepType::Assertion,
            command: command.into(),
            expected: Some(expected.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn wait(duration_ms: u64) -> Self {
        Self {
            step_type: StepType::Wait,
            command: "wait".to_string(),
            ..Self::default()
        }
        .param("duration", duration_ms)
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn store_result(mut self, variable: impl Into<String>) -> Self {
        self.store_result = Some(variable.into());
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn continue_on_failure(mut self) -> Self {
        self.continue_on_failure = true;
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
