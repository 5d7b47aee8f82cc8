//! Built-in assertion commands and comparison against `expected`.
//!
//! A handler only observes the UI; deciding pass or fail is left to
//! [`evaluate`], which compares the observation using the handler's
//! [`Comparison`] mode.

use crate::automation::{AutomationBackend, ElementProperty};
use crate::error::{EngineError, EngineResult};
use crate::runner::actions::{selector_from_params, StepContext};
use crate::variables::{parse_bool, value_to_string, ResolvedParams};
use serde_json::Value;

/// How an observed value is compared with the step's `expected` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// `expected` is coerced to a boolean first.
    Boolean,
    /// String representations must be equal.
    Text,
}

/// Value read by an assertion handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    pub actual: String,
    pub comparison: Comparison,
}

impl Observation {
    #[must_use]
    pub fn boolean(actual: bool) -> Self {
        Self {
            actual: actual.to_string(),
            comparison: Comparison::Boolean,
        }
    }

    #[must_use]
    pub fn text(actual: impl Into<String>) -> Self {
        Self {
            actual: actual.into(),
            comparison: Comparison::Text,
        }
    }
}

pub type AssertionHandler<B> = fn(&mut StepContext<'_, B>, &ResolvedParams) -> EngineResult<Observation>;

pub(crate) fn default_assertions<B: AutomationBackend>() -> Vec<(&'static str, AssertionHandler<B>)> {
    vec![
        ("element_exists", element_exists::<B>),
        ("get_element_value", get_element_value::<B>),
        ("get_element_text", get_element_text::<B>),
        ("get_element_state", get_element_state::<B>),
    ]
}

/// Whether `observation` satisfies `expected`.
///
/// Boolean comparisons accept a JSON bool or the strings `true` / `false`
/// (any case); any other expected value is an invalid argument. A missing
/// `expected` never matches.
pub fn evaluate(observation: &Observation, expected: Option<&Value>) -> EngineResult<bool> {
    let Some(expected) = expected else {
        return Ok(false);
    };
    match observation.comparison {
        Comparison::Boolean => {
            let wanted = match expected {
                Value::Bool(flag) => Some(*flag),
                Value::String(text) => parse_bool(text),
                _ => None,
            }
            .ok_or_else(|| {
                EngineError::invalid_argument(format!(
                    "Expected value '{}' is not a boolean",
                    value_to_string(expected)
                ))
            })?;
            Ok(parse_bool(&observation.actual) == Some(wanted))
        }
        Comparison::Text => Ok(observation.actual == value_to_string(expected)),
    }
}

/// Message recorded for a failed assertion without a custom `message`.
#[must_use]
pub fn failure_message(command: &str, expected: Option<&Value>, actual: &str) -> String {
    let expected = expected.map(value_to_string).unwrap_or_default();
    format!("Assertion failed: {command} expected '{expected}', got '{actual}'")
}

fn element_exists<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Observation> {
    let selector = selector_from_params(params).ok_or_else(|| {
        EngineError::invalid_argument("element_exists requires one of automationId, name or className")
    })?;
    let exists = ctx
        .backend
        .element_exists(&selector)
        .map_err(|err| EngineError::capability(&err))?;
    Ok(Observation::boolean(exists))
}

fn get_element_value<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Observation> {
    let element = ctx.cached_element(params)?;
    let value = match ctx
        .backend
        .read_property(&element, ElementProperty::Value)
        .map_err(|err| EngineError::capability(&err))?
    {
        Some(value) => Some(value),
        None => ctx
            .backend
            .read_property(&element, ElementProperty::Text)
            .map_err(|err| EngineError::capability(&err))?,
    };
    Ok(Observation::text(value.unwrap_or_default()))
}

fn get_element_text<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Observation> {
    let element = ctx.cached_element(params)?;
    let name = ctx
        .backend
        .read_property(&element, ElementProperty::Name)
        .map_err(|err| EngineError::capability(&err))?;
    Ok(Observation::text(name.unwrap_or_default()))
}

fn get_element_state<B: AutomationBackend>(
    ctx: &mut StepContext<'_, B>,
    params: &ResolvedParams,
) -> EngineResult<Observation> {
    let element = ctx.cached_element(params)?;
    let requested = params.non_empty("property").unwrap_or("IsEnabled");
    let property = ElementProperty::parse(requested)
        .filter(|property| matches!(property, ElementProperty::IsEnabled | ElementProperty::IsOffscreen))
        .ok_or_else(|| {
            EngineError::invalid_argument(format!("Unknown element state property: {requested}"))
        })?;
    let state = ctx
        .backend
        .read_property(&element, property)
        .map_err(|err| EngineError::capability(&err))?
        .as_deref()
        .and_then(parse_bool)
        .unwrap_or(false);
    Ok(Observation::boolean(state))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boolean_expected_accepts_bool_and_string_forms() {
        let observed = Observation::boolean(true);
        assert!(evaluate(&observed, Some(&json!(true))).unwrap());
        assert!(evaluate(&observed, Some(&json!("TRUE"))).unwrap());
        assert!(!evaluate(&Observation::boolean(false), Some(&json!(true))).unwrap());
    }

    #[test]
    fn non_boolean_expected_is_rejected() {
        let err = evaluate(&Observation::boolean(true), Some(&json!("maybe"))).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidArgument);
    }

    #[test]
    fn text_comparison_uses_string_form() {
        assert!(evaluate(&Observation::text("42"), Some(&json!(42))).unwrap());
        assert!(!evaluate(&Observation::text("ada"), Some(&json!("Ada"))).unwrap());
        assert!(!evaluate(&Observation::text(""), None).unwrap());
    }

    #[test]
    fn failure_message_names_command_and_both_values() {
        assert_eq!(
            failure_message("element_exists", Some(&json!(true)), "false"),
            "Assertion failed: element_exists expected 'true', got 'false'"
        );
    }
}
