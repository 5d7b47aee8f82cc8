//! Run-time variable store and `{{name}}` placeholder resolution.
//!
//! A store is seeded from a script's declared variables, then overlaid with
//! caller-supplied overrides (overrides always win). Step parameters are
//! resolved against the store right before each step runs, so values written
//! by earlier steps through `storeResult` are visible to later ones.
//!
//! Unknown placeholders are left untouched: `{{missing}}` resolves to the
//! literal text `{{missing}}`.

use crate::model::StepParams;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

#[allow(clippy::expect_used)]
fn placeholder_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid"))
}

/// Mapping of variable name to string value for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariableStore {
    values: BTreeMap<String, String>,
}

impl VariableStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declared defaults first, then overrides on top.
    #[must_use]
    pub fn seeded(
        declared: &BTreeMap<String, String>,
        overrides: Option<&BTreeMap<String, String>>,
    ) -> Self {
        let mut values = declared.clone();
        if let Some(overrides) = overrides {
            for (name, value) in overrides {
                values.insert(name.clone(), value.clone());
            }
        }
        Self { values }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Replace every known `{{name}}` token in `text`.
    #[must_use]
    pub fn resolve(&self, text: &str) -> String {
        placeholder_regex()
            .replace_all(text, |caps: &Captures<'_>| {
                let whole = caps.get(0).map_or("", |m| m.as_str());
                let name = caps.get(1).map_or("", |m| m.as_str());
                match self.values.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        debug!(placeholder = whole, "leaving unknown placeholder unresolved");
                        whole.to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Normalize every parameter to a string and resolve placeholders in it.
    #[must_use]
    pub fn resolve_params(&self, params: &StepParams) -> ResolvedParams {
        let values = params
            .iter()
            .map(|(key, value)| (key.clone(), self.resolve(&value_to_string(value))))
            .collect();
        ResolvedParams { values }
    }
}

/// String form of a parameter or expected value.
///
/// Strings are taken verbatim, `null` becomes the empty string and every other
/// value uses its JSON text (`true`, `42`, `1.5`, ...).
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Step parameters after placeholder resolution.
///
/// All values are strings; the typed accessors coerce them back the way the
/// consuming command expects.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedParams {
    values: BTreeMap<String, String>,
}

impl ResolvedParams {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// String parameter, empty when absent.
    #[must_use]
    pub fn string(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// Non-empty string parameter.
    #[must_use]
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(parse_bool).unwrap_or(default)
    }

    #[must_use]
    pub fn u64_or(&self, key: &str, default: u64) -> u64 {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    #[must_use]
    pub fn u32_or(&self, key: &str, default: u32) -> u32 {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

impl FromIterator<(String, String)> for ResolvedParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Case-insensitive `true` / `false`.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declared(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn override_wins_over_declared_value() {
        let store = VariableStore::seeded(
            &declared(&[("x", "1"), ("y", "keep")]),
            Some(&declared(&[("x", "2")])),
        );
        assert_eq!(store.resolve("{{x}}"), "2");
        assert_eq!(store.resolve("{{y}}"), "keep");
    }

    #[test]
    fn unknown_placeholder_is_left_verbatim() {
        let store = VariableStore::new();
        assert_eq!(store.resolve("{{undefinedVar}}"), "{{undefinedVar}}");
    }

    #[test]
    fn resolves_several_tokens_inside_one_value() {
        let mut store = VariableStore::new();
        store.set("user", "ada");
        store.set("host", "example");
        assert_eq!(
            store.resolve("{{user}}@{{host}}.org / {{user}} / {{other}}"),
            "ada@example.org / ada / {{other}}"
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let mut store = VariableStore::new();
        store.set("a", "{{b}}");
        store.set("b", "deep");
        assert_eq!(store.resolve("{{a}}"), "{{b}}");
    }

    #[test]
    fn primitive_params_are_normalized_then_coerced_back() {
        let store = VariableStore::new();
        let mut params = StepParams::new();
        params.insert("duration".into(), json!(250));
        params.insert("force".into(), json!(true));
        params.insert("none".into(), Value::Null);

        let resolved = store.resolve_params(&params);
        assert_eq!(resolved.get("duration"), Some("250"));
        assert_eq!(resolved.u64_or("duration", 1000), 250);
        assert!(resolved.bool_or("force", false));
        assert_eq!(resolved.string("none"), "");
        assert_eq!(resolved.u64_or("missing", 7), 7);
    }

    #[test]
    fn unparseable_numbers_fall_back_to_default() {
        let resolved: ResolvedParams = [("duration".to_string(), "soon".to_string())]
            .into_iter()
            .collect();
        assert_eq!(resolved.u64_or("duration", 1000), 1000);
    }

    #[test]
    fn parse_bool_is_case_insensitive() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool(" FALSE "), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }
}
