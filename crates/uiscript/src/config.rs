//! Engine configuration.
//!
//! Every field has a default, so an empty document (or no file at all) yields
//! a usable configuration.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOME: &str = "./test-scripts";
pub const DEFAULT_WAIT_MS: u64 = 1000;
pub const DEFAULT_ELEMENT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Repository base directory holding `scripts/` and `results/`.
    pub home: PathBuf,
    /// Duration of a `wait` step without a `duration` param.
    pub default_wait_ms: u64,
    /// Timeout of `wait_for_element` without a `timeoutMs` param.
    pub element_timeout_ms: u64,
    /// Result count returned by `get_results` when no maximum is given.
    pub max_results: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from(DEFAULT_HOME),
            default_wait_ms: DEFAULT_WAIT_MS,
            element_timeout_ms: DEFAULT_ELEMENT_TIMEOUT_MS,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let data = fs::read_to_string(path)
            .map_err(|err| EngineError::io("failed to read config file", err))?;
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if is_yaml {
            serde_yml::from_str(&data)
                .map_err(|err| EngineError::protocol("failed to parse config yaml", err))
        } else {
            serde_json::from_str(&data)
                .map_err(|err| EngineError::protocol("failed to parse config json", err))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"defaultWaitMs": 5}"#).unwrap();
        assert_eq!(config.default_wait_ms, 5);
        assert_eq!(config.element_timeout_ms, DEFAULT_ELEMENT_TIMEOUT_MS);
        assert_eq!(config.home, PathBuf::from(DEFAULT_HOME));
    }

    #[test]
    fn loads_yaml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(&path, "home: /tmp/suite\nmaxResults: 3\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.home, PathBuf::from("/tmp/suite"));
        assert_eq!(config.max_results, 3);
    }

    #[test]
    fn malformed_file_is_a_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, "{ not json").unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Protocol);
    }
}
