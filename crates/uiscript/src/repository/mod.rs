//! Durable storage of scripts and run results.
//!
//! Layout under the repository home:
//!
//! ```text
//! scripts/<name>.json
//! results/<name>_<YYYYMMDD_HHMMSS_ffffff>[-NNN].json
//! results/<name>_<YYYYMMDD_HHMMSS>.html        (exported reports)
//! ```
//!
//! `<name>` is the sanitized script name. Two script names that sanitize to
//! the same string share one entry; the later save overwrites the earlier.

use crate::error::{EngineError, EngineResult};
use crate::model::{Script, TestResult};
use chrono::Utc;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const SCRIPTS_DIR: &str = "scripts";
const RESULTS_DIR: &str = "results";
const RESULT_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";
const REPORT_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_STAMP_SUFFIX: u32 = 999;

#[allow(clippy::expect_used)]
fn result_stamp_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\d{8}_\d{6}_\d{6}(-\d{3})?$").expect("result stamp pattern is valid")
    })
}

fn is_invalid_file_char(c: char) -> bool {
    matches!(c, '"' | '<' | '>' | '|' | '\0' | ':' | '*' | '?' | '\\' | '/') || ('\u{1}'..='\u{1f}').contains(&c)
}

/// Filesystem-safe form of a script name.
///
/// Runs of characters that are illegal in file names collapse into a single
/// `_`, and trailing dots are removed. A name with nothing left is rejected.
pub fn sanitize_name(name: &str) -> EngineResult<String> {
    let joined = name
        .split(is_invalid_file_char)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let sanitized = joined.trim_end_matches('.');
    if sanitized.is_empty() {
        return Err(EngineError::invalid_argument(format!(
            "script name '{name}' has no file-safe characters"
        )));
    }
    Ok(sanitized.to_string())
}

/// Script and result store rooted at one home directory.
#[derive(Clone, Debug)]
pub struct ScriptRepository {
    home: PathBuf,
}

impl ScriptRepository {
    /// Open (creating if needed) a repository under `home`.
    pub fn open(home: impl Into<PathBuf>) -> EngineResult<Self> {
        let repository = Self { home: home.into() };
        for dir in [repository.scripts_dir(), repository.results_dir()] {
            fs::create_dir_all(&dir)
                .map_err(|err| EngineError::io("failed to create repository dir", err))?;
        }
        debug!(home = %repository.home.display(), "opened script repository");
        Ok(repository)
    }

    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    #[must_use]
    pub fn scripts_dir(&self) -> PathBuf {
        self.home.join(SCRIPTS_DIR)
    }

    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.home.join(RESULTS_DIR)
    }

    /// Persist `script`, advancing its `modified` stamp first.
    pub fn save(&self, script: &mut Script) -> EngineResult<PathBuf> {
        if script.name.trim().is_empty() {
            return Err(EngineError::invalid_argument("script name must not be empty"));
        }
        let path = self.script_path(&sanitize_name(&script.name)?);
        script.touch();
        write_json(&path, script)?;
        info!(script = %script.name, path = %path.display(), "saved script");
        Ok(path)
    }

    /// The stored script, or `None` when nothing is stored under `name`.
    pub fn load(&self, name: &str) -> EngineResult<Option<Script>> {
        let Ok(sanitized) = sanitize_name(name) else {
            return Ok(None);
        };
        let path = self.script_path(&sanitized);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Every readable script, sorted by name. Unreadable files are skipped.
    pub fn list(&self) -> EngineResult<Vec<Script>> {
        let mut scripts: Vec<Script> = json_files(&self.scripts_dir())?
            .into_iter()
            .filter_map(|path| match read_json(&path) {
                Ok(script) => Some(script),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable script");
                    None
                }
            })
            .collect();
        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scripts)
    }

    /// Remove a stored script. Returns whether anything was removed.
    pub fn delete(&self, name: &str) -> EngineResult<bool> {
        let Ok(sanitized) = sanitize_name(name) else {
            return Ok(false);
        };
        let path = self.script_path(&sanitized);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|err| EngineError::io("failed to delete script", err))?;
        info!(script = name, "deleted script");
        Ok(true)
    }

    /// Persist a run result next to earlier results of the same script.
    pub fn save_result(&self, result: &TestResult) -> EngineResult<PathBuf> {
        let prefix = sanitize_name(&result.script_name)?;
        let stamp = Utc::now().format(RESULT_STAMP_FORMAT).to_string();
        let path = self.unused_result_path(&prefix, &stamp)?;
        write_json(&path, result)?;
        info!(script = %result.script_name, path = %path.display(), "saved test result");
        Ok(path)
    }

    /// Up to `max_results` results for `name`, newest first.
    pub fn get_results(&self, name: &str, max_results: usize) -> EngineResult<Vec<TestResult>> {
        let Ok(prefix) = sanitize_name(name) else {
            return Ok(Vec::new());
        };
        let mut stamped: Vec<(String, PathBuf)> = json_files(&self.results_dir())?
            .into_iter()
            .filter_map(|path| {
                let stamp = result_stamp(&path, &prefix)?;
                Some((stamp, path))
            })
            .collect();
        stamped.sort_by(|a, b| b.0.cmp(&a.0));

        let mut results = Vec::new();
        for (_, path) in stamped {
            if results.len() >= max_results {
                break;
            }
            match read_json(&path) {
                Ok(result) => results.push(result),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable result"),
            }
        }
        Ok(results)
    }

    pub fn latest_result(&self, name: &str) -> EngineResult<Option<TestResult>> {
        Ok(self.get_results(name, 1)?.into_iter().next())
    }

    /// Where the HTML report for `result` is written.
    pub fn report_path(&self, result: &TestResult) -> EngineResult<PathBuf> {
        let prefix = sanitize_name(&result.script_name)?;
        let stamp = result.start_time.format(REPORT_STAMP_FORMAT);
        Ok(self.results_dir().join(format!("{prefix}_{stamp}.html")))
    }

    fn script_path(&self, sanitized: &str) -> PathBuf {
        self.scripts_dir().join(format!("{sanitized}.json"))
    }

    fn unused_result_path(&self, prefix: &str, stamp: &str) -> EngineResult<PathBuf> {
        let dir = self.results_dir();
        let first = dir.join(format!("{prefix}_{stamp}.json"));
        if !first.exists() {
            return Ok(first);
        }
        (1..=MAX_STAMP_SUFFIX)
            .map(|n| dir.join(format!("{prefix}_{stamp}-{n:03}.json")))
            .find(|path| !path.exists())
            .ok_or_else(|| EngineError::io("no free result file name", stamp))
    }
}

/// Stamp part of a result file name belonging to `prefix`, if it is one.
fn result_stamp(path: &Path, prefix: &str) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let stamp = stem.strip_prefix(prefix)?.strip_prefix('_')?;
    result_stamp_regex()
        .is_match(stamp)
        .then(|| stamp.to_string())
}

fn json_files(dir: &Path) -> EngineResult<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries =
        fs::read_dir(dir).map_err(|err| EngineError::io("failed to read repository dir", err))?;
    Ok(entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| EngineError::io("failed to create repository dir", err))?;
    }
    let data = serde_json::to_vec_pretty(value)
        .map_err(|err| EngineError::protocol("failed to serialize", err))?;
    fs::write(path, data).map_err(|err| EngineError::io("failed to write file", err))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> EngineResult<T> {
    let data = fs::read_to_string(path).map_err(|err| EngineError::io("failed to read file", err))?;
    serde_json::from_str(&data).map_err(|err| EngineError::protocol("failed to parse json", err))
}
