//! Engine error type and stable error codes.
//!
//! Every fallible engine operation returns [`EngineResult`]. Failures inside a
//! single script step never surface here: the runner converts them into a
//! failed step result instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Result alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Stable, machine-readable error codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// A script or result does not exist.
    #[serde(rename = "E_NOT_FOUND")]
    NotFound,
    /// Missing field, malformed document or unknown step command/type.
    #[serde(rename = "E_INVALID_ARGUMENT")]
    InvalidArgument,
    /// The automation backend reported a failure.
    #[serde(rename = "E_CAPABILITY")]
    Capability,
    /// Reading or writing the repository failed.
    #[serde(rename = "E_IO")]
    Io,
    /// Encoding or decoding a document failed.
    #[serde(rename = "E_PROTOCOL")]
    Protocol,
    /// Recorder misuse (e.g. resume without a prior start).
    #[serde(rename = "E_RECORDING")]
    Recording,
}

impl ErrorCode {
    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "E_NOT_FOUND",
            Self::InvalidArgument => "E_INVALID_ARGUMENT",
            Self::Capability => "E_CAPABILITY",
            Self::Io => "E_IO",
            Self::Protocol => "E_PROTOCOL",
            Self::Recording => "E_RECORDING",
        }
    }

    /// Parse a wire string back into a code.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "E_NOT_FOUND" => Some(Self::NotFound),
            "E_INVALID_ARGUMENT" => Some(Self::InvalidArgument),
            "E_CAPABILITY" => Some(Self::Capability),
            "E_IO" => Some(Self::Io),
            "E_PROTOCOL" => Some(Self::Protocol),
            "E_RECORDING" => Some(Self::Recording),
            _ => None,
        }
    }

    /// Process exit code used by the CLI.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::NotFound => 2,
            Self::InvalidArgument => 3,
            Self::Capability => 4,
            Self::Io => 5,
            Self::Protocol => 6,
            Self::Recording => 7,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured engine error.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{code}: {message}")]
pub struct EngineError {
    /// Error category.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional structured context (offending path, source error, ...).
    pub context: Option<Value>,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self {
            code,
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message, None)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message, None)
    }

    pub fn recording(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Recording, message, None)
    }

    pub fn capability(err: &crate::automation::AutomationError) -> Self {
        Self::new(ErrorCode::Capability, err.to_string(), None)
    }

    pub fn io(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Io,
            message,
            serde_json::json!({ "source": err.to_string() }),
        )
    }

    pub fn protocol(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Protocol,
            message,
            serde_json::json!({ "source": err.to_string() }),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_wire_strings() {
        for code in [
            ErrorCode::NotFound,
            ErrorCode::InvalidArgument,
            ErrorCode::Capability,
            ErrorCode::Io,
            ErrorCode::Protocol,
            ErrorCode::Recording,
        ] {
            assert_eq!(ErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::parse("E_UNKNOWN"), None);
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = EngineError::not_found("script 'login' not found");
        assert_eq!(err.to_string(), "E_NOT_FOUND: script 'login' not found");
    }
}
