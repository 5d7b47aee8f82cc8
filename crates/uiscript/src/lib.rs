//! uiscript: record, store and replay desktop UI automation test scripts.
//!
//! A script is an ordered list of steps (actions, assertions and waits) with
//! declared variables. The [`runner`] executes a script against an
//! [`automation::AutomationBackend`], the [`repository`] keeps scripts and
//! timestamped results on disk, the [`recorder`] builds scripts from observed
//! interactions, and [`session::TestSession`] ties them together behind one
//! set of operations.

#![forbid(unsafe_code)]
// Public API types have docs; internal helpers are documented where the
// behavior is not obvious from the signature.
#![allow(missing_docs)]

pub mod assertions;
pub mod automation;
pub mod config;
pub mod error;
pub mod model;
pub mod recorder;
pub mod report;
pub mod repository;
pub mod runner;
pub mod session;
pub mod variables;

pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, EngineResult, ErrorCode};
pub use crate::model::*;
pub use crate::session::TestSession;
