//! Error taxonomy for the discovery pipeline.
//!
//! Three failure classes exist: [`ConfigError`] for invalid profiles or
//! authentication configuration (fail fast, nothing has run yet),
//! [`ToolFailure`] for an external tool invocation that could not complete,
//! and [`PipelineError`] for a stage that could not proceed at all. Failures
//! on individual items inside a stage are logged and absorbed by the stage
//! itself and never surface through these types.

use crate::model::StageName;
use thiserror::Error;

/// Invalid depth profile or authentication configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A profile field failed its bounds check. Values are never clamped
    /// silently; the offending field is named instead.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField {
        /// Name of the offending configuration field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The authentication configuration file could not be read or parsed.
    #[error("authentication config `{path}` could not be loaded: {reason}")]
    AuthConfig {
        /// Path of the configuration file.
        path: String,
        /// Why loading failed.
        reason: String,
    },

    /// No usable root domain could be extracted from the target argument.
    #[error("invalid target `{0}`: no domain could be extracted")]
    InvalidTarget(String),
}

/// An external scanning tool could not complete its invocation.
#[derive(Debug, Error)]
pub enum ToolFailure {
    /// The tool binary is not on `PATH`.
    #[error("tool `{tool}` not found on PATH")]
    NotFound {
        /// Name of the missing tool.
        tool: &'static str,
    },

    /// The tool ran but exited unsuccessfully.
    #[error("tool `{tool}` exited with code {code:?}: {stderr}")]
    Failed {
        /// Name of the failing tool.
        tool: &'static str,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Captured stderr, truncated for logging.
        stderr: String,
    },

    /// The tool exceeded its deadline and was killed.
    #[error("tool `{tool}` timed out after {seconds}s")]
    Timeout {
        /// Name of the tool that was killed.
        tool: &'static str,
        /// The deadline that expired.
        seconds: u64,
    },

    /// The process could not be spawned or its I/O failed.
    #[error("tool `{tool}` could not be executed: {source}")]
    Io {
        /// Name of the tool.
        tool: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A pipeline stage could not proceed; the engine halts on this.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {source}")]
pub struct PipelineError {
    /// The stage that failed.
    pub stage: StageName,
    /// The tool failure that made the stage unable to run.
    #[source]
    pub source: ToolFailure,
}

impl PipelineError {
    pub(crate) fn in_stage(stage: StageName) -> impl FnOnce(ToolFailure) -> Self {
        move |source| Self { stage, source }
    }
}
