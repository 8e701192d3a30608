//! Error types for the indd2pdf library.
//!
//! Two layers reflect two distinct kinds of failure:
//!
//! * [`crate::outcome::ClassifiedResult`]: what the automation run *did*.
//!   Produced by the classifier, consumed by the retry controller. Never
//!   leaves the library directly.
//!
//! * [`AutomationError`]: **Fatal** for the request: returned as
//!   `Err(AutomationError)` from [`crate::convert()`] and [`crate::compare()`].
//!   Each variant carries a stable wire code via [`AutomationError::code`].

use crate::outcome::JobMode;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the indd2pdf library.
#[derive(Debug, Error)]
pub enum AutomationError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The input exists but is not the kind of document the flow needs.
    #[error("Invalid input '{path}': {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    // ── Automation results ────────────────────────────────────────────────
    /// The run looked successful but no artifact was found.
    #[error("{} was not generated: {detail}", artifact_label(.mode))]
    ArtifactNotGenerated { mode: JobMode, detail: String },

    /// The host application reported a failure (missing fonts, missing
    /// links, script error).
    #[error("Conversion failed: {message}")]
    ConversionFailed {
        message: String,
        /// The failure came from the pre-export font/link audit.
        is_preflight_failure: bool,
        /// Fonts reported missing, when the failure is font-related.
        missing_resources: Vec<String>,
    },

    /// The automation runtime exceeded its wall-clock budget.
    #[error("Automation timed out after {secs}s.\n{hint}")]
    Timeout { secs: u64, hint: String },

    /// The automation runtime could not be started.
    #[error("Failed to launch '{program}': {message}\n{hint}")]
    LaunchFailed {
        program: String,
        message: String,
        hint: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (I/O on the output directory, task panic).
    #[error("Internal error: {0}")]
    Internal(String),
}

fn artifact_label(mode: &JobMode) -> &'static str {
    match mode {
        JobMode::Convert => "PDF",
        JobMode::Compare => "Comparison report",
    }
}

impl AutomationError {
    /// Stable machine-readable code surfaced to HTTP callers.
    pub fn code(&self) -> &'static str {
        match self {
            AutomationError::FileNotFound { .. } => "FILE_NOT_FOUND",
            AutomationError::InvalidInput { .. } => "INVALID_INPUT",
            AutomationError::ArtifactNotGenerated {
                mode: JobMode::Convert,
                ..
            } => "PDF_NOT_GENERATED",
            AutomationError::ArtifactNotGenerated {
                mode: JobMode::Compare,
                ..
            } => "ARTIFACT_NOT_GENERATED",
            AutomationError::ConversionFailed { .. } => "CONVERSION_FAILED",
            AutomationError::Timeout { .. } => "TIMEOUT",
            AutomationError::LaunchFailed { .. } => "LAUNCH_FAILED",
            AutomationError::InvalidConfig(_) => "INVALID_CONFIG",
            AutomationError::Internal(_) => "INTERNAL",
        }
    }

    /// `true` only for failures raised by the pre-export audit.
    pub fn is_preflight_failure(&self) -> bool {
        matches!(
            self,
            AutomationError::ConversionFailed {
                is_preflight_failure: true,
                ..
            }
        )
    }

    /// The user-facing message without the hint lines.
    pub fn message(&self) -> String {
        match self {
            AutomationError::ConversionFailed { message, .. } => message.clone(),
            AutomationError::LaunchFailed { message, .. } => message.clone(),
            other => other
                .to_string()
                .lines()
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}
