//! Progress-callback trait for automation events.
//!
//! Inject an [`Arc<dyn AutomationProgressCallback>`] via
//! [`crate::config::AutomationConfigBuilder::progress_callback`] to receive
//! events while a job runs: each attempt, every line the automation runtime
//! prints, and the remediation step between attempts.
//!
//! # Example
//!
//! ```rust
//! use indd2pdf::{AutomationConfig, AutomationProgressCallback, OutputStream};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct LineCounter {
//!     lines: AtomicUsize,
//! }
//!
//! impl AutomationProgressCallback for LineCounter {
//!     fn on_output_line(&self, _stream: OutputStream, _line: &str) {
//!         self.lines.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(LineCounter { lines: AtomicUsize::new(0) });
//!
//! let config = AutomationConfig::builder()
//!     .progress_callback(counter as Arc<dyn AutomationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::outcome::{ClassifiedResult, JobMode};
use std::sync::Arc;

/// Which pipe a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Called by the controllers as a job progresses.
///
/// Implementations must be `Send + Sync`: output lines arrive from the two
/// reader tasks concurrently. All methods default to no-ops.
pub trait AutomationProgressCallback: Send + Sync {
    /// Called before each automation run.
    ///
    /// # Arguments
    /// * `mode`: convert or compare
    /// * `attempt`: 1 for the first run, 2 for the post-remediation retry
    fn on_attempt_start(&self, mode: JobMode, attempt: u8) {
        let _ = (mode, attempt);
    }

    /// Called for every line the automation runtime prints, as it is read.
    fn on_output_line(&self, stream: OutputStream, line: &str) {
        let _ = (stream, line);
    }

    /// Called once a run has been classified.
    fn on_attempt_complete(&self, mode: JobMode, attempt: u8, result: &ClassifiedResult) {
        let _ = (mode, attempt, result);
    }

    /// Called before fonts are acquired for the retry.
    fn on_remediation_start(&self, resource_names: &[String]) {
        let _ = resource_names;
    }

    /// Called for each font that ended up installed (new or already present).
    fn on_resource_installed(&self, name: &str) {
        let _ = name;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AutomationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AutomationConfig`].
pub type ProgressCallback = Arc<dyn AutomationProgressCallback>;
