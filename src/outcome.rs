//! Data model shared by every pipeline stage.
//!
//! One [`AutomationJob`] flows through script generation, supervision and
//! classification. Each process run yields exactly one [`ProcessOutcome`],
//! which the classifier turns into exactly one [`ClassifiedResult`]. When a
//! missing font triggers remediation, a [`RetryState`] records the single
//! permitted retry.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which automation flow a job drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// InDesign document → PDF export.
    Convert,
    /// Acrobat "Compare Files" over two PDFs.
    Compare,
}

impl JobMode {
    /// Lowercase label used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Convert => "convert",
            JobMode::Compare => "compare",
        }
    }
}

/// One logical conversion or comparison request.
///
/// Fields are private so a job cannot change once handed to the supervisor;
/// the retry path builds a fresh job via [`AutomationJob::with_extra_hints`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationJob {
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    artifact_path: PathBuf,
    mode: JobMode,
    resource_hints: Vec<String>,
}

impl AutomationJob {
    /// A Convert job exporting `document` to `artifact_path`.
    pub fn convert(
        document: impl Into<PathBuf>,
        artifact_path: impl Into<PathBuf>,
        resource_hints: Vec<String>,
    ) -> Self {
        let artifact_path = artifact_path.into();
        Self {
            inputs: vec![document.into()],
            output_dir: parent_dir(&artifact_path),
            artifact_path,
            mode: JobMode::Convert,
            resource_hints: dedup_preserving_order(resource_hints),
        }
    }

    /// A Compare job diffing `older` against `newer`, saving to `artifact_path`.
    pub fn compare(
        older: impl Into<PathBuf>,
        newer: impl Into<PathBuf>,
        artifact_path: impl Into<PathBuf>,
    ) -> Self {
        let artifact_path = artifact_path.into();
        Self {
            inputs: vec![older.into(), newer.into()],
            output_dir: parent_dir(&artifact_path),
            artifact_path,
            mode: JobMode::Compare,
            resource_hints: Vec::new(),
        }
    }

    /// A copy of this job whose hints also contain `extra` (appended, de-duplicated).
    pub fn with_extra_hints(&self, extra: impl IntoIterator<Item = String>) -> Self {
        let mut hints = self.resource_hints.clone();
        hints.extend(extra);
        Self {
            resource_hints: dedup_preserving_order(hints),
            ..self.clone()
        }
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the caller expects the finished PDF.
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn mode(&self) -> JobMode {
        self.mode
    }

    pub fn resource_hints(&self) -> &[String] {
        &self.resource_hints
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Order-preserving de-duplication.
pub(crate) fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|s| seen.insert(s.clone())).collect()
}

/// Raw result of one automation process run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// Exit status; `-1` when the process was killed by a signal or never ran.
    pub exit_code: i32,
    pub raw_stdout: String,
    pub raw_stderr: String,
    /// The wall-clock timeout fired (partial output may still be present).
    pub timed_out: bool,
    /// The process could not be started at all.
    pub launch_error: Option<String>,
}

impl ProcessOutcome {
    /// Outcome for a process that never started.
    pub fn launch_failed(message: impl Into<String>) -> Self {
        Self {
            exit_code: -1,
            launch_error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Typed result of classifying a [`ProcessOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedResult {
    /// The expected artifact exists on disk.
    Success { artifact_path: PathBuf },
    /// Required fonts are missing; the only remediable failure.
    MissingResourceFailure {
        resource_names: Vec<String>,
        raw_diagnostic: String,
    },
    /// The document failed a hard check, or no artifact appeared.
    ValidationFailure { raw_diagnostic: String },
    /// The wall-clock timeout fired.
    TimeoutFailure,
    /// The automation runtime could not be started.
    LaunchFailure { message: String },
}

impl ClassifiedResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ClassifiedResult::Success { .. })
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ClassifiedResult::Success { .. } => "success",
            ClassifiedResult::MissingResourceFailure { .. } => "missing_resource",
            ClassifiedResult::ValidationFailure { .. } => "validation",
            ClassifiedResult::TimeoutFailure => "timeout",
            ClassifiedResult::LaunchFailure { .. } => "launch",
        }
    }
}

/// Bookkeeping for the single remediation-and-retry cycle.
///
/// Created at the first [`ClassifiedResult::MissingResourceFailure`]; the
/// original diagnostic is kept verbatim because it is what the user sees if
/// the retry fails too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempts_made: u8,
    original_diagnostic: String,
    original_resources: Vec<String>,
    remediated_resources: Vec<String>,
}

impl RetryState {
    pub fn new(original_resources: Vec<String>, original_diagnostic: String) -> Self {
        Self {
            attempts_made: 0,
            original_diagnostic,
            original_resources,
            remediated_resources: Vec::new(),
        }
    }

    /// Marks the one permitted retry as used. Saturates at one.
    pub fn record_retry(&mut self) {
        self.attempts_made = 1;
    }

    pub fn record_remediated(&mut self, names: impl IntoIterator<Item = String>) {
        self.remediated_resources.extend(names);
        let all = std::mem::take(&mut self.remediated_resources);
        self.remediated_resources = dedup_preserving_order(all);
    }

    pub fn attempts_made(&self) -> u8 {
        self.attempts_made
    }

    pub fn remediated_resources(&self) -> &[String] {
        &self.remediated_resources
    }

    /// The first failure, rebuilt for surfacing to the caller.
    pub fn into_original_failure(self) -> ClassifiedResult {
        ClassifiedResult::MissingResourceFailure {
            resource_names: self.original_resources,
            raw_diagnostic: self.original_diagnostic,
        }
    }
}

/// Successful result handed back to the inbound caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOutput {
    pub artifact_path: PathBuf,
    /// Number of automation runs performed (1, or 2 after remediation).
    pub attempts: u8,
    /// Fonts installed during remediation, if any.
    pub remediated_resources: Vec<String>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_job_derives_output_dir() {
        let job = AutomationJob::convert("/in/doc.indd", "/out/doc.pdf", vec![]);
        assert_eq!(job.output_dir(), Path::new("/out"));
        assert_eq!(job.mode(), JobMode::Convert);
        assert_eq!(job.inputs().len(), 1);
    }

    #[test]
    fn extra_hints_are_appended_once() {
        let job = AutomationJob::convert(
            "/in/doc.indd",
            "/out/doc.pdf",
            vec!["Arial".into(), "Arial".into(), "MinionPro".into()],
        );
        assert_eq!(job.resource_hints(), ["Arial", "MinionPro"]);

        let retry = job.with_extra_hints(vec!["Solway-Bold".into(), "Arial".into()]);
        assert_eq!(retry.resource_hints(), ["Arial", "MinionPro", "Solway-Bold"]);
        assert_eq!(job.resource_hints().len(), 2, "original job untouched");
    }

    #[test]
    fn retry_state_allows_exactly_one_retry() {
        let mut state = RetryState::new(vec!["Solway-Bold".into()], "orig".into());
        assert_eq!(state.attempts_made(), 0);
        state.record_retry();
        state.record_retry();
        assert_eq!(state.attempts_made(), 1);
        assert_eq!(
            state.into_original_failure(),
            ClassifiedResult::MissingResourceFailure {
                resource_names: vec!["Solway-Bold".into()],
                raw_diagnostic: "orig".into(),
            }
        );
    }

    #[test]
    fn launch_failed_outcome_has_no_output() {
        let o = ProcessOutcome::launch_failed("not found");
        assert_eq!(o.launch_error.as_deref(), Some("not found"));
        assert!(o.raw_stdout.is_empty() && o.raw_stderr.is_empty());
        assert!(!o.timed_out);
    }

    #[test]
    fn classified_result_serialises_with_kind_tag() {
        let json = serde_json::to_value(ClassifiedResult::TimeoutFailure).unwrap();
        assert_eq!(json["kind"], "timeout_failure");
    }
}
