//! Convert entry point and the remediation-retry controller.
//!
//! ## Flow
//!
//! ```text
//! resolve input ─▶ build hints ─▶ [session] ─▶ attempt 1 ─▶ classify
//!                                                  │
//!                       MissingResourceFailure ────┤
//!                                                  ▼
//!                               remediate ─▶ attempt 2 ─▶ Success | original failure
//! ```
//!
//! The retry happens at most once. When it fails, the caller sees the first
//! diagnostic: it names the fonts that were missing, whereas the retry's
//! failure is usually a side effect of the remediation.

use crate::config::AutomationConfig;
use crate::error::AutomationError;
use crate::outcome::{AutomationJob, ClassifiedResult, ConversionOutput, JobMode, ProcessOutcome, RetryState};
use crate::pipeline::classify::{classify, is_preflight_diagnostic, ARTIFACT_NOT_PRODUCED};
use crate::pipeline::discover::OUTPUT_ARTIFACT_NOT_FOUND;
use crate::pipeline::input::resolve_document;
use crate::pipeline::remediate::remediate;
use crate::pipeline::script;
use crate::pipeline::supervise::ProcessSupervisor;
use crate::session;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Export an InDesign document (or package directory) to PDF.
///
/// # Arguments
/// * `input`: an `.indd` file or an InDesign package directory
/// * `output_dir`: created if missing; the PDF is written as `<stem>.pdf`
/// * `config`: automation configuration
///
/// # Errors
/// - `FileNotFound` / `InvalidInput` for bad inputs (never retried)
/// - `ConversionFailed` when InDesign reports a problem; `is_preflight_failure`
///   is set for missing fonts or links
/// - `ArtifactNotGenerated` (code `PDF_NOT_GENERATED`) when the run looked
///   fine but no PDF appeared
/// - `Timeout` / `LaunchFailed` for runtime problems
pub async fn convert(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &AutomationConfig,
) -> Result<ConversionOutput, AutomationError> {
    let started = Instant::now();
    let input = input.as_ref();
    info!("Starting conversion: {}", input.display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = resolve_document(input)?;
    let document = absolute(&resolved.document)?;

    // ── Step 2: Prepare output location ──────────────────────────────────
    let output_dir = prepare_output_dir(output_dir.as_ref()).await?;
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let artifact = output_dir.join(format!("{stem}.pdf"));

    // ── Step 3: Resource hints ───────────────────────────────────────────
    let mut hints = scan_installed_fonts(config.font_dirs.clone()).await;
    hints.extend(resolved.document_fonts.iter().cloned());
    let job = AutomationJob::convert(&document, &artifact, hints);
    debug!(hints = job.resource_hints().len(), "Resource hints collected");

    // ── Step 4: Run, remediating once on missing fonts ───────────────────
    let _session = session::acquire().await;
    remove_stale_artifact(&artifact).await?;

    let first = run_attempt(&job, 1, config).await;
    let (result, attempts, remediated) = match first {
        ClassifiedResult::MissingResourceFailure {
            resource_names,
            raw_diagnostic,
        } => retry_after_remediation(&job, resource_names, raw_diagnostic, config).await,
        other => (other, 1, Vec::new()),
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    match result {
        ClassifiedResult::Success { artifact_path } => {
            info!(
                artifact = %artifact_path.display(),
                attempts,
                duration_ms,
                "Conversion complete"
            );
            Ok(ConversionOutput {
                artifact_path,
                attempts,
                remediated_resources: remediated,
                duration_ms,
            })
        }
        failure => {
            info!(kind = failure.label(), attempts, duration_ms, "Conversion failed");
            Err(failure_to_error(failure, JobMode::Convert, config))
        }
    }
}

/// Remediate the missing fonts and retry exactly once.
async fn retry_after_remediation(
    job: &AutomationJob,
    resource_names: Vec<String>,
    raw_diagnostic: String,
    config: &AutomationConfig,
) -> (ClassifiedResult, u8, Vec<String>) {
    let mut state = RetryState::new(resource_names.clone(), raw_diagnostic);
    state.record_retry();

    warn!(fonts = ?resource_names, "Missing fonts, remediating before retry");
    let installed = remediate(&resource_names, config).await;
    state.record_remediated(installed.iter().cloned());

    let mut extra = scan_installed_fonts(config.font_dirs.clone()).await;
    extra.extend(installed);
    let retry_job = job.with_extra_hints(extra);

    if let Err(e) = remove_stale_artifact(retry_job.artifact_path()).await {
        warn!(error = %e, "Cannot clear artifact before retry");
    }

    let remediated = state.remediated_resources().to_vec();
    let attempts = 1 + state.attempts_made();
    match run_attempt(&retry_job, attempts, config).await {
        success @ ClassifiedResult::Success { .. } => (success, attempts, remediated),
        retry_failure => {
            warn!(
                kind = retry_failure.label(),
                retry_diagnostic = %describe(&retry_failure),
                "Retry failed, reporting original diagnostic"
            );
            (state.into_original_failure(), attempts, remediated)
        }
    }
}

/// One generate → supervise → classify pass.
async fn run_attempt(job: &AutomationJob, attempt: u8, config: &AutomationConfig) -> ClassifiedResult {
    let outcome = launch(job, attempt, config).await;
    let result = classify(&outcome, job.artifact_path());
    debug!(attempt, kind = result.label(), "Attempt classified");
    if let Some(cb) = config.progress() {
        cb.on_attempt_complete(job.mode(), attempt, &result);
    }
    result
}

/// Generate the job's script and run it once under the configured timeout.
pub(crate) async fn launch(job: &AutomationJob, attempt: u8, config: &AutomationConfig) -> ProcessOutcome {
    if let Some(cb) = config.progress() {
        cb.on_attempt_start(job.mode(), attempt);
    }
    info!(mode = job.mode().as_str(), attempt, "Launching automation");
    let script = script::generate(job, config);
    ProcessSupervisor::new(config)
        .run(&script, Duration::from_millis(config.timeout_ms))
        .await
}

/// Map a terminal, non-success result to the caller-facing error.
pub(crate) fn failure_to_error(
    result: ClassifiedResult,
    mode: JobMode,
    config: &AutomationConfig,
) -> AutomationError {
    match result {
        ClassifiedResult::Success { artifact_path } => AutomationError::Internal(format!(
            "success reported as failure for {}",
            artifact_path.display()
        )),
        ClassifiedResult::MissingResourceFailure {
            resource_names,
            raw_diagnostic,
        } => AutomationError::ConversionFailed {
            message: raw_diagnostic,
            is_preflight_failure: true,
            missing_resources: resource_names,
        },
        ClassifiedResult::ValidationFailure { raw_diagnostic }
            if raw_diagnostic == ARTIFACT_NOT_PRODUCED
                || raw_diagnostic == OUTPUT_ARTIFACT_NOT_FOUND =>
        {
            AutomationError::ArtifactNotGenerated {
                mode,
                detail: raw_diagnostic,
            }
        }
        ClassifiedResult::ValidationFailure { raw_diagnostic } => AutomationError::ConversionFailed {
            is_preflight_failure: is_preflight_diagnostic(&raw_diagnostic),
            message: raw_diagnostic,
            missing_resources: Vec::new(),
        },
        ClassifiedResult::TimeoutFailure => AutomationError::Timeout {
            secs: config.timeout_ms.div_ceil(1000),
            hint: "The application may be waiting on a dialog, or the document is very large. \
                   Check the host for open dialogs and try again."
                .into(),
        },
        ClassifiedResult::LaunchFailure { message } => AutomationError::LaunchFailed {
            program: config.runtime_program.display().to_string(),
            message,
            hint: "Verify the installation path of the automation runtime and the Adobe application."
                .into(),
        },
    }
}

fn describe(result: &ClassifiedResult) -> String {
    match result {
        ClassifiedResult::MissingResourceFailure { raw_diagnostic, .. }
        | ClassifiedResult::ValidationFailure { raw_diagnostic } => raw_diagnostic.clone(),
        ClassifiedResult::LaunchFailure { message } => message.clone(),
        other => other.label().to_string(),
    }
}

/// Font base-names installed under `dirs`.
pub(crate) async fn scan_installed_fonts(dirs: Vec<PathBuf>) -> Vec<String> {
    match tokio::task::spawn_blocking(move || font_auto::installed_font_names(&dirs)).await {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "Font directory scan failed");
            Vec::new()
        }
    }
}

pub(crate) async fn prepare_output_dir(dir: &Path) -> Result<PathBuf, AutomationError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        AutomationError::Internal(format!("cannot create output directory '{}': {e}", dir.display()))
    })?;
    absolute(dir)
}

/// Removes a leftover artifact so an earlier run can't pass the on-disk check.
pub(crate) async fn remove_stale_artifact(path: &Path) -> Result<(), AutomationError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale artifact");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AutomationError::Internal(format!(
            "cannot remove existing '{}': {e}",
            path.display()
        ))),
    }
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf, AutomationError> {
    std::path::absolute(path)
        .map_err(|e| AutomationError::Internal(format!("cannot resolve '{}': {e}", path.display())))
}
