//! Compare entry point: Acrobat "Compare Files" over two PDFs.
//!
//! Same supervise/classify pattern as Convert, without remediation. A clean
//! run is not trusted on its own: the report must be found on disk by
//! [`discover_artifact`] before it counts as success.

use crate::config::AutomationConfig;
use crate::convert::{absolute, failure_to_error, launch, prepare_output_dir, remove_stale_artifact};
use crate::error::AutomationError;
use crate::outcome::{AutomationJob, ClassifiedResult, ConversionOutput, JobMode, ProcessOutcome};
use crate::pipeline::classify::{classify, is_success_shaped};
use crate::pipeline::discover::{discover_artifact, OUTPUT_ARTIFACT_NOT_FOUND};
use crate::pipeline::input::check_pdf;
use crate::session;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Compare `older` against `newer`, saving the report into `output_dir`.
///
/// The report is written as `<older-stem>_vs_<newer-stem>.pdf`.
pub async fn compare(
    older: impl AsRef<Path>,
    newer: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &AutomationConfig,
) -> Result<ConversionOutput, AutomationError> {
    let started = Instant::now();
    let (older, newer) = (older.as_ref(), newer.as_ref());
    info!("Starting comparison: {} vs {}", older.display(), newer.display());

    check_pdf(older)?;
    check_pdf(newer)?;
    let older = absolute(older)?;
    let newer = absolute(newer)?;
    if same_file(&older, &newer) {
        return Err(AutomationError::InvalidInput {
            path: newer,
            reason: "both inputs refer to the same file".into(),
        });
    }

    let output_dir = prepare_output_dir(output_dir.as_ref()).await?;
    let artifact = output_dir.join(format!("{}_vs_{}.pdf", stem(&older), stem(&newer)));
    let job = AutomationJob::compare(&older, &newer, &artifact);

    let _session = session::acquire().await;
    remove_stale_artifact(&artifact).await?;

    let outcome = launch(&job, 1, config).await;
    let result = classify_compare(&outcome, &job, config).await;
    if let Some(cb) = config.progress() {
        cb.on_attempt_complete(JobMode::Compare, 1, &result);
    }

    let duration_ms = started.elapsed().as_millis() as u64;
    match result {
        ClassifiedResult::Success { artifact_path } => {
            info!(artifact = %artifact_path.display(), duration_ms, "Comparison complete");
            Ok(ConversionOutput {
                artifact_path,
                attempts: 1,
                remediated_resources: Vec::new(),
                duration_ms,
            })
        }
        failure => {
            info!(kind = failure.label(), duration_ms, "Comparison failed");
            Err(failure_to_error(failure, JobMode::Compare, config))
        }
    }
}

/// Discovery first for clean runs; everything else goes through the classifier.
async fn classify_compare(
    outcome: &ProcessOutcome,
    job: &AutomationJob,
    config: &AutomationConfig,
) -> ClassifiedResult {
    if !is_success_shaped(outcome) {
        return classify(outcome, job.artifact_path());
    }

    let [older, newer] = job.inputs() else {
        return ClassifiedResult::ValidationFailure {
            raw_diagnostic: OUTPUT_ARTIFACT_NOT_FOUND.into(),
        };
    };
    match discover_artifact(
        job.output_dir(),
        older,
        newer,
        &config.artifact_candidates,
        job.artifact_path(),
    )
    .await
    {
        Some(artifact_path) => ClassifiedResult::Success { artifact_path },
        None => ClassifiedResult::ValidationFailure {
            raw_diagnostic: OUTPUT_ARTIFACT_NOT_FOUND.into(),
        },
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_pdf_input() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, b"%PDF-1.4").unwrap();
        std::fs::write(&b, b"GIF89a").unwrap();

        let err = compare(&a, &b, dir.path(), &AutomationConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn rejects_same_file_twice() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        std::fs::write(&a, b"%PDF-1.4").unwrap();

        let err = compare(&a, dir.path().join(".").join("a.pdf"), dir.path(), &AutomationConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn missing_input_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = compare(
            dir.path().join("a.pdf"),
            dir.path().join("b.pdf"),
            dir.path(),
            &AutomationConfig::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }
}
