//! Artifact discovery for the Compare flow.
//!
//! Acrobat names the saved report after whichever input it treats as
//! primary, so the file is located by probing an ordered list of templates
//! in the output directory. `{old}` and `{new}` expand to the input file
//! stems.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Diagnostic used when a clean Compare run left no recognisable report.
pub const OUTPUT_ARTIFACT_NOT_FOUND: &str = "output artifact not found";

/// Expand `templates` into concrete candidate paths under `output_dir`.
pub fn candidate_paths(
    output_dir: &Path,
    older: &Path,
    newer: &Path,
    templates: &[String],
) -> Vec<PathBuf> {
    let old = stem(older);
    let new = stem(newer);
    let mut seen = std::collections::HashSet::new();
    templates
        .iter()
        .map(|t| output_dir.join(t.replace("{old}", &old).replace("{new}", &new)))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Find the saved report and move it to `expected`.
///
/// `expected` itself is accepted as-is when it already exists. Returns
/// `None` when no candidate exists or the rename fails.
pub async fn discover_artifact(
    output_dir: &Path,
    older: &Path,
    newer: &Path,
    templates: &[String],
    expected: &Path,
) -> Option<PathBuf> {
    if tokio::fs::try_exists(expected).await.unwrap_or(false) {
        return Some(expected.to_path_buf());
    }

    for candidate in candidate_paths(output_dir, older, newer, templates) {
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            debug!(candidate = %candidate.display(), "Artifact candidate absent");
            continue;
        }
        return match tokio::fs::rename(&candidate, expected).await {
            Ok(()) => {
                info!(
                    from = %candidate.display(),
                    to = %expected.display(),
                    "Comparison report located"
                );
                Some(expected.to_path_buf())
            }
            Err(e) => {
                warn!(from = %candidate.display(), error = %e, "Cannot move comparison report");
                None
            }
        };
    }
    None
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
