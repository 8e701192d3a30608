//! Outcome classification: [`ProcessOutcome`] → [`ClassifiedResult`].
//!
//! Pure apart from one file-existence check on the expected artifact. All
//! literals come from [`super::markers`].

use crate::outcome::{ClassifiedResult, ProcessOutcome};
use crate::pipeline::markers::{
    APP_ERROR_PREFIX, BLOCK_TERMINATORS, ERROR_MARKER, EXCEPTION_PREFIX, EXCESS_NEWLINES,
    EXECUTION_ERROR_PREFIX, FOLLOWING_SUBHEADER, LOOSE_NAME, MISSING_FONTS_HEADER,
    MISSING_LINKS_HEADER, NOISE_LINE, STOPLIST, STRICT_NAME_LINE, TRAILING_CODE, WORKDIR_PATH,
};
use std::collections::HashSet;
use std::path::Path;

/// Diagnostic used when the run looked successful but left nothing on disk.
pub const ARTIFACT_NOT_PRODUCED: &str = "artifact not produced";

/// Classify one process run.
///
/// Precedence: timeout, then launch failure, then error marker or non-zero
/// exit, then the on-disk artifact check.
pub fn classify(outcome: &ProcessOutcome, expected_artifact: &Path) -> ClassifiedResult {
    if outcome.timed_out {
        return ClassifiedResult::TimeoutFailure;
    }
    if let Some(message) = &outcome.launch_error {
        return ClassifiedResult::LaunchFailure {
            message: message.clone(),
        };
    }

    let output = combined_output(outcome);

    if output.contains(ERROR_MARKER) || outcome.exit_code != 0 {
        let raw_diagnostic = clean_diagnostic(&extract_diagnostic(&output));
        if raw_diagnostic.contains(MISSING_FONTS_HEADER) {
            return ClassifiedResult::MissingResourceFailure {
                resource_names: parse_missing_resources(&raw_diagnostic),
                raw_diagnostic,
            };
        }
        return ClassifiedResult::ValidationFailure { raw_diagnostic };
    }

    if expected_artifact.is_file() {
        ClassifiedResult::Success {
            artifact_path: expected_artifact.to_path_buf(),
        }
    } else {
        ClassifiedResult::ValidationFailure {
            raw_diagnostic: ARTIFACT_NOT_PRODUCED.to_string(),
        }
    }
}

/// `true` when the run carries no failure signal, regardless of artifacts.
///
/// Compare uses this to decide whether artifact discovery should run.
pub fn is_success_shaped(outcome: &ProcessOutcome) -> bool {
    !outcome.timed_out
        && outcome.launch_error.is_none()
        && outcome.exit_code == 0
        && !combined_output(outcome).contains(ERROR_MARKER)
}

/// `true` for diagnostics produced by the pre-export audit.
pub fn is_preflight_diagnostic(diagnostic: &str) -> bool {
    diagnostic.contains(MISSING_FONTS_HEADER) || diagnostic.contains(MISSING_LINKS_HEADER)
}

/// stdout followed by stderr, with benign runtime noise removed.
fn combined_output(outcome: &ProcessOutcome) -> String {
    let mut joined = String::with_capacity(outcome.raw_stdout.len() + outcome.raw_stderr.len() + 1);
    joined.push_str(&outcome.raw_stdout);
    if !outcome.raw_stdout.is_empty() && !outcome.raw_stdout.ends_with('\n') {
        joined.push('\n');
    }
    joined.push_str(&outcome.raw_stderr);
    NOISE_LINE.replace_all(&joined, "").into_owned()
}

/// Text after the first error marker, or everything when there is none.
fn extract_diagnostic(output: &str) -> String {
    match output.find(ERROR_MARKER) {
        Some(idx) => output[idx + ERROR_MARKER.len()..].to_string(),
        None => output.to_string(),
    }
}

/// Strip runtime wrapper text so no script path or line:column leaks out.
pub fn clean_diagnostic(text: &str) -> String {
    let text = EXECUTION_ERROR_PREFIX.replace_all(text, "");
    let text = WORKDIR_PATH.replace_all(&text, "");
    let text = APP_ERROR_PREFIX.replace_all(&text, "");
    let text = EXCEPTION_PREFIX.replace_all(&text, "");
    let text = text.replace(ERROR_MARKER, "");
    let text = TRAILING_CODE.replace(text.trim_end(), "");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Font names listed in a missing-font block, in order, without duplicates.
pub fn parse_missing_resources(diagnostic: &str) -> Vec<String> {
    let strict = parse_block_lines(diagnostic);
    if !strict.is_empty() {
        return strict;
    }
    parse_loose(diagnostic)
}

fn parse_block_lines(diagnostic: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();

    let mut lines = diagnostic.lines().map(str::trim);
    if !lines.any(|l| l.contains(MISSING_FONTS_HEADER)) {
        return names;
    }

    let mut started = false;
    for line in lines {
        if !started && FOLLOWING_SUBHEADER.is_match(line) {
            started = true;
            continue;
        }
        if line.is_empty() {
            if started || !names.is_empty() {
                break;
            }
            continue;
        }
        if is_terminator(line) {
            break;
        }
        started = true;
        if line.len() > 2 && STRICT_NAME_LINE.is_match(line) && seen.insert(line.to_string()) {
            names.push(line.to_string());
        }
    }
    names
}

fn parse_loose(diagnostic: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    for m in LOOSE_NAME.find_iter(diagnostic) {
        let token = m.as_str();
        let head = token.split([' ', '-']).next().unwrap_or(token);
        if token.len() <= 2 || STOPLIST.contains(&token) || STOPLIST.contains(&head) {
            continue;
        }
        if seen.insert(token.to_string()) {
            names.push(token.to_string());
        }
    }
    names
}

fn is_terminator(line: &str) -> bool {
    BLOCK_TERMINATORS.iter().any(|t| line.contains(t))
}
