//! Integration tests for the Convert and Compare controllers.
//!
//! The automation runtime is replaced by `sh -c <body>`: the generated
//! script path arrives as `$1`, so each body inspects the script the same
//! way InDesign or Acrobat would act on it. Font collaborators are in-memory
//! fakes. Unix only.

#![cfg(unix)]

use async_trait::async_trait;
use font_auto::FontAutoError;
use indd2pdf::{
    compare, convert, AutomationConfig, AutomationConfigBuilder, AutomationError,
    AutomationProgressCallback, ClassifiedResult, FontInstaller, FontSource, JobMode, OutputStream,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

// ── Fake runtime bodies ──────────────────────────────────────────────────────

/// Prints `OK` and writes the PDF when `Solway-Bold` is hinted; otherwise
/// reports it missing. Every run appends to `$RUNS_FILE`.
const CONVERT_NEEDS_SOLWAY: &str = r#"
n=$(($(cat "$RUNS_FILE" 2>/dev/null || echo 0) + 1)); echo $n > "$RUNS_FILE"
pdf=$(sed -n 's/^ *var PDF_PATH = "\(.*\)";$/\1/p' "$1")
if grep -q 'RESOURCE_HINTS = .*"Solway-Bold"' "$1"; then
    printf '%%PDF-1.7\n' > "$pdf"
    echo "OK: $pdf"
else
    echo "objc[77]: Class AXHelper is implemented in both /a and /b. One of the two will be used." >&2
    printf 'ERROR: Missing Fonts\nThe following fonts are missing on this system:\nSolway-Bold\n\nSolutions: attempt %s\n' "$n"
fi
"#;

/// Acrobat saves its report as `<new>_compared.pdf` in the output directory.
const COMPARE_SAVES_REPORT: &str = r#"
dir=$(sed -n 's/^ *set outputDir to "\(.*\)"$/\1/p' "$1")
new=$(sed -n 's/^ *set newPath to "\(.*\)"$/\1/p' "$1")
stem=$(basename "$new" .pdf)
printf '%%PDF-1.7 report\n' > "$dir/${stem}_compared.pdf"
echo "OK: $dir"
"#;

// ── Fake collaborators ───────────────────────────────────────────────────────

/// Serves a font file for each name in `known`.
struct FakeFontSource {
    known: Vec<&'static str>,
    calls: AtomicUsize,
}

#[async_trait]
impl FontSource for FakeFontSource {
    async fn acquire(&self, name: &str, target_dir: &Path) -> Vec<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.known.iter().any(|k| *k == name) {
            return Vec::new();
        }
        let path = target_dir.join(format!("{name}.otf"));
        std::fs::write(&path, b"OTTO").unwrap();
        vec![path]
    }
}

/// Installs into a test-owned font directory.
struct DirInstaller {
    dir: PathBuf,
    refreshes: AtomicUsize,
}

#[async_trait]
impl FontInstaller for DirInstaller {
    async fn install_permanently(&self, paths: &[PathBuf]) -> Result<Vec<String>, FontAutoError> {
        Ok(font_auto::install_fonts(paths, &self.dir)?.names())
    }

    async fn refresh_cache(&self) -> Result<(), FontAutoError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl AutomationProgressCallback for Recorder {
    fn on_attempt_start(&self, mode: JobMode, attempt: u8) {
        self.push(format!("start {} {attempt}", mode.as_str()));
    }

    fn on_output_line(&self, stream: OutputStream, line: &str) {
        if stream == OutputStream::Stdout && line.starts_with("OK:") {
            self.push("ok-line".into());
        }
    }

    fn on_attempt_complete(&self, _mode: JobMode, attempt: u8, result: &ClassifiedResult) {
        self.push(format!("done {attempt} {}", result.label()));
    }

    fn on_remediation_start(&self, resource_names: &[String]) {
        self.push(format!("remediate {}", resource_names.join(",")));
    }

    fn on_resource_installed(&self, name: &str) {
        self.push(format!("installed {name}"));
    }
}

impl Recorder {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("fonts")).unwrap();
        Self { root }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    fn document(&self) -> PathBuf {
        let doc = self.path("doc.indd");
        std::fs::write(&doc, b"indd").unwrap();
        doc
    }

    fn pdf(&self, name: &str) -> PathBuf {
        let pdf = self.path(name);
        std::fs::write(&pdf, b"%PDF-1.4\n").unwrap();
        pdf
    }

    fn runs(&self) -> usize {
        std::fs::read_to_string(self.path("runs"))
            .map(|s| s.trim().parse().unwrap())
            .unwrap_or(0)
    }

    fn runtime(&self, body: &str) -> AutomationConfigBuilder {
        AutomationConfig::builder()
            .runtime_program("sh")
            .runtime_args(vec!["-c".into(), body.into(), "sh".into()])
            .bridge_extendscript(false)
            .env("RUNS_FILE", self.path("runs").display().to_string())
            .font_dirs(vec![self.path("fonts")])
            .grace_ms(500)
            .font_settle_ms(0)
    }
}

// ── Convert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_font_is_remediated_and_retry_succeeds() {
    let ws = Workspace::new();
    let source = Arc::new(FakeFontSource {
        known: vec!["Solway-Bold"],
        calls: AtomicUsize::new(0),
    });
    let installer = Arc::new(DirInstaller {
        dir: ws.path("fonts"),
        refreshes: AtomicUsize::new(0),
    });
    let recorder = Arc::new(Recorder::default());
    let config = ws
        .runtime(CONVERT_NEEDS_SOLWAY)
        .font_source(source.clone())
        .font_installer(installer.clone())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let output = assert_ok!(convert(ws.document(), ws.path("out"), &config).await);

    assert_eq!(output.attempts, 2);
    assert_eq!(output.remediated_resources, ["Solway-Bold"]);
    assert_eq!(output.artifact_path, ws.path("out").join("doc.pdf"));
    assert!(output.artifact_path.is_file());
    assert_eq!(ws.runs(), 2);
    assert_eq!(installer.refreshes.load(Ordering::SeqCst), 1);
    assert!(ws.path("fonts").join("Solway-Bold.otf").is_file());

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            "start convert 1",
            "done 1 missing_resource",
            "remediate Solway-Bold",
            "installed Solway-Bold",
            "start convert 2",
            "ok-line",
            "done 2 success",
        ]
    );
}

#[tokio::test]
async fn unavailable_font_retries_once_and_reports_original_diagnostic() {
    let ws = Workspace::new();
    let source = Arc::new(FakeFontSource {
        known: vec![],
        calls: AtomicUsize::new(0),
    });
    let installer = Arc::new(DirInstaller {
        dir: ws.path("fonts"),
        refreshes: AtomicUsize::new(0),
    });
    let config = ws
        .runtime(CONVERT_NEEDS_SOLWAY)
        .font_source(source.clone())
        .font_installer(installer.clone())
        .build()
        .unwrap();

    let err = assert_err!(convert(ws.document(), ws.path("out"), &config).await);

    assert_eq!(ws.runs(), 2, "exactly one retry");
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(installer.refreshes.load(Ordering::SeqCst), 0);
    match err {
        AutomationError::ConversionFailed {
            message,
            is_preflight_failure,
            missing_resources,
        } => {
            assert!(is_preflight_failure);
            assert_eq!(missing_resources, ["Solway-Bold"]);
            assert!(message.contains("attempt 1"), "got: {message}");
            assert!(!message.contains("attempt 2"));
            assert!(!message.contains("objc["));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn package_fonts_count_as_hints() {
    let ws = Workspace::new();
    let pkg = ws.path("Package");
    std::fs::create_dir_all(pkg.join("Document fonts")).unwrap();
    std::fs::write(pkg.join("doc.indd"), b"indd").unwrap();
    std::fs::write(pkg.join("Document fonts").join("Solway-Bold.otf"), b"OTTO").unwrap();
    let config = ws.runtime(CONVERT_NEEDS_SOLWAY).build().unwrap();

    let output = assert_ok!(convert(&pkg, ws.path("out"), &config).await);
    assert_eq!(output.attempts, 1);
    assert_eq!(ws.runs(), 1);
}

#[tokio::test]
async fn clean_exit_without_pdf_is_not_generated() {
    let ws = Workspace::new();
    let config = ws.runtime("echo 'OK: done'").build().unwrap();

    let err = assert_err!(convert(ws.document(), ws.path("out"), &config).await);
    assert_eq!(err.code(), "PDF_NOT_GENERATED");
}

#[tokio::test]
async fn stale_pdf_does_not_count_as_success() {
    let ws = Workspace::new();
    std::fs::create_dir_all(ws.path("out")).unwrap();
    std::fs::write(ws.path("out").join("doc.pdf"), b"%PDF stale").unwrap();
    let config = ws.runtime("echo 'OK: done'").build().unwrap();

    let err = assert_err!(convert(ws.document(), ws.path("out"), &config).await);
    assert_eq!(err.code(), "PDF_NOT_GENERATED");
    assert!(!ws.path("out").join("doc.pdf").exists());
}

#[tokio::test]
async fn script_error_is_surfaced_without_tooling_boilerplate() {
    let ws = Workspace::new();
    let body = r#"echo "$1:12:40: execution error: Adobe InDesign 2025 got an error: ERROR: PDF export preset not found: [Press] (-2753)" >&2; exit 1"#;
    let config = ws.runtime(body).build().unwrap();

    let err = assert_err!(convert(ws.document(), ws.path("out"), &config).await);
    assert_eq!(err.code(), "CONVERSION_FAILED");
    assert!(!err.is_preflight_failure());
    assert_eq!(err.message(), "PDF export preset not found: [Press]");
}

#[tokio::test]
async fn missing_runtime_is_launch_failure() {
    let ws = Workspace::new();
    let config = AutomationConfig::builder()
        .runtime_program(ws.path("no-such-runtime"))
        .font_dirs(vec![])
        .build()
        .unwrap();

    let err = assert_err!(convert(ws.document(), ws.path("out"), &config).await);
    assert_eq!(err.code(), "LAUNCH_FAILED");
}

#[tokio::test]
async fn hung_runtime_times_out() {
    let ws = Workspace::new();
    let config = ws.runtime("exec sleep 30").timeout_ms(300).build().unwrap();

    let started = std::time::Instant::now();
    let err = assert_err!(convert(ws.document(), ws.path("out"), &config).await);
    assert_eq!(err.code(), "TIMEOUT");
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}

// ── Compare ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn compare_report_is_discovered_and_renamed() {
    let ws = Workspace::new();
    let config = ws.runtime(COMPARE_SAVES_REPORT).build().unwrap();

    let output = assert_ok!(
        compare(ws.pdf("v1.pdf"), ws.pdf("v2.pdf"), ws.path("reports"), &config).await
    );
    assert_eq!(output.artifact_path, ws.path("reports").join("v1_vs_v2.pdf"));
    assert!(output.artifact_path.is_file());
    assert!(!ws.path("reports").join("v2_compared.pdf").exists());
}

#[tokio::test]
async fn compare_without_report_is_artifact_not_generated() {
    let ws = Workspace::new();
    let config = ws.runtime("echo 'OK: saved'").build().unwrap();

    let err = assert_err!(
        compare(ws.pdf("v1.pdf"), ws.pdf("v2.pdf"), ws.path("reports"), &config).await
    );
    assert_eq!(err.code(), "ARTIFACT_NOT_GENERATED");
    assert_eq!(err.message(), "Comparison report was not generated: output artifact not found");
}

#[tokio::test]
async fn compare_ui_error_is_conversion_failure() {
    let ws = Workspace::new();
    let config = ws
        .runtime(r#"echo 'ERROR: System Events got an error: Can’t get menu item "Open". (-1728)'"#)
        .build()
        .unwrap();

    let err = assert_err!(
        compare(ws.pdf("v1.pdf"), ws.pdf("v2.pdf"), ws.path("reports"), &config).await
    );
    assert_eq!(err.code(), "CONVERSION_FAILED");
    assert_eq!(err.message(), "Can’t get menu item \"Open\".");
}

// ── Serialisation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_jobs_run_one_at_a_time() {
    let ws = Workspace::new();
    let lock = ws.path("busy");
    let body = format!(
        "if [ -e '{lock}' ]; then echo 'ERROR: overlap'; exit 1; fi; touch '{lock}'; sleep 0.2; rm '{lock}'; \
         pdf=$(sed -n 's/^ *var PDF_PATH = \"\\(.*\\)\";$/\\1/p' \"$1\"); printf '%%PDF' > \"$pdf\"",
        lock = lock.display()
    );
    let config = ws.runtime(&body).build().unwrap();

    let docs: Vec<PathBuf> = (0..3)
        .map(|i| {
            let doc = ws.path(&format!("doc{i}.indd"));
            std::fs::write(&doc, b"indd").unwrap();
            doc
        })
        .collect();

    let results = futures::future::join_all(
        docs.iter()
            .map(|doc| convert(doc, ws.path("out"), &config)),
    )
    .await;

    for result in results {
        assert_ok!(result);
    }
}
