//! Process supervision: run one generated script under a wall-clock budget.
//!
//! ## Lifecycle of one run
//!
//! ```text
//! TempDir ──▶ write script (+ bridge wrapper) ──▶ spawn runtime
//!                                                   │
//!                      stdout/stderr reader tasks ◀─┤  (attached at once)
//!                                                   ▼
//!                                    wait ── timeout? ──▶ SIGTERM ─ grace ─▶ SIGKILL
//!                                                   │
//!                        drain readers (bounded) ◀──┘
//!                                                   ▼
//!                                  ProcessOutcome, TempDir dropped
//! ```
//!
//! On unix the runtime is started as the leader of its own process group so
//! termination reaches every helper it forked. Launch failures never produce
//! output; the caller sees only [`ProcessOutcome::launch_error`].

use crate::config::{AutomationConfig, DUPLICATE_CLASS_WARNING_ENV};
use crate::outcome::ProcessOutcome;
use crate::pipeline::script::{bridge_wrapper, AutomationScript, ScriptLanguage};
use crate::progress::{AutomationProgressCallback, OutputStream, ProgressCallback};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Upper bound on waiting for the pipes to close once the runtime has exited.
///
/// A forked helper that outlives the runtime can hold the write end open.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs generated scripts through the configured automation runtime.
pub struct ProcessSupervisor<'a> {
    config: &'a AutomationConfig,
}

impl<'a> ProcessSupervisor<'a> {
    pub fn new(config: &'a AutomationConfig) -> Self {
        Self { config }
    }

    /// Run `script`, enforcing `timeout`.
    ///
    /// Exactly one OS process is spawned. The script files live in a
    /// per-call temporary directory removed before this returns, whatever
    /// the outcome.
    pub async fn run(&self, script: &AutomationScript, timeout: Duration) -> ProcessOutcome {
        let workdir = match tempfile::Builder::new().prefix("indd2pdf-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return ProcessOutcome::launch_failed(format!(
                    "cannot create script directory: {e}"
                ))
            }
        };

        let entry = match write_script_files(workdir.path(), script).await {
            Ok(path) => path,
            Err(e) => return ProcessOutcome::launch_failed(format!("cannot write script: {e}")),
        };

        let outcome = self.spawn_and_wait(&entry, timeout).await;
        drop(workdir);
        outcome
    }

    async fn spawn_and_wait(&self, entry: &Path, timeout: Duration) -> ProcessOutcome {
        let program = &self.config.runtime_program;

        let mut cmd = Command::new(program);
        cmd.args(&self.config.runtime_args)
            .arg(entry)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env(DUPLICATE_CLASS_WARNING_ENV.0, DUPLICATE_CLASS_WARNING_ENV.1)
            .kill_on_drop(true);
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %program.display(), error = %e, "Failed to launch automation runtime");
                return ProcessOutcome::launch_failed(e.to_string());
            }
        };

        let started = Instant::now();
        let progress = self.config.progress_callback.clone();
        let stdout_buf = Arc::new(Mutex::new(String::new()));
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let readers = [
            child.stdout.take().map(|pipe| {
                spawn_reader(pipe, OutputStream::Stdout, stdout_buf.clone(), progress.clone())
            }),
            child.stderr.take().map(|pipe| {
                spawn_reader(pipe, OutputStream::Stderr, stderr_buf.clone(), progress.clone())
            }),
        ];

        info!(
            program = %program.display(),
            pid = child.id().unwrap_or_default(),
            timeout_ms = timeout.as_millis() as u64,
            "Automation runtime started"
        );

        let mut timed_out = false;
        let exit_code = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status.code().unwrap_or(-1),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to wait for automation runtime");
                -1
            }
            Err(_) => {
                timed_out = true;
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Automation runtime timed out, terminating"
                );
                terminate(&mut child, Duration::from_millis(self.config.grace_ms)).await;
                -1
            }
        };

        drain(readers).await;

        let outcome = ProcessOutcome {
            exit_code,
            raw_stdout: take_buffer(&stdout_buf),
            raw_stderr: take_buffer(&stderr_buf),
            timed_out,
            launch_error: None,
        };
        info!(
            exit_code,
            timed_out,
            elapsed_ms = started.elapsed().as_millis() as u64,
            stdout_bytes = outcome.raw_stdout.len(),
            stderr_bytes = outcome.raw_stderr.len(),
            "Automation runtime finished"
        );
        outcome
    }
}

/// Write the script (and its wrapper when bridged); returns the file the
/// runtime should be given.
async fn write_script_files(dir: &Path, script: &AutomationScript) -> std::io::Result<PathBuf> {
    let script_path = dir.join(format!("job.{}", script.language.extension()));
    tokio::fs::write(&script_path, &script.text).await?;

    match &script.bridge_app {
        Some(app) => {
            let wrapper_path =
                dir.join(format!("bridge.{}", ScriptLanguage::AppleScript.extension()));
            tokio::fs::write(&wrapper_path, bridge_wrapper(app, &script_path)).await?;
            Ok(wrapper_path)
        }
        None => Ok(script_path),
    }
}

fn spawn_reader<R>(
    pipe: R,
    stream: OutputStream,
    buffer: Arc<Mutex<String>>,
    progress: Option<ProgressCallback>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(pipe).lines());
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!(?stream, error = %e, "Output pipe read failed");
                    break;
                }
            };
            debug!(?stream, "{line}");
            if let Some(cb) = progress.as_deref() {
                AutomationProgressCallback::on_output_line(cb, stream, &line);
            }
            if let Ok(mut buf) = buffer.lock() {
                buf.push_str(&line);
                buf.push('\n');
            }
        }
    })
}

async fn drain(readers: [Option<JoinHandle<()>>; 2]) {
    for handle in readers.into_iter().flatten() {
        let abort = handle.abort_handle();
        if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
            debug!("Output pipe still open after exit, abandoning reader");
            abort.abort();
        }
    }
}

fn take_buffer(buffer: &Mutex<String>) -> String {
    buffer
        .lock()
        .map(|mut b| std::mem::take(&mut *b))
        .unwrap_or_default()
}

/// Graceful stop, then force after `grace`.
async fn terminate(child: &mut Child, grace: Duration) {
    let Some(pid) = child.id() else {
        return;
    };

    request_stop(child, pid);
    if tokio::time::timeout(grace, child.wait()).await.is_ok() {
        debug!(pid, "Automation runtime exited after stop request");
        return;
    }

    warn!(pid, grace_ms = grace.as_millis() as u64, "Grace period elapsed, killing");
    force_kill(pid);
    if let Err(e) = child.kill().await {
        debug!(pid, error = %e, "Kill after group kill");
    }
}

#[cfg(unix)]
fn request_stop(_child: &mut Child, pid: u32) {
    signal_group(pid, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child, _pid: u32) {
    let _ = child.start_kill();
}

#[cfg(unix)]
fn force_kill(pid: u32) {
    signal_group(pid, nix::sys::signal::Signal::SIGKILL);
}

#[cfg(not(unix))]
fn force_kill(_pid: u32) {}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::unistd::Pid;
    if let Err(e) = nix::sys::signal::killpg(Pid::from_raw(pid as i32), signal) {
        debug!(pid, ?signal, error = %e, "killpg failed");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::pipeline::script::ScriptLanguage;

    fn shell_config(body: &str) -> AutomationConfig {
        AutomationConfig::builder()
            .runtime_program("sh")
            .runtime_args(vec!["-c".into(), body.into(), "sh".into()])
            .bridge_extendscript(false)
            .grace_ms(500)
            .build()
            .unwrap()
    }

    fn script(text: &str) -> AutomationScript {
        AutomationScript {
            language: ScriptLanguage::ExtendScript,
            text: text.into(),
            bridge_app: None,
        }
    }

    #[tokio::test]
    async fn captures_both_streams() {
        let config = shell_config("cat \"$1\"; echo warn >&2");
        let outcome = ProcessSupervisor::new(&config)
            .run(&script("OK: /out/doc.pdf"), Duration::from_secs(10))
            .await;
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.raw_stdout, "OK: /out/doc.pdf\n");
        assert_eq!(outcome.raw_stderr, "warn\n");
        assert!(!outcome.timed_out);
        assert!(outcome.launch_error.is_none());
    }

    #[tokio::test]
    async fn reports_nonzero_exit() {
        let config = shell_config("echo 'ERROR: nope'; exit 3");
        let outcome = ProcessSupervisor::new(&config)
            .run(&script(""), Duration::from_secs(10))
            .await;
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.raw_stdout, "ERROR: nope\n");
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_failure() {
        let config = AutomationConfig::builder()
            .runtime_program("/nonexistent/indd2pdf-runtime")
            .build()
            .unwrap();
        let outcome = ProcessSupervisor::new(&config)
            .run(&script(""), Duration::from_secs(5))
            .await;
        assert!(outcome.launch_error.is_some());
        assert!(outcome.raw_stdout.is_empty());
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn timeout_terminates_the_process() {
        let config = shell_config("echo started; exec sleep 30");
        let started = Instant::now();
        let outcome = ProcessSupervisor::new(&config)
            .run(&script(""), Duration::from_millis(300))
            .await;
        assert!(outcome.timed_out);
        assert_eq!(outcome.raw_stdout, "started\n");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn ignored_sigterm_escalates_to_kill() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let body = format!(
            "echo $$ > '{}'; trap '' TERM; while :; do sleep 0.1; done",
            pid_file.display()
        );
        let config = shell_config(&body);
        let outcome = ProcessSupervisor::new(&config)
            .run(&script(""), Duration::from_millis(300))
            .await;
        assert!(outcome.timed_out);

        let pid: i32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok();
        assert!(!alive, "runtime still running after forced termination");
    }

    #[tokio::test]
    async fn script_files_are_removed_afterwards() {
        let config = shell_config("echo \"$1\"");
        let outcome = ProcessSupervisor::new(&config)
            .run(&script("x"), Duration::from_secs(10))
            .await;
        let path = PathBuf::from(outcome.raw_stdout.trim());
        assert!(path.ends_with("job.jsx"), "got {}", path.display());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn bridged_script_runs_through_wrapper() {
        let config = shell_config("cat \"$1\"");
        let mut bridged = script("alert('hi')");
        bridged.bridge_app = Some("Adobe InDesign 2025".into());
        let outcome = ProcessSupervisor::new(&config)
            .run(&bridged, Duration::from_secs(10))
            .await;
        assert!(outcome.raw_stdout.contains("do script (POSIX file"));
        assert!(outcome.raw_stdout.contains("job.jsx"));
    }

    #[tokio::test]
    async fn duplicate_class_warning_env_is_set() {
        let config = shell_config("printenv OBJC_PRINT_DUPLICATE_CLASS_WARNINGS");
        let outcome = ProcessSupervisor::new(&config)
            .run(&script(""), Duration::from_secs(10))
            .await;
        assert_eq!(outcome.raw_stdout, "NO\n");
    }
}
