//! CLI binary for indd2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AutomationConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indd2pdf::{
    compare, convert, AutomationConfig, AutomationError, AutomationProgressCallback,
    ClassifiedResult, ConversionOutput, JobMode, OutputStream, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the current attempt and the last line the runtime printed.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl AutomationProgressCallback for CliProgressCallback {
    fn on_attempt_start(&self, mode: JobMode, attempt: u8) {
        let verb = match mode {
            JobMode::Convert => "Exporting",
            JobMode::Compare => "Comparing",
        };
        self.bar.set_prefix(if attempt > 1 {
            format!("{verb} (retry)")
        } else {
            verb.to_string()
        });
        self.bar.set_message("launching…");
    }

    fn on_output_line(&self, _stream: OutputStream, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let msg: String = line.chars().take(72).collect();
        self.bar.set_message(msg);
    }

    fn on_attempt_complete(&self, _mode: JobMode, attempt: u8, result: &ClassifiedResult) {
        let mark = if result.is_success() {
            green("✓")
        } else {
            red("✗")
        };
        self.bar
            .println(format!("  {mark} attempt {attempt}  {}", dim(result.label())));
    }

    fn on_remediation_start(&self, resource_names: &[String]) {
        self.bar.println(format!(
            "  {} missing fonts: {}",
            cyan("◆"),
            resource_names.join(", ")
        ));
        self.bar.set_prefix("Installing fonts");
    }

    fn on_resource_installed(&self, name: &str) {
        self.bar.println(format!("  {} installed {}", green("+"), bold(name)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export a packaged document
  indd2pdf convert "Brochure Folder" -o out/

  # Export with automatic font download on missing fonts
  indd2pdf --font-url 'https://fonts.example.net/{name}.otf' convert doc.indd -o out/

  # Compare two PDFs in Acrobat
  indd2pdf compare v1.pdf v2.pdf -o reports/

  # Machine-readable result
  indd2pdf --json convert doc.indd -o out/

ENVIRONMENT VARIABLES:
  Every flag can be set via INDD2PDF_<FLAG>, e.g. INDD2PDF_TIMEOUT_MS=600000.
  RUST_LOG overrides the log filter derived from --verbose / --quiet.

NOTES:
  InDesign and Acrobat are driven through their GUI session. Jobs run one at a
  time; Compare clicks at fixed screen coordinates, so keep Acrobat's window
  at its default position while it runs."#;

/// Export InDesign documents to PDF and compare PDFs with Acrobat.
#[derive(Parser, Debug)]
#[command(
    name = "indd2pdf",
    version,
    about = "Export InDesign documents to PDF and compare PDFs with Acrobat",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    automation: AutomationArgs,

    /// Output structured JSON instead of a summary line.
    #[arg(long, global = true, env = "INDD2PDF_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "INDD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs (every line the runtime prints).
    #[arg(short, long, global = true, env = "INDD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "INDD2PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export an .indd document or package directory to PDF.
    Convert {
        /// InDesign document (.indd) or package directory.
        input: PathBuf,

        /// Directory the PDF is written into.
        #[arg(short, long, env = "INDD2PDF_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,
    },
    /// Produce an Acrobat comparison report for two PDFs.
    Compare {
        /// The older PDF.
        older: PathBuf,

        /// The newer PDF.
        newer: PathBuf,

        /// Directory the report is written into.
        #[arg(short, long, env = "INDD2PDF_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AutomationArgs {
    /// Automation runtime executable.
    #[arg(long, global = true, env = "INDD2PDF_RUNTIME")]
    runtime: Option<PathBuf>,

    /// Pass the ExtendScript path straight to the runtime instead of
    /// wrapping it in an AppleScript `do script` bridge.
    #[arg(long, global = true, env = "INDD2PDF_NO_BRIDGE")]
    no_bridge: bool,

    /// InDesign application name.
    #[arg(long, global = true, env = "INDD2PDF_INDESIGN_APP")]
    indesign_app: Option<String>,

    /// Acrobat application name.
    #[arg(long, global = true, env = "INDD2PDF_ACROBAT_APP")]
    acrobat_app: Option<String>,

    /// PDF export preset name.
    #[arg(long, global = true, env = "INDD2PDF_PRESET")]
    preset: Option<String>,

    /// Wall-clock budget per automation run, in milliseconds.
    #[arg(long, global = true, env = "INDD2PDF_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Grace period between SIGTERM and SIGKILL, in milliseconds.
    #[arg(long, global = true, env = "INDD2PDF_GRACE_MS")]
    grace_ms: Option<u64>,

    /// Font download URL template containing `{name}`.
    #[arg(long, global = true, env = "INDD2PDF_FONT_URL")]
    font_url: Option<String>,

    /// Directory fonts are permanently installed into.
    #[arg(long, global = true, env = "INDD2PDF_FONT_INSTALL_DIR")]
    font_install_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; keep INFO logs out of
    // its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli.automation,
        progress.clone().map(|cb| cb as ProgressCallback),
    )?;

    // ── Run ──────────────────────────────────────────────────────────────
    let result = match &cli.command {
        Command::Convert { input, output_dir } => convert(input, output_dir, &config).await,
        Command::Compare {
            older,
            newer,
            output_dir,
        } => compare(older, newer, output_dir, &config).await,
    };

    if let Some(cb) = &progress {
        cb.finish();
    }

    match result {
        Ok(output) => {
            report_success(&cli, &output)?;
            Ok(())
        }
        Err(e) => {
            if cli.json {
                println!("{}", error_json(&e)?);
            }
            let action = match cli.command {
                Command::Convert { .. } => "Conversion failed",
                Command::Compare { .. } => "Comparison failed",
            };
            Err(anyhow::Error::new(e).context(action))
        }
    }
}

fn report_success(cli: &Cli, output: &ConversionOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::json!({ "artifactPath": output.artifact_path });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).context("Failed to serialise output")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    eprintln!(
        "{}  {}  {}",
        green("✔"),
        bold(&output.artifact_path.display().to_string()),
        dim(&format!("{}ms", output.duration_ms)),
    );
    if !output.remediated_resources.is_empty() {
        eprintln!(
            "   installed fonts: {}",
            dim(&output.remediated_resources.join(", "))
        );
    }
    Ok(())
}

fn error_json(e: &AutomationError) -> Result<String> {
    let json = serde_json::json!({
        "error": {
            "code": e.code(),
            "message": e.message(),
            "isPreflightFailure": e.is_preflight_failure(),
        }
    });
    serde_json::to_string_pretty(&json).context("Failed to serialise error")
}

/// Map CLI args to `AutomationConfig`.
fn build_config(args: &AutomationArgs, progress: Option<ProgressCallback>) -> Result<AutomationConfig> {
    let mut builder = AutomationConfig::builder();

    if let Some(ref runtime) = args.runtime {
        builder = builder.runtime_program(runtime);
    }
    if args.no_bridge {
        builder = builder.bridge_extendscript(false);
    }
    if let Some(ref app) = args.indesign_app {
        builder = builder.indesign_app(app);
    }
    if let Some(ref app) = args.acrobat_app {
        builder = builder.acrobat_app(app);
    }
    if let Some(ref preset) = args.preset {
        builder = builder.pdf_export_preset(preset);
    }
    if let Some(ms) = args.timeout_ms {
        builder = builder.timeout_ms(ms);
    }
    if let Some(ms) = args.grace_ms {
        builder = builder.grace_ms(ms);
    }
    if let Some(ref url) = args.font_url {
        builder = builder.font_source_url(url);
    }
    if let Some(ref dir) = args.font_install_dir {
        builder = builder.font_install_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
