//! # indd2pdf
//!
//! Drive Adobe InDesign and Acrobat from Rust: export InDesign documents to
//! PDF and produce Acrobat "Compare Files" reports.
//!
//! Neither application has a headless API, so each job generates a script
//! (ExtendScript for InDesign, AppleScript UI scripting for Acrobat), runs it
//! through `osascript` under a timeout, and classifies the captured output
//! into a typed result.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input
//!  │
//!  ├─ 1. Resolve   .indd file, package directory, or two PDFs
//!  ├─ 2. Script    generated ExtendScript / AppleScript
//!  ├─ 3. Run       osascript, streamed output, SIGTERM → SIGKILL on timeout
//!  ├─ 4. Classify  success, missing fonts, validation, timeout, launch
//!  ├─ 5. Remediate missing fonts: download, install, retry once (Convert)
//!  └─ 6. Discover  locate Acrobat's report under its chosen name (Compare)
//! ```
//!
//! Jobs are serialised: only one automation session runs per process.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use indd2pdf::{convert, AutomationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AutomationConfig::builder()
//!         .font_source_url("https://fonts.example.net/{name}.otf")
//!         .build()?;
//!     let output = convert("Brochure Folder", "out", &config).await?;
//!     println!("{}", output.artifact_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `indd2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! indd2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compare;
pub mod config;
pub mod convert;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compare::compare;
pub use config::{AutomationConfig, AutomationConfigBuilder, CompareLayout, ScreenPoint};
pub use convert::convert;
pub use error::AutomationError;
pub use outcome::{
    AutomationJob, ClassifiedResult, ConversionOutput, JobMode, ProcessOutcome, RetryState,
};
pub use pipeline::remediate::{FontInstaller, FontSource, HttpFontSource, SystemFontInstaller};
pub use progress::{AutomationProgressCallback, NoopProgressCallback, OutputStream, ProgressCallback};
