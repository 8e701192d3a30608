//! Configuration types for InDesign conversion and Acrobat comparison.
//!
//! All automation behaviour is controlled through [`AutomationConfig`], built
//! via its [`AutomationConfigBuilder`]. External collaborators (font source,
//! font installer, progress sink) are injected here as trait objects so tests
//! and embedding services can replace them.

use crate::error::AutomationError;
use crate::pipeline::remediate::{FontInstaller, FontSource};
use crate::progress::{AutomationProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Environment override that silences the Objective-C runtime's
/// "Class X is implemented in both …" warnings printed by `osascript`.
pub const DUPLICATE_CLASS_WARNING_ENV: (&str, &str) = ("OBJC_PRINT_DUPLICATE_CLASS_WARNINGS", "NO");

/// Configuration for driving the Adobe applications.
///
/// Built via [`AutomationConfig::builder()`] or using
/// [`AutomationConfig::default()`].
///
/// # Example
/// ```rust
/// use indd2pdf::AutomationConfig;
///
/// let config = AutomationConfig::builder()
///     .timeout_ms(120_000)
///     .indesign_app("Adobe InDesign 2024")
///     .font_source_url("https://fonts.example.net/{name}.otf")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AutomationConfig {
    /// Program that executes generated scripts. Default: `osascript`.
    pub runtime_program: PathBuf,

    /// Arguments placed before the script path.
    pub runtime_args: Vec<String>,

    /// Run ExtendScript through an AppleScript wrapper that asks InDesign to
    /// `do script` it. Default: `true` on macOS, `false` elsewhere (the
    /// runtime then receives the `.jsx` path directly).
    pub bridge_extendscript: bool,

    /// Application name InDesign is addressed by. Default: `Adobe InDesign 2025`.
    pub indesign_app: String,

    /// Application name Acrobat is addressed by. Default: `Adobe Acrobat`.
    pub acrobat_app: String,

    /// Acrobat's process name as System Events sees it. Default: `AdobeAcrobat`.
    pub acrobat_process: String,

    /// InDesign PDF export preset. Default: `[High Quality Print]`.
    pub pdf_export_preset: String,

    /// Wall-clock budget per automation run, in ms. Default: 300 000.
    ///
    /// A conversion that remediates fonts runs twice, so the worst case is
    /// roughly twice this plus the remediation time.
    pub timeout_ms: u64,

    /// Time between SIGTERM and SIGKILL after a timeout, in ms. Default: 5 000.
    pub grace_ms: u64,

    /// Pause after the font cache is rebuilt, before the retry. Default: 3 000.
    pub font_settle_ms: u64,

    /// URL template for font downloads, containing `{name}`. Default: none
    /// (remediation installs nothing, the retry still runs once).
    pub font_source_url: Option<String>,

    /// Directories scanned for installed fonts when building resource hints.
    pub font_dirs: Vec<PathBuf>,

    /// Where remediation installs fonts. `None` uses the per-user font dir.
    pub font_install_dir: Option<PathBuf>,

    /// Extra environment for the runtime process.
    pub env: Vec<(String, String)>,

    /// Screen positions used by the Acrobat compare flow.
    pub compare_layout: CompareLayout,

    /// File names Acrobat may have saved the comparison under, tried in
    /// order. `{old}` and `{new}` expand to the input file stems.
    pub artifact_candidates: Vec<String>,

    /// Pre-constructed font source. Takes precedence over `font_source_url`.
    pub font_source: Option<Arc<dyn FontSource>>,

    /// Pre-constructed font installer. Default: permanent install via font-auto.
    pub font_installer: Option<Arc<dyn FontInstaller>>,

    /// Receives attempt/output/remediation events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            runtime_program: PathBuf::from("osascript"),
            runtime_args: Vec::new(),
            bridge_extendscript: cfg!(target_os = "macos"),
            indesign_app: "Adobe InDesign 2025".to_string(),
            acrobat_app: "Adobe Acrobat".to_string(),
            acrobat_process: "AdobeAcrobat".to_string(),
            pdf_export_preset: "[High Quality Print]".to_string(),
            timeout_ms: 300_000,
            grace_ms: 5_000,
            font_settle_ms: 3_000,
            font_source_url: None,
            font_dirs: font_auto::system_font_dirs(),
            font_install_dir: None,
            env: vec![(
                DUPLICATE_CLASS_WARNING_ENV.0.to_string(),
                DUPLICATE_CLASS_WARNING_ENV.1.to_string(),
            )],
            compare_layout: CompareLayout::default(),
            artifact_candidates: default_artifact_candidates(),
            font_source: None,
            font_installer: None,
            progress_callback: None,
        }
    }
}

fn default_artifact_candidates() -> Vec<String> {
    [
        "Compare Report.pdf",
        "{new}_compared.pdf",
        "{old}_compared.pdf",
        "Compare_{old}_{new}.pdf",
        "Compare_{new}_{old}.pdf",
        "{old} vs {new}.pdf",
        "{new} vs {old}.pdf",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl fmt::Debug for AutomationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutomationConfig")
            .field("runtime_program", &self.runtime_program)
            .field("runtime_args", &self.runtime_args)
            .field("bridge_extendscript", &self.bridge_extendscript)
            .field("indesign_app", &self.indesign_app)
            .field("acrobat_app", &self.acrobat_app)
            .field("timeout_ms", &self.timeout_ms)
            .field("grace_ms", &self.grace_ms)
            .field("font_settle_ms", &self.font_settle_ms)
            .field("font_source_url", &self.font_source_url)
            .field("font_install_dir", &self.font_install_dir)
            .field("font_source", &self.font_source.as_ref().map(|_| "<dyn FontSource>"))
            .field(
                "font_installer",
                &self.font_installer.as_ref().map(|_| "<dyn FontInstaller>"),
            )
            .field("artifact_candidates", &self.artifact_candidates)
            .finish()
    }
}

impl AutomationConfig {
    /// Create a new builder for `AutomationConfig`.
    pub fn builder() -> AutomationConfigBuilder {
        AutomationConfigBuilder {
            config: Self::default(),
        }
    }

    pub(crate) fn progress(&self) -> Option<&dyn AutomationProgressCallback> {
        self.progress_callback.as_deref()
    }
}

/// Builder for [`AutomationConfig`].
#[derive(Debug)]
pub struct AutomationConfigBuilder {
    config: AutomationConfig,
}

impl AutomationConfigBuilder {
    pub fn runtime_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.runtime_program = program.into();
        self
    }

    pub fn runtime_args(mut self, args: Vec<String>) -> Self {
        self.config.runtime_args = args;
        self
    }

    pub fn bridge_extendscript(mut self, v: bool) -> Self {
        self.config.bridge_extendscript = v;
        self
    }

    pub fn indesign_app(mut self, name: impl Into<String>) -> Self {
        self.config.indesign_app = name.into();
        self
    }

    pub fn acrobat_app(mut self, name: impl Into<String>) -> Self {
        self.config.acrobat_app = name.into();
        self
    }

    pub fn acrobat_process(mut self, name: impl Into<String>) -> Self {
        self.config.acrobat_process = name.into();
        self
    }

    pub fn pdf_export_preset(mut self, preset: impl Into<String>) -> Self {
        self.config.pdf_export_preset = preset.into();
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn grace_ms(mut self, ms: u64) -> Self {
        self.config.grace_ms = ms;
        self
    }

    pub fn font_settle_ms(mut self, ms: u64) -> Self {
        self.config.font_settle_ms = ms;
        self
    }

    pub fn font_source_url(mut self, template: impl Into<String>) -> Self {
        self.config.font_source_url = Some(template.into());
        self
    }

    pub fn font_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.config.font_dirs = dirs;
        self
    }

    pub fn font_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.font_install_dir = Some(dir.into());
        self
    }

    /// Adds one environment variable for the runtime process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    pub fn compare_layout(mut self, layout: CompareLayout) -> Self {
        self.config.compare_layout = layout;
        self
    }

    pub fn artifact_candidates(mut self, candidates: Vec<String>) -> Self {
        self.config.artifact_candidates = candidates;
        self
    }

    pub fn font_source(mut self, source: Arc<dyn FontSource>) -> Self {
        self.config.font_source = Some(source);
        self
    }

    pub fn font_installer(mut self, installer: Arc<dyn FontInstaller>) -> Self {
        self.config.font_installer = Some(installer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AutomationConfig, AutomationError> {
        let c = &self.config;
        if c.timeout_ms == 0 {
            return Err(AutomationError::InvalidConfig(
                "timeout must be > 0 ms".into(),
            ));
        }
        if c.runtime_program.as_os_str().is_empty() {
            return Err(AutomationError::InvalidConfig(
                "runtime program must not be empty".into(),
            ));
        }
        if c.artifact_candidates.is_empty() {
            return Err(AutomationError::InvalidConfig(
                "at least one comparison artifact candidate is required".into(),
            ));
        }
        if let Some(ref url) = c.font_source_url {
            if !url.contains("{name}") {
                return Err(AutomationError::InvalidConfig(format!(
                    "font source URL must contain {{name}}, got '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Acrobat UI layout ────────────────────────────────────────────────────

/// A screen position in points, relative to the Acrobat front window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Click targets and timings for Acrobat's "Compare Files" tool.
///
/// Acrobat exposes no scripting API for comparison, so the flow clicks at
/// fixed offsets. These values match the default window layout of Acrobat
/// DC on a 1440×900 display and must be re-measured for other setups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareLayout {
    /// "Select File" button of the old-file pane.
    pub old_file_button: ScreenPoint,
    /// "Select File" button of the new-file pane.
    pub new_file_button: ScreenPoint,
    /// The "Compare" button.
    pub compare_button: ScreenPoint,
    /// Pause between UI actions, in ms.
    pub ui_delay_ms: u64,
    /// Time allowed for Acrobat to finish the comparison, in seconds.
    pub compare_wait_secs: u64,
}

impl Default for CompareLayout {
    fn default() -> Self {
        Self {
            old_file_button: ScreenPoint::new(420, 430),
            new_file_button: ScreenPoint::new(1010, 430),
            compare_button: ScreenPoint::new(715, 640),
            ui_delay_ms: 1_500,
            compare_wait_secs: 20,
        }
    }
}
