//! Font remediation: acquire missing fonts, install them, refresh the cache.
//!
//! The host font directory and font cache are process-wide state. Every
//! mutation goes through [`remediate`], which holds [`HOST_FONTS`] for its
//! whole duration.
//!
//! Both collaborators are traits so tests (and embedders) can swap them:
//!
//! - [`FontSource`]: where font files come from. Default: [`HttpFontSource`]
//!   when `font_source_url` is configured, otherwise nothing is acquirable.
//! - [`FontInstaller`]: how files become permanently installed. Default:
//!   [`SystemFontInstaller`].

use crate::config::AutomationConfig;
use async_trait::async_trait;
use font_auto::FontAutoError;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Serialises every mutation of the host font directory and cache.
static HOST_FONTS: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Supplies font files by name.
#[async_trait]
pub trait FontSource: Send + Sync {
    /// Fetch `name` into `target_dir`.
    ///
    /// Returns the font files written; empty when the font could not be
    /// acquired. Failures are the implementation's to log.
    async fn acquire(&self, name: &str, target_dir: &Path) -> Vec<PathBuf>;
}

/// Installs font files into the host permanently.
#[async_trait]
pub trait FontInstaller: Send + Sync {
    /// Install `paths`, skipping files already present by exact name.
    ///
    /// Returns every effective font name (new or already present).
    async fn install_permanently(&self, paths: &[PathBuf]) -> Result<Vec<String>, FontAutoError>;

    /// Invalidate and rebuild the host font cache.
    async fn refresh_cache(&self) -> Result<(), FontAutoError>;
}

/// Downloads fonts from a URL template containing `{name}`.
#[derive(Debug, Clone)]
pub struct HttpFontSource {
    url_template: String,
}

impl HttpFontSource {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }
}

#[async_trait]
impl FontSource for HttpFontSource {
    async fn acquire(&self, name: &str, target_dir: &Path) -> Vec<PathBuf> {
        let template = self.url_template.clone();
        let owned_name = name.to_string();
        let dir = target_dir.to_path_buf();

        let result = tokio::task::spawn_blocking(move || {
            font_auto::download_font(&template, &owned_name, &dir)
        })
        .await;

        match result {
            Ok(Ok(files)) => {
                debug!(font = name, files = files.len(), "Font downloaded");
                files
            }
            Ok(Err(FontAutoError::NotFound { .. })) => {
                info!(font = name, "Font source has no such font");
                Vec::new()
            }
            Ok(Err(e)) => {
                warn!(font = name, error = %e, "Font download failed");
                Vec::new()
            }
            Err(e) => {
                warn!(font = name, error = %e, "Font download task panicked");
                Vec::new()
            }
        }
    }
}

/// Copies fonts into the user font directory and refreshes the OS cache.
#[derive(Debug, Clone, Default)]
pub struct SystemFontInstaller {
    install_dir: Option<PathBuf>,
}

impl SystemFontInstaller {
    /// Install into `install_dir`, or the platform default when `None`.
    pub fn new(install_dir: Option<PathBuf>) -> Self {
        Self { install_dir }
    }

    fn resolve_dir(&self) -> Result<PathBuf, FontAutoError> {
        match &self.install_dir {
            Some(dir) => Ok(dir.clone()),
            None => font_auto::font_install_dir(),
        }
    }
}

#[async_trait]
impl FontInstaller for SystemFontInstaller {
    async fn install_permanently(&self, paths: &[PathBuf]) -> Result<Vec<String>, FontAutoError> {
        let dir = self.resolve_dir()?;
        let paths = paths.to_vec();
        let report = tokio::task::spawn_blocking(move || font_auto::install_fonts(&paths, &dir))
            .await
            .map_err(|e| FontAutoError::Extract(format!("install task failed: {e}")))??;

        info!(
            installed = report.installed.len(),
            already_present = report.already_present.len(),
            "Fonts installed"
        );
        Ok(report.names())
    }

    async fn refresh_cache(&self) -> Result<(), FontAutoError> {
        tokio::task::spawn_blocking(font_auto::refresh_font_cache)
            .await
            .map_err(|e| FontAutoError::CacheRefresh(format!("cache task failed: {e}")))?
    }
}

fn resolve_source(config: &AutomationConfig) -> Option<Arc<dyn FontSource>> {
    if let Some(source) = &config.font_source {
        return Some(source.clone());
    }
    config
        .font_source_url
        .as_ref()
        .map(|url| Arc::new(HttpFontSource::new(url.clone())) as Arc<dyn FontSource>)
}

fn resolve_installer(config: &AutomationConfig) -> Arc<dyn FontInstaller> {
    match &config.font_installer {
        Some(installer) => installer.clone(),
        None => Arc::new(SystemFontInstaller::new(config.font_install_dir.clone())),
    }
}

/// Acquire and install `names`; returns the font names now installed.
///
/// Best effort throughout: a font that cannot be acquired is logged and
/// skipped, and an install failure yields an empty list. The cache refresh
/// and settle delay run only when something was installed.
pub async fn remediate(names: &[String], config: &AutomationConfig) -> Vec<String> {
    let _host = HOST_FONTS.lock().await;

    if let Some(cb) = config.progress() {
        cb.on_remediation_start(names);
    }

    let Some(source) = resolve_source(config) else {
        warn!(fonts = ?names, "No font source configured, skipping acquisition");
        return Vec::new();
    };

    let staging = match tempfile::Builder::new().prefix("indd2pdf-fonts-").tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            warn!(error = %e, "Cannot create font staging directory");
            return Vec::new();
        }
    };

    let mut acquired = Vec::new();
    for name in names {
        let files = source.acquire(name, staging.path()).await;
        if files.is_empty() {
            warn!(font = %name, "Font could not be acquired");
        }
        acquired.extend(files);
    }

    if acquired.is_empty() {
        info!("No fonts acquired, nothing to install");
        return Vec::new();
    }

    let installer = resolve_installer(config);
    let installed = match installer.install_permanently(&acquired).await {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "Font installation failed");
            return Vec::new();
        }
    };

    if let Some(cb) = config.progress() {
        for name in &installed {
            cb.on_resource_installed(name);
        }
    }

    if let Err(e) = installer.refresh_cache().await {
        warn!(error = %e, "Font cache refresh failed");
    }
    if config.font_settle_ms > 0 {
        debug!(settle_ms = config.font_settle_ms, "Waiting for font cache to settle");
        tokio::time::sleep(Duration::from_millis(config.font_settle_ms)).await;
    }

    installed
}
