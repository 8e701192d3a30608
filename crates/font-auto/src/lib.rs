//! # font-auto
//!
//! Acquire fonts a document needs and install them **permanently** into the
//! host's font directory, so that desktop publishing applications (Adobe
//! InDesign in particular) pick them up on their next launch.
//!
//! ## How it works
//!
//! 1. [`download_font`] fetches `{url_template}` with `{name}` substituted.
//!    A plain font payload is written as-is; a gzip tarball has its font
//!    members extracted.
//! 2. [`install_fonts`] copies the files into [`font_install_dir`]. Installs
//!    are idempotent by file name and never rolled back.
//! 3. [`refresh_font_cache`] invalidates the OS font cache (`fc-cache` on
//!    Linux, `atsutil` on macOS).
//!
//! [`installed_font_names`] scans font directories and returns base-names,
//! which callers use as "known available" hints.
//!
//! ## Environment variable overrides
//!
//! - `FONT_AUTO_INSTALL_DIR`: install into this directory instead of the
//!   per-user font directory.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// File extensions recognised as installable font files.
pub const FONT_EXTENSIONS: &[&str] = &["otf", "ttf", "ttc", "dfont"];

/// Maximum directory depth walked by [`installed_font_names`].
const MAX_SCAN_DEPTH: usize = 4;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by font-auto operations.
#[derive(Error, Debug)]
pub enum FontAutoError {
    /// The platform exposes no per-user font directory.
    #[error("No font install directory on {os}; set FONT_AUTO_INSTALL_DIR")]
    UnsupportedPlatform { os: String },

    /// Could not create the install directory.
    #[error("Font directory error: {0}")]
    InstallDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// The font source has no file for this name.
    #[error("Font '{name}' not available from source")]
    NotFound { name: String },

    /// gzip/tar extraction failed, or the archive held no font files.
    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// Copying a font file into the install directory failed.
    #[error("Failed to install '{path}': {source}")]
    Install {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS font cache tool failed or is missing.
    #[error("Font cache refresh failed: {0}")]
    CacheRefresh(String),
}

// ── Directories ──────────────────────────────────────────────────────────────

/// Returns the directory fonts are permanently installed into.
///
/// Default locations:
/// - **macOS**: `~/Library/Fonts/`
/// - **Linux**: `~/.local/share/fonts/`
///
/// Override by setting `FONT_AUTO_INSTALL_DIR`.
pub fn font_install_dir() -> Result<PathBuf, FontAutoError> {
    if let Ok(override_dir) = std::env::var("FONT_AUTO_INSTALL_DIR") {
        if !override_dir.is_empty() {
            return Ok(PathBuf::from(override_dir));
        }
    }

    dirs::font_dir().ok_or_else(|| FontAutoError::UnsupportedPlatform {
        os: std::env::consts::OS.to_string(),
    })
}

/// Well-known font directories for the current platform, install dir first.
///
/// Directories that do not exist are still returned; scanning skips them.
pub fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs_out = Vec::new();
    if let Ok(install) = font_install_dir() {
        dirs_out.push(install);
    }

    let fixed: &[&str] = match std::env::consts::OS {
        "macos" => &["/Library/Fonts", "/System/Library/Fonts"],
        "linux" => &["/usr/share/fonts", "/usr/local/share/fonts"],
        "windows" => &["C:\\Windows\\Fonts"],
        _ => &[],
    };
    dirs_out.extend(fixed.iter().map(PathBuf::from));

    if let Some(home) = dirs::home_dir() {
        if std::env::consts::OS == "linux" {
            dirs_out.push(home.join(".fonts"));
        }
    }

    let mut seen = HashSet::new();
    dirs_out.retain(|d| seen.insert(d.clone()));
    dirs_out
}

// ── Scanning ─────────────────────────────────────────────────────────────────

/// Returns `true` if `path` has a recognised font file extension.
pub fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FONT_EXTENSIONS.iter().any(|f| e.eq_ignore_ascii_case(f)))
        .unwrap_or(false)
}

/// Collects font base-names (file stems) found under `dirs`.
///
/// Order follows `dirs` and then directory listing order (sorted per
/// directory for determinism). Duplicates are dropped, first one wins.
pub fn installed_font_names(dirs: &[PathBuf]) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    for dir in dirs {
        scan_dir(dir, 0, &mut names, &mut seen);
    }
    names
}

fn scan_dir(dir: &Path, depth: usize, names: &mut Vec<String>, seen: &mut HashSet<String>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            scan_dir(&path, depth + 1, names, seen);
        } else if is_font_file(&path) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if seen.insert(stem.to_string()) {
                    names.push(stem.to_string());
                }
            }
        }
    }
}

// ── Download ─────────────────────────────────────────────────────────────────

/// Downloads the font `name` into `dest_dir` and returns the font files written.
///
/// `url_template` must contain `{name}`; spaces in `name` are sent as `%20`.
/// A 404 maps to [`FontAutoError::NotFound`] so callers can tell "source has
/// no such font" apart from transport failures.
pub fn download_font(
    url_template: &str,
    name: &str,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, FontAutoError> {
    let url = url_template.replace("{name}", &name.replace(' ', "%20"));

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("font-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| FontAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(&url)
        .send()
        .map_err(|e| FontAutoError::Download(format!("GET {url}: {e}")))?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(FontAutoError::NotFound {
            name: name.to_string(),
        });
    }
    if !response.status().is_success() {
        return Err(FontAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let mut bytes = Vec::new();
    response
        .read_to_end(&mut bytes)
        .map_err(|e| FontAutoError::Download(format!("Read error: {e}")))?;

    std::fs::create_dir_all(dest_dir).map_err(FontAutoError::InstallDir)?;
    write_font_payload(&bytes, name, dest_dir)
}

/// Writes a downloaded payload into `dest_dir`.
///
/// Gzip payloads are treated as tarballs of font files; anything else must be
/// a bare font file, whose extension is derived from its magic bytes.
pub fn write_font_payload(
    bytes: &[u8],
    name: &str,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, FontAutoError> {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        return extract_fonts(bytes, dest_dir);
    }

    let ext = sniff_font_extension(bytes).ok_or_else(|| {
        FontAutoError::Download(format!("payload for '{name}' is not a font file"))
    })?;
    let path = dest_dir.join(format!("{}.{}", sanitize_file_name(name), ext));
    std::fs::write(&path, bytes).map_err(|e| FontAutoError::Install {
        path: path.clone(),
        source: e,
    })?;
    Ok(vec![path])
}

fn sniff_font_extension(bytes: &[u8]) -> Option<&'static str> {
    match bytes.get(..4)? {
        b"OTTO" => Some("otf"),
        b"ttcf" => Some("ttc"),
        [0x00, 0x01, 0x00, 0x00] | b"true" => Some("ttf"),
        _ => None,
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

/// Extracts every font member of a gzipped tar archive into `dest_dir`.
fn extract_fonts(archive_bytes: &[u8], dest_dir: &Path) -> Result<Vec<PathBuf>, FontAutoError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let gz = GzDecoder::new(archive_bytes);
    let mut archive = Archive::new(gz);
    let mut written = Vec::new();

    for entry in archive
        .entries()
        .map_err(|e| FontAutoError::Extract(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| FontAutoError::Extract(e.to_string()))?;
        let entry_path = entry
            .path()
            .map_err(|e| FontAutoError::Extract(e.to_string()))?
            .into_owned();

        if !is_font_file(&entry_path) {
            continue;
        }
        // Flatten: archive directory structure is irrelevant to installation.
        let Some(file_name) = entry_path.file_name() else {
            continue;
        };
        let dest = dest_dir.join(file_name);
        entry
            .unpack(&dest)
            .map_err(|e| FontAutoError::Extract(format!("Unpack failed: {e}")))?;
        written.push(dest);
    }

    if written.is_empty() {
        return Err(FontAutoError::Extract(
            "archive contains no font files".to_string(),
        ));
    }
    Ok(written)
}

// ── Install ──────────────────────────────────────────────────────────────────

/// Result of [`install_fonts`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Base-names copied into the install directory by this call.
    pub installed: Vec<String>,
    /// Base-names that were already present (left untouched).
    pub already_present: Vec<String>,
}

impl InstallReport {
    /// Every effective name, newly installed or already present, in input order.
    pub fn names(&self) -> Vec<String> {
        let mut all = self.installed.clone();
        all.extend(self.already_present.iter().cloned());
        all
    }
}

/// Copies `paths` into `install_dir`, skipping files already present by exact name.
///
/// Nothing is ever deleted: an install is a permanent side effect owned by
/// the host, not by the caller.
pub fn install_fonts(paths: &[PathBuf], install_dir: &Path) -> Result<InstallReport, FontAutoError> {
    std::fs::create_dir_all(install_dir).map_err(FontAutoError::InstallDir)?;
    let mut report = InstallReport::default();

    for src in paths {
        let Some(file_name) = src.file_name() else {
            continue;
        };
        let stem = src
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let dest = install_dir.join(file_name);

        if dest.exists() {
            report.already_present.push(stem);
            continue;
        }

        std::fs::copy(src, &dest).map_err(|e| FontAutoError::Install {
            path: dest.clone(),
            source: e,
        })?;
        report.installed.push(stem);
    }

    Ok(report)
}

// ── Cache refresh ────────────────────────────────────────────────────────────

/// Invalidates and rebuilds the OS font cache.
///
/// - **Linux**: `fc-cache -f`
/// - **macOS**: `atsutil databases -removeUser` (the cache rebuilds lazily)
/// - elsewhere: no-op
pub fn refresh_font_cache() -> Result<(), FontAutoError> {
    let (program, args): (&str, &[&str]) = match std::env::consts::OS {
        "linux" => ("fc-cache", &["-f"]),
        "macos" => ("atsutil", &["databases", "-removeUser"]),
        _ => return Ok(()),
    };

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| FontAutoError::CacheRefresh(format!("{program}: {e}")))?;

    if !output.status.success() {
        return Err(FontAutoError::CacheRefresh(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
