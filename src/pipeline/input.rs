//! Input resolution: validate user-supplied paths before anything is launched.
//!
//! Convert accepts either an `.indd` file or an InDesign package directory
//! (the folder produced by File › Package, holding the document, `Links/`
//! and `Document fonts/`). Compare accepts two PDF files, checked by magic
//! bytes so a renamed file fails here instead of deep inside Acrobat.

use crate::error::AutomationError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Folder InDesign's packager writes bundled fonts into.
pub const DOCUMENT_FONTS_DIR: &str = "Document fonts";

/// A Convert input resolved to a concrete document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    /// The `.indd` file to open.
    pub document: PathBuf,
    /// Font base-names shipped in the package's `Document fonts` folder.
    pub document_fonts: Vec<String>,
}

/// Resolve a Convert input to an `.indd` document.
pub fn resolve_document(input: &Path) -> Result<ResolvedDocument, AutomationError> {
    if !input.exists() {
        return Err(AutomationError::FileNotFound {
            path: input.to_path_buf(),
        });
    }

    if input.is_dir() {
        let document = find_indd(input).ok_or_else(|| AutomationError::InvalidInput {
            path: input.to_path_buf(),
            reason: "package directory contains no .indd document".into(),
        })?;
        let document_fonts = package_fonts(input);
        debug!(
            document = %document.display(),
            fonts = document_fonts.len(),
            "Resolved InDesign package"
        );
        return Ok(ResolvedDocument {
            document,
            document_fonts,
        });
    }

    if !is_indd(input) {
        return Err(AutomationError::InvalidInput {
            path: input.to_path_buf(),
            reason: "expected an InDesign document (.indd) or package directory".into(),
        });
    }

    // Loose documents may still sit next to a package fonts folder.
    let document_fonts = input.parent().map(package_fonts).unwrap_or_default();
    Ok(ResolvedDocument {
        document: input.to_path_buf(),
        document_fonts,
    })
}

/// Check that `path` exists and starts with the `%PDF` magic bytes.
pub fn check_pdf(path: &Path) -> Result<(), AutomationError> {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AutomationError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(AutomationError::InvalidInput {
                path: path.to_path_buf(),
                reason: format!("cannot read file: {e}"),
            })
        }
    };

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(AutomationError::InvalidInput {
            path: path.to_path_buf(),
            reason: "not a PDF file (missing %PDF header)".into(),
        });
    }
    Ok(())
}

fn is_indd(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("indd"))
}

/// First `.indd` by name at the top level, then one directory down.
fn find_indd(dir: &Path) -> Option<PathBuf> {
    let entries = sorted_entries(dir);
    if let Some(doc) = entries.iter().find(|p| is_indd(p)) {
        return Some(doc.clone());
    }
    entries
        .iter()
        .filter(|p| p.is_dir())
        .find_map(|sub| sorted_entries(sub).into_iter().find(|p| is_indd(p)))
}

fn package_fonts(dir: &Path) -> Vec<String> {
    let fonts_dir = dir.join(DOCUMENT_FONTS_DIR);
    if !fonts_dir.is_dir() {
        return Vec::new();
    }
    font_auto::installed_font_names(&[fonts_dir])
}

fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => Vec::new(),
    };
    entries.sort();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_file_not_found() {
        let err = resolve_document(Path::new("/nonexistent/doc.indd")).unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn wrong_extension_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.idml");
        std::fs::write(&path, b"x").unwrap();
        let err = resolve_document(&path).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn package_directory_resolves_document_and_fonts() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("Brochure Folder");
        std::fs::create_dir_all(pkg.join(DOCUMENT_FONTS_DIR)).unwrap();
        std::fs::write(pkg.join("Brochure.indd"), b"x").unwrap();
        std::fs::write(pkg.join(DOCUMENT_FONTS_DIR).join("Solway-Bold.otf"), b"OTTO").unwrap();

        let resolved = resolve_document(&pkg).unwrap();
        assert_eq!(resolved.document, pkg.join("Brochure.indd"));
        assert_eq!(resolved.document_fonts, ["Solway-Bold"]);
    }

    #[test]
    fn package_document_one_level_down() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("job")).unwrap();
        std::fs::write(dir.path().join("job").join("Flyer.INDD"), b"x").unwrap();
        let resolved = resolve_document(dir.path()).unwrap();
        assert!(resolved.document.ends_with("job/Flyer.INDD"));
    }

    #[test]
    fn empty_package_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_document(dir.path()).unwrap_err().code(), "INVALID_INPUT");
    }

    #[test]
    fn pdf_magic_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("a.pdf");
        let fake = dir.path().join("b.pdf");
        std::fs::write(&pdf, b"%PDF-1.7\n").unwrap();
        std::fs::write(&fake, b"<html>").unwrap();

        assert!(check_pdf(&pdf).is_ok());
        assert_eq!(check_pdf(&fake).unwrap_err().code(), "INVALID_INPUT");
        assert_eq!(
            check_pdf(&dir.path().join("c.pdf")).unwrap_err().code(),
            "FILE_NOT_FOUND"
        );
    }
}
