//! Marker table for the outcome classifier.
//!
//! Every literal and pattern the classifier matches against lives here, so
//! the rules can be read (and tested) in one place. The generated scripts
//! emit the same headers via these constants.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentinel a script prints on a handled failure.
pub const ERROR_MARKER: &str = "ERROR:";

/// Sentinel a script prints on success.
pub const OK_MARKER: &str = "OK:";

/// Header of the missing-font block written by the pre-export audit.
pub const MISSING_FONTS_HEADER: &str = "Missing Fonts";

/// Header of the missing-link block written by the pre-export audit.
pub const MISSING_LINKS_HEADER: &str = "Missing Links";

/// A line containing any of these ends a missing-font block.
pub const BLOCK_TERMINATORS: &[&str] = &["Solutions", "Available"];

/// Font weight and style words the loose name pattern may append to a family.
pub const WEIGHT_KEYWORDS: &[&str] = &[
    "Thin",
    "Hairline",
    "ExtraLight",
    "UltraLight",
    "Light",
    "Book",
    "Regular",
    "Roman",
    "Normal",
    "Medium",
    "SemiBold",
    "DemiBold",
    "Bold",
    "ExtraBold",
    "UltraBold",
    "Heavy",
    "Black",
    "Italic",
    "Oblique",
    "Condensed",
];

/// Words that look like font names to the loose pattern but are report text.
pub const STOPLIST: &[&str] = &[
    "Missing",
    "Fonts",
    "Font",
    "Links",
    "The",
    "These",
    "This",
    "Following",
    "Solutions",
    "Solution",
    "Available",
    "Install",
    "Error",
    "ERROR",
    "Document",
    "Package",
    "Please",
    "System",
];

/// Platform warnings about duplicate Objective-C class implementations,
/// printed by the macOS runtime when two frameworks ship the same class.
pub static NOISE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^.*(?:objc\[\d+\]:|Class \S+ is implemented in both).*$\n?")
        .expect("valid noise regex")
});

/// `osascript` prefix: `/path/job.applescript:123:456: execution error: `.
/// Compile failures (an unknown application name, for one) report
/// `syntax error:` in the same position.
pub static EXECUTION_ERROR_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:[^\n]*?:\d+:\d+: )?(?:execution|syntax|script) error: ")
        .expect("valid prefix regex")
});

/// A path inside a per-run scratch directory (`indd2pdf-XXXXXX` or
/// `indd2pdf-fonts-XXXXXX`), with any `:line:col:` suffix. The directory
/// itself only ever appears as a file's parent.
pub static WORKDIR_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:/[^\s/]+)*/indd2pdf-(?:fonts-)?[A-Za-z0-9]{6}/[^\s:]*(?::\d+:\d+:?)?")
        .expect("valid workdir regex")
});

/// `Adobe InDesign 2025 got an error: ` wrapper added around script errors.
pub static APP_ERROR_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[^\n]*? got an error: ").expect("valid app regex"));

/// ExtendScript exception wrappers (`Error: `, `Uncaught exception: `).
pub static EXCEPTION_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:Uncaught exception: |Error: |JavaScript Error!?:? )").expect("valid regex")
});

/// Trailing numeric error code, e.g. ` (-2753)` or ` (1)`.
pub static TRAILING_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(-?\d+\)\s*$").expect("valid code regex"));

/// Three or more newlines, possibly with whitespace between them.
pub static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("valid newline regex"));

/// The "The following fonts are missing ..." sub-header under the block header.
pub static FOLLOWING_SUBHEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfollowing\b.*\bare\b").expect("valid subheader regex"));

/// Strict per-line font name: starts with a capital letter or digit-led
/// foundry prefix, then name characters only.
pub static STRICT_NAME_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][A-Za-z0-9]*(?:[ \-_.][A-Za-z0-9]+)*(?:\s*\([^)]*\))?$")
        .expect("valid name regex")
});

/// Loose font-name token: `Capitalized-Word(-Capitalized-Word)* [Weight]?`.
pub static LOOSE_NAME: Lazy<Regex> = Lazy::new(|| {
    let weights = WEIGHT_KEYWORDS.join("|");
    Regex::new(&format!(
        r"\b[A-Z][A-Za-z0-9]*(?:-[A-Z][A-Za-z0-9]*)*(?: (?:{weights}))?\b"
    ))
    .expect("valid loose name regex")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_regex_covers_compile_errors() {
        let line = "/tmp/indd2pdf-a1B2c3/bridge.applescript:210:216: syntax error: Expected end of line";
        assert_eq!(EXECUTION_ERROR_PREFIX.replace(line, ""), "Expected end of line");
        assert!(EXECUTION_ERROR_PREFIX.is_match("execution error: boom"));
    }

    #[test]
    fn workdir_regex_spares_user_paths() {
        assert!(WORKDIR_PATH.is_match("see /private/var/folders/T/indd2pdf-Xy12ab/job.jsx:3:9: here"));
        assert!(!WORKDIR_PATH.is_match("/Users/ada/indd2pdf-exports/Brochure.pdf"));
    }

    #[test]
    fn noise_regex_matches_duplicate_class_warning() {
        let line = "objc[4242]: Class AdobeFoo is implemented in both /A and /B. One of the two will be used.\n";
        assert!(NOISE_LINE.is_match(line));
        assert!(!NOISE_LINE.is_match("ERROR: Missing Fonts"));
    }

    #[test]
    fn execution_prefix_matches_osascript_form() {
        let s = "/tmp/x/convert.applescript:120:180: execution error: boom";
        assert_eq!(EXECUTION_ERROR_PREFIX.replace(s, ""), "boom");
    }

    #[test]
    fn loose_pattern_includes_weight() {
        let found: Vec<&str> = LOOSE_NAME
            .find_iter("need Minion-Pro Bold and Helvetica")
            .map(|m| m.as_str())
            .collect();
        assert_eq!(found, ["Minion-Pro Bold", "Helvetica"]);
    }

    #[test]
    fn strict_pattern_rejects_sentences() {
        assert!(STRICT_NAME_LINE.is_match("Solway-Bold"));
        assert!(STRICT_NAME_LINE.is_match("Minion Pro Regular"));
        assert!(!STRICT_NAME_LINE.is_match("please install: fonts"));
        assert!(!STRICT_NAME_LINE.is_match("solway-bold"));
    }
}
