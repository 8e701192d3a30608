//! Script generation: turn an [`AutomationJob`] into automation source text.
//!
//! Every application-specific detail lives here: ExtendScript object names,
//! AppleScript UI scripting, screen coordinates, keystrokes. The rest of the
//! crate only sees an opaque [`AutomationScript`].
//!
//! ## Output protocol
//!
//! Both flows report through their return value, which the runtime prints:
//!
//! - `OK: <path>` on success
//! - `ERROR: <message>` on any handled failure
//!
//! The classifier keys on the `ERROR:` sentinel, so a failure is detected
//! even when the runtime itself exits 0.
//!
//! Generation is pure: no file system access, no validation of inputs.

use crate::config::{AutomationConfig, CompareLayout, ScreenPoint};
use crate::outcome::{AutomationJob, JobMode};
use crate::pipeline::markers::{ERROR_MARKER, MISSING_FONTS_HEADER, MISSING_LINKS_HEADER, OK_MARKER};
use std::path::Path;

/// The language a generated script is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLanguage {
    /// Adobe ExtendScript, executed inside InDesign.
    ExtendScript,
    /// AppleScript, executed by `osascript`.
    AppleScript,
}

impl ScriptLanguage {
    /// File extension the runtime expects.
    pub fn extension(&self) -> &'static str {
        match self {
            ScriptLanguage::ExtendScript => "jsx",
            ScriptLanguage::AppleScript => "applescript",
        }
    }
}

/// A generated script ready to hand to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationScript {
    pub language: ScriptLanguage,
    pub text: String,
    /// When set, the script must be run through an AppleScript wrapper that
    /// hands it to this application (see [`bridge_wrapper`]).
    pub bridge_app: Option<String>,
}

/// Build the script for `job`.
pub fn generate(job: &AutomationJob, config: &AutomationConfig) -> AutomationScript {
    match job.mode() {
        JobMode::Convert => {
            let bridged = config.bridge_extendscript;
            AutomationScript {
                language: ScriptLanguage::ExtendScript,
                // The wrapper quits InDesign itself: quitting from inside
                // `do script` would sever the Apple event that is waiting
                // for the result.
                text: convert_script(job, &config.pdf_export_preset, !bridged),
                bridge_app: bridged.then(|| config.indesign_app.clone()),
            }
        }
        JobMode::Compare => AutomationScript {
            language: ScriptLanguage::AppleScript,
            text: compare_script(
                job,
                &config.acrobat_app,
                &config.acrobat_process,
                &config.compare_layout,
            ),
            bridge_app: None,
        },
    }
}

// ── Convert (ExtendScript) ───────────────────────────────────────────────

fn convert_script(job: &AutomationJob, preset: &str, quit_in_script: bool) -> String {
    let document = job.inputs().first().map(|p| p.as_path()).unwrap_or(Path::new(""));
    let quit = if quit_in_script {
        "app.quit(SaveOptions.NO);"
    } else {
        ""
    };

    format!(
        r#"// Generated by indd2pdf. Do not edit.
#target indesign
(function () {{
    var RESOURCE_HINTS = {hints};
    var DOCUMENT_PATH = {document};
    var PDF_PATH = {pdf};
    var PRESET_NAME = {preset};

    function normalise(name) {{
        return String(name).toLowerCase().replace(/[\s\-_]/g, "");
    }}

    var hinted = {{}};
    for (var h = 0; h < RESOURCE_HINTS.length; h++) {{
        hinted[normalise(RESOURCE_HINTS[h])] = true;
    }}

    function isHinted(font) {{
        var names = [font.name, font.postscriptName, font.fontFamily];
        for (var n = 0; n < names.length; n++) {{
            if (names[n] && hinted[normalise(names[n])]) {{
                return true;
            }}
        }}
        return false;
    }}

    function fontLabel(font) {{
        if (font.postscriptName) {{
            return String(font.postscriptName);
        }}
        return String(font.name).replace(/\t/g, " ");
    }}

    // Fonts that are hinted exist on disk but may not be activated yet;
    // they are not worth aborting the export for.
    function auditFonts(doc) {{
        var missing = [];
        var fonts = doc.fonts.everyItem().getElements();
        for (var i = 0; i < fonts.length; i++) {{
            if (fonts[i].status === FontStatus.INSTALLED || isHinted(fonts[i])) {{
                continue;
            }}
            missing.push(fontLabel(fonts[i]));
        }}
        return missing;
    }}

    function auditLinks(doc) {{
        var missing = [];
        var links = doc.links.everyItem().getElements();
        for (var i = 0; i < links.length; i++) {{
            if (links[i].status === LinkStatus.LINK_MISSING ||
                links[i].status === LinkStatus.LINK_INACCESSIBLE) {{
                missing.push(String(links[i].filePath));
            }}
        }}
        return missing;
    }}

    function report(missingFonts, missingLinks) {{
        var lines = [];
        if (missingFonts.length) {{
            lines.push("{fonts_header}");
            lines.push("The following fonts are missing on this system:");
            lines = lines.concat(missingFonts);
            lines.push("");
            lines.push("Solutions: install the fonts above or add them to the package's Document fonts folder.");
        }}
        if (missingLinks.length) {{
            if (lines.length) {{
                lines.push("");
            }}
            lines.push("{links_header}");
            lines.push("The following linked files are missing:");
            lines = lines.concat(missingLinks);
            lines.push("");
            lines.push("Solutions: repackage the document with all links included.");
        }}
        return lines.join("\n");
    }}

    var previousLevel = app.scriptPreferences.userInteractionLevel;
    app.scriptPreferences.userInteractionLevel = UserInteractionLevels.NEVER_INTERACT;
    var doc = null;
    var result;
    try {{
        doc = app.open(File(DOCUMENT_PATH), false);
        var problems = report(auditFonts(doc), auditLinks(doc));
        if (problems.length) {{
            throw new Error(problems);
        }}
        var preset = app.pdfExportPresets.itemByName(PRESET_NAME);
        if (!preset.isValid) {{
            throw new Error("PDF export preset not found: " + PRESET_NAME);
        }}
        doc.exportFile(ExportFormat.PDF_TYPE, File(PDF_PATH), false, preset);
        result = "{ok} " + PDF_PATH;
    }} catch (e) {{
        result = "{err} " + (e && e.message ? e.message : String(e));
    }} finally {{
        if (doc !== null && doc.isValid) {{
            doc.close(SaveOptions.NO);
        }}
        app.scriptPreferences.userInteractionLevel = previousLevel;
        {quit}
    }}
    return result;
}})();
"#,
        hints = js_array(job.resource_hints()),
        document = js_string(&document.to_string_lossy()),
        pdf = js_string(&job.artifact_path().to_string_lossy()),
        preset = js_string(preset),
        fonts_header = MISSING_FONTS_HEADER,
        links_header = MISSING_LINKS_HEADER,
        ok = OK_MARKER,
        err = ERROR_MARKER,
        quit = quit,
    )
}

// ── Compare (AppleScript UI scripting) ───────────────────────────────────

fn compare_script(
    job: &AutomationJob,
    acrobat_app: &str,
    acrobat_process: &str,
    layout: &CompareLayout,
) -> String {
    let inputs = job.inputs();
    let old = inputs.first().map(|p| p.to_string_lossy()).unwrap_or_default();
    let new = inputs.get(1).map(|p| p.to_string_lossy()).unwrap_or_default();
    let delay = format!("{:.1}", layout.ui_delay_ms as f64 / 1000.0);

    format!(
        r#"-- Generated by indd2pdf. Do not edit.
on chooseFile(filePath, uiDelay)
    tell application "System Events"
        keystroke "g" using {{command down, shift down}}
        delay uiDelay
        keystroke filePath
        delay uiDelay
        keystroke return
        delay uiDelay
        keystroke return
        delay uiDelay
    end tell
end chooseFile

try
    set oldPath to {old}
    set newPath to {new}
    set outputDir to {output_dir}
    set uiDelay to {delay}

    tell application {app} to activate
    delay uiDelay * 2

    tell application "System Events"
        tell process {process}
            set frontmost to true
            click menu item "Open" of menu 1 of menu item "Compare Files" of menu 1 of menu item "Tools" of menu 1 of menu bar item "View" of menu bar 1
            delay uiDelay
            click at {old_pt}
            delay uiDelay
        end tell
    end tell
    chooseFile(oldPath, uiDelay)

    tell application "System Events"
        tell process {process}
            click at {new_pt}
            delay uiDelay
        end tell
    end tell
    chooseFile(newPath, uiDelay)

    tell application "System Events"
        tell process {process}
            click at {cmp_pt}
        end tell
    end tell

    set waited to 0
    repeat while waited < {wait_secs}
        delay 1
        set waited to waited + 1
        tell application "System Events"
            if exists (window 1 of process {process} whose name contains "Compare") then exit repeat
        end tell
    end repeat
    delay uiDelay

    tell application "System Events"
        tell process {process}
            keystroke "s" using {{command down, shift down}}
        end tell
    end tell
    delay uiDelay
    chooseFile(outputDir, uiDelay)
    delay uiDelay * 2

    tell application "System Events"
        tell process {process}
            keystroke "w" using command down
        end tell
    end tell
    return "{ok} " & outputDir
on error errMsg number errNum
    return "{err} " & errMsg & " (" & errNum & ")"
end try
"#,
        old = applescript_string(&old),
        new = applescript_string(&new),
        output_dir = applescript_string(&job.output_dir().to_string_lossy()),
        delay = delay,
        app = applescript_string(acrobat_app),
        process = applescript_string(acrobat_process),
        old_pt = point(layout.old_file_button),
        new_pt = point(layout.new_file_button),
        cmp_pt = point(layout.compare_button),
        wait_secs = layout.compare_wait_secs,
        ok = OK_MARKER,
        err = ERROR_MARKER,
    )
}

// ── Bridge wrapper ───────────────────────────────────────────────────────

/// AppleScript that asks `app` to run the ExtendScript at `script_path`,
/// prints its result, and quits the application on every path.
pub fn bridge_wrapper(app: &str, script_path: &Path) -> String {
    format!(
        r#"-- Generated by indd2pdf. Do not edit.
set scriptResult to ""
set scriptFailure to ""
try
    with timeout of 86400 seconds
        tell application {app}
            set scriptResult to do script (POSIX file {path}) language javascript
        end tell
    end timeout
on error errMsg number errNum
    set scriptFailure to "{err} " & errMsg & " (" & errNum & ")"
end try
try
    tell application {app} to quit saving no
end try
if scriptFailure is not "" then return scriptFailure
return scriptResult
"#,
        app = applescript_string(app),
        path = applescript_string(&script_path.to_string_lossy()),
        err = ERROR_MARKER,
    )
}

// ── Literal helpers ──────────────────────────────────────────────────────

/// A JavaScript string literal. JSON string syntax is a subset of JS.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn js_array(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// An AppleScript string literal.
fn applescript_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn point(p: ScreenPoint) -> String {
    format!("{{{}, {}}}", p.x, p.y)
}
