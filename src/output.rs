//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every slate is listed by its input clip (the thing the user asked about),
//! with the written file and the metadata that went onto the slate as
//! indented context lines. Paths of intermediate files are secondary and only
//! appear as `Staged:` lines.
//!
//! # Output Format
//!
//! ## Render
//!
//! ```text
//! 001 a.mov → out/a_slate.exr
//!     Resolution: 4096x2160
//!     Timecode: 01:00:00:00
//!     Staged: /tmp/slate_staged_3f2a9c1e.png
//! 002 (template only) → out/slate.exr
//!     Resolution: 1920x1080
//!     Timecode: 00:00:41:17
//!     Staged: /tmp/slate_staged.png
//!
//! Rendered 2 slates
//! ```
//!
//! ## Probe
//!
//! ```text
//! a.mov
//!     Source: /plates/a.mov
//!     Resolution: 4096x2160
//!     Timecode: 01:00:00:00 @ 24
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::media::Resolution;
use crate::slate::SlateOutcome;
use crate::timecode::FrameRate;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// File name of a path, falling back to the full path.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Render
// ============================================================================

/// Format one finished slate.
pub fn format_slate_outcome(index: usize, outcome: &SlateOutcome) -> Vec<String> {
    let source = match &outcome.input {
        Some(input) => display_name(input),
        None => "(template only)".to_string(),
    };
    vec![
        format!(
            "{} {} → {}",
            format_index(index),
            source,
            outcome.output.display()
        ),
        format!("{}Resolution: {}", indent(1), outcome.resolution),
        format!("{}Timecode: {}", indent(1), outcome.timecode),
        format!("{}Staged: {}", indent(1), outcome.staged_png.display()),
    ]
}

/// Format a full render run: every slate followed by a summary line.
pub fn format_render_output(outcomes: &[SlateOutcome]) -> Vec<String> {
    let mut lines: Vec<String> = outcomes
        .iter()
        .enumerate()
        .flat_map(|(i, outcome)| format_slate_outcome(i + 1, outcome))
        .collect();
    lines.push(String::new());
    lines.push(format!("Rendered {}", plural(outcomes.len(), "slate")));
    lines
}

pub fn print_render_output(outcomes: &[SlateOutcome]) {
    for line in format_render_output(outcomes) {
        println!("{}", line);
    }
}

// ============================================================================
// Probe
// ============================================================================

/// Format the metadata a slate would show for `input`.
pub fn format_probe_report(
    input: &Path,
    resolution: Resolution,
    timecode: &str,
    fps: FrameRate,
) -> Vec<String> {
    vec![
        display_name(input),
        format!("{}Source: {}", indent(1), input.display()),
        format!("{}Resolution: {}", indent(1), resolution),
        format!("{}Timecode: {} @ {}", indent(1), timecode, fps),
    ]
}

pub fn print_probe_report(input: &Path, resolution: Resolution, timecode: &str, fps: FrameRate) {
    for line in format_probe_report(input, resolution, timecode, fps) {
        println!("{}", line);
    }
}
