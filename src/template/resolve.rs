//! Template resolution: comment stripping and asset path rebasing.
//!
//! Templates are authored next to their images and stylesheets and reference
//! them with relative paths. The renderer loads the compiled HTML from a
//! staging directory, so every `src="…"`/`href="…"` is rewritten to an
//! absolute path under the resources directory, keeping only the file name.
//!
//! Resolution is line oriented. Each line passes through a two-state machine:
//!
//! | State | Line contains | Result |
//! |---|---|---|
//! | any | `-->` | line dropped, state `Normal` |
//! | any | `<!--` (no `-->`) | line dropped, state `InComment` |
//! | `InComment` | neither | line dropped |
//! | `Normal` | neither | line kept, first path reference rebased |

use super::TemplateError;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// `src="…"`, `href="…"` or a `{thumbnail…}` placeholder.
static PATH_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"src="(.*?)"|href="(.*?)"|\{(thumbnail.*?)\}"#)
        .expect("path reference pattern is valid")
});

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

/// Template text with comments removed and asset paths made absolute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedTemplate {
    text: String,
}

impl ResolvedTemplate {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Normal,
    InComment,
}

impl LineState {
    /// Advance past `line`; returns the next state and whether the line is kept.
    fn step(self, line: &str) -> (LineState, bool) {
        let opens = line.contains(COMMENT_OPEN);
        if line.contains(COMMENT_CLOSE) {
            return (LineState::Normal, false);
        }
        let state = if opens { LineState::InComment } else { self };
        (state, state == LineState::Normal)
    }
}

/// Resolve template text against `resources_dir`.
pub fn resolve_template(source: &str, resources_dir: &Path) -> ResolvedTemplate {
    let resources = absolute_dir(resources_dir);
    tracing::debug!("Resolving template against {}", resources.display());

    let mut state = LineState::Normal;
    let mut text = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let (next, keep) = state.step(line);
        state = next;
        if keep {
            text.push_str(&rebase_line(line, &resources));
        }
    }
    if state == LineState::InComment {
        tracing::warn!("Template ends inside an unterminated comment");
    }
    ResolvedTemplate { text }
}

/// Read and resolve a template file.
///
/// Without an explicit resources directory, assets are looked up next to the
/// template.
pub fn load_template(
    template_path: &Path,
    resources_dir: Option<&Path>,
) -> Result<ResolvedTemplate, TemplateError> {
    let source = std::fs::read_to_string(template_path).map_err(|source| TemplateError::Io {
        path: template_path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Template text:\n{source}");
    let resources = match resources_dir {
        Some(dir) => dir.to_path_buf(),
        None => template_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    Ok(resolve_template(&source, &resources))
}

/// Rewrite the first path reference of `line`, if it is a literal path.
fn rebase_line(line: &str, resources: &Path) -> String {
    let Some(caps) = PATH_REFERENCE.captures(line) else {
        return line.to_string();
    };
    // Group 3 is the {thumbnail…} placeholder form.
    let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
        return line.to_string();
    };
    let path = value.as_str();
    if path.is_empty() || path.starts_with('{') {
        return line.to_string();
    }

    let rebased = resources.join(base_name(path));
    tracing::debug!("Resolved path {path} -> {}", rebased.display());
    let mut out = String::with_capacity(line.len() + resources.as_os_str().len());
    out.push_str(&line[..value.start()]);
    out.push_str(&rebased.to_string_lossy());
    out.push_str(&line[value.end()..]);
    out
}

/// Last component of a path written with either separator style.
fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Absolute, lexically normalized form of `dir`.
fn absolute_dir(dir: &Path) -> PathBuf {
    let absolute = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
