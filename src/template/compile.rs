//! Placeholder substitution.
//!
//! [`TemplateCompiler`] turns a [`ResolvedTemplate`] and a [`SlateData`] into
//! the final HTML document. Compilation runs in three steps:
//!
//! 1. **Tokenize** the template into literal text and `{key}` placeholders.
//!    `{{` and `}}` are literal braces; any other unmatched brace is a
//!    [`TemplateError::MalformedPlaceholder`].
//! 2. **Derive optionals**: every `{X_optional}` placeholder sets
//!    `data["X_optional"]` to `""` when `X` is truthy and to [`HIDDEN_STYLE`]
//!    otherwise. A missing `X` counts as falsy.
//! 3. **Validate, then substitute**: all keys are checked before any output is
//!    produced, so a missing key fails the whole compile and reports the first
//!    missing key in document order.

use super::TemplateError;
use super::resolve::{ResolvedTemplate, load_template};
use crate::data::SlateData;
use std::path::Path;

/// Inline style that hides an element whose optional field is falsy.
pub const HIDDEN_STYLE: &str = "style=\"display:None;\"";

const OPTIONAL_SUFFIX: &str = "_optional";

#[derive(Debug, Clone, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    Key(&'a str),
}

/// Compiles a resolved template against slate data.
///
/// Holds the last compiled document; it is replaced on every
/// [`compile`](Self::compile) and cleared when compilation fails.
#[derive(Debug, Default)]
pub struct TemplateCompiler {
    resolved: Option<ResolvedTemplate>,
    compiled: String,
}

impl TemplateCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(resolved: ResolvedTemplate) -> Self {
        Self {
            resolved: Some(resolved),
            compiled: String::new(),
        }
    }

    pub fn set_template(&mut self, resolved: ResolvedTemplate) {
        self.resolved = Some(resolved);
        self.compiled.clear();
    }

    /// Resolve `template_path` and keep the result for later compiles.
    pub fn load(
        &mut self,
        template_path: &Path,
        resources_dir: Option<&Path>,
    ) -> Result<(), TemplateError> {
        self.set_template(load_template(template_path, resources_dir)?);
        Ok(())
    }

    /// The last successfully compiled document (empty before the first).
    pub fn compiled(&self) -> &str {
        &self.compiled
    }

    /// Compile the loaded template against `data`.
    ///
    /// With `process_optionals`, `*_optional` keys are (re)derived into `data`
    /// first. The returned slice borrows the compiler; copy it to keep a
    /// snapshot across compiles.
    pub fn compile(
        &mut self,
        data: &mut SlateData,
        process_optionals: bool,
    ) -> Result<&str, TemplateError> {
        self.compiled.clear();
        let resolved = match &self.resolved {
            Some(r) if !r.is_empty() => r,
            _ => return Err(TemplateError::NotLoaded),
        };

        let segments = tokenize(resolved.as_str())?;
        if process_optionals {
            derive_optionals(&segments, data);
        }
        tracing::debug!("Slate data: {data:?}");

        if let Some(missing) = segments.iter().find_map(|s| match s {
            Segment::Key(key) if !data.contains(key) => Some(*key),
            _ => None,
        }) {
            tracing::error!("Template key '{missing}' missing from slate data");
            return Err(TemplateError::MissingKey(missing.to_string()));
        }

        let mut out = String::with_capacity(resolved.as_str().len());
        for segment in &segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Key(key) => {
                    if let Some(value) = data.get(key) {
                        out.push_str(&value.to_string());
                    }
                }
            }
        }
        self.compiled = out;
        Ok(&self.compiled)
    }
}

/// Set `X_optional` for every distinct `{X_optional}` placeholder.
fn derive_optionals(segments: &[Segment<'_>], data: &mut SlateData) {
    for segment in segments {
        let Segment::Key(key) = segment else {
            continue;
        };
        let Some(base) = key.strip_suffix(OPTIONAL_SUFFIX) else {
            continue;
        };
        let value = if data.is_truthy(base) { "" } else { HIDDEN_STYLE };
        data.set(*key, value);
    }
}

/// Split template text into literal runs and placeholder keys.
fn tokenize(text: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'}' if bytes.get(i + 1) == Some(&bytes[i]) => {
                // Escaped brace: keep one of the pair.
                segments.push(Segment::Literal(&text[literal_start..=i]));
                i += 2;
                literal_start = i;
            }
            b'{' => {
                let close = text[i + 1..]
                    .find(['{', '}'])
                    .map(|rel| i + 1 + rel)
                    .filter(|&end| bytes[end] == b'}' && end > i + 1)
                    .ok_or(TemplateError::MalformedPlaceholder { offset: i })?;
                if literal_start < i {
                    segments.push(Segment::Literal(&text[literal_start..i]));
                }
                segments.push(Segment::Key(&text[i + 1..close]));
                i = close + 1;
                literal_start = i;
            }
            b'}' => return Err(TemplateError::MalformedPlaceholder { offset: i }),
            _ => i += 1,
        }
    }
    if literal_start < text.len() {
        segments.push(Segment::Literal(&text[literal_start..]));
    }
    Ok(segments)
}
