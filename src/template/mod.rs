//! HTML slate templates.
//!
//! A template goes through two passes before it reaches the renderer:
//!
//! ```text
//! template.html ──resolve──▶ ResolvedTemplate ──compile(data)──▶ HTML string
//!                (comments dropped,              (optionals derived,
//!                 asset paths rebased)            placeholders substituted)
//! ```
//!
//! Resolution only depends on the template file and the resources directory,
//! so one resolved template can be compiled against many data sets.
//!
//! ## Placeholder syntax
//!
//! | Text | Meaning |
//! |---|---|
//! | `{shot}` | value of the `shot` field |
//! | `{shot_optional}` | empty when `shot` is truthy, otherwise `style="display:None;"` |
//! | `{{` / `}}` | literal `{` / `}` |

pub mod compile;
pub mod resolve;

pub use compile::{HIDDEN_STYLE, TemplateCompiler};
pub use resolve::{ResolvedTemplate, load_template, resolve_template};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("failed to read template '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no template loaded")]
    NotLoaded,
    #[error("no template path configured (set template.path or pass --template)")]
    NoTemplatePath,
    #[error("template references missing key '{0}'")]
    MissingKey(String),
    #[error("malformed placeholder at byte {offset}")]
    MalformedPlaceholder { offset: usize },
}
