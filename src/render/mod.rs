//! Rasterizing compiled slates and converting them to the delivery color space.
//!
//! Both steps are delegated to external programs behind a trait each, so the
//! orchestrator can be tested with recording doubles:
//!
//! | Trait | Production impl | Program |
//! |---|---|---|
//! | [`SlateRenderer`] | [`BrowserRenderer`] | headless Chromium-family browser |
//! | [`ColorConverter`] | [`OiioConverter`] | OpenImageIO `oiiotool` |
//!
//! ## Module Structure
//!
//! - [`browser`] - HTML to PNG through `--headless --screenshot`
//! - [`oiio`] - Color conversion through `oiiotool --colorconvert`

pub mod browser;
pub mod oiio;

pub use browser::BrowserRenderer;
pub use oiio::OiioConverter;

use crate::tools::ToolError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("renderer produced no image at '{}'", .0.display())]
    MissingOutput(PathBuf),
    #[error("unreadable render output '{}': {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error(
        "render output '{}' is {}x{}, expected {}x{}",
        .path.display(), .actual.0, .actual.1, .expected.0, .expected.1
    )]
    SizeMismatch {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Render a compiled HTML document to a PNG of exactly `width`x`height`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    pub html: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Convert `input` from one color space to another, writing `output`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertParams {
    pub input: PathBuf,
    pub output: PathBuf,
    pub from: String,
    pub to: String,
}

pub trait SlateRenderer: Sync {
    fn render(&self, params: &RenderParams) -> Result<(), RenderError>;
}

pub trait ColorConverter: Sync {
    fn convert(&self, params: &ConvertParams) -> Result<(), RenderError>;
}
