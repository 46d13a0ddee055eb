//! Headless browser rendering.
//!
//! The compiled slate is loaded from its staging file and screenshotted at
//! the slate's raster size:
//!
//! ```text
//! chromium --headless --disable-gpu --hide-scrollbars \
//!     --default-background-color=000000 --window-size=W,H \
//!     --screenshot=OUT.png file:///staging/slate_staged.html
//! ```
//!
//! Browsers exit zero even when a page fails to load, so the screenshot is
//! checked afterwards: it must exist and have exactly the requested size.

use super::{RenderError, RenderParams, SlateRenderer};
use crate::config::ToolsConfig;
use crate::tools::ToolRunner;
use std::path::Path;

pub struct BrowserRenderer {
    runner: ToolRunner,
    browser: String,
}

impl BrowserRenderer {
    pub fn new(runner: ToolRunner, browser: impl Into<String>) -> Self {
        Self {
            runner,
            browser: browser.into(),
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self::new(ToolRunner::from_config(config), config.browser.clone())
    }

    fn args(params: &RenderParams) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--disable-gpu".to_string(),
            "--hide-scrollbars".to_string(),
            "--default-background-color=000000".to_string(),
            format!("--window-size={},{}", params.width, params.height),
            format!("--screenshot={}", params.output.display()),
            file_url(&params.html),
        ]
    }
}

impl SlateRenderer for BrowserRenderer {
    fn render(&self, params: &RenderParams) -> Result<(), RenderError> {
        if params.output.exists() {
            std::fs::remove_file(&params.output)?;
        }
        self.runner.run(&self.browser, Self::args(params))?;
        verify_dimensions(&params.output, params.width, params.height)
    }
}

/// Check a rendered PNG exists and is `width`x`height`.
pub fn verify_dimensions(path: &Path, width: u32, height: u32) -> Result<(), RenderError> {
    if !path.exists() {
        return Err(RenderError::MissingOutput(path.to_path_buf()));
    }
    let actual = image::image_dimensions(path).map_err(|e| RenderError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if actual != (width, height) {
        return Err(RenderError::SizeMismatch {
            path: path.to_path_buf(),
            expected: (width, height),
            actual,
        });
    }
    tracing::debug!("Rendered {} at {width}x{height}", path.display());
    Ok(())
}

fn file_url(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let text = absolute.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}
