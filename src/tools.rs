//! Running external executables.
//!
//! Every probe, render and conversion goes through a [`ToolRunner`], which
//! carries its own search path instead of touching the process environment.
//! The child's `PATH` is the configured search directories followed by the
//! inherited `PATH`, so vendored OIIO/FFmpeg builds win over system ones and
//! the tools they spawn resolve the same way.

use crate::config::ToolsConfig;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} not found in search paths or PATH")]
    NotFound { tool: String },
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::NotFound { tool }
            | ToolError::Spawn { tool, .. }
            | ToolError::Failed { tool, .. } => tool,
        }
    }
}

/// Resolves and runs external tools with an explicit search path.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    search_paths: Vec<PathBuf>,
}

impl ToolRunner {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self::new(config.search_paths.clone())
    }

    /// `PATH` for child processes: search paths first, then the inherited `PATH`.
    pub fn child_path(&self) -> OsString {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .search_paths
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited));
        std::env::join_paths(dirs).unwrap_or(inherited)
    }

    /// Locate an executable. Names containing a path separator are used as-is.
    pub fn resolve(&self, tool: &str) -> Result<PathBuf, ToolError> {
        let as_path = Path::new(tool);
        if as_path.components().count() > 1 {
            return if as_path.exists() {
                Ok(as_path.to_path_buf())
            } else {
                Err(ToolError::NotFound {
                    tool: tool.to_string(),
                })
            };
        }
        let cwd = std::env::current_dir().unwrap_or_default();
        which::which_in(tool, Some(self.child_path()), cwd).map_err(|_| ToolError::NotFound {
            tool: tool.to_string(),
        })
    }

    /// Run `tool` to completion and capture its output.
    ///
    /// A non-zero exit status is an error carrying the tool's stderr.
    pub fn run<I, S>(&self, tool: &str, args: I) -> Result<Output, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.resolve(tool)?;
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        tracing::debug!(
            "{tool}: cmd> {} {}",
            program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let output = Command::new(&program)
            .args(&args)
            .env("PATH", self.child_path())
            .output()
            .map_err(|source| ToolError::Spawn {
                tool: tool.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: tool.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}
