//! Probe backed by OpenImageIO's `iinfo` and FFmpeg's `ffprobe`.
//!
//! | Question | Command |
//! |---|---|
//! | Frame metadata | `iinfo -v FILE` |
//! | Stream metadata | `ffprobe -v error -select_streams v:0 -show_streams -of json FILE` |

use super::probe::{MediaProbe, ProbeError, StreamInfo};
use crate::config::ToolsConfig;
use crate::tools::{ToolError, ToolRunner};
use std::ffi::OsStr;
use std::path::Path;

pub struct ToolProbe {
    runner: ToolRunner,
    iinfo: String,
    ffprobe: String,
}

impl ToolProbe {
    pub fn new(runner: ToolRunner, iinfo: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            runner,
            iinfo: iinfo.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        Self::new(
            ToolRunner::from_config(config),
            config.iinfo.clone(),
            config.ffprobe.clone(),
        )
    }

    fn run(&self, tool: &str, args: &[&OsStr], path: &Path) -> Result<Vec<u8>, ProbeError> {
        self.runner
            .run(tool, args)
            .map(|output| output.stdout)
            .map_err(|e| probe_failure(e, path))
    }
}

fn probe_failure(err: ToolError, path: &Path) -> ProbeError {
    let tool = err.tool().to_string();
    ProbeError::failure(&tool, path, err.to_string())
}

impl MediaProbe for ToolProbe {
    fn frame_tool(&self) -> &str {
        &self.iinfo
    }

    fn stream_tool(&self) -> &str {
        &self.ffprobe
    }

    fn frame_metadata(&self, path: &Path) -> Result<Vec<String>, ProbeError> {
        let stdout = self.run(&self.iinfo, &[OsStr::new("-v"), path.as_os_str()], path)?;
        let text = String::from_utf8(stdout).map_err(|_| {
            ProbeError::failure(&self.iinfo, path, "output is not valid UTF-8")
        })?;
        Ok(text.lines().map(str::to_string).collect())
    }

    fn stream_metadata(&self, path: &Path) -> Result<StreamInfo, ProbeError> {
        let stdout = self.run(
            &self.ffprobe,
            &[
                OsStr::new("-v"),
                OsStr::new("error"),
                OsStr::new("-select_streams"),
                OsStr::new("v:0"),
                OsStr::new("-show_streams"),
                OsStr::new("-of"),
                OsStr::new("json"),
                path.as_os_str(),
            ],
            path,
        )?;
        let info: StreamInfo = serde_json::from_slice(&stdout).map_err(|e| {
            ProbeError::failure(&self.ffprobe, path, format!("JSON parse failed: {e}"))
        })?;
        tracing::debug!("{}: {} stream(s) reported", path.display(), info.streams.len());
        Ok(info)
    }
}
