//! Metadata probe trait and shared types.
//!
//! The [`MediaProbe`] trait defines the two questions the extractor asks about
//! a media file:
//!
//! - **frame metadata**: the per-frame attribute dump of an image reader
//!   (`iinfo -v`), returned as raw text lines;
//! - **stream metadata**: the container's video stream description
//!   (`ffprobe -show_streams`), returned parsed.
//!
//! The production implementation is
//! [`ToolProbe`](super::tool_probe::ToolProbe), which shells out to
//! OpenImageIO and FFmpeg.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{tool} failed for '{}': {reason}", .path.display())]
    Failure {
        tool: String,
        path: PathBuf,
        reason: String,
    },
}

impl ProbeError {
    pub fn failure(tool: &str, path: &Path, reason: impl Into<String>) -> Self {
        Self::Failure {
            tool: tool.to_string(),
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Container description as reported by ffprobe's JSON writer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamInfo {
    #[serde(default)]
    pub streams: Vec<StreamEntry>,
}

/// One stream of a container. Only the fields the slate needs are kept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamEntry {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl StreamInfo {
    pub fn first(&self) -> Option<&StreamEntry> {
        self.streams.first()
    }
}

impl StreamEntry {
    /// The stream's `timecode` tag, if non-empty.
    pub fn timecode(&self) -> Option<&str> {
        self.tags
            .get("timecode")
            .map(|tc| tc.trim())
            .filter(|tc| !tc.is_empty())
    }
}

/// Source of media metadata.
pub trait MediaProbe: Sync {
    /// Name of the tool behind [`frame_metadata`](Self::frame_metadata), for errors.
    fn frame_tool(&self) -> &str;

    /// Name of the tool behind [`stream_metadata`](Self::stream_metadata), for errors.
    fn stream_tool(&self) -> &str;

    /// Per-frame attribute dump, one attribute per line.
    fn frame_metadata(&self, path: &Path) -> Result<Vec<String>, ProbeError>;

    /// Video stream description of the container.
    fn stream_metadata(&self, path: &Path) -> Result<StreamInfo, ProbeError>;
}
