//! Timecode and resolution extraction.
//!
//! ## Timecode sources
//!
//! The timecode of a clip is resolved from three sources, in order:
//!
//! 1. **Default**: built from the configured start frame and frame rate.
//! 2. **Frame metadata**: the first `…TimeCode: HH:MM:SS:FF` attribute in the
//!    per-frame dump (EXR/DPX headers).
//! 3. **Container tag**: `streams[0].tags.timecode` from ffprobe (movies).
//!
//! Every source that produced a value overrides the ones before it, so the
//! container tag wins when both probes report a timecode. The configured
//! frame offset is applied to whichever value wins.
//!
//! ## Failures
//!
//! A probe that fails to run, exits non-zero or prints something unparsable is
//! an error. Only a probe that succeeded without reporting a value falls back.

use super::probe::{MediaProbe, ProbeError};
use crate::config::TimingConfig;
use crate::data::{self, SlateData};
use crate::timecode::{self, FrameRate, TimeError, Timecode};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Time(#[from] TimeError),
    #[error("no video stream reported for '{}'", .0.display())]
    NoVideoStream(PathBuf),
    #[error("image sequence directory '{}' contains no frames", .0.display())]
    EmptySequence(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pixel dimensions of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Timing inputs for [`extract_timecode`].
#[derive(Debug, Clone, Copy)]
pub struct TimingSettings {
    pub fps: FrameRate,
    pub start_frame: i64,
    pub offset_frames: i64,
    /// Whether the per-frame probe runs at all.
    pub frame_metadata: bool,
}

impl TimingSettings {
    pub fn from_config(timing: &TimingConfig, fps: FrameRate, frame_metadata: bool) -> Self {
        Self {
            fps,
            start_frame: timing.start_frame,
            offset_frames: timing.offset_frames,
            frame_metadata,
        }
    }
}

/// Pick the last source that produced a value.
///
/// ```text
/// timecode: resolve_last(&[default, frame_metadata, container_tag])
/// ```
pub fn resolve_last(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .rev()
        .filter_map(|opt| opt.map(str::trim).filter(|s| !s.is_empty()))
        .map(String::from)
        .next()
}

/// Find the timecode attribute in a per-frame metadata dump.
///
/// Takes the first line whose text contains `timecode` (any case) and returns
/// its trailing token. When the token holds more than four colon fields (the
/// label was glued to the value) only the last four are kept.
pub fn find_frame_timecode(lines: &[String]) -> Option<String> {
    lines.iter().find_map(|line| {
        let lower = line.to_ascii_lowercase();
        let at = lower.find("timecode")?;
        let rest = &line[at + "timecode".len()..];
        let token = rest.split_whitespace().next_back()?;
        let fields: Vec<&str> = token.split(':').filter(|f| !f.is_empty()).collect();
        if fields.len() < 4 {
            tracing::warn!("Ignoring timecode attribute without a value: '{}'", line.trim());
            return None;
        }
        Some(fields[fields.len() - 4..].join(":"))
    })
}

/// Determine the timecode of `file` and store it as `data["timecode"]`.
pub fn extract_timecode(
    probe: &impl MediaProbe,
    file: &Path,
    timing: &TimingSettings,
    data: &mut SlateData,
) -> Result<String, ExtractError> {
    let name = display_name(file);
    let default_tc = timecode::frames_to_timecode(timing.start_frame, timing.fps)?;
    tracing::debug!("{name}: Starting timecode set at: {default_tc}");

    let frame_tc = if timing.frame_metadata {
        let lines = probe.frame_metadata(file)?;
        match find_frame_timecode(&lines) {
            Some(tc) => {
                Timecode::parse(&tc, timing.fps).map_err(|e| {
                    ProbeError::failure(probe.frame_tool(), file, e.to_string())
                })?;
                tracing::debug!("{name}: Timecode found in frame metadata: {tc}");
                Some(tc)
            }
            None => None,
        }
    } else {
        None
    };

    let stream = probe.stream_metadata(file)?;
    let tag_tc = stream
        .first()
        .and_then(|s| s.timecode())
        .map(str::to_string);
    if let Some(tc) = &tag_tc {
        Timecode::parse(tc, timing.fps)
            .map_err(|e| ProbeError::failure(probe.stream_tool(), file, e.to_string()))?;
        tracing::debug!("{name}: Timecode found in container tags: {tc}");
    }

    let resolved = resolve_last(&[
        Some(default_tc.as_str()),
        frame_tc.as_deref(),
        tag_tc.as_deref(),
    ])
    .unwrap_or(default_tc);

    let tc = apply_offset(&resolved, timing)?;
    tracing::debug!("{name}: Timecode for slate: {tc}");
    data.set(data::TIMECODE, tc.clone());
    Ok(tc)
}

/// Default timecode for slates rendered without an input clip.
pub fn default_timecode(
    timing: &TimingSettings,
    data: &mut SlateData,
) -> Result<String, ExtractError> {
    let tc = timecode::frames_to_timecode(timing.start_frame, timing.fps)?;
    let tc = apply_offset(&tc, timing)?;
    data.set(data::TIMECODE, tc.clone());
    Ok(tc)
}

fn apply_offset(tc: &str, timing: &TimingSettings) -> Result<String, ExtractError> {
    if timing.offset_frames == 0 {
        return Ok(tc.to_string());
    }
    let frames = timecode::timecode_to_frames(tc, timing.fps)?;
    let shifted = i64::try_from(frames)
        .ok()
        .and_then(|f| f.checked_add(timing.offset_frames))
        .ok_or_else(|| TimeError::MalformedTimecode(tc.to_string()))?;
    Ok(timecode::frames_to_timecode(shifted, timing.fps)?)
}

/// Determine the resolution of `file` and store it in `data`.
pub fn extract_resolution(
    probe: &impl MediaProbe,
    file: &Path,
    data: &mut SlateData,
) -> Result<Resolution, ExtractError> {
    let info = probe.stream_metadata(file)?;
    let stream = info
        .first()
        .ok_or_else(|| ExtractError::NoVideoStream(file.to_path_buf()))?;
    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(ProbeError::failure(
                probe.stream_tool(),
                file,
                "video stream has no usable width/height",
            )
            .into());
        }
    };
    tracing::debug!("{}: File resolution is: {width}x{height}", display_name(file));
    data.set_resolution(width, height);
    Ok(Resolution::new(width, height))
}

/// The file a probe should look at: the path itself, or for an image sequence
/// directory its first frame in lexical order (hidden files skipped).
pub fn first_frame(path: &Path) -> Result<PathBuf, ExtractError> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| ExtractError::Io(e.into()))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type().is_file() && !hidden {
            return Ok(entry.into_path());
        }
    }
    Err(ExtractError::EmptySequence(path.to_path_buf()))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::probe::tests::{MockProbe, RecordedCall};
    use std::fs;
    use tempfile::TempDir;

    fn timing() -> TimingSettings {
        TimingSettings {
            fps: FrameRate::new(24, 1).unwrap(),
            start_frame: 1001,
            offset_frames: 0,
            frame_metadata: true,
        }
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    // =========================================================================
    // resolve_last()
    // =========================================================================

    #[test]
    fn resolve_last_picks_last_present() {
        assert_eq!(
            resolve_last(&[Some("a"), Some("b"), Some("c")]),
            Some("c".to_string())
        );
        assert_eq!(
            resolve_last(&[Some("a"), Some("b"), None]),
            Some("b".to_string())
        );
        assert_eq!(resolve_last(&[Some("a"), None, None]), Some("a".to_string()));
    }

    #[test]
    fn resolve_last_skips_blank() {
        assert_eq!(
            resolve_last(&[Some("a"), Some("  ")]),
            Some("a".to_string())
        );
        assert_eq!(resolve_last(&[]), None);
    }

    // =========================================================================
    // find_frame_timecode()
    // =========================================================================

    #[test]
    fn finds_spaced_timecode_attribute() {
        let dump = lines(&[
            "/plates/a.exr : 2048 x 1152, 4 channel, half openexr",
            "    compression: \"zip\"",
            "    smpte:TimeCode: 01:00:41:17",
        ]);
        assert_eq!(find_frame_timecode(&dump), Some("01:00:41:17".to_string()));
    }

    #[test]
    fn finds_glued_timecode_attribute() {
        let dump = lines(&["smpte:TimeCode:01:00:00:05"]);
        assert_eq!(find_frame_timecode(&dump), Some("01:00:00:05".to_string()));
    }

    #[test]
    fn first_timecode_line_wins() {
        let dump = lines(&[
            "    smpte:TimeCode: 01:00:00:00",
            "    dpx:TimeCode: 02:00:00:00",
        ]);
        assert_eq!(find_frame_timecode(&dump), Some("01:00:00:00".to_string()));
    }

    #[test]
    fn no_timecode_line_is_none() {
        let dump = lines(&["    compression: \"zip\"", "    PixelAspectRatio: 1"]);
        assert_eq!(find_frame_timecode(&dump), None);
    }

    // =========================================================================
    // extract_timecode()
    // =========================================================================

    #[test]
    fn timecode_defaults_from_start_frame() {
        let probe = MockProbe::new().with_stream(1920, 1080, None);
        let mut data = SlateData::new();

        let tc = extract_timecode(&probe, Path::new("/a.exr"), &timing(), &mut data).unwrap();
        assert_eq!(tc, "00:00:41:17");
        assert_eq!(data.get("timecode").unwrap().to_string(), "00:00:41:17");
    }

    #[test]
    fn frame_metadata_overrides_default() {
        let probe = MockProbe::new()
            .with_frame_lines(&["    smpte:TimeCode: 01:00:00:00"])
            .with_stream(1920, 1080, None);
        let mut data = SlateData::new();

        let tc = extract_timecode(&probe, Path::new("/a.exr"), &timing(), &mut data).unwrap();
        assert_eq!(tc, "01:00:00:00");
    }

    #[test]
    fn container_tag_beats_frame_metadata() {
        let probe = MockProbe::new()
            .with_frame_lines(&["    smpte:TimeCode: 01:00:00:00"])
            .with_stream(1920, 1080, Some("02:00:00:00"));
        let mut data = SlateData::new();

        let tc = extract_timecode(&probe, Path::new("/a.mov"), &timing(), &mut data).unwrap();
        assert_eq!(tc, "02:00:00:00");
        assert_eq!(data.get("timecode").unwrap().to_string(), "02:00:00:00");
    }

    #[test]
    fn both_probes_run_even_when_first_matches() {
        let probe = MockProbe::new()
            .with_frame_lines(&["    smpte:TimeCode: 01:00:00:00"])
            .with_stream(1920, 1080, None);
        let mut data = SlateData::new();

        extract_timecode(&probe, Path::new("/a.exr"), &timing(), &mut data).unwrap();
        assert_eq!(
            probe.get_calls(),
            vec![
                RecordedCall::Frame("/a.exr".into()),
                RecordedCall::Stream("/a.exr".into()),
            ]
        );
    }

    #[test]
    fn frame_probe_can_be_disabled() {
        let probe = MockProbe::new()
            .with_frame_lines(&["    smpte:TimeCode: 01:00:00:00"])
            .with_stream(1920, 1080, None);
        let mut data = SlateData::new();
        let settings = TimingSettings {
            frame_metadata: false,
            ..timing()
        };

        let tc = extract_timecode(&probe, Path::new("/a.mov"), &settings, &mut data).unwrap();
        assert_eq!(tc, "00:00:41:17");
        assert_eq!(probe.get_calls(), vec![RecordedCall::Stream("/a.mov".into())]);
    }

    #[test]
    fn offset_applies_to_winning_value() {
        let probe = MockProbe::new()
            .with_frame_lines(&["    smpte:TimeCode: 01:00:00:00"])
            .with_stream(1920, 1080, None);
        let mut data = SlateData::new();
        let settings = TimingSettings {
            offset_frames: -1,
            ..timing()
        };

        let tc = extract_timecode(&probe, Path::new("/a.exr"), &settings, &mut data).unwrap();
        assert_eq!(tc, "00:59:59:23");
    }

    #[test]
    fn offset_below_zero_is_invalid_frame_count() {
        let probe = MockProbe::new()
            .with_frame_lines(&["    smpte:TimeCode: 00:00:00:00"])
            .with_stream(1920, 1080, None);
        let mut data = SlateData::new();
        let settings = TimingSettings {
            offset_frames: -1,
            ..timing()
        };

        let err = extract_timecode(&probe, Path::new("/a.exr"), &settings, &mut data).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Time(TimeError::InvalidFrameCount(-1))
        ));
    }

    #[test]
    fn offset_on_frame_count_beyond_i64_is_error() {
        let probe = MockProbe::new()
            .with_frame_lines(&[])
            .with_stream(1920, 1080, Some("200000000000000:00:00:00"));
        let mut data = SlateData::new();
        let settings = TimingSettings {
            offset_frames: -1,
            ..timing()
        };

        let err = extract_timecode(&probe, Path::new("/a.mov"), &settings, &mut data).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Time(TimeError::MalformedTimecode(_))
        ));
        assert!(data.get("timecode").is_none());
    }

    #[test]
    fn frame_probe_failure_is_not_swallowed() {
        let probe = MockProbe {
            fail_frame: true,
            ..MockProbe::new().with_stream(1920, 1080, Some("01:00:00:00"))
        };
        let mut data = SlateData::new();

        let err = extract_timecode(&probe, Path::new("/a.exr"), &timing(), &mut data).unwrap_err();
        match err {
            ExtractError::Probe(ProbeError::Failure { tool, path, .. }) => {
                assert_eq!(tool, "iinfo");
                assert_eq!(path, PathBuf::from("/a.exr"));
            }
            other => panic!("expected probe failure, got {other:?}"),
        }
        assert!(!data.contains("timecode"));
    }

    #[test]
    fn garbage_frame_timecode_is_probe_failure() {
        let probe = MockProbe::new()
            .with_frame_lines(&["    smpte:TimeCode: 99:99:99:99"])
            .with_stream(1920, 1080, None);
        let mut data = SlateData::new();

        let err = extract_timecode(&probe, Path::new("/a.exr"), &timing(), &mut data).unwrap_err();
        assert!(matches!(err, ExtractError::Probe(_)));
    }

    #[test]
    fn garbage_container_tag_is_probe_failure() {
        let probe = MockProbe::new().with_stream(1920, 1080, Some("01:00:00;00"));
        let mut data = SlateData::new();

        let err = extract_timecode(&probe, Path::new("/a.mov"), &timing(), &mut data).unwrap_err();
        match err {
            ExtractError::Probe(ProbeError::Failure { tool, .. }) => assert_eq!(tool, "ffprobe"),
            other => panic!("expected probe failure, got {other:?}"),
        }
    }

    #[test]
    fn default_timecode_applies_offset() {
        let mut data = SlateData::new();
        let settings = TimingSettings {
            offset_frames: -1,
            ..timing()
        };
        assert_eq!(default_timecode(&settings, &mut data).unwrap(), "00:00:41:16");
        assert_eq!(data.get("timecode").unwrap().to_string(), "00:00:41:16");
    }

    // =========================================================================
    // extract_resolution()
    // =========================================================================

    #[test]
    fn resolution_is_read_and_stored() {
        let probe = MockProbe::new().with_stream(4096, 2160, None);
        let mut data = SlateData::new();

        let res = extract_resolution(&probe, Path::new("/a.mov"), &mut data).unwrap();
        assert_eq!(res, Resolution::new(4096, 2160));
        assert_eq!(data.resolution(), Some((4096, 2160)));
    }

    #[test]
    fn no_stream_is_no_video_stream_error() {
        let probe = MockProbe::new();
        let mut data = SlateData::new();

        let err = extract_resolution(&probe, Path::new("/a.wav"), &mut data).unwrap_err();
        assert!(matches!(err, ExtractError::NoVideoStream(p) if p == Path::new("/a.wav")));
        assert_eq!(data.resolution(), None);
    }

    #[test]
    fn stream_without_dimensions_is_probe_failure() {
        let mut probe = MockProbe::new().with_stream(1920, 1080, None);
        probe.stream.streams[0].height = None;
        let mut data = SlateData::new();

        let err = extract_resolution(&probe, Path::new("/a.mov"), &mut data).unwrap_err();
        assert!(matches!(err, ExtractError::Probe(_)));
    }

    #[test]
    fn resolution_display() {
        assert_eq!(Resolution::new(1920, 1080).to_string(), "1920x1080");
    }

    // =========================================================================
    // first_frame()
    // =========================================================================

    #[test]
    fn first_frame_passes_files_through() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.mov");
        fs::write(&file, b"").unwrap();
        assert_eq!(first_frame(&file).unwrap(), file);
    }

    #[test]
    fn first_frame_picks_lowest_frame_of_sequence() {
        let tmp = TempDir::new().unwrap();
        for name in ["plate.1003.exr", "plate.1001.exr", ".DS_Store", "plate.1002.exr"] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        assert_eq!(
            first_frame(tmp.path()).unwrap(),
            tmp.path().join("plate.1001.exr")
        );
    }

    #[test]
    fn first_frame_of_empty_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            first_frame(tmp.path()),
            Err(ExtractError::EmptySequence(_))
        ));
    }
}
