//! Media metadata: probing clips and extracting what the slate shows.
//!
//! ## Module Structure
//!
//! - [`probe`] - The `MediaProbe` trait and the ffprobe stream types
//! - [`tool_probe`] - `iinfo`/`ffprobe` backed implementation
//! - [`extract`] - Timecode and resolution extraction on top of a probe

pub mod extract;
pub mod probe;
pub mod tool_probe;

pub use extract::{
    ExtractError, Resolution, TimingSettings, extract_resolution, extract_timecode, first_frame,
};
pub use probe::{MediaProbe, ProbeError, StreamInfo};
pub use tool_probe::ToolProbe;
