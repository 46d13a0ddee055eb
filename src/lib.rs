//! # Slate Gen
//!
//! Generates slates: title cards carrying production metadata (shot, version,
//! artist, timecode, resolution, ...) that are cut in front of a deliverable.
//! A slate is an HTML template filled from a flat data set, screenshotted by a
//! headless browser at the clip's resolution, then color-converted into the
//! delivery color space.
//!
//! # Pipeline
//!
//! ```text
//! clip ──probe──▶ resolution + timecode ─┐
//!                                        ├─▶ SlateData ──compile──▶ HTML
//! data.json + --set ─────────────────────┘                           │
//!                                                                    ▼
//!                         slate.exr ◀──oiiotool── PNG ◀──browser── staging
//! ```
//!
//! Rasterizing, color math and media decoding are delegated to external
//! tools (Chromium, OpenImageIO, FFmpeg). This crate owns the parts that need
//! to be exact: timecode arithmetic, the timecode fallback chain, template
//! resolution and placeholder substitution.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`timecode`] | `HH:MM:SS:FF` ↔ frames ↔ seconds at rational frame rates |
//! | [`data`] | The flat, typed slate data set and its JSON loading |
//! | [`media`] | Probing clips (`iinfo`, `ffprobe`) and extracting timecode and resolution |
//! | [`template`] | Comment stripping, asset path rebasing, placeholder substitution |
//! | [`render`] | Headless browser rendering and `oiiotool` color conversion |
//! | [`slate`] | The per-slate pipeline and parallel batches |
//! | [`tools`] | Locating and running external executables with an explicit search path |
//! | [`config`] | `slate.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Traits at Every External Tool
//!
//! Each external program sits behind a trait ([`media::MediaProbe`],
//! [`render::SlateRenderer`], [`render::ColorConverter`]). The orchestrator is
//! generic over them, so the whole pipeline runs in tests with recording
//! doubles and no OpenImageIO, FFmpeg or browser installed.
//!
//! ## Last Source Wins for Timecode
//!
//! The timecode is taken from, in rising priority, the configured start
//! frame, the frame metadata and the container's timecode tag. A probe that
//! fails is an error rather than a silent fallback: a slate with a wrong
//! timecode is worse than no slate.
//!
//! ## No Process-Wide State
//!
//! Tool search paths travel in a [`tools::ToolRunner`] instead of being pushed
//! into the process `PATH`, and every slate job owns its data set. Parallel
//! batches therefore need no locking.

pub mod config;
pub mod data;
pub mod media;
pub mod output;
pub mod render;
pub mod slate;
pub mod template;
pub mod timecode;
pub mod tools;
