//! Slate orchestration.
//!
//! One slate runs a fixed pipeline. Every stage completes before the next
//! starts and any failure aborts the slate:
//!
//! ```text
//! input clip ──▶ resolution ──▶ timecode ──▶ resolve template ──▶ compile
//!                                                                    │
//!   output ◀── color convert ◀── staged PNG ◀── render ◀── staged HTML
//! ```
//!
//! [`create_slate`] wires in the tool-backed collaborators
//! ([`ToolProbe`], [`BrowserRenderer`], [`OiioConverter`]);
//! [`create_slate_with`] accepts any implementation so the pipeline can be
//! tested with recording doubles.
//!
//! ## Resolution
//!
//! | Priority | Source |
//! |---|---|
//! | 1 | explicit override on the [`SlateRequest`] |
//! | 2 | the input clip's video stream (written into the data set) |
//! | 3 | truthy `resolution_width`/`resolution_height` already in the data set |
//! | 4 | `[resolution]` from the config |
//!
//! The chosen size is written back into the data set so templates can show it.
//!
//! ## Batches
//!
//! [`render_all`] renders several clips in parallel on a rayon pool sized by
//! `processing.max_jobs`. Each job clones the base data set and stages its
//! files under a specifier derived from its input path, so jobs share nothing
//! mutable.

use crate::config::{self, ConfigError, SlateConfig};
use crate::data::{self, DataError, SlateData};
use crate::media::{
    self, ExtractError, MediaProbe, Resolution, TimingSettings, ToolProbe, extract,
};
use crate::render::{
    BrowserRenderer, ColorConverter, ConvertParams, OiioConverter, RenderError, RenderParams,
    SlateRenderer,
};
use crate::template::{TemplateCompiler, TemplateError};
use crate::timecode::{FrameRate, TimeError};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Timecode error: {0}")]
    Time(#[from] TimeError),
    #[error("Metadata error: {0}")]
    Extract(#[from] ExtractError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("{}: {source}", .input.display())]
    Job {
        input: PathBuf,
        #[source]
        source: Box<SlateError>,
    },
}

/// What to render for one slate.
#[derive(Debug, Clone, PartialEq)]
pub struct SlateRequest {
    /// Clip to probe. `None` renders a template-only slate.
    pub input: Option<PathBuf>,
    /// Final, color-converted slate image.
    pub output: PathBuf,
    /// Explicit raster size, bypassing probing.
    pub resolution: Option<Resolution>,
    /// Appended to the staging name so concurrent jobs do not collide.
    pub specifier: String,
    /// Derive `*_optional` fields before substitution.
    pub process_optionals: bool,
}

impl SlateRequest {
    pub fn new(input: Option<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input,
            output: output.into(),
            resolution: None,
            specifier: String::new(),
            process_optionals: true,
        }
    }
}

/// What a finished slate produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SlateOutcome {
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub resolution: Resolution,
    pub timecode: String,
    pub staged_html: PathBuf,
    pub staged_png: PathBuf,
}

/// Options shared by every job of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    pub resolution: Option<Resolution>,
    pub process_optionals: bool,
    /// Extension of per-input outputs when several inputs share an output dir.
    pub extension: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            resolution: None,
            process_optionals: true,
            extension: "exr".to_string(),
        }
    }
}

/// Render one slate with the tool-backed probe, renderer and converter.
pub fn create_slate(
    config: &SlateConfig,
    data: &mut SlateData,
    request: &SlateRequest,
) -> Result<SlateOutcome, SlateError> {
    let probe = ToolProbe::from_config(&config.tools);
    let renderer = BrowserRenderer::from_config(&config.tools);
    let converter = OiioConverter::from_config(&config.tools, &config.color);
    create_slate_with(&probe, &renderer, &converter, config, data, request)
}

/// Render one slate with explicit collaborators.
pub fn create_slate_with(
    probe: &impl MediaProbe,
    renderer: &impl SlateRenderer,
    converter: &impl ColorConverter,
    config: &SlateConfig,
    data: &mut SlateData,
    request: &SlateRequest,
) -> Result<SlateOutcome, SlateError> {
    seed_data(config, data);
    let timing = TimingSettings::from_config(
        &config.timing,
        slate_frame_rate(config, data)?,
        config.probe.frame_metadata,
    );
    let probe_path = match &request.input {
        Some(input) => Some(media::first_frame(input)?),
        None => None,
    };

    // Resolution
    let resolution = match (request.resolution, &probe_path) {
        (Some(res), _) => res,
        (None, Some(path)) => extract::extract_resolution(probe, path, data)?,
        (None, None) => match data.resolution() {
            Some((w, h)) => Resolution::new(w, h),
            None => Resolution::new(config.resolution.width, config.resolution.height),
        },
    };
    data.set_resolution(resolution.width, resolution.height);

    // Timecode
    let timecode = match &probe_path {
        Some(path) => extract::extract_timecode(probe, path, &timing, data)?,
        None => match data.get(data::TIMECODE).filter(|tc| tc.is_truthy()) {
            Some(tc) => tc.to_string(),
            None => extract::default_timecode(&timing, data)?,
        },
    };
    tracing::info!("Slate timecode {timecode} at {resolution}");

    // Template
    if config.template.path.as_os_str().is_empty() {
        return Err(TemplateError::NoTemplatePath.into());
    }
    let mut compiler = TemplateCompiler::new();
    compiler.load(&config.template.path, Some(&config.template.resources_dir()))?;
    let html = compiler
        .compile(data, request.process_optionals)?
        .to_string();

    // Staging
    let staging = config.staging.staging_dir();
    std::fs::create_dir_all(&staging)?;
    let stem = format!("{}{}", config.staging.name, request.specifier);
    let staged_html = staging.join(format!("{stem}.html"));
    let staged_png = staging.join(format!("{stem}.png"));
    std::fs::write(&staged_html, &html)?;
    tracing::debug!("Staged slate HTML at {}", staged_html.display());

    // Render + convert
    renderer.render(&RenderParams {
        html: staged_html.clone(),
        output: staged_png.clone(),
        width: resolution.width,
        height: resolution.height,
    })?;
    if let Some(parent) = request.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    converter.convert(&ConvertParams {
        input: staged_png.clone(),
        output: request.output.clone(),
        from: config.color.input.clone(),
        to: config.color.output.clone(),
    })?;
    tracing::info!("Slate written to {}", request.output.display());

    Ok(SlateOutcome {
        input: request.input.clone(),
        output: request.output.clone(),
        resolution,
        timecode,
        staged_html,
        staged_png,
    })
}

/// Fill `fps` and `thumbnail` from the config unless the data set has them.
fn seed_data(config: &SlateConfig, data: &mut SlateData) {
    data.set_default(data::FPS, config.timing.fps);
    if let Some(thumbnail) = &config.template.thumbnail {
        data.set_default(data::THUMBNAIL, thumbnail.display().to_string());
    }
}

/// The rate timecodes are counted at: the data set's `fps` when it holds a
/// truthy value, else `timing.fps`.
fn slate_frame_rate(config: &SlateConfig, data: &SlateData) -> Result<FrameRate, SlateError> {
    match data.get(data::FPS).filter(|fps| fps.is_truthy()) {
        Some(fps) => Ok(fps.to_string().parse::<FrameRate>()?),
        None => Ok(config.timing.frame_rate()?),
    }
}

/// Short hash of an input path, used to keep parallel jobs' staging apart.
pub fn staging_specifier(input: &Path) -> String {
    let digest = Sha256::digest(input.to_string_lossy().as_bytes());
    let hex = format!("{digest:x}");
    format!("_{}", &hex[..8])
}

/// Output path for every input.
///
/// One input writes `output` itself; several inputs treat `output` as a
/// directory and write `<output>/<input stem>_slate.<extension>`.
pub fn plan_outputs(
    inputs: &[PathBuf],
    output: &Path,
    extension: &str,
) -> Vec<(PathBuf, PathBuf)> {
    if let [single] = inputs {
        return vec![(single.clone(), output.to_path_buf())];
    }
    inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "slate".to_string());
            let target = output.join(format!("{stem}_slate.{extension}"));
            (input.clone(), target)
        })
        .collect()
}

/// Render one slate per input, in parallel, with the tool-backed collaborators.
pub fn render_all(
    config: &SlateConfig,
    base: &SlateData,
    inputs: &[PathBuf],
    output: &Path,
    options: &BatchOptions,
) -> Result<Vec<SlateOutcome>, SlateError> {
    let probe = ToolProbe::from_config(&config.tools);
    let renderer = BrowserRenderer::from_config(&config.tools);
    let converter = OiioConverter::from_config(&config.tools, &config.color);
    render_all_with(
        &probe, &renderer, &converter, config, base, inputs, output, options,
    )
}

/// Render one slate per input with explicit collaborators.
///
/// Without inputs a single template-only slate is written to `output`.
/// The first failing job aborts the batch.
#[allow(clippy::too_many_arguments)]
pub fn render_all_with(
    probe: &impl MediaProbe,
    renderer: &impl SlateRenderer,
    converter: &impl ColorConverter,
    config: &SlateConfig,
    base: &SlateData,
    inputs: &[PathBuf],
    output: &Path,
    options: &BatchOptions,
) -> Result<Vec<SlateOutcome>, SlateError> {
    if inputs.is_empty() {
        let request = SlateRequest {
            resolution: options.resolution,
            process_optionals: options.process_optionals,
            ..SlateRequest::new(None, output)
        };
        let mut data = base.clone();
        return Ok(vec![create_slate_with(
            probe, renderer, converter, config, &mut data, &request,
        )?]);
    }

    let jobs: Vec<SlateRequest> = plan_outputs(inputs, output, &options.extension)
        .into_iter()
        .map(|(input, target)| SlateRequest {
            specifier: staging_specifier(&input),
            resolution: options.resolution,
            process_optionals: options.process_optionals,
            ..SlateRequest::new(Some(input), target)
        })
        .collect();

    let threads = config::effective_threads(&config.processing);
    tracing::info!("Rendering {} slate(s) on {threads} thread(s)", jobs.len());
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    pool.install(|| {
        jobs.par_iter()
            .map(|request| {
                let mut data = base.clone();
                create_slate_with(probe, renderer, converter, config, &mut data, request).map_err(
                    |e| SlateError::Job {
                        input: request.input.clone().unwrap_or_default(),
                        source: Box::new(e),
                    },
                )
            })
            .collect()
    })
}
