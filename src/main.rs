use clap::{ArgAction, Parser, Subcommand};
use slate_gen::config::{self, SlateConfig};
use slate_gen::data::SlateData;
use slate_gen::media::{self, Resolution, TimingSettings, ToolProbe};
use slate_gen::output;
use slate_gen::slate::{self, BatchOptions};
use slate_gen::template::TemplateCompiler;
use slate_gen::timecode::{self, FrameRate};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "slate.toml";

/// Flags shared by commands that compile a template.
#[derive(clap::Args, Clone)]
struct TemplateArgs {
    /// HTML template (overrides template.path)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Directory the template's assets are rebased into (overrides template.resources)
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Flat JSON object with slate fields
    #[arg(long)]
    data: Option<PathBuf>,

    /// Set a slate field, e.g. --set artist=Ana (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Leave {X_optional} fields to the data set instead of deriving them
    #[arg(long)]
    no_optionals: bool,
}

#[derive(Parser)]
#[command(name = "slate-gen")]
#[command(about = "Generate slate images from HTML templates and clip metadata")]
#[command(long_about = "\
Generate slate images from HTML templates and clip metadata

A slate is rendered in six steps:

  1. resolution   probed from the clip (ffprobe), or --resolution, or config
  2. timecode     container tag > frame metadata (iinfo) > start frame
  3. resolve      comments stripped, src/href rebased into the resources dir
  4. compile      {field} placeholders filled from --data/--set
  5. render       headless browser screenshot at the slate resolution
  6. convert      oiiotool --colorconvert into the output file

Template placeholders:

  {shot}            value of the `shot` field
  {shot_optional}   empty when `shot` is set, style=\"display:None;\" otherwise
  {{ and }}         literal braces (inline CSS)

Run 'slate-gen gen-config' to generate a documented slate.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./slate.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render slates for the given clips (none = template-only slate)
    Render {
        /// Clips or image sequence directories
        inputs: Vec<PathBuf>,

        /// Output file (one input) or directory (several inputs)
        #[arg(short, long)]
        output: PathBuf,

        /// Raster size, e.g. 2048x1152 (skips probing for size)
        #[arg(long, value_parser = parse_resolution)]
        resolution: Option<Resolution>,

        /// Extension of per-input outputs when rendering several inputs
        #[arg(long, default_value = "exr")]
        ext: String,

        #[command(flatten)]
        template: TemplateArgs,
    },
    /// Print the resolution and timecode a slate would show for a clip
    Probe {
        input: PathBuf,

        /// Frame rate (overrides timing.fps)
        #[arg(long)]
        fps: Option<FrameRate>,
    },
    /// Resolve and compile a template without rendering it
    Compile {
        /// Write the HTML here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        template: TemplateArgs,
    },
    /// Convert between timecode, frames and seconds
    Timecode {
        /// Frame rate (overrides timing.fps)
        #[arg(long, global = true)]
        fps: Option<FrameRate>,

        #[command(subcommand)]
        op: TimecodeOp,
    },
    /// Print a stock slate.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum TimecodeOp {
    /// HH:MM:SS:FF to an absolute frame number
    ToFrames { timecode: String },
    /// Frame number to HH:MM:SS:FF
    ToTimecode {
        #[arg(allow_hyphen_values = true)]
        frames: i64,
    },
    /// Frame number to seconds
    ToSeconds { frames: u64 },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Render {
            inputs,
            output: target,
            resolution,
            ext,
            template,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            apply_template_args(&mut config, &template);
            let data = load_data(&template)?;
            let options = BatchOptions {
                resolution,
                process_optionals: !template.no_optionals,
                extension: ext,
            };
            let outcomes = slate::render_all(&config, &data, &inputs, &target, &options)?;
            output::print_render_output(&outcomes);
        }
        Command::Probe { input, fps } => {
            let config = load_config(cli.config.as_deref())?;
            let fps = match fps {
                Some(fps) => fps,
                None => config.timing.frame_rate()?,
            };
            let timing =
                TimingSettings::from_config(&config.timing, fps, config.probe.frame_metadata);
            let probe = ToolProbe::from_config(&config.tools);
            let path = media::first_frame(&input)?;
            let mut data = SlateData::new();
            let resolution = media::extract_resolution(&probe, &path, &mut data)?;
            let tc = media::extract_timecode(&probe, &path, &timing, &mut data)?;
            output::print_probe_report(&input, resolution, &tc, fps);
        }
        Command::Compile {
            output: target,
            template,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            apply_template_args(&mut config, &template);
            if config.template.path.as_os_str().is_empty() {
                return Err(slate_gen::template::TemplateError::NoTemplatePath.into());
            }
            let mut data = load_data(&template)?;
            let mut compiler = TemplateCompiler::new();
            compiler.load(&config.template.path, Some(&config.template.resources_dir()))?;
            let html = compiler.compile(&mut data, !template.no_optionals)?;
            match target {
                Some(path) => {
                    std::fs::write(&path, html)?;
                    println!("==> Wrote {}", path.display());
                }
                None => print!("{}", html),
            }
        }
        Command::Timecode { fps, op } => {
            let fps = match fps {
                Some(fps) => fps,
                None => load_config(cli.config.as_deref())?.timing.frame_rate()?,
            };
            match op {
                TimecodeOp::ToFrames { timecode } => {
                    println!("{}", timecode::timecode_to_frames(&timecode, fps)?);
                }
                TimecodeOp::ToTimecode { frames } => {
                    println!("{}", timecode::frames_to_timecode(frames, fps)?);
                }
                TimecodeOp::ToSeconds { frames } => {
                    println!("{}", timecode::frames_to_seconds(frames, fps));
                }
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "slate_gen=warn",
        1 => "slate_gen=info",
        _ => "slate_gen=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load `--config`, else `./slate.toml` when present, else stock defaults.
fn load_config(path: Option<&Path>) -> Result<SlateConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config(Some(path)),
        None => {
            let local = Path::new(DEFAULT_CONFIG);
            config::load_config(local.exists().then_some(local))
        }
    }
}

fn apply_template_args(config: &mut SlateConfig, args: &TemplateArgs) {
    if let Some(template) = &args.template {
        config.template.path = template.clone();
    }
    if let Some(resources) = &args.resources {
        config.template.resources = Some(resources.clone());
    }
}

/// Data file first, then `--set` assignments on top.
fn load_data(args: &TemplateArgs) -> Result<SlateData, slate_gen::data::DataError> {
    let mut data = match &args.data {
        Some(path) => SlateData::from_json_file(path)?,
        None => SlateData::new(),
    };
    for assignment in &args.set {
        data.assign(assignment)?;
    }
    Ok(data)
}

/// Parse `WIDTHxHEIGHT`.
fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("invalid dimension '{v}' in '{s}'"))
    };
    Ok(Resolution::new(parse(w)?, parse(h)?))
}
