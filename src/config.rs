//! Slate configuration.
//!
//! Handles loading, validating, and merging `slate.toml`. Every key is
//! optional: a user file is merged on top of the stock defaults, so it only
//! needs the values it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! [template]
//! path = "templates/generic_slate/generic_slate.html"
//! resources = "templates/generic_slate/resources"  # defaults to the template dir
//! thumbnail = "templates/generic_slate/resources/thumbnail_placeholder.jpg"
//!
//! [timing]
//! fps = 24.0            # 23.976 is read as 24000/1001
//! start_frame = 1001    # default timecode when no probe reports one
//! offset_frames = 0     # shift applied to the resolved timecode
//!
//! [resolution]
//! width = 1920          # used when nothing was probed
//! height = 1080
//!
//! [probe]
//! frame_metadata = true # run iinfo before ffprobe
//!
//! [color]
//! input = "sRGB"        # colorspace of the rendered HTML
//! output = "ACEScg"     # colorspace of the delivered slate
//! input_args = []       # extra oiiotool args before -i
//! output_args = []      # extra oiiotool args before -o
//!
//! [staging]
//! dir = "/tmp"          # defaults to the OS temp dir
//! subfolder = ""
//! name = "slate_staged"
//!
//! [tools]
//! search_paths = ["vendor/oiio/bin", "vendor/ffmpeg/bin"]
//! iinfo = "iinfo"
//! ffprobe = "ffprobe"
//! oiiotool = "oiiotool"
//! browser = "chromium"
//!
//! [processing]
//! max_jobs = 4          # parallel slates (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::timecode::FrameRate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Slate configuration loaded from `slate.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlateConfig {
    /// Template location and default resources.
    pub template: TemplateConfig,
    /// Frame rate and default timecode.
    pub timing: TimingConfig,
    /// Fallback raster size.
    pub resolution: ResolutionConfig,
    /// Which metadata probes run.
    pub probe: ProbeConfig,
    /// Colorspace conversion of the rendered slate.
    pub color: ColorConfig,
    /// Where intermediate files are written.
    pub staging: StagingConfig,
    /// External executables and where to find them.
    pub tools: ToolsConfig,
    /// Parallel job settings.
    pub processing: ProcessingConfig,
}

impl SlateConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.frame_rate()?;
        if self.timing.start_frame < 0 {
            return Err(ConfigError::Validation(
                "timing.start_frame must not be negative".into(),
            ));
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(ConfigError::Validation(
                "resolution.width and resolution.height must be non-zero".into(),
            ));
        }
        if self.staging.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "staging.name must not be empty".into(),
            ));
        }
        if self.color.input.trim().is_empty() || self.color.output.trim().is_empty() {
            return Err(ConfigError::Validation(
                "color.input and color.output must not be empty".into(),
            ));
        }
        for (key, value) in [
            ("iinfo", &self.tools.iinfo),
            ("ffprobe", &self.tools.ffprobe),
            ("oiiotool", &self.tools.oiiotool),
            ("browser", &self.tools.browser),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "tools.{key} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Template location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
    /// HTML template file. Empty means "not configured".
    pub path: PathBuf,
    /// Directory relative asset references are rebased into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<PathBuf>,
    /// Image used for the `thumbnail` field when the data set has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
}

impl TemplateConfig {
    /// The resources directory, falling back to the template's own directory.
    pub fn resources_dir(&self) -> PathBuf {
        match &self.resources {
            Some(dir) => dir.clone(),
            None => self
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}

/// Frame rate and default timecode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Frames per second; decimals like `23.976` are read as NTSC ratios.
    pub fps: f64,
    /// Frame the default timecode is built from.
    pub start_frame: i64,
    /// Frames added to the resolved timecode (`-1` puts the slate one frame
    /// ahead of the first image).
    pub offset_frames: i64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fps: 24.0,
            start_frame: 1001,
            offset_frames: 0,
        }
    }
}

impl TimingConfig {
    pub fn frame_rate(&self) -> Result<FrameRate, ConfigError> {
        FrameRate::from_float(self.fps)
            .map_err(|e| ConfigError::Validation(format!("timing.fps: {e}")))
    }
}

/// Fallback raster size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Probe selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Run the per-frame metadata probe (`iinfo`). Disable for movie
    /// containers OpenImageIO cannot open.
    pub frame_metadata: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            frame_metadata: true,
        }
    }
}

/// Colorspace conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    /// Colorspace the browser renders in (sRGB or Rec.709).
    pub input: String,
    /// Colorspace of the delivered slate.
    pub output: String,
    /// Extra `oiiotool` arguments placed before `-i`.
    pub input_args: Vec<String>,
    /// Extra `oiiotool` arguments placed before `-o`.
    pub output_args: Vec<String>,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            input: "sRGB".to_string(),
            output: "ACEScg".to_string(),
            input_args: Vec::new(),
            output_args: Vec::new(),
        }
    }
}

/// Staging of intermediate files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagingConfig {
    /// Staging root. When absent the OS temp dir is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Appended to the staging root when non-empty.
    pub subfolder: String,
    /// Base name of staged files.
    pub name: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            subfolder: String::new(),
            name: "slate_staged".to_string(),
        }
    }
}

impl StagingConfig {
    /// Resolve the staging directory (root + optional subfolder).
    pub fn staging_dir(&self) -> PathBuf {
        let root = self.dir.clone().unwrap_or_else(std::env::temp_dir);
        if self.subfolder.is_empty() {
            root
        } else {
            root.join(&self.subfolder)
        }
    }
}

/// External executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    /// Directories searched before the inherited `PATH`.
    pub search_paths: Vec<PathBuf>,
    pub iinfo: String,
    pub ffprobe: String,
    pub oiiotool: String,
    /// Chromium-family browser used in headless mode.
    pub browser: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            iinfo: "iinfo".to_string(),
            ffprobe: "ffprobe".to_string(),
            oiiotool: "oiiotool".to_string(),
            browser: "chromium".to_string(),
        }
    }
}

/// Parallel job settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of slates rendered in parallel.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_jobs: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_jobs
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SlateConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<SlateConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SlateConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file, or the stock defaults when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<SlateConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    let config = resolve_config(overlay)?;
    tracing::debug!("Config: {config:?}");
    Ok(config)
}

/// Returns a fully-commented stock `slate.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# slate-gen configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Template
# ---------------------------------------------------------------------------
[template]
# HTML template. Relative src="..." and href="..." references are rebased
# into the resources directory; {placeholders} are filled from slate data.
path = ""

# Directory holding the template's images, fonts and stylesheets.
# Defaults to the directory of the template.
# resources = "templates/generic_slate/resources"

# Image used for the {thumbnail} field when the data set does not set one.
# thumbnail = "templates/generic_slate/resources/thumbnail_placeholder.jpg"

# ---------------------------------------------------------------------------
# Timing
# ---------------------------------------------------------------------------
[timing]
# Frames per second. 23.976, 29.97 and 59.94 are read as NTSC ratios.
fps = 24.0

# Frame used to build the timecode when no probe reports one.
start_frame = 1001

# Frames added to the resolved timecode. Use -1 to place the slate one
# frame before the first frame of the media.
offset_frames = 0

# ---------------------------------------------------------------------------
# Fallback resolution (used when nothing was probed)
# ---------------------------------------------------------------------------
[resolution]
width = 1920
height = 1080

# ---------------------------------------------------------------------------
# Metadata probes
# ---------------------------------------------------------------------------
[probe]
# Read per-frame metadata with iinfo before asking ffprobe.
# Disable for movie containers OpenImageIO cannot open.
frame_metadata = true

# ---------------------------------------------------------------------------
# Colorspace conversion (oiiotool --colorconvert)
# ---------------------------------------------------------------------------
[color]
input = "sRGB"
output = "ACEScg"
input_args = []
output_args = []

# ---------------------------------------------------------------------------
# Staging of intermediate files
# ---------------------------------------------------------------------------
[staging]
# dir = "/tmp"
subfolder = ""
name = "slate_staged"

# ---------------------------------------------------------------------------
# External tools
# ---------------------------------------------------------------------------
[tools]
# Directories searched before PATH, e.g. vendored OIIO and FFmpeg builds.
search_paths = []
iinfo = "iinfo"
ffprobe = "ffprobe"
oiiotool = "oiiotool"
browser = "chromium"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum slates rendered in parallel.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_jobs = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = SlateConfig::default();
        assert_eq!(config.timing.fps, 24.0);
        assert_eq!(config.timing.start_frame, 1001);
        assert_eq!(config.timing.offset_frames, 0);
        assert_eq!(config.resolution.width, 1920);
        assert_eq!(config.resolution.height, 1080);
        assert!(config.probe.frame_metadata);
        assert_eq!(config.color.input, "sRGB");
        assert_eq!(config.staging.name, "slate_staged");
        assert_eq!(config.tools.ffprobe, "ffprobe");
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(SlateConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[timing]
fps = 25

[color]
output = "ACES2065-1"
"#;
        let config: SlateConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.timing.fps, 25.0);
        assert_eq!(config.color.output, "ACES2065-1");
        // Unspecified values keep their defaults
        assert_eq!(config.timing.start_frame, 1001);
        assert_eq!(config.color.input, "sRGB");
    }

    #[test]
    fn resources_dir_defaults_to_template_dir() {
        let template = TemplateConfig {
            path: PathBuf::from("/slates/generic/generic_slate.html"),
            ..Default::default()
        };
        assert_eq!(template.resources_dir(), PathBuf::from("/slates/generic"));

        let template = TemplateConfig {
            path: PathBuf::from("/slates/generic/generic_slate.html"),
            resources: Some(PathBuf::from("/slates/shared")),
            thumbnail: None,
        };
        assert_eq!(template.resources_dir(), PathBuf::from("/slates/shared"));
    }

    #[test]
    fn staging_dir_appends_subfolder() {
        let staging = StagingConfig {
            dir: Some(PathBuf::from("/stage")),
            subfolder: "shot_010".to_string(),
            name: "slate_staged".to_string(),
        };
        assert_eq!(staging.staging_dir(), PathBuf::from("/stage/shot_010"));

        let staging = StagingConfig {
            subfolder: String::new(),
            ..staging
        };
        assert_eq!(staging.staging_dir(), PathBuf::from("/stage"));
    }

    #[test]
    fn staging_dir_defaults_to_temp() {
        assert_eq!(StagingConfig::default().staging_dir(), std::env::temp_dir());
    }

    #[test]
    fn ntsc_fps_becomes_ratio() {
        let timing = TimingConfig {
            fps: 23.976,
            ..Default::default()
        };
        assert_eq!(
            timing.frame_rate().unwrap(),
            FrameRate::new(24000, 1001).unwrap()
        );
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_config_returns_default_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config.resolution.width, 1920);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("slate.toml");
        fs::write(
            &path,
            r#"
[template]
path = "/slates/generic.html"

[resolution]
width = 4096
height = 2160

[tools]
search_paths = ["/opt/oiio/bin"]
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.template.path, PathBuf::from("/slates/generic.html"));
        assert_eq!(config.resolution.width, 4096);
        assert_eq!(config.tools.search_paths, vec![PathBuf::from("/opt/oiio/bin")]);
        // Untouched sections keep defaults
        assert_eq!(config.timing.start_frame, 1001);
        assert_eq!(config.tools.iinfo, "iinfo");
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("slate.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn unknown_key_rejected() {
        let overlay: toml::Value = toml::from_str("[timing]\nframerate = 25").unwrap();
        assert!(resolve_config(Some(overlay)).is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let overlay: toml::Value = toml::from_str("[render]\nengine = \"x\"").unwrap();
        assert!(resolve_config(Some(overlay)).is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_zero_fps() {
        let mut config = SlateConfig::default();
        config.timing.fps = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_rejects_negative_start_frame() {
        let mut config = SlateConfig::default();
        config.timing.start_frame = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_resolution() {
        let mut config = SlateConfig::default();
        config.resolution.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_tool() {
        let mut config = SlateConfig::default();
        config.tools.oiiotool = " ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tools.oiiotool"));
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str("[staging]\nname = \"\"").unwrap();
        assert!(matches!(
            resolve_config(Some(overlay)),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_nested_tables() {
        let base: toml::Value =
            toml::from_str("[color]\ninput = \"sRGB\"\noutput = \"ACEScg\"").unwrap();
        let overlay: toml::Value = toml::from_str("[color]\noutput = \"Rec.709\"").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["color"]["input"].as_str(), Some("sRGB"));
        assert_eq!(merged["color"]["output"].as_str(), Some("Rec.709"));
    }

    // =========================================================================
    // Processing
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped() {
        let config = ProcessingConfig {
            max_jobs: Some(100_000),
        };
        assert!(effective_threads(&config) <= 100_000);
        let config = ProcessingConfig { max_jobs: Some(0) };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_matches_defaults() {
        let parsed: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(Some(parsed)).unwrap();
        let defaults = SlateConfig::default();
        assert_eq!(config.timing.fps, defaults.timing.fps);
        assert_eq!(config.timing.start_frame, defaults.timing.start_frame);
        assert_eq!(config.resolution.width, defaults.resolution.width);
        assert_eq!(config.color.output, defaults.color.output);
        assert_eq!(config.staging.name, defaults.staging.name);
        assert_eq!(config.tools.browser, defaults.tools.browser);
        assert_eq!(config.processing.max_jobs, None);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        let table = value.as_table().unwrap();
        for section in [
            "template",
            "timing",
            "resolution",
            "probe",
            "color",
            "staging",
            "tools",
            "processing",
        ] {
            assert!(table.contains_key(section), "missing section {section}");
        }
    }
}
