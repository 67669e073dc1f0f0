//! Run configuration for the Parker spiral overlay pipeline.
//!
//! A run is described by one TOML (or YAML) document: model constants, the time
//! window, the output image, render options, data-service settings, and the
//! spacecraft and measurement series to overlay.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parker_core::samples::TimeRange;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid timestamp `{value}`: {reason}")]
    Timestamp { value: String, reason: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete description of one run.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub current_sheet: CurrentSheetConfig,
    pub time_range: TimeRangeConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub spacecraft: Vec<SpacecraftConfig>,
    #[serde(default)]
    pub measurements: Vec<MeasurementConfig>,
}

/// Parker spiral constants.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub solar_wind_speed_km_s: f64,
    /// Takes precedence over `rotation_period_days` when set.
    pub rotation_rate_rad_s: Option<f64>,
    pub rotation_period_days: f64,
    pub reference_radius_au: f64,
    pub r_min_au: f64,
    pub r_max_au: f64,
    pub radial_samples: usize,
    pub start_longitude_deg: f64,
    pub end_longitude_deg: f64,
    pub arms: usize,
    pub latitude_deg: f64,
    pub reference_field_nt: f64,
    pub polarity: PolarityConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            solar_wind_speed_km_s: 400.0,
            rotation_rate_rad_s: None,
            rotation_period_days: 25.4,
            reference_radius_au: 0.1,
            r_min_au: 0.1,
            r_max_au: 1.5,
            radial_samples: 200,
            start_longitude_deg: 0.0,
            end_longitude_deg: 360.0,
            arms: 4,
            latitude_deg: 0.0,
            reference_field_nt: 350.0,
            polarity: PolarityConfig::Outward,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolarityConfig {
    #[default]
    Outward,
    Inward,
}

/// Warped heliospheric current sheet overlay.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CurrentSheetConfig {
    pub enabled: bool,
    pub tilt_deg: f64,
    pub amplitude_deg: f64,
    pub radial_nodes: usize,
    pub azimuth_nodes: usize,
}

impl Default for CurrentSheetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tilt_deg: 10.0,
            amplitude_deg: 15.0,
            radial_nodes: 40,
            azimuth_nodes: 60,
        }
    }
}

/// RFC 3339 window shared by every fetch.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TimeRangeConfig {
    pub start: String,
    pub stop: String,
}

impl TimeRangeConfig {
    pub fn resolve(&self) -> Result<TimeRange, ConfigError> {
        let start = parse_timestamp(&self.start)?;
        let stop = parse_timestamp(&self.stop)?;
        TimeRange::new(start, stop).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "time_range.start ({start}) must precede time_range.stop ({stop})"
            ))
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| ConfigError::Timestamp {
            value: value.to_string(),
            reason: err.to_string(),
        })
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("artifacts/parker_spiral.png"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub title: Option<String>,
    pub width: u32,
    pub height: u32,
    pub yaw: f64,
    pub pitch: f64,
    pub scale: f64,
    pub annotations: bool,
    pub field_ticks: bool,
    /// Multiple of the median sample cadence that counts as a data gap.
    pub gap_factor: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: None,
            width: 1200,
            height: 1000,
            yaw: 0.7,
            pitch: 0.45,
            scale: 0.9,
            annotations: true,
            field_ticks: true,
            gap_factor: 1.5,
        }
    }
}

/// Data-service endpoints and the adapters' retry policy.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    pub horizons_url: String,
    pub cdaweb_url: String,
    pub timeout_secs: u64,
    pub retries: u32,
    /// Horizons table step, e.g. `30m` or `1h`.
    pub horizons_step: String,
    /// Where Earth's position for Earth-referenced frames comes from.
    pub earth: EarthSource,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            horizons_url: "https://ssd.jpl.nasa.gov/api/horizons.api".to_string(),
            cdaweb_url: "https://cdaweb.gsfc.nasa.gov/WS/cdasr/1".to_string(),
            timeout_secs: 60,
            retries: 2,
            horizons_step: "30m".to_string(),
            earth: EarthSource::Analytic,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EarthSource {
    /// Low-precision analytic solar position.
    #[default]
    Analytic,
    /// Earth vectors fetched from Horizons over the run window.
    Horizons,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Horizons,
    Cdaweb,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicyConfig {
    #[default]
    Break,
    Interpolate,
}

/// One spacecraft trajectory to overlay.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SpacecraftConfig {
    pub name: String,
    pub source: SourceKind,
    /// Horizons target id (`-96`) or CDAWeb `DATASET/variable`.
    pub target: String,
    /// Horizons: `ecliptic` or `equatorial`. CDAWeb: frame of the stored variable
    /// when its name does not say.
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub gap_policy: GapPolicyConfig,
}

/// Field measurements drawn as markers along a spacecraft's trajectory.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MeasurementConfig {
    pub label: String,
    pub spacecraft: String,
    pub dataset: String,
    pub variable: String,
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default = "default_tolerance_s")]
    pub tolerance_s: f64,
    #[serde(default = "default_max_markers")]
    pub max_markers: usize,
}

fn default_tolerance_s() -> f64 {
    600.0
}

fn default_max_markers() -> usize {
    12
}

impl PipelineConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that serde cannot express.
    ///
    /// Model constants are checked by the model itself so its error carries the
    /// physical reason.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.time_range.resolve()?;
        if self.sources.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sources.timeout_secs must be positive".to_string(),
            ));
        }
        if !(self.render.gap_factor.is_finite() && self.render.gap_factor >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "render.gap_factor must be at least 1 (got {})",
                self.render.gap_factor
            )));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output.path is empty".to_string()));
        }

        let mut names = HashSet::new();
        for craft in &self.spacecraft {
            if craft.name.trim().is_empty() {
                return Err(ConfigError::Invalid("spacecraft name is empty".to_string()));
            }
            if !names.insert(craft.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "spacecraft `{}` is listed twice",
                    craft.name
                )));
            }
            if craft.target.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "spacecraft `{}` has no target",
                    craft.name
                )));
            }
            if craft.source == SourceKind::Cdaweb && !craft.target.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "spacecraft `{}`: CDAWeb targets are `DATASET/variable`",
                    craft.name
                )));
            }
        }
        for measurement in &self.measurements {
            if !names.contains(measurement.spacecraft.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "measurement `{}` refers to unknown spacecraft `{}`",
                    measurement.label, measurement.spacecraft
                )));
            }
            if !(measurement.tolerance_s.is_finite() && measurement.tolerance_s >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "measurement `{}` tolerance must be non-negative",
                    measurement.label
                )));
            }
        }
        Ok(())
    }
}

/// Load and validate a run configuration; `.toml` files are TOML, anything else YAML.
pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let config: PipelineConfig = if path.extension().map(|ext| ext == "toml").unwrap_or(false) {
        toml::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };
    config.validate()?;
    Ok(config)
}
