//! End-to-end run: model, fetch, reconcile, compose, render.
//!
//! Model and configuration problems abort the run before any data is fetched.
//! A spacecraft or measurement series whose fetch, reconciliation, or composition
//! fails is dropped from the scene and listed in the [`RunReport`]; the spiral and
//! the remaining series still render.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use parker_config::{
    ConfigError, EarthSource, GapPolicyConfig, MeasurementConfig, ModelConfig, PipelineConfig,
    PolarityConfig, SourceKind, SpacecraftConfig,
};
use parker_core::samples::{Frame, TimeRange};
use parker_core::time::offset_seconds;
use parker_frames::{AnalyticEarth, EarthEphemeris, ReconcileError, Reconciler, SampledEarth};
use parker_model::{
    CurrentSheetParameters, CurrentSheetSurface, ModelError, ModelParameters, ParkerSpiral,
    Polarity, rotation_rate_from_period_days,
};
use parker_render::{RenderError, RenderSettings, render_scene};
use parker_scene::{ComposeError, GapPolicy, Landmark, MarkerOptions, SceneBuilder, measurement_markers};
use parker_sources::{
    CdawebClient, DatasetRequest, EphemerisSource, FrameRequest, HorizonsClient, MissionDataSource,
    SourceError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Horizons id of Earth.
const EARTH_TARGET: &str = "399";
/// Padding around the run window when sampling Earth, so sample epochs at the
/// window edges stay inside the interpolation span.
const EARTH_PADDING_HOURS: i64 = 2;

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Model,
    Fetch,
    Reconcile,
    Compose,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Model => "model",
            Stage::Fetch => "fetch",
            Stage::Reconcile => "reconcile",
            Stage::Compose => "compose",
            Stage::Render => "render",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config stage: {0}")]
    Config(#[from] ConfigError),
    #[error("model stage: {0}")]
    Model(#[from] ModelError),
    #[error("fetch stage, source `{source_name}`: {error}")]
    Fetch {
        source_name: String,
        #[source]
        error: SourceError,
    },
    #[error("reconcile stage, source `{source_name}`: {error}")]
    Reconcile {
        source_name: String,
        #[source]
        error: ReconcileError,
    },
    #[error("compose stage, source `{source_name}`: {error}")]
    Compose {
        source_name: String,
        #[source]
        error: ComposeError,
    },
    #[error("render stage: {0}")]
    Render(#[from] RenderError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config(_) => Stage::Config,
            Self::Model(_) => Stage::Model,
            Self::Fetch { .. } => Stage::Fetch,
            Self::Reconcile { .. } => Stage::Reconcile,
            Self::Compose { .. } => Stage::Compose,
            Self::Render(_) => Stage::Render,
        }
    }
}

/// A series left out of the scene.
#[derive(Debug)]
pub struct DroppedSource {
    pub name: String,
    pub error: PipelineError,
}

/// Outcome of a run that produced an image.
#[derive(Debug)]
pub struct RunReport {
    pub output: PathBuf,
    /// Trajectory names in legend order.
    pub trajectories: Vec<String>,
    pub markers: usize,
    pub dropped: Vec<DroppedSource>,
}

impl RunReport {
    /// True when at least one configured series is missing from the image.
    pub fn is_partial(&self) -> bool {
        !self.dropped.is_empty()
    }
}

/// Data sources used by one run, one per service.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub horizons: &'a dyn EphemerisSource,
    pub cdaweb: &'a dyn EphemerisSource,
    pub measurements: &'a dyn MissionDataSource,
}

/// Network clients built from the `[sources]` section.
pub struct LiveSources {
    horizons: HorizonsClient,
    cdaweb: CdawebClient,
}

impl LiveSources {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let settings = &config.sources;
        let timeout = Duration::from_secs(settings.timeout_secs);
        let horizons = HorizonsClient::new(
            settings.horizons_url.clone(),
            settings.horizons_step.clone(),
            timeout,
            settings.retries,
        )
        .map_err(|error| PipelineError::Fetch {
            source_name: "horizons".to_string(),
            error,
        })?;
        let cdaweb = CdawebClient::new(settings.cdaweb_url.clone(), timeout, settings.retries)
            .map_err(|error| PipelineError::Fetch {
                source_name: "cdaweb".to_string(),
                error,
            })?;
        Ok(Self { horizons, cdaweb })
    }

    pub fn sources(&self) -> Sources<'_> {
        Sources {
            horizons: &self.horizons,
            cdaweb: &self.cdaweb,
            measurements: &self.cdaweb,
        }
    }
}

/// Run against the live services named in the configuration.
pub fn run(config: &PipelineConfig) -> Result<RunReport, PipelineError> {
    let live = LiveSources::from_config(config)?;
    run_with_sources(config, live.sources())
}

/// Run against caller-supplied sources.
pub fn run_with_sources(
    config: &PipelineConfig,
    sources: Sources<'_>,
) -> Result<RunReport, PipelineError> {
    config.validate()?;
    let range = config.time_range.resolve()?;
    let requests = config
        .spacecraft
        .iter()
        .map(frame_request)
        .collect::<Result<Vec<_>, _>>()?;

    let model = ParkerSpiral::new(model_parameters(&config.model))?;
    let curve = model.evaluate();
    info!(
        arms = curve.arms.len(),
        points = curve.len(),
        "model evaluated"
    );

    let mut builder = SceneBuilder::new(curve);
    builder
        .title(scene_title(config, &range))
        .gap_factor(config.render.gap_factor);
    if config.current_sheet.enabled {
        let sheet = CurrentSheetSurface::compute(&model, &current_sheet_parameters(config))?;
        builder.with_current_sheet(sheet);
    }

    let mut dropped = Vec::new();
    let earth = earth_context(config, &range, sources, &mut dropped);
    let reconciler = Reconciler::new(earth.as_ref());

    builder.add_landmark(Landmark::sun());
    let mid_window = offset_seconds(&range.start, 0.5 * (range.stop - range.start).num_seconds() as f64);
    match earth.earth_position_au(&mid_window) {
        Ok(position) => {
            builder.add_landmark(Landmark::earth(position));
        }
        Err(err) => warn!(error = %err, "Earth landmark unavailable"),
    }

    for (craft, request) in config.spacecraft.iter().zip(&requests) {
        let source: &dyn EphemerisSource = match craft.source {
            SourceKind::Horizons => sources.horizons,
            SourceKind::Cdaweb => sources.cdaweb,
        };
        match add_spacecraft(&mut builder, craft, request, source, &reconciler, &range) {
            Ok(points) => info!(spacecraft = %craft.name, points, "trajectory added"),
            Err(error) => {
                warn!(spacecraft = %craft.name, stage = %error.stage(), error = %error, "dropping spacecraft");
                dropped.push(DroppedSource {
                    name: craft.name.clone(),
                    error,
                });
            }
        }
    }

    let mut markers = 0;
    for measurement in &config.measurements {
        match add_measurements(&mut builder, measurement, sources.measurements, &model, &range) {
            Ok(count) => {
                markers += count;
                info!(label = %measurement.label, markers = count, "measurement markers added");
            }
            Err(error) => {
                warn!(label = %measurement.label, stage = %error.stage(), error = %error, "dropping measurements");
                dropped.push(DroppedSource {
                    name: measurement.label.clone(),
                    error,
                });
            }
        }
    }

    let scene = builder.build();
    let settings = render_settings(config);
    render_scene(&scene, &config.output.path, &settings)?;

    Ok(RunReport {
        output: config.output.path.clone(),
        trajectories: scene.trajectories.iter().map(|t| t.name.clone()).collect(),
        markers,
        dropped,
    })
}

fn add_spacecraft(
    builder: &mut SceneBuilder,
    craft: &SpacecraftConfig,
    request: &FrameRequest,
    source: &dyn EphemerisSource,
    reconciler: &Reconciler<'_>,
    range: &TimeRange,
) -> Result<usize, PipelineError> {
    let samples = source
        .fetch(range, &craft.target, request)
        .map_err(|error| PipelineError::Fetch {
            source_name: craft.name.clone(),
            error,
        })?;
    debug!(spacecraft = %craft.name, samples = samples.len(), "fetched ephemeris");
    let points = reconciler
        .reconcile_series(&samples)
        .map_err(|error| PipelineError::Reconcile {
            source_name: craft.name.clone(),
            error,
        })?;
    let count = points.len();
    let policy = match craft.gap_policy {
        GapPolicyConfig::Break => GapPolicy::Break,
        GapPolicyConfig::Interpolate => GapPolicy::Interpolate,
    };
    builder
        .add_trajectory(&craft.name, points, policy)
        .map_err(|error| PipelineError::Compose {
            source_name: craft.name.clone(),
            error,
        })?;
    Ok(count)
}

fn add_measurements(
    builder: &mut SceneBuilder,
    measurement: &MeasurementConfig,
    source: &dyn MissionDataSource,
    model: &ParkerSpiral,
    range: &TimeRange,
) -> Result<usize, PipelineError> {
    let compose_error = |error| PipelineError::Compose {
        source_name: measurement.label.clone(),
        error,
    };
    let Some(trajectory) = builder.trajectory(&measurement.spacecraft) else {
        return Err(compose_error(ComposeError::EmptyTrajectory {
            name: measurement.spacecraft.clone(),
        }));
    };
    let request = DatasetRequest {
        frame: measurement.frame.as_deref().map(Frame::from_name),
        ..DatasetRequest::new(measurement.dataset.as_str(), measurement.variable.as_str())
    };
    let samples = source
        .fetch(range, &request)
        .map_err(|error| PipelineError::Fetch {
            source_name: measurement.label.clone(),
            error,
        })?;
    let options = MarkerOptions {
        tolerance_s: measurement.tolerance_s,
        max_markers: measurement.max_markers,
    };
    let markers = measurement_markers(&measurement.label, &samples, trajectory, model, &options)
        .map_err(compose_error)?;
    let count = markers.len();
    for marker in markers {
        builder.add_marker(marker);
    }
    Ok(count)
}

/// Earth context for Earth-referenced frames. A failed Horizons fetch falls back
/// to the analytic position and is reported as dropped.
fn earth_context(
    config: &PipelineConfig,
    range: &TimeRange,
    sources: Sources<'_>,
    dropped: &mut Vec<DroppedSource>,
) -> Box<dyn EarthEphemeris> {
    if config.sources.earth == EarthSource::Analytic {
        return Box::new(AnalyticEarth);
    }
    let padding = ChronoDuration::hours(EARTH_PADDING_HOURS);
    let padded = TimeRange::new(range.start - padding, range.stop + padding).unwrap_or(*range);
    let fetched = sources
        .horizons
        .fetch(&padded, EARTH_TARGET, &FrameRequest::HeliocentricEcliptic)
        .map_err(|error| PipelineError::Fetch {
            source_name: "Earth".to_string(),
            error,
        })
        .and_then(|samples| {
            Reconciler::heliocentric_only()
                .reconcile_series(&samples)
                .map_err(|error| PipelineError::Reconcile {
                    source_name: "Earth".to_string(),
                    error,
                })
        });
    match fetched {
        Ok(points) => {
            debug!(samples = points.len(), "sampled Earth ephemeris");
            Box::new(SampledEarth::new(&points))
        }
        Err(error) => {
            warn!(error = %error, "Earth ephemeris unavailable, using analytic position");
            dropped.push(DroppedSource {
                name: "Earth".to_string(),
                error,
            });
            Box::new(AnalyticEarth)
        }
    }
}

fn frame_request(craft: &SpacecraftConfig) -> Result<FrameRequest, ConfigError> {
    let frame = craft.frame.as_deref().map(str::trim);
    match craft.source {
        SourceKind::Horizons => match frame.map(str::to_ascii_lowercase).as_deref() {
            None | Some("ecliptic") => Ok(FrameRequest::HeliocentricEcliptic),
            Some("equatorial") => Ok(FrameRequest::HeliocentricEquatorial),
            Some(other) => Err(ConfigError::Invalid(format!(
                "spacecraft `{}`: Horizons frame must be `ecliptic` or `equatorial` (got `{other}`)",
                craft.name
            ))),
        },
        SourceKind::Cdaweb => Ok(FrameRequest::Native(frame.map(Frame::from_name))),
    }
}

pub fn model_parameters(model: &ModelConfig) -> ModelParameters {
    ModelParameters {
        solar_wind_speed_km_s: model.solar_wind_speed_km_s,
        rotation_rate_rad_s: model
            .rotation_rate_rad_s
            .unwrap_or_else(|| rotation_rate_from_period_days(model.rotation_period_days)),
        reference_radius_au: model.reference_radius_au,
        r_min_au: model.r_min_au,
        r_max_au: model.r_max_au,
        radial_samples: model.radial_samples,
        start_longitude_deg: model.start_longitude_deg,
        end_longitude_deg: model.end_longitude_deg,
        arms: model.arms,
        latitude_deg: model.latitude_deg,
        reference_field_nt: model.reference_field_nt,
        polarity: match model.polarity {
            PolarityConfig::Outward => Polarity::Outward,
            PolarityConfig::Inward => Polarity::Inward,
        },
    }
}

fn current_sheet_parameters(config: &PipelineConfig) -> CurrentSheetParameters {
    let sheet = &config.current_sheet;
    CurrentSheetParameters {
        tilt_deg: sheet.tilt_deg,
        amplitude_deg: sheet.amplitude_deg,
        radial_nodes: sheet.radial_nodes,
        azimuth_nodes: sheet.azimuth_nodes,
    }
}

fn render_settings(config: &PipelineConfig) -> RenderSettings {
    let render = &config.render;
    RenderSettings {
        width: render.width,
        height: render.height,
        yaw: render.yaw,
        pitch: render.pitch,
        scale: render.scale,
        annotations: render.annotations,
        field_ticks: render.field_ticks,
    }
}

fn scene_title(config: &PipelineConfig, range: &TimeRange) -> String {
    config.render.title.clone().unwrap_or_else(|| {
        format!(
            "Parker spiral (v = {:.0} km/s), {} to {} UTC",
            config.model.solar_wind_speed_km_s,
            range.start.format("%Y-%m-%d %H:%M"),
            range.stop.format("%Y-%m-%d %H:%M"),
        )
    })
}
