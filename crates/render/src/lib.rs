//! Static 3D rendering of a [`Scene`] to a bitmap.
//!
//! Scene coordinates are heliocentric ecliptic AU. The chart's vertical axis is
//! ecliptic north, so points are handed to plotters as `(x, z, y)`.

use std::fs;
use std::path::Path;

use parker_core::vector::{self, Vector3};
use parker_model::Polarity;
use parker_scene::{Bounds, LandmarkKind, Scene};
use plotters::coord::ranged3d::Cartesian3d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

type Chart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian3d<RangedCoordf64, RangedCoordf64, RangedCoordf64>>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("scene has nothing to draw")]
    EmptyScene,
    #[error("invalid render settings: {0}")]
    InvalidSettings(String),
    #[error("failed to prepare output: {0}")]
    Io(#[from] std::io::Error),
    #[error("drawing failed: {0}")]
    Drawing(String),
}

fn drawing<E: std::fmt::Display>(err: E) -> RenderError {
    RenderError::Drawing(err.to_string())
}

/// Image size, camera, and annotation switches.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    /// Rotation about the vertical axis (rad).
    pub yaw: f64,
    /// Elevation of the camera above the ecliptic (rad).
    pub pitch: f64,
    pub scale: f64,
    /// Caption, axis labels, legend, and marker text. These need a system font.
    pub annotations: bool,
    /// Short field-direction ticks along the spiral arms.
    pub field_ticks: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 1000,
            yaw: 0.7,
            pitch: 0.45,
            scale: 0.9,
            annotations: true,
            field_ticks: true,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width < 100 || self.height < 100 {
            return Err(RenderError::InvalidSettings(format!(
                "image must be at least 100x100 pixels (got {}x{})",
                self.width, self.height
            )));
        }
        if !(self.yaw.is_finite() && self.pitch.is_finite()) {
            return Err(RenderError::InvalidSettings(
                "camera angles must be finite".to_string(),
            ));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(RenderError::InvalidSettings(format!(
                "scale must be positive (got {})",
                self.scale
            )));
        }
        Ok(())
    }
}

const TRAJECTORY_PALETTE: [RGBColor; 5] = [
    RGBColor(230, 120, 20),
    RGBColor(20, 150, 70),
    RGBColor(150, 50, 180),
    RGBColor(0, 140, 190),
    RGBColor(120, 120, 0),
];
const OUTWARD_COLOR: RGBColor = RGBColor(200, 40, 40);
const INWARD_COLOR: RGBColor = RGBColor(40, 80, 200);
const MARKER_COLOR: RGBColor = RGBColor(210, 30, 140);
const SUN_COLOR: RGBColor = RGBColor(250, 200, 20);
const PLANET_COLOR: RGBColor = RGBColor(30, 90, 220);

/// Render `scene` to a PNG at `path`, creating parent directories and
/// overwriting any existing file.
pub fn render_scene(scene: &Scene, path: &Path, settings: &RenderSettings) -> Result<(), RenderError> {
    settings.validate()?;
    let bounds = scene.bounds().ok_or(RenderError::EmptyScene)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let root = BitMapBackend::new(path, (settings.width, settings.height)).into_drawing_area();
    root.fill(&WHITE).map_err(drawing)?;

    let font_family = select_font_family();
    let label_font = FontDesc::new(font_family, 16.0, FontStyle::Normal);

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if settings.annotations {
        builder.caption(&scene.title, FontDesc::new(font_family, 24.0, FontStyle::Bold));
    }
    let mut chart = builder
        .build_cartesian_3d(
            bounds.min[0]..bounds.max[0],
            bounds.min[2]..bounds.max[2],
            bounds.min[1]..bounds.max[1],
        )
        .map_err(drawing)?;
    chart.with_projection(|mut pb| {
        pb.yaw = settings.yaw;
        pb.pitch = settings.pitch;
        pb.scale = settings.scale;
        pb.into_matrix()
    });

    if settings.annotations {
        chart
            .configure_axes()
            .label_style(label_font.clone())
            .light_grid_style(BLACK.mix(0.08))
            .max_light_lines(4)
            .draw()
            .map_err(drawing)?;
    } else {
        draw_box(&mut chart, &bounds)?;
    }

    draw_current_sheet(&mut chart, scene)?;
    draw_spiral(&mut chart, scene, &bounds, settings)?;
    draw_trajectories(&mut chart, scene)?;
    draw_landmarks_and_markers(&mut chart, scene, settings, &label_font)?;

    if settings.annotations {
        chart
            .configure_series_labels()
            .label_font(label_font.clone())
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .map_err(drawing)?;
    }

    root.present().map_err(drawing)?;
    info!(path = %path.display(), trajectories = scene.trajectories.len(), "rendered scene");
    Ok(())
}

/// Scene point to chart coordinates (vertical axis last in the scene, middle in plotters).
fn to_chart(p: &Vector3) -> (f64, f64, f64) {
    (p[0], p[2], p[1])
}

fn draw_box(chart: &mut Chart<'_, '_>, bounds: &Bounds) -> Result<(), RenderError> {
    let corner = |i: usize| -> Vector3 {
        [
            if i & 1 == 0 { bounds.min[0] } else { bounds.max[0] },
            if i & 2 == 0 { bounds.min[1] } else { bounds.max[1] },
            if i & 4 == 0 { bounds.min[2] } else { bounds.max[2] },
        ]
    };
    let style = ShapeStyle::from(&BLACK.mix(0.25)).stroke_width(1);
    let edges = (0..8usize).flat_map(|a| {
        [1usize, 2, 4]
            .into_iter()
            .filter(move |bit| a & bit == 0)
            .map(move |bit| (a, a | bit))
    });
    chart
        .draw_series(edges.map(|(a, b)| {
            PathElement::new(vec![to_chart(&corner(a)), to_chart(&corner(b))], style)
        }))
        .map_err(drawing)?;
    Ok(())
}

fn draw_current_sheet(chart: &mut Chart<'_, '_>, scene: &Scene) -> Result<(), RenderError> {
    let Some(surface) = &scene.current_sheet else {
        return Ok(());
    };
    let Some((lo, hi)) = surface.field_range() else {
        return Ok(());
    };
    // Log scale keeps the inner 1/r² growth from washing out the colours.
    let (log_lo, log_hi) = (lo.ln(), hi.ln());
    let shade = |b: f64| {
        let t = if (log_hi - log_lo).abs() < f64::EPSILON {
            0.0
        } else {
            (b.ln() - log_lo) / (log_hi - log_lo)
        };
        ShapeStyle::from(&jet_color(t).mix(0.35)).stroke_width(1)
    };

    let mut lines = Vec::new();
    for j in 0..surface.azimuth_nodes {
        for i in 0..surface.radial_nodes {
            let Some(node) = surface.node(j, i) else {
                continue;
            };
            for neighbour in [surface.node(j, i + 1), surface.node(j + 1, i)]
                .into_iter()
                .flatten()
            {
                let b = 0.5 * (node.normalized_field + neighbour.normalized_field);
                lines.push(PathElement::new(
                    vec![to_chart(&node.position_au), to_chart(&neighbour.position_au)],
                    shade(b),
                ));
            }
        }
    }
    debug!(edges = lines.len(), "drawing current sheet");
    chart.draw_series(lines).map_err(drawing)?;
    Ok(())
}

fn draw_spiral(
    chart: &mut Chart<'_, '_>,
    scene: &Scene,
    bounds: &Bounds,
    settings: &RenderSettings,
) -> Result<(), RenderError> {
    let params = &scene.spiral.parameters;
    let color = match params.polarity {
        Polarity::Outward => OUTWARD_COLOR,
        Polarity::Inward => INWARD_COLOR,
    };
    let style = ShapeStyle::from(&color).stroke_width(2);
    let label = format!(
        "Parker spiral (v = {:.0} km/s, {})",
        params.solar_wind_speed_km_s,
        match params.polarity {
            Polarity::Outward => "outward",
            Polarity::Inward => "inward",
        }
    );

    for (idx, arm) in scene.spiral.arms.iter().enumerate() {
        let path: Vec<_> = arm.points.iter().map(|p| to_chart(&p.position_au)).collect();
        let anno = chart
            .draw_series(std::iter::once(PathElement::new(path, style)))
            .map_err(drawing)?;
        if idx == 0 {
            anno.label(label.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        }
    }

    if settings.field_ticks {
        let length = 0.04 * bounds.half_width();
        let ticks = scene.spiral.arms.iter().flat_map(|arm| {
            let stride = (arm.points.len() / 8).max(1);
            arm.points.iter().step_by(stride).skip(1).map(move |p| {
                let tip = vector::add(&p.position_au, &vector::scale(&p.direction, length));
                PathElement::new(
                    vec![to_chart(&p.position_au), to_chart(&tip)],
                    ShapeStyle::from(&color.mix(0.6)).stroke_width(1),
                )
            })
        });
        chart.draw_series(ticks).map_err(drawing)?;
    }
    Ok(())
}

fn draw_trajectories(chart: &mut Chart<'_, '_>, scene: &Scene) -> Result<(), RenderError> {
    for (idx, trajectory) in scene.trajectories.iter().enumerate() {
        let color = TRAJECTORY_PALETTE[idx % TRAJECTORY_PALETTE.len()];
        let style = ShapeStyle::from(&color).stroke_width(2);
        // Each segment is its own path so gaps stay visible.
        let paths = trajectory.segments.iter().filter(|s| s.len() > 1).map(|segment| {
            PathElement::new(
                segment
                    .points
                    .iter()
                    .map(|p| to_chart(&p.position_au))
                    .collect::<Vec<_>>(),
                style,
            )
        });
        chart.draw_series(paths).map_err(drawing)?;

        let lone = trajectory
            .segments
            .iter()
            .filter(|s| s.len() == 1)
            .flat_map(|s| s.points.iter())
            .map(|p| Circle::new(to_chart(&p.position_au), 2, color.filled()));
        chart.draw_series(lone).map_err(drawing)?;

        if let Some(last) = trajectory.last_point() {
            chart
                .draw_series(std::iter::once(Circle::new(
                    to_chart(&last.position_au),
                    5,
                    color.filled(),
                )))
                .map_err(drawing)?
                .label(trajectory.name.clone())
                .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
        }
    }
    Ok(())
}

fn draw_landmarks_and_markers(
    chart: &mut Chart<'_, '_>,
    scene: &Scene,
    settings: &RenderSettings,
    label_font: &FontDesc<'_>,
) -> Result<(), RenderError> {
    for landmark in &scene.landmarks {
        let (color, size) = match landmark.kind {
            LandmarkKind::Star => (SUN_COLOR, 10),
            LandmarkKind::Planet => (PLANET_COLOR, 6),
        };
        let at = to_chart(&landmark.position_au);
        chart
            .draw_series(std::iter::once(Circle::new(at, size, color.filled())))
            .map_err(drawing)?;
        if settings.annotations {
            chart
                .draw_series(std::iter::once(Text::new(
                    landmark.name.clone(),
                    at,
                    label_font.clone().color(&BLACK),
                )))
                .map_err(drawing)?;
        }
    }

    chart
        .draw_series(
            scene
                .markers
                .iter()
                .map(|m| Circle::new(to_chart(&m.position_au), 4, MARKER_COLOR.filled())),
        )
        .map_err(drawing)?;
    if settings.annotations {
        chart
            .draw_series(scene.markers.iter().map(|m| {
                Text::new(
                    m.annotation.clone(),
                    to_chart(&m.position_au),
                    label_font.clone().color(&MARKER_COLOR),
                )
            }))
            .map_err(drawing)?;
    }
    Ok(())
}

fn select_font_family() -> FontFamily<'static> {
    if cfg!(target_os = "macos") {
        FontFamily::Name("Helvetica")
    } else if cfg!(target_os = "windows") {
        FontFamily::Name("Arial")
    } else {
        FontFamily::Name("DejaVu Sans")
    }
}

/// Blue-to-red colormap on `[0, 1]`.
pub fn jet_color(t_in: f64) -> RGBColor {
    let t = t_in.clamp(0.0, 1.0);
    let comp = |v: f64| (1.0 - (v - 1.0).abs()).clamp(0.0, 1.0);
    let r = comp(1.5 - 4.0 * (t - 0.75).abs());
    let g = comp(1.5 - 4.0 * (t - 0.5).abs());
    let b = comp(1.5 - 4.0 * (t - 0.25).abs());
    RGBColor((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use parker_frames::ReconciledPoint;
    use parker_model::{CurrentSheetParameters, CurrentSheetSurface, ModelParameters, ParkerSpiral};
    use parker_scene::{GapPolicy, Landmark, Marker, SceneBuilder};

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn quiet() -> RenderSettings {
        RenderSettings {
            width: 320,
            height: 240,
            annotations: false,
            ..RenderSettings::default()
        }
    }

    fn scene() -> Scene {
        let model = ParkerSpiral::new(ModelParameters {
            radial_samples: 40,
            ..ModelParameters::default()
        })
        .unwrap();
        let sheet = CurrentSheetSurface::compute(
            &model,
            &CurrentSheetParameters {
                radial_nodes: 8,
                azimuth_nodes: 12,
                ..CurrentSheetParameters::default()
            },
        )
        .unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let track: Vec<ReconciledPoint> = [0, 1, 2, 6, 7]
            .iter()
            .map(|&h| ReconciledPoint {
                epoch: t0 + Duration::hours(h),
                position_au: [-0.4 + 0.01 * h as f64, 0.35, 0.02],
                velocity_km_s: None,
            })
            .collect();
        let mut builder = SceneBuilder::new(model.evaluate());
        builder
            .with_current_sheet(sheet)
            .add_landmark(Landmark::sun())
            .add_landmark(Landmark::earth([-0.98, 0.15, 0.0]))
            .add_marker(Marker {
                label: "MMS1".into(),
                position_au: [-0.98, 0.15, 0.0],
                epoch: Some(t0),
                annotation: "MMS1 |B| 6.0 nT".into(),
                measured_nt: Some(6.0),
                model_nt: Some(5.1),
            });
        builder.add_trajectory("PSP", track, GapPolicy::Break).unwrap();
        builder.build()
    }

    #[test]
    fn renders_png_and_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/spiral.png");
        render_scene(&scene(), &path, &quiet()).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.len() > PNG_MAGIC.len());
        assert_eq!(&bytes[..8], &PNG_MAGIC);
    }

    #[test]
    fn spiral_only_scene_renders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spiral_only.png");
        let model = ParkerSpiral::new(ModelParameters::default()).unwrap();
        let scene = SceneBuilder::new(model.evaluate()).build();
        render_scene(&scene, &path, &quiet()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn rejects_degenerate_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.png");
        let settings = RenderSettings {
            width: 10,
            ..quiet()
        };
        assert!(matches!(
            render_scene(&scene(), &path, &settings),
            Err(RenderError::InvalidSettings(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn jet_colormap_runs_blue_to_red() {
        let low = jet_color(0.0);
        let high = jet_color(1.0);
        assert!(low.2 > low.0);
        assert!(high.0 > high.2);
        assert_eq!(jet_color(-3.0), low);
    }
}
