//! Overlay composition.
//!
//! A [`Scene`] gathers the evaluated spiral, the optional current sheet, spacecraft
//! trajectories, measurement markers, and landmarks. Trajectories only accept
//! [`ReconciledPoint`]s, so everything in a scene shares the heliocentric ecliptic
//! AU system.

pub mod markers;
pub mod segments;

use chrono::{DateTime, Utc};
use parker_core::vector::{self, Vector3};
use parker_frames::{ReconcileError, ReconciledPoint};
use parker_model::{CurrentSheetSurface, SpiralCurve};
use thiserror::Error;
use tracing::debug;

pub use markers::{MarkerOptions, measurement_markers};
pub use segments::{
    DEFAULT_GAP_FACTOR, GapPolicy, MAX_INTERPOLATED_STEPS, Segment, split_segments,
    split_segments_with,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComposeError {
    #[error("samples out of order at index {index} ({epoch})")]
    UnorderedSamples { index: usize, epoch: DateTime<Utc> },
    #[error("trajectory `{name}` has no plottable points")]
    EmptyTrajectory { name: String },
    #[error("gap factor must be finite and at least 1 (got {0})")]
    InvalidGapFactor(f64),
    #[error("field measurement: {0}")]
    Field(#[from] ReconcileError),
}

/// Named spacecraft path, split into gap-free segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub name: String,
    pub segments: Vec<Segment>,
}

impl Trajectory {
    pub fn points(&self) -> impl Iterator<Item = &ReconciledPoint> {
        self.segments.iter().flat_map(|segment| segment.points.iter())
    }

    /// Most recent point, drawn as the spacecraft's current position.
    pub fn last_point(&self) -> Option<&ReconciledPoint> {
        self.segments.last().and_then(|segment| segment.points.last())
    }
}

/// Labelled point of interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub label: String,
    pub position_au: Vector3,
    pub epoch: Option<DateTime<Utc>>,
    pub annotation: String,
    pub measured_nt: Option<f64>,
    pub model_nt: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkKind {
    Star,
    Planet,
}

/// Reference body drawn for orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmark {
    pub name: String,
    pub kind: LandmarkKind,
    pub position_au: Vector3,
}

impl Landmark {
    pub fn sun() -> Self {
        Self {
            name: "Sun".to_string(),
            kind: LandmarkKind::Star,
            position_au: [0.0; 3],
        }
    }

    pub fn earth(position_au: Vector3) -> Self {
        Self {
            name: "Earth".to_string(),
            kind: LandmarkKind::Planet,
            position_au,
        }
    }
}

/// Axis-aligned cube enclosing a scene (AU).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vector3,
    pub max: Vector3,
}

impl Bounds {
    pub fn half_width(&self) -> f64 {
        0.5 * (self.max[0] - self.min[0])
    }

    pub fn contains(&self, p: &Vector3) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }
}

/// Everything to be drawn, in the canonical frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub title: String,
    pub spiral: SpiralCurve,
    pub current_sheet: Option<CurrentSheetSurface>,
    /// In insertion order, which is also legend order.
    pub trajectories: Vec<Trajectory>,
    pub markers: Vec<Marker>,
    pub landmarks: Vec<Landmark>,
}

impl Scene {
    /// Smallest cube, centred on the data, that encloses every point.
    pub fn bounds(&self) -> Option<Bounds> {
        let spiral = self.spiral.points().map(|p| p.position_au);
        let sheet = self
            .current_sheet
            .iter()
            .flat_map(|surface| surface.nodes.iter().map(|n| n.position_au));
        let tracks = self
            .trajectories
            .iter()
            .flat_map(|t| t.points().map(|p| p.position_au));
        let markers = self.markers.iter().map(|m| m.position_au);
        let landmarks = self.landmarks.iter().map(|l| l.position_au);

        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for p in spiral
            .chain(sheet)
            .chain(tracks)
            .chain(markers)
            .chain(landmarks)
            .filter(vector::is_finite)
        {
            for i in 0..3 {
                lo[i] = lo[i].min(p[i]);
                hi[i] = hi[i].max(p[i]);
            }
        }
        if lo[0] > hi[0] {
            return None;
        }
        let centre = vector::scale(&vector::add(&lo, &hi), 0.5);
        let half = (0..3)
            .map(|i| 0.5 * (hi[i] - lo[i]))
            .fold(0.0_f64, f64::max)
            .max(1e-6)
            * (1.0 + 1e-9);
        Some(Bounds {
            min: centre.map(|c| c - half),
            max: centre.map(|c| c + half),
        })
    }

    pub fn trajectory(&self, name: &str) -> Option<&Trajectory> {
        self.trajectories.iter().find(|t| t.name == name)
    }
}

/// Incrementally assembles a [`Scene`] around an evaluated spiral.
#[derive(Debug, Clone)]
pub struct SceneBuilder {
    scene: Scene,
    gap_factor: f64,
}

impl SceneBuilder {
    pub fn new(spiral: SpiralCurve) -> Self {
        Self {
            scene: Scene {
                title: "Parker spiral".to_string(),
                spiral,
                current_sheet: None,
                trajectories: Vec::new(),
                markers: Vec::new(),
                landmarks: Vec::new(),
            },
            gap_factor: DEFAULT_GAP_FACTOR,
        }
    }

    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.scene.title = title.into();
        self
    }

    pub fn gap_factor(&mut self, gap_factor: f64) -> &mut Self {
        self.gap_factor = gap_factor;
        self
    }

    pub fn with_current_sheet(&mut self, surface: CurrentSheetSurface) -> &mut Self {
        self.scene.current_sheet = Some(surface);
        self
    }

    pub fn add_landmark(&mut self, landmark: Landmark) -> &mut Self {
        self.scene.landmarks.push(landmark);
        self
    }

    /// Split `points` into segments and append the trajectory.
    pub fn add_trajectory(
        &mut self,
        name: &str,
        points: Vec<ReconciledPoint>,
        policy: GapPolicy,
    ) -> Result<&mut Self, ComposeError> {
        let segments = split_segments_with(&points, policy, self.gap_factor)?;
        if segments.is_empty() {
            return Err(ComposeError::EmptyTrajectory {
                name: name.to_string(),
            });
        }
        debug!(
            trajectory = name,
            points = points.len(),
            segments = segments.len(),
            "added trajectory"
        );
        self.scene.trajectories.push(Trajectory {
            name: name.to_string(),
            segments,
        });
        Ok(self)
    }

    pub fn add_marker(&mut self, marker: Marker) -> &mut Self {
        self.scene.markers.push(marker);
        self
    }

    /// A trajectory added so far, for placing markers before the scene is built.
    pub fn trajectory(&self, name: &str) -> Option<&Trajectory> {
        self.scene.trajectory(name)
    }

    pub fn build(self) -> Scene {
        self.scene
    }
}
