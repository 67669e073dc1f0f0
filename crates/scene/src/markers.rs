//! Measurement markers: in-situ |B| placed on a trajectory next to the model value.

use parker_core::samples::FieldSample;
use parker_core::time::seconds_between;
use parker_frames::ReconciledPoint;
use parker_frames::reconcile::field_magnitude_nt;
use parker_model::ParkerSpiral;
use tracing::debug;

use crate::{ComposeError, Marker, Trajectory};

/// Placement options for [`measurement_markers`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerOptions {
    /// Largest allowed distance in time between a measurement and the trajectory
    /// point it is drawn at (s).
    pub tolerance_s: f64,
    /// Upper bound on markers per call; measurements are thinned evenly.
    pub max_markers: usize,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            tolerance_s: 600.0,
            max_markers: 12,
        }
    }
}

/// Markers for field measurements along `trajectory`.
///
/// Each marker sits at the trajectory point nearest in time to the measurement and
/// carries the measured magnitude next to the model magnitude at that radius.
/// Measurements with no trajectory point within the tolerance are skipped.
pub fn measurement_markers(
    label: &str,
    samples: &[FieldSample],
    trajectory: &Trajectory,
    model: &ParkerSpiral,
    options: &MarkerOptions,
) -> Result<Vec<Marker>, ComposeError> {
    let points: Vec<&ReconciledPoint> = trajectory
        .segments
        .iter()
        .flat_map(|segment| segment.points.iter())
        .collect();
    if points.is_empty() || options.max_markers == 0 {
        return Ok(Vec::new());
    }

    let stride = samples.len().div_ceil(options.max_markers).max(1);
    let mut markers = Vec::new();
    for sample in samples.iter().step_by(stride) {
        let measured_nt = field_magnitude_nt(sample)?;
        let Some(nearest) = nearest_in_time(&points, sample) else {
            continue;
        };
        let offset = seconds_between(&nearest.epoch, &sample.epoch).abs();
        if offset > options.tolerance_s {
            continue;
        }
        let Some(model_field) = model.field_at_position(&nearest.position_au) else {
            continue;
        };
        let model_nt = model_field.magnitude_nt();
        markers.push(Marker {
            label: label.to_string(),
            position_au: nearest.position_au,
            epoch: Some(sample.epoch),
            annotation: format!("{label} |B| {measured_nt:.1} nT (model {model_nt:.1} nT)"),
            measured_nt: Some(measured_nt),
            model_nt: Some(model_nt),
        });
    }
    debug!(
        label,
        measurements = samples.len(),
        markers = markers.len(),
        "placed measurement markers"
    );
    Ok(markers)
}

fn nearest_in_time<'a>(
    points: &[&'a ReconciledPoint],
    sample: &FieldSample,
) -> Option<&'a ReconciledPoint> {
    let idx = points.partition_point(|p| p.epoch < sample.epoch);
    let before = idx.checked_sub(1).and_then(|i| points.get(i));
    let after = points.get(idx);
    match (before, after) {
        (Some(b), Some(a)) => {
            let db = seconds_between(&b.epoch, &sample.epoch).abs();
            let da = seconds_between(&sample.epoch, &a.epoch).abs();
            Some(if db <= da { *b } else { *a })
        }
        (Some(only), None) | (None, Some(only)) => Some(*only),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GapPolicy, SceneBuilder};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use parker_core::samples::{FieldUnit, FieldValue, Frame};
    use parker_model::ModelParameters;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    fn trajectory() -> (ParkerSpiral, Trajectory) {
        let model = ParkerSpiral::new(ModelParameters::default()).unwrap();
        let points: Vec<ReconciledPoint> = (0..4)
            .map(|h| ReconciledPoint {
                epoch: t0() + Duration::hours(h),
                position_au: [0.5 + 0.1 * h as f64, 0.0, 0.0],
                velocity_km_s: None,
            })
            .collect();
        let mut builder = SceneBuilder::new(model.evaluate());
        builder.add_trajectory("PSP", points, GapPolicy::Break).unwrap();
        let scene = builder.build();
        (model, scene.trajectories[0].clone())
    }

    fn field(minutes: i64, nt: f64) -> FieldSample {
        FieldSample {
            epoch: t0() + Duration::minutes(minutes),
            value: FieldValue::Scalar(nt),
            unit: FieldUnit::Nanotesla,
            frame: Frame::Gse,
            instrument: "FGM".into(),
        }
    }

    #[test]
    fn markers_snap_to_nearest_point_and_carry_model_value() {
        let (model, trajectory) = trajectory();
        let markers = measurement_markers(
            "MMS1",
            &[field(65, 8.0), field(170, 6.0)],
            &trajectory,
            &model,
            &MarkerOptions::default(),
        )
        .unwrap();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].position_au, [0.6, 0.0, 0.0]);
        assert_eq!(markers[1].position_au, [0.8, 0.0, 0.0]);
        assert_eq!(markers[0].measured_nt, Some(8.0));
        let expected = model.field_at(0.6).magnitude_nt();
        assert!((markers[0].model_nt.unwrap() - expected).abs() < 1e-9);
        assert!(markers[0].annotation.starts_with("MMS1 |B| 8.0 nT"));
    }

    #[test]
    fn measurements_far_from_the_trajectory_are_skipped_and_thinned() {
        let (model, trajectory) = trajectory();
        let far = measurement_markers(
            "MMS1",
            &[field(30, 5.0)],
            &trajectory,
            &model,
            &MarkerOptions {
                tolerance_s: 60.0,
                max_markers: 10,
            },
        )
        .unwrap();
        assert!(far.is_empty());

        let dense: Vec<FieldSample> = (0..100).map(|m| field(m, 5.0)).collect();
        let thinned = measurement_markers(
            "MMS1",
            &dense,
            &trajectory,
            &model,
            &MarkerOptions {
                tolerance_s: 3_600.0,
                max_markers: 10,
            },
        )
        .unwrap();
        assert_eq!(thinned.len(), 10);
    }

    #[test]
    fn model_value_follows_the_spacecraft_latitude() {
        let model = ParkerSpiral::new(ModelParameters::default()).unwrap();
        let lat = 45.0_f64.to_radians();
        let points: Vec<ReconciledPoint> = (0..3)
            .map(|h| ReconciledPoint {
                epoch: t0() + Duration::hours(h),
                position_au: [lat.cos(), 0.0, lat.sin()],
                velocity_km_s: None,
            })
            .collect();
        let mut builder = SceneBuilder::new(model.evaluate());
        builder.add_trajectory("Ulysses", points, GapPolicy::Break).unwrap();
        let trajectory = builder.trajectory("Ulysses").unwrap().clone();

        let markers = measurement_markers(
            "Ulysses",
            &[field(60, 2.0)],
            &trajectory,
            &model,
            &MarkerOptions::default(),
        )
        .unwrap();
        let off_plane = markers[0].model_nt.unwrap();
        let in_plane = model.field_at(1.0).magnitude_nt();
        let expected = model
            .field_at_position(&[lat.cos(), 0.0, lat.sin()])
            .unwrap()
            .magnitude_nt();
        assert!((off_plane - expected).abs() < 1e-9);
        assert!(off_plane < in_plane);
    }

    #[test]
    fn unsupported_field_units_fail() {
        let (model, trajectory) = trajectory();
        let mut sample = field(0, 5.0);
        sample.unit = FieldUnit::Other("counts".into());
        assert!(matches!(
            measurement_markers("X", &[sample], &trajectory, &model, &MarkerOptions::default()),
            Err(ComposeError::Field(_))
        ));
    }
}
