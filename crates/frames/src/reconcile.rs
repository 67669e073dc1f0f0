//! Conversion of adapter samples into the canonical frame and units.

use chrono::{DateTime, Utc};
use parker_core::constants::OBLIQUITY_J2000;
use parker_core::samples::{
    EphemerisSample, FieldSample, FieldUnit, Frame, LengthUnit, VelocityUnit,
};
use parker_core::time::seconds_between;
use parker_core::units;
use parker_core::vector::{self, Vector3};
use tracing::debug;

use crate::ReconcileError;
use crate::earth::EarthEphemeris;

/// A sample expressed in the canonical system.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledPoint {
    pub epoch: DateTime<Utc>,
    /// Heliocentric ecliptic J2000 position (AU).
    pub position_au: Vector3,
    /// Heliocentric ecliptic J2000 velocity (km/s), when it could be carried over.
    pub velocity_km_s: Option<Vector3>,
}

/// Converts samples onto the canonical system.
///
/// Earth-referenced frames (GSE, HEE) need an [`EarthEphemeris`]; without one they
/// fail with [`ReconcileError::MissingEarthContext`].
#[derive(Clone, Copy)]
pub struct Reconciler<'a> {
    earth: Option<&'a dyn EarthEphemeris>,
}

impl<'a> Reconciler<'a> {
    pub fn new(earth: &'a dyn EarthEphemeris) -> Self {
        Self { earth: Some(earth) }
    }

    /// Reconciler limited to Sun-centred frames.
    pub fn heliocentric_only() -> Self {
        Self { earth: None }
    }

    /// Convert one position into heliocentric ecliptic J2000 AU.
    pub fn reconcile_position(
        &self,
        frame: &Frame,
        unit: &LengthUnit,
        epoch: &DateTime<Utc>,
        position: &Vector3,
    ) -> Result<Vector3, ReconcileError> {
        let local = length_to_au(unit, position)?;
        match frame {
            Frame::HeliocentricEclipticJ2000 => Ok(local),
            Frame::HeliocentricEquatorialJ2000 => Ok(vector::rotate_x(&local, -OBLIQUITY_J2000)),
            Frame::SolarCorotating {
                reference,
                rate_rad_s,
            } => {
                let angle = rate_rad_s * seconds_between(reference, epoch);
                Ok(vector::rotate_z(&local, angle))
            }
            Frame::Gse => {
                let earth = self.earth_position(frame, epoch)?;
                let (x_axis, y_axis, z_axis) = earth_ecliptic_axes(&vector::scale(&earth, -1.0));
                Ok(vector::add(&earth, &compose(&x_axis, &y_axis, &z_axis, &local)))
            }
            Frame::Hee => {
                let earth = self.earth_position(frame, epoch)?;
                let (x_axis, y_axis, z_axis) = earth_ecliptic_axes(&earth);
                Ok(compose(&x_axis, &y_axis, &z_axis, &local))
            }
            Frame::Other(name) => Err(ReconcileError::UnsupportedFrame {
                frame: name.clone(),
            }),
        }
    }

    /// Convert a velocity into km/s in the canonical axes.
    ///
    /// Only inertial Sun-centred frames carry a velocity over; Earth-relative and
    /// rotating frames would need transport terms, so their velocity is dropped.
    pub fn reconcile_velocity(
        &self,
        frame: &Frame,
        unit: &VelocityUnit,
        velocity: &Vector3,
    ) -> Result<Option<Vector3>, ReconcileError> {
        let local = velocity_to_km_s(unit, velocity)?;
        match frame {
            Frame::HeliocentricEclipticJ2000 => Ok(Some(local)),
            Frame::HeliocentricEquatorialJ2000 => {
                Ok(Some(vector::rotate_x(&local, -OBLIQUITY_J2000)))
            }
            Frame::Gse | Frame::Hee | Frame::SolarCorotating { .. } => {
                debug!(frame = %frame.label(), "dropping velocity from non-inertial frame");
                Ok(None)
            }
            Frame::Other(name) => Err(ReconcileError::UnsupportedFrame {
                frame: name.clone(),
            }),
        }
    }

    pub fn reconcile_sample(
        &self,
        sample: &EphemerisSample,
    ) -> Result<ReconciledPoint, ReconcileError> {
        let position_au =
            self.reconcile_position(&sample.frame, &sample.length_unit, &sample.epoch, &sample.position)?;
        let velocity_km_s = match &sample.velocity {
            Some(v) => self.reconcile_velocity(&sample.frame, &sample.velocity_unit, v)?,
            None => None,
        };
        Ok(ReconciledPoint {
            epoch: sample.epoch,
            position_au,
            velocity_km_s,
        })
    }

    /// Reconcile every sample, failing on the first one that cannot be converted.
    pub fn reconcile_series(
        &self,
        samples: &[EphemerisSample],
    ) -> Result<Vec<ReconciledPoint>, ReconcileError> {
        samples.iter().map(|s| self.reconcile_sample(s)).collect()
    }

    fn earth_position(
        &self,
        frame: &Frame,
        epoch: &DateTime<Utc>,
    ) -> Result<Vector3, ReconcileError> {
        let earth = self.earth.ok_or_else(|| ReconcileError::MissingEarthContext {
            frame: frame.label(),
        })?;
        earth.earth_position_au(epoch)
    }
}

/// Field magnitude of a measurement in nT.
pub fn field_magnitude_nt(sample: &FieldSample) -> Result<f64, ReconcileError> {
    let magnitude = sample.value.magnitude();
    match &sample.unit {
        FieldUnit::Nanotesla => Ok(magnitude),
        FieldUnit::Tesla => Ok(magnitude * 1e9),
        FieldUnit::Gauss => Ok(magnitude * 1e5),
        FieldUnit::Other(unit) => Err(ReconcileError::UnsupportedUnits {
            unit: unit.clone(),
            quantity: "magnetic field",
        }),
    }
}

fn length_to_au(unit: &LengthUnit, v: &Vector3) -> Result<Vector3, ReconcileError> {
    let to_au = |km: f64| units::km_to_au(km);
    match unit {
        LengthUnit::Au => Ok(*v),
        LengthUnit::Km => Ok(v.map(to_au)),
        LengthUnit::M => Ok(v.map(|c| to_au(units::m_to_km(c)))),
        LengthUnit::EarthRadii => Ok(v.map(|c| to_au(units::earth_radii_to_km(c)))),
        LengthUnit::Other(unit) => Err(ReconcileError::UnsupportedUnits {
            unit: unit.clone(),
            quantity: "length",
        }),
    }
}

fn velocity_to_km_s(unit: &VelocityUnit, v: &Vector3) -> Result<Vector3, ReconcileError> {
    match unit {
        VelocityUnit::KmPerSecond => Ok(*v),
        VelocityUnit::AuPerDay => Ok(v.map(units::au_per_day_to_km_s)),
        VelocityUnit::MPerSecond => Ok(v.map(units::m_to_km)),
        VelocityUnit::Other(unit) => Err(ReconcileError::UnsupportedUnits {
            unit: unit.clone(),
            quantity: "velocity",
        }),
    }
}

/// Right-handed axes with X along `x_direction` (projected onto the ecliptic) and
/// Z toward ecliptic north.
fn earth_ecliptic_axes(x_direction: &Vector3) -> (Vector3, Vector3, Vector3) {
    let pole = [0.0, 0.0, 1.0];
    let x_axis = vector::normalize(&[x_direction[0], x_direction[1], 0.0]).unwrap_or([1.0, 0.0, 0.0]);
    let y_axis = vector::cross(&pole, &x_axis);
    let z_axis = vector::cross(&x_axis, &y_axis);
    (x_axis, y_axis, z_axis)
}

fn compose(x_axis: &Vector3, y_axis: &Vector3, z_axis: &Vector3, local: &Vector3) -> Vector3 {
    vector::add(
        &vector::add(&vector::scale(x_axis, local[0]), &vector::scale(y_axis, local[1])),
        &vector::scale(z_axis, local[2]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earth::AnalyticEarth;
    use chrono::TimeZone;
    use parker_core::constants::AU_KM;
    use parker_core::samples::FieldValue;

    struct FixedEarth(Vector3);

    impl EarthEphemeris for FixedEarth {
        fn earth_position_au(&self, _epoch: &DateTime<Utc>) -> Result<Vector3, ReconcileError> {
            Ok(self.0)
        }
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    fn sample(frame: Frame, unit: LengthUnit, position: Vector3) -> EphemerisSample {
        EphemerisSample {
            epoch: epoch(),
            position,
            velocity: None,
            frame,
            length_unit: unit,
            velocity_unit: VelocityUnit::KmPerSecond,
        }
    }

    fn assert_close(a: &Vector3, b: &Vector3, tol: f64) {
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < tol, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn canonical_samples_pass_through_unchanged() {
        let earth = AnalyticEarth;
        let reconciler = Reconciler::new(&earth);
        let input = EphemerisSample {
            velocity: Some([12.5, -3.25, 0.125]),
            ..sample(
                Frame::HeliocentricEclipticJ2000,
                LengthUnit::Au,
                [0.123_456_789, -0.987_654_321, 0.011_111_111],
            )
        };
        let point = reconciler.reconcile_sample(&input).unwrap();
        assert_eq!(point.epoch, input.epoch);
        assert_eq!(point.position_au, input.position);
        assert_eq!(point.velocity_km_s, input.velocity);
    }

    #[test]
    fn kilometres_are_converted_to_au() {
        let reconciler = Reconciler::heliocentric_only();
        let point = reconciler
            .reconcile_sample(&sample(
                Frame::HeliocentricEclipticJ2000,
                LengthUnit::Km,
                [AU_KM, 0.0, -0.5 * AU_KM],
            ))
            .unwrap();
        assert_close(&point.position_au, &[1.0, 0.0, -0.5], 1e-15);
    }

    #[test]
    fn gse_offsets_from_earth_with_sunward_x() {
        let earth = FixedEarth([1.0, 0.0, 0.0]);
        let reconciler = Reconciler::new(&earth);
        let sunward = 100_000.0;
        let point = reconciler
            .reconcile_sample(&sample(
                Frame::Gse,
                LengthUnit::Km,
                [sunward, 20_000.0, 5_000.0],
            ))
            .unwrap();
        let expected = [
            1.0 - sunward / AU_KM,
            -20_000.0 / AU_KM,
            5_000.0 / AU_KM,
        ];
        assert_close(&point.position_au, &expected, 1e-15);
        assert!(point.position_au[0] < 1.0);
    }

    #[test]
    fn gse_origin_is_earth_for_any_earth_longitude() {
        let earth_pos = [0.0, -0.98, 0.0];
        let earth = FixedEarth(earth_pos);
        let reconciler = Reconciler::new(&earth);
        let origin = reconciler
            .reconcile_position(&Frame::Gse, &LengthUnit::EarthRadii, &epoch(), &[0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(origin, earth_pos);
        // 1 AU sunward from Earth lands on the Sun's side of Earth.
        let toward_sun = reconciler
            .reconcile_position(&Frame::Gse, &LengthUnit::Au, &epoch(), &[0.98, 0.0, 0.0])
            .unwrap();
        assert_close(&toward_sun, &[0.0, 0.0, 0.0], 1e-12);
    }

    #[test]
    fn hee_x_axis_points_at_earth() {
        let earth = FixedEarth([0.0, 1.0, 0.0]);
        let reconciler = Reconciler::new(&earth);
        let p = reconciler
            .reconcile_position(&Frame::Hee, &LengthUnit::Au, &epoch(), &[0.5, 0.25, 0.1])
            .unwrap();
        assert_close(&p, &[-0.25, 0.5, 0.1], 1e-12);
    }

    #[test]
    fn equatorial_pole_maps_onto_ecliptic_coordinates() {
        let reconciler = Reconciler::heliocentric_only();
        let pole = reconciler
            .reconcile_position(
                &Frame::HeliocentricEquatorialJ2000,
                &LengthUnit::Au,
                &epoch(),
                &[0.0, 0.0, 1.0],
            )
            .unwrap();
        assert_close(
            &pole,
            &[0.0, OBLIQUITY_J2000.sin(), OBLIQUITY_J2000.cos()],
            1e-12,
        );
    }

    #[test]
    fn corotating_frame_rotates_with_elapsed_time() {
        let reconciler = Reconciler::heliocentric_only();
        let quarter_turn_s = 86_400.0;
        let frame = Frame::SolarCorotating {
            reference: epoch() - chrono::Duration::days(1),
            rate_rad_s: std::f64::consts::FRAC_PI_2 / quarter_turn_s,
        };
        let p = reconciler
            .reconcile_position(&frame, &LengthUnit::Au, &epoch(), &[1.0, 0.0, 0.0])
            .unwrap();
        assert_close(&p, &[0.0, 1.0, 0.0], 1e-12);
    }

    #[test]
    fn unknown_frames_and_units_are_rejected() {
        let earth = AnalyticEarth;
        let reconciler = Reconciler::new(&earth);
        let gsm = sample(Frame::Other("GSM".into()), LengthUnit::Km, [1.0, 2.0, 3.0]);
        assert_eq!(
            reconciler.reconcile_sample(&gsm),
            Err(ReconcileError::UnsupportedFrame {
                frame: "GSM".into()
            })
        );
        let parsecs = sample(
            Frame::HeliocentricEclipticJ2000,
            LengthUnit::Other("pc".into()),
            [1.0, 2.0, 3.0],
        );
        assert!(matches!(
            reconciler.reconcile_sample(&parsecs),
            Err(ReconcileError::UnsupportedUnits { quantity: "length", .. })
        ));
        let weird_velocity = EphemerisSample {
            velocity: Some([1.0, 1.0, 1.0]),
            velocity_unit: VelocityUnit::Other("furlong/fortnight".into()),
            ..sample(Frame::HeliocentricEclipticJ2000, LengthUnit::Au, [1.0, 0.0, 0.0])
        };
        assert!(matches!(
            reconciler.reconcile_sample(&weird_velocity),
            Err(ReconcileError::UnsupportedUnits { quantity: "velocity", .. })
        ));
    }

    #[test]
    fn earth_frames_need_earth_context() {
        let reconciler = Reconciler::heliocentric_only();
        let gse = sample(Frame::Gse, LengthUnit::Km, [1.0, 0.0, 0.0]);
        assert!(matches!(
            reconciler.reconcile_sample(&gse),
            Err(ReconcileError::MissingEarthContext { .. })
        ));
    }

    #[test]
    fn series_fails_on_first_unconvertible_sample() {
        let reconciler = Reconciler::heliocentric_only();
        let samples = vec![
            sample(Frame::HeliocentricEclipticJ2000, LengthUnit::Au, [0.5, 0.0, 0.0]),
            sample(Frame::Other("HGC".into()), LengthUnit::Au, [0.6, 0.0, 0.0]),
        ];
        assert!(reconciler.reconcile_series(&samples).is_err());
        assert_eq!(reconciler.reconcile_series(&samples[..1]).unwrap().len(), 1);
    }

    #[test]
    fn au_per_day_velocity_is_converted_and_gse_velocity_dropped() {
        let earth = FixedEarth([1.0, 0.0, 0.0]);
        let reconciler = Reconciler::new(&earth);
        let helio = EphemerisSample {
            velocity: Some([0.01, 0.0, 0.0]),
            velocity_unit: VelocityUnit::AuPerDay,
            ..sample(Frame::HeliocentricEclipticJ2000, LengthUnit::Au, [0.3, 0.0, 0.0])
        };
        let v = reconciler.reconcile_sample(&helio).unwrap().velocity_km_s.unwrap();
        assert!((v[0] - 17.314_568_368).abs() < 1e-6);
        let gse = EphemerisSample {
            velocity: Some([1.0, 0.0, 0.0]),
            ..sample(Frame::Gse, LengthUnit::Km, [0.0, 0.0, 0.0])
        };
        assert_eq!(reconciler.reconcile_sample(&gse).unwrap().velocity_km_s, None);
    }

    #[test]
    fn field_magnitudes_convert_to_nanotesla() {
        let mut sample = FieldSample {
            epoch: epoch(),
            value: FieldValue::Vector([3.0, 4.0, 0.0]),
            unit: FieldUnit::Nanotesla,
            frame: Frame::Gse,
            instrument: "MMS1_FGM".into(),
        };
        assert_eq!(field_magnitude_nt(&sample).unwrap(), 5.0);
        sample.unit = FieldUnit::Tesla;
        sample.value = FieldValue::Scalar(-5e-9);
        assert!((field_magnitude_nt(&sample).unwrap() - 5.0).abs() < 1e-9);
        sample.unit = FieldUnit::Other("mG".into());
        assert!(field_magnitude_nt(&sample).is_err());
    }
}
