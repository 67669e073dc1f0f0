//! Heliocentric Earth position, needed for Earth-referenced frames (GSE, HEE).

use chrono::{DateTime, Utc};
use parker_core::constants::{DAYS_PER_CENTURY, J2000_JD};
use parker_core::time::{julian_date, seconds_between};
use parker_core::vector::{self, Vector3};

use crate::ReconcileError;
use crate::reconcile::ReconciledPoint;

/// Source of Earth's heliocentric ecliptic J2000 position (AU).
pub trait EarthEphemeris {
    fn earth_position_au(&self, epoch: &DateTime<Utc>) -> Result<Vector3, ReconcileError>;
}

/// Low-precision analytic Earth position (Meeus, ~0.01° in longitude).
///
/// The solar longitude is computed in the ecliptic of date and shifted back to
/// J2000 with the general precession in longitude.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticEarth;

impl EarthEphemeris for AnalyticEarth {
    fn earth_position_au(&self, epoch: &DateTime<Utc>) -> Result<Vector3, ReconcileError> {
        let t = (julian_date(epoch) - J2000_JD) / DAYS_PER_CENTURY;
        let mean_longitude = 280.46645 + 36_000.76983 * t + 0.000_303_2 * t * t;
        let mean_anomaly =
            357.52910 + 35_999.05030 * t - 0.000_155_9 * t * t - 0.000_000_48 * t * t * t;
        let m = mean_anomaly.to_radians();
        let center = (1.914_600 - 0.004_817 * t - 0.000_014 * t * t) * m.sin()
            + (0.019_93 - 0.000_101 * t) * (2.0 * m).sin()
            + 0.000_290 * (3.0 * m).sin();
        let sun_longitude = mean_longitude + center - 1.396_971 * t;
        let eccentricity = 0.016_708_617 - t * (0.000_042_037 + 0.000_000_123_6 * t);
        let distance = 1.000_001_018 * (1.0 - eccentricity * eccentricity)
            / (1.0 + eccentricity * (mean_anomaly + center).to_radians().cos());
        let (sin_l, cos_l) = sun_longitude.to_radians().sin_cos();
        // Earth sits opposite the geocentric Sun.
        Ok([-distance * cos_l, -distance * sin_l, 0.0])
    }
}

/// Earth positions sampled from an ephemeris service, linearly interpolated.
#[derive(Debug, Clone)]
pub struct SampledEarth {
    samples: Vec<(DateTime<Utc>, Vector3)>,
}

impl SampledEarth {
    /// Build from canonical points; they are sorted by epoch.
    pub fn new(points: &[ReconciledPoint]) -> Self {
        let mut samples: Vec<(DateTime<Utc>, Vector3)> = points
            .iter()
            .filter(|p| vector::is_finite(&p.position_au))
            .map(|p| (p.epoch, p.position_au))
            .collect();
        samples.sort_by_key(|(epoch, _)| *epoch);
        samples.dedup_by_key(|(epoch, _)| *epoch);
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl EarthEphemeris for SampledEarth {
    fn earth_position_au(&self, epoch: &DateTime<Utc>) -> Result<Vector3, ReconcileError> {
        let out_of_range = || ReconcileError::EarthOutOfRange { epoch: *epoch };
        match self.samples.binary_search_by_key(epoch, |(t, _)| *t) {
            Ok(idx) => Ok(self.samples[idx].1),
            Err(0) => Err(out_of_range()),
            Err(idx) if idx >= self.samples.len() => Err(out_of_range()),
            Err(idx) => {
                let (t0, p0) = &self.samples[idx - 1];
                let (t1, p1) = &self.samples[idx];
                let span = seconds_between(t0, t1);
                let frac = seconds_between(t0, epoch) / span;
                Ok(vector::lerp(p0, p1, frac))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn analytic_earth_near_march_equinox_lies_on_negative_x() {
        let equinox = Utc.with_ymd_and_hms(2024, 3, 20, 3, 6, 0).unwrap();
        let earth = AnalyticEarth.earth_position_au(&equinox).unwrap();
        let distance = vector::norm(&earth);
        assert!((distance - 0.996).abs() < 0.002, "distance {distance}");
        assert!(earth[0] < -0.99);
        assert!(earth[1].abs() < 0.01, "y = {}", earth[1]);
        assert_eq!(earth[2], 0.0);
    }

    #[test]
    fn analytic_earth_distance_tracks_perihelion_and_aphelion() {
        let perihelion = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let aphelion = Utc.with_ymd_and_hms(2024, 7, 5, 0, 0, 0).unwrap();
        let near = vector::norm(&AnalyticEarth.earth_position_au(&perihelion).unwrap());
        let far = vector::norm(&AnalyticEarth.earth_position_au(&aphelion).unwrap());
        assert!((near - 0.9833).abs() < 0.001, "perihelion distance {near}");
        assert!((far - 1.0167).abs() < 0.001, "aphelion distance {far}");
    }

    #[test]
    fn sampled_earth_interpolates_and_rejects_outside_span() {
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 2, 1, 2, 0, 0).unwrap();
        let mid = Utc.with_ymd_and_hms(2024, 2, 1, 1, 0, 0).unwrap();
        let earth = SampledEarth::new(&[
            ReconciledPoint {
                epoch: t1,
                position_au: [0.0, 1.0, 0.0],
                velocity_km_s: None,
            },
            ReconciledPoint {
                epoch: t0,
                position_au: [1.0, 0.0, 0.0],
                velocity_km_s: None,
            },
        ]);
        assert_eq!(earth.len(), 2);
        let p = earth.earth_position_au(&mid).unwrap();
        assert!((p[0] - 0.5).abs() < 1e-12 && (p[1] - 0.5).abs() < 1e-12);
        assert_eq!(earth.earth_position_au(&t0).unwrap(), [1.0, 0.0, 0.0]);
        let late = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
        assert_eq!(
            earth.earth_position_au(&late),
            Err(ReconcileError::EarthOutOfRange { epoch: late })
        );
    }
}
