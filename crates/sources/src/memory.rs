//! In-memory fixtures behind the source traits.

use std::collections::HashMap;

use parker_core::samples::{EphemerisSample, FieldSample, TimeRange};

use crate::{DatasetRequest, EphemerisSource, FrameRequest, MissionDataSource, SourceError};

const SERVICE: &str = "memory";

/// Serves pre-loaded samples, filtered to the requested window.
///
/// Ephemerides are keyed by target id, measurements by `DATASET/variable`.
/// Failures can be injected per key.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    ephemerides: HashMap<String, Vec<EphemerisSample>>,
    measurements: HashMap<String, Vec<FieldSample>>,
    failures: HashMap<String, SourceError>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ephemeris(mut self, target_id: &str, samples: Vec<EphemerisSample>) -> Self {
        self.ephemerides.insert(target_id.to_string(), samples);
        self
    }

    pub fn with_measurements(mut self, request: &DatasetRequest, samples: Vec<FieldSample>) -> Self {
        self.measurements.insert(request.target(), samples);
        self
    }

    /// Make every fetch for `key` fail with `error`.
    pub fn with_failure(mut self, key: &str, error: SourceError) -> Self {
        self.failures.insert(key.to_string(), error);
        self
    }

    fn lookup<T: Clone>(
        &self,
        table: &HashMap<String, Vec<T>>,
        key: &str,
        range: &TimeRange,
        epoch: impl Fn(&T) -> chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<T>, SourceError> {
        if let Some(error) = self.failures.get(key) {
            return Err(error.clone());
        }
        let samples: Vec<T> = table
            .get(key)
            .map(|all| all.iter().filter(|s| range.contains(&epoch(s))).cloned().collect())
            .unwrap_or_default();
        if samples.is_empty() {
            return Err(SourceError::no_data(SERVICE, key, range));
        }
        Ok(samples)
    }
}

impl EphemerisSource for MemorySource {
    fn fetch(
        &self,
        range: &TimeRange,
        target_id: &str,
        _frame: &FrameRequest,
    ) -> Result<Vec<EphemerisSample>, SourceError> {
        self.lookup(&self.ephemerides, target_id, range, |s| s.epoch)
    }
}

impl MissionDataSource for MemorySource {
    fn fetch(
        &self,
        range: &TimeRange,
        request: &DatasetRequest,
    ) -> Result<Vec<FieldSample>, SourceError> {
        self.lookup(&self.measurements, &request.target(), range, |s| s.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use parker_core::samples::{Frame, LengthUnit, VelocityUnit};

    fn samples() -> Vec<EphemerisSample> {
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        (0..5)
            .map(|i| EphemerisSample {
                epoch: t0 + Duration::hours(i),
                position: [0.5, 0.0, 0.0],
                velocity: None,
                frame: Frame::HeliocentricEclipticJ2000,
                length_unit: LengthUnit::Au,
                velocity_unit: VelocityUnit::KmPerSecond,
            })
            .collect()
    }

    #[test]
    fn filters_to_window_and_reports_missing_targets() {
        let source = MemorySource::new().with_ephemeris("-96", samples());
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 1, 0, 0).unwrap();
        let range = TimeRange::new(t0, t0 + Duration::hours(2)).unwrap();
        let fetched = EphemerisSource::fetch(&source, &range, "-96", &FrameRequest::default()).unwrap();
        assert_eq!(fetched.len(), 3);
        assert!(matches!(
            EphemerisSource::fetch(&source, &range, "-31", &FrameRequest::default()),
            Err(SourceError::NoDataForRange { .. })
        ));
    }

    #[test]
    fn injected_failures_win_over_fixtures() {
        let outage = SourceError::DataSourceUnavailable {
            service: "memory",
            reason: "simulated outage".into(),
        };
        let source = MemorySource::new()
            .with_ephemeris("-96", samples())
            .with_failure("-96", outage.clone());
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let range = TimeRange::new(t0, t0 + Duration::hours(4)).unwrap();
        assert_eq!(
            EphemerisSource::fetch(&source, &range, "-96", &FrameRequest::default()),
            Err(outage)
        );
    }
}
