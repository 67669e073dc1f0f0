//! JPL Horizons vector tables over the REST API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use parker_core::samples::{EphemerisSample, Frame, LengthUnit, TimeRange, VelocityUnit};
use parker_core::time::tdb_julian_to_utc;
use serde::Deserialize;
use tracing::{debug, info};

use crate::http::Fetcher;
use crate::{EphemerisSource, FrameRequest, SourceError, order_by_epoch};

pub const DEFAULT_URL: &str = "https://ssd.jpl.nasa.gov/api/horizons.api";
const SERVICE: &str = "horizons";

/// Client for the Horizons `VECTORS` ephemeris type, Sun-centred, AU and AU/day.
#[derive(Debug, Clone)]
pub struct HorizonsClient {
    fetcher: Fetcher,
    base_url: String,
    step_size: String,
}

#[derive(Debug, Deserialize)]
struct HorizonsPayload {
    result: Option<String>,
    error: Option<String>,
}

impl HorizonsClient {
    pub fn new(
        base_url: impl Into<String>,
        step_size: impl Into<String>,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            fetcher: Fetcher::new(SERVICE, timeout, retries)?,
            base_url: base_url.into(),
            step_size: step_size.into(),
        })
    }

    fn query(&self, range: &TimeRange, target_id: &str, plane: &str) -> Vec<(&'static str, String)> {
        vec![
            ("format", "json".to_string()),
            ("COMMAND", format!("'{target_id}'")),
            ("OBJ_DATA", "NO".to_string()),
            ("MAKE_EPHEM", "YES".to_string()),
            ("EPHEM_TYPE", "VECTORS".to_string()),
            ("CENTER", "'500@10'".to_string()),
            ("REF_PLANE", plane.to_string()),
            ("REF_SYSTEM", "ICRF".to_string()),
            ("START_TIME", format!("'{}'", horizons_time(&range.start))),
            ("STOP_TIME", format!("'{}'", horizons_time(&range.stop))),
            ("STEP_SIZE", format!("'{}'", self.step_size)),
            ("OUT_UNITS", "AU-D".to_string()),
            ("VEC_TABLE", "2".to_string()),
            ("VEC_LABELS", "NO".to_string()),
            ("CSV_FORMAT", "YES".to_string()),
        ]
    }
}

impl EphemerisSource for HorizonsClient {
    fn fetch(
        &self,
        range: &TimeRange,
        target_id: &str,
        frame: &FrameRequest,
    ) -> Result<Vec<EphemerisSample>, SourceError> {
        let (plane, frame) = match frame {
            FrameRequest::HeliocentricEcliptic => ("ECLIPTIC", Frame::HeliocentricEclipticJ2000),
            FrameRequest::HeliocentricEquatorial => {
                ("FRAME", Frame::HeliocentricEquatorialJ2000)
            }
            FrameRequest::Native(_) => {
                return Err(SourceError::UnsupportedRequest {
                    service: SERVICE,
                    request: "native archive frames".to_string(),
                });
            }
        };
        info!(target = target_id, start = %range.start, stop = %range.stop, "fetching Horizons vectors");
        let body = self
            .fetcher
            .get(&self.base_url, &self.query(range, target_id, plane), "application/json")?;
        let samples = parse_response(&body, frame, target_id, range)?;
        debug!(target = target_id, samples = samples.len(), "parsed Horizons vectors");
        Ok(samples)
    }
}

/// Horizons reads bare calendar dates in its default time scale; seconds are
/// dropped because the step size is coarse.
fn horizons_time(epoch: &DateTime<Utc>) -> String {
    epoch.format("%Y-%m-%d %H:%M").to_string()
}

/// Decode the JSON envelope and the vector table inside it.
pub fn parse_response(
    body: &str,
    frame: Frame,
    target_id: &str,
    range: &TimeRange,
) -> Result<Vec<EphemerisSample>, SourceError> {
    let payload: HorizonsPayload = serde_json::from_str(body)
        .map_err(|err| SourceError::malformed(SERVICE, format!("invalid JSON envelope: {err}")))?;
    if let Some(error) = payload.error {
        if mentions_no_ephemeris(&error) {
            return Err(SourceError::no_data(SERVICE, target_id, range));
        }
        return Err(SourceError::DataSourceUnavailable {
            service: SERVICE,
            reason: error.trim().to_string(),
        });
    }
    let result = payload
        .result
        .ok_or_else(|| SourceError::malformed(SERVICE, "response has neither `result` nor `error`"))?;
    parse_vector_table(&result, frame, target_id, range)
}

/// Parse the `$$SOE` / `$$EOE` block of a CSV vector table (`VEC_TABLE=2`).
///
/// Rows are `JDTDB, calendar date, X, Y, Z, VX, VY, VZ`; epochs are converted to UTC.
pub fn parse_vector_table(
    result: &str,
    frame: Frame,
    target_id: &str,
    range: &TimeRange,
) -> Result<Vec<EphemerisSample>, SourceError> {
    if mentions_no_ephemeris(result) {
        return Err(SourceError::no_data(SERVICE, target_id, range));
    }
    let start = result.find("$$SOE");
    let end = result.find("$$EOE");
    let block = match (start, end) {
        (Some(start), Some(end)) if start < end => &result[start + "$$SOE".len()..end],
        _ => {
            let first_line = result.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
            return Err(SourceError::malformed(
                SERVICE,
                format!("no $$SOE/$$EOE block (starts with `{}`)", first_line.trim()),
            ));
        }
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(block.trim().as_bytes());
    let mut samples = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| SourceError::malformed(SERVICE, err.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        samples.push(parse_row(&record, &frame)?);
    }
    if samples.is_empty() {
        return Err(SourceError::no_data(SERVICE, target_id, range));
    }
    order_by_epoch(&mut samples, |s| s.epoch);
    Ok(samples)
}

fn parse_row(record: &StringRecord, frame: &Frame) -> Result<EphemerisSample, SourceError> {
    let field = |idx: usize| -> Result<f64, SourceError> {
        let raw = record
            .get(idx)
            .ok_or_else(|| SourceError::malformed(SERVICE, format!("row has no column {idx}")))?;
        raw.parse::<f64>()
            .map_err(|_| SourceError::malformed(SERVICE, format!("`{raw}` is not a number")))
    };
    let jd_tdb = field(0)?;
    let epoch = tdb_julian_to_utc(jd_tdb)
        .ok_or_else(|| SourceError::malformed(SERVICE, format!("epoch JD {jd_tdb} out of range")))?;
    let position = [field(2)?, field(3)?, field(4)?];
    let velocity = match (field(5), field(6), field(7)) {
        (Ok(vx), Ok(vy), Ok(vz)) => Some([vx, vy, vz]),
        _ => None,
    };
    Ok(EphemerisSample {
        epoch,
        position,
        velocity,
        frame: frame.clone(),
        length_unit: LengthUnit::Au,
        velocity_unit: VelocityUnit::AuPerDay,
    })
}

fn mentions_no_ephemeris(text: &str) -> bool {
    text.contains("No ephemeris for target") || text.contains("No ephemeris available")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parker_core::time::seconds_between;

    const TABLE: &str = r#"
*******************************************************************************
Ephemeris / API_USER Thu Feb  1 00:00:00 2024 Pasadena, USA      / Horizons
*******************************************************************************
Target body name: Parker Solar Probe (spacecraft) (-96) {source: spp_nom_20180812_20250831}
Center body name: Sun (10)                        {source: DE441}
*******************************************************************************
            JDTDB,            Calendar Date (TDB),                      X,                      Y,                      Z,                     VX,                     VY,                     VZ,
**************************************************************************************************************************************************************************************************
$$SOE
2460342.500000000, A.D. 2024-Feb-01 00:00:00.0000, -4.021470353927462E-01,  3.497395126493427E-01,  2.628005658541651E-02, -1.123960012373201E-02, -1.261224133271659E-02,  3.694516301584906E-04,
2460342.541666667, A.D. 2024-Feb-01 01:00:00.0000, -4.026150091532010E-01,  3.492136398050215E-01,  2.629544863802744E-02, -1.122337013813287E-02, -1.263069418937010E-02,  3.693011005234771E-04,
$$EOE
**************************************************************************************************************************************************************************************************
"#;

    fn range() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn envelope(result: &str) -> String {
        serde_json::json!({
            "signature": {"version": "1.2", "source": "NASA/JPL Horizons API"},
            "result": result,
        })
        .to_string()
    }

    #[test]
    fn vector_table_parses_into_ordered_samples() {
        let samples =
            parse_response(&envelope(TABLE), Frame::HeliocentricEclipticJ2000, "-96", &range())
                .unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].epoch < samples[1].epoch);
        let first = &samples[0];
        assert_eq!(first.frame, Frame::HeliocentricEclipticJ2000);
        assert_eq!(first.length_unit, LengthUnit::Au);
        assert_eq!(first.velocity_unit, VelocityUnit::AuPerDay);
        assert!((first.position[0] + 0.402_147_035_392_746_2).abs() < 1e-15);
        assert!((first.velocity.unwrap()[2] - 3.694_516_301_584_906e-4).abs() < 1e-18);
        let midnight = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!((seconds_between(&midnight, &first.epoch) + 69.184).abs() < 0.01);
        assert!((seconds_between(&samples[0].epoch, &samples[1].epoch) - 3_600.0).abs() < 0.01);
    }

    #[test]
    fn missing_ephemeris_maps_to_no_data() {
        let result = "No ephemeris for target \"Parker Solar Probe (spacecraft)\" prior to A.D. 2018-AUG-12 08:15:00.0000 TDB";
        let err = parse_response(&envelope(result), Frame::HeliocentricEclipticJ2000, "-96", &range())
            .unwrap_err();
        assert!(matches!(err, SourceError::NoDataForRange { ref target, .. } if target == "-96"));

        let empty = "$$SOE\n$$EOE\n";
        assert!(matches!(
            parse_vector_table(empty, Frame::HeliocentricEclipticJ2000, "-96", &range()),
            Err(SourceError::NoDataForRange { .. })
        ));
    }

    #[test]
    fn service_errors_and_garbage_are_reported() {
        let error = serde_json::json!({"error": "Cannot interpret date. Type \"?!\" for help."})
            .to_string();
        assert!(matches!(
            parse_response(&error, Frame::HeliocentricEclipticJ2000, "-96", &range()),
            Err(SourceError::DataSourceUnavailable { service: "horizons", .. })
        ));
        assert!(matches!(
            parse_response("<html>502</html>", Frame::HeliocentricEclipticJ2000, "-96", &range()),
            Err(SourceError::Malformed { .. })
        ));
        let bad_row = "$$SOE\n2460342.5, A.D. 2024-Feb-01, abc, 0.0, 0.0,\n$$EOE";
        assert!(matches!(
            parse_vector_table(bad_row, Frame::HeliocentricEclipticJ2000, "-96", &range()),
            Err(SourceError::Malformed { .. })
        ));
    }

    #[test]
    fn rows_without_velocity_keep_positions() {
        let table = "$$SOE\n2460342.5, A.D. 2024-Feb-01 00:00:00.0000, 1.0, 0.5, 0.0,\n$$EOE";
        let samples =
            parse_vector_table(table, Frame::HeliocentricEquatorialJ2000, "399", &range()).unwrap();
        assert_eq!(samples[0].position, [1.0, 0.5, 0.0]);
        assert_eq!(samples[0].velocity, None);
        assert_eq!(samples[0].frame, Frame::HeliocentricEquatorialJ2000);
    }

    #[test]
    fn native_frame_requests_are_refused_before_any_request() {
        let client =
            HorizonsClient::new("http://127.0.0.1:9", "1h", Duration::from_secs(1), 0).unwrap();
        for frame in [FrameRequest::Native(None), FrameRequest::Native(Some(Frame::Gse))] {
            assert!(matches!(
                client.fetch(&range(), "-96", &frame),
                Err(SourceError::UnsupportedRequest { service: "horizons", .. })
            ));
        }
    }
}
