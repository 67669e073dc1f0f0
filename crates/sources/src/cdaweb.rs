//! NASA CDAWeb data service (CDAS REST).
//!
//! A data request returns a JSON file description pointing at a generated text
//! listing; the listing is fetched and parsed in a second request.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use parker_core::samples::{
    EphemerisSample, FieldSample, FieldUnit, FieldValue, LengthUnit, TimeRange, VelocityUnit,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::http::Fetcher;
use crate::{
    DatasetRequest, EphemerisSource, FrameRequest, MissionDataSource, SourceError, order_by_epoch,
};

pub const DEFAULT_URL: &str = "https://cdaweb.gsfc.nasa.gov/WS/cdasr/1";
const SERVICE: &str = "cdaweb";
const DATAVIEW: &str = "sp_phys";
/// CDF fill values are around -1e31.
const FILL_THRESHOLD: f64 = 1e30;
const LISTING_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub struct CdawebClient {
    fetcher: Fetcher,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DataResult {
    #[serde(default)]
    file_description: Vec<FileDescription>,
    #[serde(default)]
    status: Vec<String>,
    #[serde(default)]
    error: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileDescription {
    name: String,
}

/// One row of a text listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub epoch: DateTime<Utc>,
    pub values: Vec<f64>,
}

/// Parsed text listing: the per-column units and the rows without fill values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Listing {
    pub units: Vec<String>,
    pub rows: Vec<ListingRow>,
    /// Rows dropped because a value was a fill value.
    pub filled: usize,
}

impl CdawebClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            fetcher: Fetcher::new(SERVICE, timeout, retries)?,
            base_url: base_url.into(),
        })
    }

    fn listing(&self, range: &TimeRange, request: &DatasetRequest) -> Result<Listing, SourceError> {
        let url = format!(
            "{}/dataviews/{DATAVIEW}/datasets/{}/data/{},{}/{}",
            self.base_url.trim_end_matches('/'),
            request.dataset,
            cdas_time(&range.start),
            cdas_time(&range.stop),
            request.variable,
        );
        info!(dataset = %request.dataset, variable = %request.variable, "requesting CDAWeb listing");
        let description = self
            .fetcher
            .get(&url, &[("format", "text".to_string())], "application/json")?;
        let files = file_urls(&description, &request.target(), range)?;

        let mut listing = Listing::default();
        for file in files {
            let text = self.fetcher.get(&file, &[], "text/plain")?;
            let part = parse_listing(&text)?;
            if listing.units.is_empty() {
                listing.units = part.units;
            }
            listing.rows.extend(part.rows);
            listing.filled += part.filled;
        }
        if listing.filled > 0 {
            warn!(target = %request.target(), filled = listing.filled, "dropped fill-value rows");
        }
        listing.rows.retain(|row| range.contains(&row.epoch));
        order_by_epoch(&mut listing.rows, |row| row.epoch);
        if listing.rows.is_empty() {
            return Err(SourceError::no_data(SERVICE, &request.target(), range));
        }
        debug!(target = %request.target(), rows = listing.rows.len(), "parsed CDAWeb listing");
        Ok(listing)
    }
}

impl EphemerisSource for CdawebClient {
    fn fetch(
        &self,
        range: &TimeRange,
        target_id: &str,
        frame: &FrameRequest,
    ) -> Result<Vec<EphemerisSample>, SourceError> {
        let mut request =
            DatasetRequest::from_target(target_id).ok_or_else(|| SourceError::UnsupportedRequest {
                service: SERVICE,
                request: format!("target `{target_id}` (expected DATASET/variable)"),
            })?;
        match frame {
            FrameRequest::Native(explicit) => request.frame = explicit.clone(),
            other => {
                return Err(SourceError::UnsupportedRequest {
                    service: SERVICE,
                    request: format!("re-projection to {other:?}"),
                });
            }
        }
        let listing = self.listing(range, &request)?;
        listing_to_positions(&listing, &request)
    }
}

impl MissionDataSource for CdawebClient {
    fn fetch(
        &self,
        range: &TimeRange,
        request: &DatasetRequest,
    ) -> Result<Vec<FieldSample>, SourceError> {
        let listing = self.listing(range, request)?;
        listing_to_fields(&listing, request)
    }
}

fn cdas_time(epoch: &DateTime<Utc>) -> String {
    epoch.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Extract listing URLs from a CDAS data-result document.
pub fn file_urls(body: &str, target: &str, range: &TimeRange) -> Result<Vec<String>, SourceError> {
    let result: DataResult = serde_json::from_str(body)
        .map_err(|err| SourceError::malformed(SERVICE, format!("invalid data result: {err}")))?;
    if !result.error.is_empty() {
        return Err(SourceError::DataSourceUnavailable {
            service: SERVICE,
            reason: result.error.join("; "),
        });
    }
    if result.file_description.is_empty() {
        if !result.status.is_empty() {
            debug!(status = %result.status.join("; "), "CDAWeb returned no files");
        }
        return Err(SourceError::no_data(SERVICE, target, range));
    }
    Ok(result.file_description.into_iter().map(|f| f.name).collect())
}

/// Parse a CDAWeb text listing.
///
/// Comment lines start with `#`. The units row starts with the literal
/// `dd-mm-yyyy hh:mm:ss.mmm` template; data rows start with a timestamp in that
/// format followed by whitespace-separated values.
pub fn parse_listing(text: &str) -> Result<Listing, SourceError> {
    let mut listing = Listing::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(date), Some(time)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        if date == "dd-mm-yyyy" {
            listing.units = tokens.map(str::to_string).collect();
            continue;
        }
        if !looks_like_date(date) {
            continue;
        }
        let epoch = NaiveDateTime::parse_from_str(&format!("{date} {time}"), LISTING_TIME_FORMAT)
            .map_err(|err| SourceError::malformed(SERVICE, format!("bad timestamp `{date} {time}`: {err}")))?
            .and_utc();
        let values = tokens
            .map(|token| {
                token
                    .parse::<f64>()
                    .map_err(|_| SourceError::malformed(SERVICE, format!("`{token}` is not a number")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() {
            return Err(SourceError::malformed(SERVICE, format!("row at {epoch} has no values")));
        }
        if values.iter().any(|v| !v.is_finite() || v.abs() >= FILL_THRESHOLD) {
            listing.filled += 1;
            continue;
        }
        listing.rows.push(ListingRow { epoch, values });
    }
    Ok(listing)
}

fn looks_like_date(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            2 | 5 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

fn first_unit(listing: &Listing, target: &str) -> Result<String, SourceError> {
    listing
        .units
        .first()
        .cloned()
        .ok_or_else(|| SourceError::malformed(SERVICE, format!("listing for `{target}` has no units row")))
}

/// Positions from a listing whose first three columns are X, Y, Z.
pub fn listing_to_positions(
    listing: &Listing,
    request: &DatasetRequest,
) -> Result<Vec<EphemerisSample>, SourceError> {
    let target = request.target();
    let length_unit = LengthUnit::from_name(&first_unit(listing, &target)?);
    let frame = request.native_frame();
    listing
        .rows
        .iter()
        .map(|row| match row.values.as_slice() {
            [x, y, z, ..] => Ok(EphemerisSample {
                epoch: row.epoch,
                position: [*x, *y, *z],
                velocity: None,
                frame: frame.clone(),
                length_unit: length_unit.clone(),
                velocity_unit: VelocityUnit::KmPerSecond,
            }),
            _ => Err(SourceError::malformed(
                SERVICE,
                format!("`{target}` row at {} has fewer than 3 components", row.epoch),
            )),
        })
        .collect()
}

/// Field samples from a listing: three or more columns are a vector (extra
/// columns such as a magnitude are ignored), a single column is a scalar.
pub fn listing_to_fields(
    listing: &Listing,
    request: &DatasetRequest,
) -> Result<Vec<FieldSample>, SourceError> {
    let target = request.target();
    let unit = FieldUnit::from_name(&first_unit(listing, &target)?);
    let frame = request.native_frame();
    listing
        .rows
        .iter()
        .map(|row| {
            let value = match row.values.as_slice() {
                [x, y, z, ..] => FieldValue::Vector([*x, *y, *z]),
                [scalar] => FieldValue::Scalar(*scalar),
                _ => {
                    return Err(SourceError::malformed(
                        SERVICE,
                        format!("`{target}` row at {} has 2 components", row.epoch),
                    ));
                }
            };
            Ok(FieldSample {
                epoch: row.epoch,
                value,
                unit: unit.clone(),
                frame: frame.clone(),
                instrument: request.dataset.clone(),
            })
        })
        .collect()
}
