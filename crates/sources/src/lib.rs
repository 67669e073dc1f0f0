//! Adapters that fetch spacecraft ephemerides and in-situ measurements.
//!
//! The rest of the workspace only sees the [`EphemerisSource`] and
//! [`MissionDataSource`] traits. Adapters own their retries and timeouts; callers
//! never retry. Every sample is tagged with the frame and units it was served in,
//! reconciliation happens downstream.

pub mod cdaweb;
pub mod horizons;
mod http;
pub mod memory;

use chrono::{DateTime, Utc};
use parker_core::samples::{EphemerisSample, FieldSample, Frame, TimeRange};
use thiserror::Error;

pub use cdaweb::CdawebClient;
pub use horizons::HorizonsClient;
pub use memory::MemorySource;

/// Failures reported by a data source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("{service} unavailable: {reason}")]
    DataSourceUnavailable {
        service: &'static str,
        reason: String,
    },
    #[error("{service} has no data for `{target}` between {start} and {stop}")]
    NoDataForRange {
        service: &'static str,
        target: String,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
    #[error("malformed {service} payload: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },
    #[error("{service} cannot serve {request}")]
    UnsupportedRequest {
        service: &'static str,
        request: String,
    },
}

impl SourceError {
    pub(crate) fn no_data(service: &'static str, target: &str, range: &TimeRange) -> Self {
        Self::NoDataForRange {
            service,
            target: target.to_string(),
            start: range.start,
            stop: range.stop,
        }
    }

    pub(crate) fn malformed(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            service,
            reason: reason.into(),
        }
    }
}

/// Frame the caller would like positions served in.
///
/// Services that can re-project (Horizons) honour the heliocentric variants.
/// Archives serve stored variables in their native frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FrameRequest {
    #[default]
    HeliocentricEcliptic,
    HeliocentricEquatorial,
    /// Keep the archive's frame; `Some` names it when the variable does not.
    Native(Option<Frame>),
}

/// An archived variable inside a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRequest {
    pub dataset: String,
    pub variable: String,
    /// Frame of the variable, when it cannot be read off the variable name.
    pub frame: Option<Frame>,
}

impl DatasetRequest {
    pub fn new(dataset: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            variable: variable.into(),
            frame: None,
        }
    }

    /// Parse a `DATASET/variable` target identifier.
    pub fn from_target(target: &str) -> Option<Self> {
        let (dataset, variable) = target.split_once('/')?;
        let (dataset, variable) = (dataset.trim(), variable.trim());
        (!dataset.is_empty() && !variable.is_empty()).then(|| Self::new(dataset, variable))
    }

    pub fn target(&self) -> String {
        format!("{}/{}", self.dataset, self.variable)
    }

    /// Frame of the stored variable: the explicit one, else the first frame token
    /// in the variable name (`mms1_mec_r_gse` is GSE). Tokens such as `j2000` or
    /// `hae` do not pin the origin and resolve to [`Frame::Other`], so such
    /// variables need an explicit frame.
    pub fn native_frame(&self) -> Frame {
        if let Some(frame) = &self.frame {
            return frame.clone();
        }
        const FRAME_TOKENS: &[&str] = &[
            "gse", "gsm", "hee", "hae", "hci", "hg", "rtn", "j2000", "gei", "geo", "sm", "dmpa",
            "bcs",
        ];
        self.variable
            .split('_')
            .find(|token| FRAME_TOKENS.contains(&token.to_ascii_lowercase().as_str()))
            .map(Frame::from_name)
            .unwrap_or_else(|| Frame::Other(self.variable.clone()))
    }
}

/// Supplies spacecraft positions over a time window.
pub trait EphemerisSource {
    /// Samples for `target_id` ordered by strictly increasing epoch.
    fn fetch(
        &self,
        range: &TimeRange,
        target_id: &str,
        frame: &FrameRequest,
    ) -> Result<Vec<EphemerisSample>, SourceError>;
}

/// Supplies in-situ field measurements over a time window.
pub trait MissionDataSource {
    /// Samples ordered by strictly increasing epoch.
    fn fetch(
        &self,
        range: &TimeRange,
        request: &DatasetRequest,
    ) -> Result<Vec<FieldSample>, SourceError>;
}

/// Sort by epoch and drop repeated epochs, keeping the first occurrence.
pub(crate) fn order_by_epoch<T>(items: &mut Vec<T>, epoch: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by_key(|item| epoch(item));
    items.dedup_by_key(|item| epoch(item));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_targets_parse_and_resolve_native_frames() {
        let request = DatasetRequest::from_target("MMS1_MEC_SRVY_L2_EPHT89D/mms1_mec_r_gse").unwrap();
        assert_eq!(request.dataset, "MMS1_MEC_SRVY_L2_EPHT89D");
        assert_eq!(request.native_frame(), Frame::Gse);
        assert_eq!(request.target(), "MMS1_MEC_SRVY_L2_EPHT89D/mms1_mec_r_gse");

        let field = DatasetRequest::new("MMS1_FGM_SRVY_L2", "mms1_fgm_b_gsm_srvy_l2");
        assert_eq!(field.native_frame(), Frame::Other("gsm".into()));

        let explicit = DatasetRequest {
            frame: Some(Frame::Hee),
            ..DatasetRequest::new("X", "position")
        };
        assert_eq!(explicit.native_frame(), Frame::Hee);
        assert_eq!(
            DatasetRequest::new("X", "xyz_j2000").native_frame(),
            Frame::Other("j2000".into())
        );
        assert_eq!(
            DatasetRequest::new("X", "pos_hae").native_frame(),
            Frame::Other("hae".into())
        );
        assert!(DatasetRequest::from_target("no-separator").is_none());
        assert!(DatasetRequest::from_target("DATASET/").is_none());
    }
}
