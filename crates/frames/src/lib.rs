//! Frame and unit reconciliation.
//!
//! Every point handed to the scene is expressed in one canonical system:
//! heliocentric ecliptic J2000 (Sun at the origin, X toward the J2000 equinox,
//! Z toward ecliptic north), positions in AU, velocities in km/s, epochs in UTC.
//! Samples that cannot be brought into that system are rejected, never passed
//! through unconverted.

pub mod earth;
pub mod reconcile;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use earth::{AnalyticEarth, EarthEphemeris, SampledEarth};
pub use reconcile::{ReconciledPoint, Reconciler};

/// Human-readable name of the canonical system, used in plot axes and logs.
pub const CANONICAL_FRAME: &str = "Heliocentric ecliptic J2000 (AU)";

/// Reasons a sample cannot be reconciled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    #[error("unsupported reference frame `{frame}`")]
    UnsupportedFrame { frame: String },
    #[error("unsupported {quantity} unit `{unit}`")]
    UnsupportedUnits {
        unit: String,
        quantity: &'static str,
    },
    #[error("frame `{frame}` needs an Earth ephemeris but none was supplied")]
    MissingEarthContext { frame: String },
    #[error("Earth ephemeris does not cover {epoch}")]
    EarthOutOfRange { epoch: DateTime<Utc> },
}
