//! Analytic models of the heliospheric magnetic field.
//!
//! The Parker spiral follows from a constant-speed radial solar wind dragging
//! field lines anchored to a rotating Sun. Every position produced here is in the
//! heliocentric ecliptic J2000 frame with lengths in AU; field components are in nT.

pub mod current_sheet;
pub mod spiral;

pub use current_sheet::{CurrentSheetParameters, CurrentSheetSurface, SheetNode};
pub use spiral::{
    FieldComponents, ModelParameters, ParkerSpiral, Polarity, SpiralArm, SpiralCurve,
    SpiralPoint, rotation_rate_from_period_days,
};

use thiserror::Error;

/// Errors raised while validating or evaluating a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("invalid model parameters: {0}")]
    InvalidModelParameters(String),
}
