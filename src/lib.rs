//! Parker spiral overlay.
//!
//! Evaluates the analytic Parker spiral model of the interplanetary magnetic
//! field, brings spacecraft trajectories from JPL Horizons and CDAWeb into the
//! heliocentric ecliptic J2000 AU frame, and renders everything into one static
//! 3D image. The member crates do the work; [`pipeline`] wires them together for
//! the `parker_overlay` binary.

pub mod pipeline;

pub use parker_config;
pub use parker_core;
pub use parker_frames;
pub use parker_model;
pub use parker_render;
pub use parker_scene;
pub use parker_sources;
