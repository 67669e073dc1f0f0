//! Warped heliospheric current sheet carried out by the Parker spiral.
//!
//! The sheet is a tilted, sinusoidally undulating surface whose azimuth is twisted
//! with radius by the same winding rate as the spiral arms. Each node carries the
//! field magnitude normalised so that B ≈ 1 near 1 AU.

use std::f64::consts::{FRAC_PI_2, TAU};

use parker_core::vector::Vector3;

use crate::ModelError;
use crate::spiral::ParkerSpiral;

/// Shape of the warped sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSheetParameters {
    /// Tilt of the sheet against the ecliptic (deg).
    pub tilt_deg: f64,
    /// Undulation amplitude in polar angle (deg).
    pub amplitude_deg: f64,
    pub radial_nodes: usize,
    pub azimuth_nodes: usize,
}

impl Default for CurrentSheetParameters {
    fn default() -> Self {
        Self {
            tilt_deg: 10.0,
            amplitude_deg: 15.0,
            radial_nodes: 40,
            azimuth_nodes: 60,
        }
    }
}

impl CurrentSheetParameters {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.tilt_deg.is_finite() || !self.amplitude_deg.is_finite() {
            return Err(ModelError::InvalidModelParameters(
                "current sheet tilt and amplitude must be finite".to_string(),
            ));
        }
        if self.tilt_deg.abs() + self.amplitude_deg.abs() >= 90.0 {
            return Err(ModelError::InvalidModelParameters(format!(
                "current sheet tilt + amplitude must stay below 90 deg (got {} + {})",
                self.tilt_deg, self.amplitude_deg
            )));
        }
        if self.radial_nodes < 2 || self.azimuth_nodes < 3 {
            return Err(ModelError::InvalidModelParameters(
                "current sheet grid needs at least 2 radial and 3 azimuth nodes".to_string(),
            ));
        }
        Ok(())
    }
}

/// One node of the sheet mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetNode {
    pub position_au: Vector3,
    pub normalized_field: f64,
}

/// Sampled sheet surface, stored azimuth-major.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentSheetSurface {
    pub radial_nodes: usize,
    pub azimuth_nodes: usize,
    pub nodes: Vec<SheetNode>,
}

impl CurrentSheetSurface {
    /// Compute the sheet for the spiral's wind speed, rotation rate, and radial range.
    pub fn compute(
        spiral: &ParkerSpiral,
        sheet: &CurrentSheetParameters,
    ) -> Result<Self, ModelError> {
        sheet.validate()?;
        let params = spiral.parameters();
        let tilt = sheet.tilt_deg.to_radians();
        let amplitude = sheet.amplitude_deg.to_radians();
        let alpha = params.winding_rad_per_au();
        let b0_norm = 1.0 / (1.0 + (alpha * tilt.cos()).powi(2)).sqrt();

        let inner = params.r_min_au.max(params.reference_radius_au);
        let outer = params.r_max_au;
        let radii: Vec<f64> = (0..sheet.radial_nodes)
            .map(|i| inner + (outer - inner) * i as f64 / (sheet.radial_nodes - 1) as f64)
            .collect();

        let mut nodes = Vec::with_capacity(sheet.radial_nodes * sheet.azimuth_nodes);
        for j in 0..sheet.azimuth_nodes {
            let phi = TAU * j as f64 / (sheet.azimuth_nodes - 1) as f64;
            let theta = (FRAC_PI_2 - tilt) + amplitude * (2.0 * phi).sin();
            let (sin_theta, cos_theta) = theta.sin_cos();
            for &r in &radii {
                let twisted = phi - spiral.azimuthal_offset(r);
                let (sin_phi, cos_phi) = twisted.sin_cos();
                let winding = alpha * r * sin_theta;
                nodes.push(SheetNode {
                    position_au: [
                        r * sin_theta * cos_phi,
                        r * sin_theta * sin_phi,
                        r * cos_theta,
                    ],
                    normalized_field: b0_norm / (r * r) * (1.0 + winding * winding).sqrt(),
                });
            }
        }

        Ok(Self {
            radial_nodes: sheet.radial_nodes,
            azimuth_nodes: sheet.azimuth_nodes,
            nodes,
        })
    }

    pub fn node(&self, azimuth_idx: usize, radial_idx: usize) -> Option<&SheetNode> {
        if radial_idx >= self.radial_nodes {
            return None;
        }
        self.nodes.get(azimuth_idx * self.radial_nodes + radial_idx)
    }

    /// Minimum and maximum normalised field over the surface.
    pub fn field_range(&self) -> Option<(f64, f64)> {
        self.nodes.iter().map(|n| n.normalized_field).fold(None, |acc, b| match acc {
            None => Some((b, b)),
            Some((lo, hi)) => Some((lo.min(b), hi.max(b))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spiral::ModelParameters;
    use parker_core::vector;

    fn spiral() -> ParkerSpiral {
        ParkerSpiral::new(ModelParameters::default()).expect("default parameters are valid")
    }

    #[test]
    fn surface_has_expected_node_count_and_radii() {
        let sheet = CurrentSheetParameters {
            radial_nodes: 5,
            azimuth_nodes: 7,
            ..CurrentSheetParameters::default()
        };
        let surface = CurrentSheetSurface::compute(&spiral(), &sheet).unwrap();
        assert_eq!(surface.nodes.len(), 35);
        let first = surface.node(0, 0).unwrap();
        let last = surface.node(6, 4).unwrap();
        assert!((vector::norm(&first.position_au) - 0.1).abs() < 1e-12);
        assert!((vector::norm(&last.position_au) - 1.5).abs() < 1e-12);
        assert!(surface.node(0, 5).is_none());
    }

    #[test]
    fn normalized_field_is_near_unity_at_one_au() {
        let spiral = ParkerSpiral::new(ModelParameters {
            r_min_au: 0.1,
            r_max_au: 1.9,
            ..ModelParameters::default()
        })
        .unwrap();
        let sheet = CurrentSheetParameters {
            tilt_deg: 0.0,
            amplitude_deg: 0.0,
            radial_nodes: 10,
            azimuth_nodes: 4,
        };
        let surface = CurrentSheetSurface::compute(&spiral, &sheet).unwrap();
        let at_one_au = surface.node(0, 5).unwrap();
        assert!((vector::norm(&at_one_au.position_au) - 1.1).abs() < 1e-12);
        let (lo, hi) = surface.field_range().unwrap();
        assert!(lo > 0.0 && hi > lo);
        // Flat sheet: B(r) = r⁻² sqrt(1 + (α r)²) / sqrt(1 + α²), equal to 1 at 1 AU.
        let b_1 = (1.0 + (spiral.parameters().winding_rad_per_au() * 1.1).powi(2)).sqrt()
            / (1.0 + spiral.parameters().winding_rad_per_au().powi(2)).sqrt()
            / (1.1 * 1.1);
        assert!((at_one_au.normalized_field - b_1).abs() < 1e-12);
    }

    #[test]
    fn excessive_tilt_is_rejected() {
        let sheet = CurrentSheetParameters {
            tilt_deg: 60.0,
            amplitude_deg: 35.0,
            ..CurrentSheetParameters::default()
        };
        assert!(CurrentSheetSurface::compute(&spiral(), &sheet).is_err());
    }
}
