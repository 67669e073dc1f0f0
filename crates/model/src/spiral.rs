//! Parker spiral field-line geometry and field components.

use std::f64::consts::TAU;

use parker_core::constants::{AU_KM, SECONDS_PER_DAY};
use parker_core::vector::{self, Vector3};
use tracing::debug;

use crate::ModelError;

/// Magnetic polarity of the sector the field lines belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Field points away from the Sun.
    Outward,
    /// Field points toward the Sun.
    Inward,
}

impl Polarity {
    fn sign(self) -> f64 {
        match self {
            Self::Outward => 1.0,
            Self::Inward => -1.0,
        }
    }
}

/// Sidereal solar rotation rate (rad/s) for a rotation period in days.
pub fn rotation_rate_from_period_days(period_days: f64) -> f64 {
    TAU / (period_days * SECONDS_PER_DAY)
}

/// Inputs for one model evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    /// Constant radial solar wind speed (km/s).
    pub solar_wind_speed_km_s: f64,
    /// Solar angular rotation rate (rad/s).
    pub rotation_rate_rad_s: f64,
    /// Radius where the field lines are anchored and Δφ = 0 (AU).
    pub reference_radius_au: f64,
    /// Inner edge of the sampled radial range (AU).
    pub r_min_au: f64,
    /// Outer edge of the sampled radial range (AU).
    pub r_max_au: f64,
    /// Number of radial samples per arm.
    pub radial_samples: usize,
    /// First footpoint longitude (deg, ecliptic J2000).
    pub start_longitude_deg: f64,
    /// Last footpoint longitude (deg, ecliptic J2000).
    pub end_longitude_deg: f64,
    /// Number of spiral arms spread across the longitude range.
    pub arms: usize,
    /// Heliographic latitude of the arms (deg, 0 = ecliptic plane).
    pub latitude_deg: f64,
    /// Radial field magnitude at the reference radius (nT).
    pub reference_field_nt: f64,
    pub polarity: Polarity,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            solar_wind_speed_km_s: 400.0,
            rotation_rate_rad_s: 2.7e-6,
            reference_radius_au: 0.1,
            r_min_au: 0.1,
            r_max_au: 1.5,
            radial_samples: 200,
            start_longitude_deg: 0.0,
            end_longitude_deg: 360.0,
            arms: 4,
            latitude_deg: 0.0,
            reference_field_nt: 350.0,
            polarity: Polarity::Outward,
        }
    }
}

impl ModelParameters {
    /// Reject degenerate physical inputs. Nothing is clamped.
    pub fn validate(&self) -> Result<(), ModelError> {
        let finite = [
            ("solar wind speed", self.solar_wind_speed_km_s),
            ("rotation rate", self.rotation_rate_rad_s),
            ("reference radius", self.reference_radius_au),
            ("r_min", self.r_min_au),
            ("r_max", self.r_max_au),
            ("start longitude", self.start_longitude_deg),
            ("end longitude", self.end_longitude_deg),
            ("latitude", self.latitude_deg),
            ("reference field", self.reference_field_nt),
        ];
        if let Some((name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{name} must be finite (got {value})")));
        }
        if self.solar_wind_speed_km_s <= 0.0 {
            return Err(invalid(format!(
                "solar wind speed must be positive (got {} km/s)",
                self.solar_wind_speed_km_s
            )));
        }
        if self.rotation_rate_rad_s <= 0.0 {
            return Err(invalid(format!(
                "rotation rate must be positive (got {} rad/s)",
                self.rotation_rate_rad_s
            )));
        }
        if self.r_max_au < self.r_min_au {
            return Err(invalid(format!(
                "r_max ({} AU) is below r_min ({} AU)",
                self.r_max_au, self.r_min_au
            )));
        }
        if self.r_min_au < 0.0 {
            return Err(invalid(format!("r_min must not be negative (got {} AU)", self.r_min_au)));
        }
        if self.reference_radius_au <= 0.0 || self.reference_radius_au > self.r_max_au {
            return Err(invalid(format!(
                "reference radius must lie in (0, r_max] (got {} AU)",
                self.reference_radius_au
            )));
        }
        if self.radial_samples < 2 {
            return Err(invalid("at least two radial samples are required".to_string()));
        }
        if self.arms == 0 {
            return Err(invalid("at least one spiral arm is required".to_string()));
        }
        if self.latitude_deg.abs() > 90.0 {
            return Err(invalid(format!(
                "latitude must lie in [-90, 90] deg (got {})",
                self.latitude_deg
            )));
        }
        if self.reference_field_nt <= 0.0 {
            return Err(invalid(format!(
                "reference field must be positive (got {} nT); use polarity for the sign",
                self.reference_field_nt
            )));
        }
        Ok(())
    }

    /// Winding rate Ω / v in radians per AU.
    pub fn winding_rad_per_au(&self) -> f64 {
        self.rotation_rate_rad_s / self.solar_wind_speed_km_s * AU_KM
    }

    /// Footpoint longitudes (rad). A full-circle range does not repeat its endpoint.
    pub fn footpoint_longitudes(&self) -> Vec<f64> {
        let start = self.start_longitude_deg;
        let span = self.end_longitude_deg - start;
        if self.arms == 1 {
            return vec![start.to_radians()];
        }
        let full_circle = (span.abs() - 360.0).abs() < 1e-9;
        let divisor = if full_circle { self.arms } else { self.arms - 1 } as f64;
        (0..self.arms)
            .map(|i| (start + span * i as f64 / divisor).to_radians())
            .collect()
    }

    /// Radial grid (AU). Starts at the reference radius whenever it lies inside the range.
    pub fn radial_grid(&self) -> Vec<f64> {
        let start = self.r_min_au.max(self.reference_radius_au);
        let end = self.r_max_au;
        if end <= start {
            return vec![start];
        }
        let steps = (self.radial_samples - 1) as f64;
        (0..self.radial_samples)
            .map(|i| {
                if i + 1 == self.radial_samples {
                    end
                } else {
                    start + (end - start) * i as f64 / steps
                }
            })
            .collect()
    }
}

fn invalid(reason: String) -> ModelError {
    ModelError::InvalidModelParameters(reason)
}

/// Radial and azimuthal field at one radius (nT).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldComponents {
    pub radial_nt: f64,
    pub azimuthal_nt: f64,
}

impl FieldComponents {
    pub fn magnitude_nt(&self) -> f64 {
        self.radial_nt.hypot(self.azimuthal_nt)
    }

    /// Angle between the field and the radial direction (rad).
    pub fn spiral_angle_rad(&self) -> f64 {
        (self.azimuthal_nt.abs()).atan2(self.radial_nt.abs())
    }
}

/// One sampled point of a spiral arm.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiralPoint {
    pub radius_au: f64,
    /// Lag behind the footpoint longitude, Δφ (rad).
    pub azimuthal_offset_rad: f64,
    /// Ecliptic longitude of the point (rad).
    pub longitude_rad: f64,
    pub position_au: Vector3,
    pub field: FieldComponents,
    /// Unit vector along the local field.
    pub direction: Vector3,
}

/// Field line anchored at one footpoint longitude.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiralArm {
    pub footpoint_longitude_rad: f64,
    pub points: Vec<SpiralPoint>,
}

/// The evaluated model: every arm over the radial grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SpiralCurve {
    pub parameters: ModelParameters,
    pub arms: Vec<SpiralArm>,
}

impl SpiralCurve {
    /// Iterate over every point of every arm.
    pub fn points(&self) -> impl Iterator<Item = &SpiralPoint> {
        self.arms.iter().flat_map(|arm| arm.points.iter())
    }

    pub fn len(&self) -> usize {
        self.arms.iter().map(|arm| arm.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validated Parker spiral model.
#[derive(Debug, Clone)]
pub struct ParkerSpiral {
    params: ModelParameters,
}

impl ParkerSpiral {
    pub fn new(params: ModelParameters) -> Result<Self, ModelError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    /// Azimuthal offset Δφ(r) = (Ω / v)(r − r0) in radians.
    pub fn azimuthal_offset(&self, radius_au: f64) -> f64 {
        self.params.winding_rad_per_au() * (radius_au - self.params.reference_radius_au)
    }

    /// Garden-hose angle ψ = atan(Ω r sinθ / v) in radians.
    pub fn spiral_angle(&self, radius_au: f64) -> f64 {
        self.field_at(radius_au).spiral_angle_rad()
    }

    /// Field components at `radius_au` on the model latitude:
    /// B_r ∝ 1/r², B_φ = −B_r Ω r sinθ / v.
    pub fn field_at(&self, radius_au: f64) -> FieldComponents {
        let sin_theta = self.params.latitude_deg.to_radians().cos();
        self.field_with_colatitude(radius_au, sin_theta)
    }

    /// Field components at a canonical position, using that point's own
    /// colatitude. `None` at the origin.
    pub fn field_at_position(&self, position_au: &Vector3) -> Option<FieldComponents> {
        let radius = vector::norm(position_au);
        if !(radius.is_finite() && radius > 0.0) {
            return None;
        }
        let sin_theta = position_au[0].hypot(position_au[1]) / radius;
        Some(self.field_with_colatitude(radius, sin_theta))
    }

    fn field_with_colatitude(&self, radius_au: f64, sin_theta: f64) -> FieldComponents {
        let p = &self.params;
        let ratio = p.reference_radius_au / radius_au;
        let radial_nt = p.polarity.sign() * p.reference_field_nt * ratio * ratio;
        let azimuthal_nt = -radial_nt * p.winding_rad_per_au() * radius_au * sin_theta;
        FieldComponents {
            radial_nt,
            azimuthal_nt,
        }
    }

    /// Evaluate every arm over the radial grid.
    pub fn evaluate(&self) -> SpiralCurve {
        let grid = self.params.radial_grid();
        let latitude = self.params.latitude_deg.to_radians();
        let arms: Vec<SpiralArm> = self
            .params
            .footpoint_longitudes()
            .into_iter()
            .map(|footpoint| SpiralArm {
                footpoint_longitude_rad: footpoint,
                points: grid
                    .iter()
                    .map(|&r| self.point(footpoint, latitude, r))
                    .collect(),
            })
            .collect();
        debug!(
            arms = arms.len(),
            radial_samples = grid.len(),
            "evaluated Parker spiral"
        );
        SpiralCurve {
            parameters: self.params.clone(),
            arms,
        }
    }

    fn point(&self, footpoint: f64, latitude: f64, radius_au: f64) -> SpiralPoint {
        let offset = self.azimuthal_offset(radius_au);
        // Field lines trail the prograde rotation, so longitude decreases outward.
        let longitude = footpoint - offset;
        let (sin_lon, cos_lon) = longitude.sin_cos();
        let (sin_lat, cos_lat) = latitude.sin_cos();
        let radial_hat = [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat];
        let azimuth_hat = [-sin_lon, cos_lon, 0.0];
        let field = self.field_at(radius_au);
        let b = vector::add(
            &vector::scale(&radial_hat, field.radial_nt),
            &vector::scale(&azimuth_hat, field.azimuthal_nt),
        );
        SpiralPoint {
            radius_au,
            azimuthal_offset_rad: offset,
            longitude_rad: longitude,
            position_au: vector::scale(&radial_hat, radius_au),
            field,
            direction: vector::normalize(&b).unwrap_or(radial_hat),
        }
    }
}
