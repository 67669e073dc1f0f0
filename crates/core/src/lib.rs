//! Core units, constants, and shared primitives for the Parker spiral overlay workspace.

/// Physical constants expressed in SI-derived units (unless stated otherwise).
pub mod constants {
    /// Kilometres per astronomical unit.
    pub const AU_KM: f64 = 149_597_870.7;
    /// Seconds per Julian day.
    pub const SECONDS_PER_DAY: f64 = 86_400.0;
    /// Mean Earth radius used by magnetospheric datasets (km).
    pub const EARTH_RADIUS_KM: f64 = 6_371.2;
    /// Julian date of the J2000 epoch (2000-01-01 12:00 TT).
    pub const J2000_JD: f64 = 2_451_545.0;
    /// Days per Julian century.
    pub const DAYS_PER_CENTURY: f64 = 36_525.0;
    /// TT − UTC offset valid since 2017 (s); TDB is treated as TT.
    pub const TT_MINUS_UTC_SECONDS: f64 = 69.184;
    /// TT − UTC offset at the J2000 epoch (s).
    pub const TT_MINUS_UTC_AT_J2000_SECONDS: f64 = 64.184;
    /// Ecliptic obliquity at J2000 (rad), matching JPL Horizons.
    pub const OBLIQUITY_J2000: f64 = 0.409_092_804_222_328_97;
}

/// Basic unit conversion helpers.
pub mod units {
    use super::constants::{AU_KM, EARTH_RADIUS_KM, SECONDS_PER_DAY};

    /// Convert kilometres to astronomical units.
    #[inline]
    pub fn km_to_au(v: f64) -> f64 {
        v / AU_KM
    }

    /// Convert astronomical units to kilometres.
    #[inline]
    pub fn au_to_km(v: f64) -> f64 {
        v * AU_KM
    }

    /// Convert metres to kilometres.
    #[inline]
    pub fn m_to_km(v: f64) -> f64 {
        v / 1_000.0
    }

    /// Convert Earth radii to kilometres.
    #[inline]
    pub fn earth_radii_to_km(v: f64) -> f64 {
        v * EARTH_RADIUS_KM
    }

    /// Convert AU/day to km/s.
    #[inline]
    pub fn au_per_day_to_km_s(v: f64) -> f64 {
        v * AU_KM / SECONDS_PER_DAY
    }
}

/// Time helpers shared across crates.
pub mod time {
    use chrono::{DateTime, Duration, Utc};

    use super::constants::{
        J2000_JD, SECONDS_PER_DAY, TT_MINUS_UTC_AT_J2000_SECONDS, TT_MINUS_UTC_SECONDS,
    };

    /// Convert days to seconds.
    #[inline]
    pub fn days_to_seconds(days: f64) -> f64 {
        days * SECONDS_PER_DAY
    }

    /// Convert seconds to days.
    #[inline]
    pub fn seconds_to_days(seconds: f64) -> f64 {
        seconds / SECONDS_PER_DAY
    }

    /// The J2000 epoch (2000-01-01 12:00 TT) expressed in UTC.
    pub fn j2000_utc() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(946_727_935_816).unwrap_or_default()
    }

    /// Julian date (UTC scale) of a UTC instant.
    pub fn julian_date(epoch: &DateTime<Utc>) -> f64 {
        2_440_587.5 + seconds_to_days(epoch.timestamp_millis() as f64 / 1_000.0)
    }

    /// Convert a TDB Julian date (as returned by JPL Horizons) into a UTC instant.
    ///
    /// TDB is treated as TT; leap seconds are taken as the current TT − UTC offset.
    pub fn tdb_julian_to_utc(jd_tdb: f64) -> Option<DateTime<Utc>> {
        let tt_seconds = days_to_seconds(jd_tdb - J2000_JD);
        if !tt_seconds.is_finite() {
            return None;
        }
        let leap_since_j2000 = TT_MINUS_UTC_SECONDS - TT_MINUS_UTC_AT_J2000_SECONDS;
        Some(offset_seconds(&j2000_utc(), tt_seconds - leap_since_j2000))
    }

    /// Signed seconds elapsed from `from` to `to` (millisecond resolution).
    pub fn seconds_between(from: &DateTime<Utc>, to: &DateTime<Utc>) -> f64 {
        (*to - *from).num_milliseconds() as f64 / 1_000.0
    }

    /// Offset an instant by a fractional number of seconds.
    pub fn offset_seconds(epoch: &DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
        *epoch + Duration::milliseconds((seconds * 1_000.0).round() as i64)
    }
}

/// Minimal vector helpers to avoid ad-hoc `[f64; 3]` math everywhere.
pub mod vector {
    /// Alias for a 3D vector in AU, km, or km/s depending on context.
    pub type Vector3 = [f64; 3];

    /// Euclidean norm of a vector.
    #[inline]
    pub fn norm(v: &Vector3) -> f64 {
        dot(v, v).sqrt()
    }

    /// Dot product of two vectors.
    #[inline]
    pub fn dot(a: &Vector3, b: &Vector3) -> f64 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    /// Cross product of two vectors.
    #[inline]
    pub fn cross(a: &Vector3, b: &Vector3) -> Vector3 {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    /// Vector addition.
    #[inline]
    pub fn add(a: &Vector3, b: &Vector3) -> Vector3 {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }

    /// Vector subtraction.
    #[inline]
    pub fn sub(a: &Vector3, b: &Vector3) -> Vector3 {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    /// Scale a vector by a scalar.
    #[inline]
    pub fn scale(v: &Vector3, s: f64) -> Vector3 {
        [v[0] * s, v[1] * s, v[2] * s]
    }

    /// Unit vector in the direction of `v`, or `None` for a zero-length input.
    #[inline]
    pub fn normalize(v: &Vector3) -> Option<Vector3> {
        let n = norm(v);
        if n > 0.0 && n.is_finite() {
            Some(scale(v, 1.0 / n))
        } else {
            None
        }
    }

    /// Linear interpolation between `a` and `b` with `t` in `[0, 1]`.
    #[inline]
    pub fn lerp(a: &Vector3, b: &Vector3, t: f64) -> Vector3 {
        add(a, &scale(&sub(b, a), t))
    }

    /// Rotate `v` about the +X axis by `angle` radians.
    #[inline]
    pub fn rotate_x(v: &Vector3, angle: f64) -> Vector3 {
        let (s, c) = angle.sin_cos();
        [v[0], c * v[1] - s * v[2], s * v[1] + c * v[2]]
    }

    /// Rotate `v` about the +Z axis by `angle` radians.
    #[inline]
    pub fn rotate_z(v: &Vector3, angle: f64) -> Vector3 {
        let (s, c) = angle.sin_cos();
        [c * v[0] - s * v[1], s * v[0] + c * v[1], v[2]]
    }

    /// True when every component is finite.
    #[inline]
    pub fn is_finite(v: &Vector3) -> bool {
        v.iter().all(|c| c.is_finite())
    }
}

/// Time-ordered records exchanged between the data adapters and the core.
pub mod samples {
    use chrono::{DateTime, Utc};

    use super::vector::Vector3;

    /// Reference frame a sample is expressed in.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Frame {
        /// Sun-centred, ecliptic and equinox of J2000.
        HeliocentricEclipticJ2000,
        /// Sun-centred, Earth mean equator and equinox of J2000.
        HeliocentricEquatorialJ2000,
        /// Geocentric solar ecliptic: X toward the Sun, Z ecliptic north.
        Gse,
        /// Heliocentric Earth ecliptic: X toward the Earth, Z ecliptic north.
        Hee,
        /// Sun-centred frame rotating about ecliptic north, aligned with the
        /// ecliptic frame at `reference`.
        SolarCorotating {
            reference: DateTime<Utc>,
            rate_rad_s: f64,
        },
        /// Any frame the core does not know how to convert.
        Other(String),
    }

    impl Frame {
        /// Resolve a frame identifier as used by the archives (case-insensitive).
        ///
        /// Names that fix only the axes (`J2000`, `ICRF`, `GEI`) or an ecliptic of
        /// date (`HAE`) say nothing reliable about the origin, so they stay `Other`.
        pub fn from_name(name: &str) -> Self {
            match name.trim().to_ascii_uppercase().as_str() {
                "ECLIPJ2000" | "HELIOCENTRIC_ECLIPTIC" => Self::HeliocentricEclipticJ2000,
                "HCRF" | "HELIOCENTRIC_EQUATORIAL" => {
                    Self::HeliocentricEquatorialJ2000
                }
                "GSE" => Self::Gse,
                "HEE" => Self::Hee,
                _ => Self::Other(name.trim().to_string()),
            }
        }

        pub fn label(&self) -> String {
            match self {
                Self::HeliocentricEclipticJ2000 => "ECLIPJ2000".to_string(),
                Self::HeliocentricEquatorialJ2000 => "HELIOCENTRIC_EQUATORIAL".to_string(),
                Self::Gse => "GSE".to_string(),
                Self::Hee => "HEE".to_string(),
                Self::SolarCorotating { rate_rad_s, .. } => {
                    format!("COROTATING({rate_rad_s:e} rad/s)")
                }
                Self::Other(name) => name.clone(),
            }
        }
    }

    /// Unit of a position vector.
    #[derive(Debug, Clone, PartialEq)]
    pub enum LengthUnit {
        Au,
        Km,
        M,
        EarthRadii,
        Other(String),
    }

    impl LengthUnit {
        pub fn from_name(name: &str) -> Self {
            match name.trim().to_ascii_lowercase().as_str() {
                "au" => Self::Au,
                "km" => Self::Km,
                "m" => Self::M,
                "re" | "earth_radii" => Self::EarthRadii,
                _ => Self::Other(name.trim().to_string()),
            }
        }
    }

    /// Unit of a velocity vector.
    #[derive(Debug, Clone, PartialEq)]
    pub enum VelocityUnit {
        KmPerSecond,
        AuPerDay,
        MPerSecond,
        Other(String),
    }

    impl VelocityUnit {
        pub fn from_name(name: &str) -> Self {
            match name.trim().to_ascii_lowercase().as_str() {
                "km/s" => Self::KmPerSecond,
                "au/d" | "au/day" => Self::AuPerDay,
                "m/s" => Self::MPerSecond,
                _ => Self::Other(name.trim().to_string()),
            }
        }
    }

    /// Unit of a magnetic field value.
    #[derive(Debug, Clone, PartialEq)]
    pub enum FieldUnit {
        Nanotesla,
        Tesla,
        Gauss,
        Other(String),
    }

    impl FieldUnit {
        pub fn from_name(name: &str) -> Self {
            match name.trim().to_ascii_lowercase().as_str() {
                "nt" => Self::Nanotesla,
                "t" => Self::Tesla,
                "g" | "gauss" => Self::Gauss,
                _ => Self::Other(name.trim().to_string()),
            }
        }
    }

    /// Closed time window `[start, stop]`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimeRange {
        pub start: DateTime<Utc>,
        pub stop: DateTime<Utc>,
    }

    impl TimeRange {
        /// Returns `None` unless `start` precedes `stop`.
        pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Option<Self> {
            (start < stop).then_some(Self { start, stop })
        }

        pub fn contains(&self, epoch: &DateTime<Utc>) -> bool {
            (self.start..=self.stop).contains(epoch)
        }
    }

    /// Spacecraft position (and optionally velocity) at one epoch.
    #[derive(Debug, Clone, PartialEq)]
    pub struct EphemerisSample {
        pub epoch: DateTime<Utc>,
        pub position: Vector3,
        pub velocity: Option<Vector3>,
        pub frame: Frame,
        pub length_unit: LengthUnit,
        pub velocity_unit: VelocityUnit,
    }

    /// Vector or scalar field value.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum FieldValue {
        Vector(Vector3),
        Scalar(f64),
    }

    impl FieldValue {
        pub fn magnitude(&self) -> f64 {
            match self {
                Self::Vector(v) => super::vector::norm(v),
                Self::Scalar(s) => s.abs(),
            }
        }
    }

    /// In-situ field measurement at one epoch.
    #[derive(Debug, Clone, PartialEq)]
    pub struct FieldSample {
        pub epoch: DateTime<Utc>,
        pub value: FieldValue,
        pub unit: FieldUnit,
        pub frame: Frame,
        pub instrument: String,
    }
}
