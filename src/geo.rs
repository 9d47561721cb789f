//! Geographic points and great-circle distances.
//!
//! Distances are computed on the sphere PostGIS uses for `geography` values when
//! `use_spheroid = false` (the WGS84 mean radius), so a distance computed here agrees with
//! one computed by `ST_Distance(a, b, false)` in the database.

use crate::error::{AppError, AppResult};

/// WGS84 mean radius `(2a + b) / 3`, the sphere PostGIS uses for non-spheroidal geography
/// distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.771_4;

/// Search radius applied when a nearby query does not specify one.
pub const DEFAULT_NEARBY_RADIUS_METERS: f64 = 10_000.0;

/// Coordinates
///
/// A WGS84 point that is known to be in range. The only way to build one is `new`,
/// so anything holding a `Coordinates` never needs to re-check the bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    /// Validates latitude ∈ [-90, 90] and longitude ∈ [-180, 180]; both bounds inclusive.
    pub fn new(latitude: f64, longitude: f64) -> AppResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::validation("Latitude must be between -90 and 90"));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::validation(
                "Longitude must be between -180 and 180",
            ));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance to `other`, in meters.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        haversine_distance(self, other)
    }
}

/// Haversine distance in meters between two points on a sphere of `EARTH_RADIUS_METERS`.
pub fn haversine_distance(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    // Clamp guards against h drifting past 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Validates a nearby-search radius, applying the default when absent.
pub fn search_radius(radius: Option<f64>) -> AppResult<f64> {
    match radius {
        None => Ok(DEFAULT_NEARBY_RADIUS_METERS),
        Some(r) if r.is_finite() && r > 0.0 => Ok(r),
        Some(_) => Err(AppError::validation(
            "Radius must be a positive number of meters",
        )),
    }
}
