//! Geographic utilities shared across Nova services
//!
//! WGS84 coordinates (standard for GPS) and great-circle distance.
//! Pure computation only; no I/O.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("invalid latitude {0}: must be between -90 and 90")]
    InvalidLatitude(f64),
    #[error("invalid longitude {0}: must be between -180 and 180")]
    InvalidLongitude(f64),
}

/// Coordinate pair (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude (-90 to 90)
    pub latitude: f64,
    /// Longitude (-180 to 180)
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::InvalidLatitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::InvalidLongitude(longitude));
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Great-circle distance between two points using the Haversine formula (kilometers)
pub fn distance_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1_rad = a.latitude.to_radians();
    let lat2_rad = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinates::new(48.8566, 2.3522).is_ok());
        assert_eq!(
            Coordinates::new(91.0, 0.0),
            Err(GeoError::InvalidLatitude(91.0))
        );
        assert_eq!(
            Coordinates::new(0.0, -181.0),
            Err(GeoError::InvalidLongitude(-181.0))
        );
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let paris = Coordinates::new(48.8566, 2.3522).unwrap();
        assert!(distance_km(&paris, &paris).abs() < TOLERANCE);
    }

    #[test]
    fn test_distance_symmetry() {
        let paris = Coordinates::new(48.8566, 2.3522).unwrap();
        let london = Coordinates::new(51.5074, -0.1278).unwrap();

        let ab = distance_km(&paris, &london);
        let ba = distance_km(&london, &paris);
        assert!((ab - ba).abs() < TOLERANCE);
    }

    #[test]
    fn test_known_distance() {
        // Paris <-> London is roughly 344 km great-circle
        let paris = Coordinates::new(48.8566, 2.3522).unwrap();
        let london = Coordinates::new(51.5074, -0.1278).unwrap();

        let d = distance_km(&paris, &london);
        assert!(d > 330.0 && d < 350.0, "unexpected distance: {}", d);
    }

    #[test]
    fn test_antipodal_distance() {
        let a = Coordinates::new(0.0, 0.0).unwrap();
        let b = Coordinates::new(0.0, 180.0).unwrap();

        // Half the earth's circumference
        let d = distance_km(&a, &b);
        assert!((d - std::f64::consts::PI * 6371.0).abs() < 1.0);
    }
}
