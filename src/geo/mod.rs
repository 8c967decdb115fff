use serde::{Deserialize, Serialize};

use crate::error::AppError;

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Builds a point after checking both coordinates are finite and in range.
    pub fn validated(lat: f64, lng: f64) -> Result<Self, AppError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Validation(format!(
                "lat must be a number in [-90, 90], got {lat}"
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::Validation(format!(
                "lng must be a number in [-180, 180], got {lng}"
            )));
        }

        Ok(Self { lat, lng })
    }
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, haversine_km};

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 41.0082,
            lng: 28.9784,
        };
        assert!(haversine_km(&p, &p) < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint { lat: 40.0, lng: 29.0 };
        let b = GeoPoint { lat: 40.5, lng: 29.4 };
        assert!((haversine_km(&a, &b) - haversine_km(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range_and_nan_coordinates() {
        assert!(GeoPoint::validated(f64::NAN, 10.0).is_err());
        assert!(GeoPoint::validated(10.0, f64::INFINITY).is_err());
        assert!(GeoPoint::validated(91.0, 10.0).is_err());
        assert!(GeoPoint::validated(10.0, -181.0).is_err());
        assert!(GeoPoint::validated(-90.0, 180.0).is_ok());
    }
}
