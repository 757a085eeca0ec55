//! Great-circle distance for location filters.

use super::types::GeoPoint;

/// Mean Earth radius in kilometres
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometres.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Whether `point` lies within `radius_km` of `center`.
pub fn within_radius(center: GeoPoint, point: GeoPoint, radius_km: f64) -> bool {
    distance_km(center, point) <= radius_km
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = GeoPoint::new(52.52, 13.405);
        assert!(distance_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn test_known_distance_berlin_paris() {
        let berlin = GeoPoint::new(52.5200, 13.4050);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let d = distance_km(berlin, paris);
        // ~878 km
        assert!((d - 878.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn test_within_radius() {
        let center = GeoPoint::new(40.7128, -74.0060);
        let near = GeoPoint::new(40.7306, -73.9352); // ~6 km
        assert!(within_radius(center, near, 10.0));
        assert!(!within_radius(center, near, 3.0));
    }
}
