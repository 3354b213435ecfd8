//! Great-circle distance between geographic coordinates.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two latitude/longitude points (degrees).
///
/// Inputs are not validated; callers are expected to reject coordinates outside
/// `[-90, 90]` / `[-180, 180]` before calling.
pub fn distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// True when the pair is a plausible WGS84 coordinate.
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_points() {
        let d = distance_m(40.7128, -74.006, 40.7128, -74.006);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn test_nyc_to_philadelphia() {
        let d = distance_m(40.7128, -74.006, 39.9526, -75.1652);
        assert!(d > 120_000.0 && d < 140_000.0, "got {}", d);
    }

    #[test]
    fn test_boston_to_washington() {
        let d = distance_m(42.3601, -71.0589, 38.9072, -77.0369);
        assert!(d > 600_000.0 && d < 660_000.0, "got {}", d);
    }

    #[test]
    fn test_roughly_one_km() {
        let d = distance_m(40.7128, -74.006, 40.7218, -74.006);
        assert!(d > 900.0 && d < 1100.0, "got {}", d);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ((40.7128, -74.006), (39.9526, -75.1652)),
            ((42.3601, -71.0589), (38.9072, -77.0369)),
            ((-33.8688, 151.2093), (51.5074, -0.1278)),
            ((0.0, 179.9), (0.0, -179.9)),
        ];
        for ((lat1, lng1), (lat2, lng2)) in pairs {
            let forward = distance_m(lat1, lng1, lat2, lng2);
            let back = distance_m(lat2, lng2, lat1, lng1);
            assert!((forward - back).abs() < 1e-6);
        }
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(is_valid_coordinate(40.7, -74.0));
        assert!(!is_valid_coordinate(91.0, 0.0));
        assert!(!is_valid_coordinate(0.0, -180.5));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
    }
}
