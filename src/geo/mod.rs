use crate::models::trip::GeoPoint;

/// Radius gating boarding, drop-off and trip completion.
pub const GEOFENCE_RADIUS_M: f64 = 100.0;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn distance_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_M * central_angle
}

pub fn within(a: &GeoPoint, b: &GeoPoint, threshold_m: f64) -> bool {
    distance_m(a, b) <= threshold_m
}

#[cfg(test)]
mod tests {
    use super::{distance_m, within, GEOFENCE_RADIUS_M};
    use crate::models::trip::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 53.5511,
            lng: 9.9937,
        };
        let distance = distance_m(&p, &p);
        assert!(distance < 1e-9);
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
        let distance = distance_m(&london, &paris);
        assert!((distance - 343_000.0).abs() < 5_000.0);
    }

    #[test]
    fn within_is_symmetric() {
        let a = GeoPoint {
            lat: 27.7172,
            lng: 85.3240,
        };
        let b = GeoPoint {
            lat: 27.7180,
            lng: 85.3248,
        };
        assert_eq!(
            within(&a, &b, GEOFENCE_RADIUS_M),
            within(&b, &a, GEOFENCE_RADIUS_M)
        );
    }

    #[test]
    fn identical_points_are_within_any_positive_threshold() {
        let p = GeoPoint {
            lat: 27.7172,
            lng: 85.3240,
        };
        assert!(within(&p, &p, 0.001));
        assert!(within(&p, &p, GEOFENCE_RADIUS_M));
    }

    #[test]
    fn geofence_flips_around_the_radius() {
        let base = GeoPoint {
            lat: 27.7172,
            lng: 85.3240,
        };
        // ~1 degree of latitude is 111.2 km; offset north by meters
        let offset = |meters: f64| GeoPoint {
            lat: base.lat + meters / 111_194.9,
            lng: base.lng,
        };

        assert!(within(&base, &offset(99.0), GEOFENCE_RADIUS_M));
        assert!(!within(&base, &offset(101.0), GEOFENCE_RADIUS_M));
    }
}
