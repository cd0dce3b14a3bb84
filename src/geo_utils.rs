//! Geographic utilities: haversine distance, route length, unit conversion
//! and the display formatting used by notifications and summaries.

use geo::{algorithm::simplify::Simplify, Coord, LineString};

use crate::{GpsPoint, RoutePoint};

/// Mean Earth radius used for all distance computations (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two fixes in meters.
///
/// Coordinates are not validated here; NaN inputs produce NaN.
pub fn haversine_distance(a: &RoutePoint, b: &RoutePoint) -> f64 {
    haversine_coords(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Great-circle distance between two plain coordinates in meters.
pub fn haversine_points(a: &GpsPoint, b: &GpsPoint) -> f64 {
    haversine_coords(a.latitude, a.longitude, b.latitude, b.longitude)
}

pub fn haversine_coords(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Sum of consecutive pairwise distances in meters (0 for fewer than 2 points).
pub fn total_distance(points: &[RoutePoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Average speed between two fixes in km/h.
///
/// Returns 0 when the second fix is not strictly later than the first.
pub fn speed_kmh(from: &RoutePoint, to: &RoutePoint) -> f64 {
    let dt_ms = to.timestamp_ms - from.timestamp_ms;
    if dt_ms <= 0 {
        return 0.0;
    }
    ms_to_kmh(haversine_distance(from, to) / (dt_ms as f64 / 1000.0))
}

pub fn ms_to_kmh(speed_mps: f64) -> f64 {
    speed_mps * 3.6
}

pub fn kmh_to_ms(speed_kmh: f64) -> f64 {
    speed_kmh / 3.6
}

/// Format a speed as "12.3 km/h".
pub fn format_speed(speed_kmh: f64) -> String {
    format!("{:.1} km/h", speed_kmh.max(0.0))
}

/// Format a distance as meters below 1 km, otherwise kilometers.
pub fn format_distance(distance_m: f64) -> String {
    if distance_m < 1000.0 {
        format!("{:.0} m", distance_m.max(0.0))
    } else {
        format!("{:.2} km", distance_m / 1000.0)
    }
}

/// Format a duration as "HH:MM:SS".
pub fn format_duration(duration_ms: i64) -> String {
    let total_secs = duration_ms.max(0) / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}

/// Simplify a route for map previews using Douglas-Peucker.
///
/// `tolerance_deg` is in degrees (0.0001 is roughly 11 meters).
pub fn simplify_for_display(points: &[RoutePoint], tolerance_deg: f64) -> Vec<GpsPoint> {
    let coords: Vec<Coord> = points
        .iter()
        .filter(|p| p.is_valid())
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    if coords.len() < 3 {
        return coords.iter().map(|c| GpsPoint::new(c.y, c.x)).collect();
    }

    let line = LineString::new(coords);
    line.simplify(&tolerance_deg)
        .0
        .iter()
        .map(|c| GpsPoint::new(c.y, c.x))
        .collect()
}
