//! Small-area geodesy helpers for the simulated providers.
//!
//! Equirectangular approximation: fine for the few-kilometer legs the
//! simulators walk, not for transcontinental routes.

/// Meters per degree of latitude.
const M_PER_DEG_LAT: f64 = 111_320.0;

fn m_per_deg_lon(lat: f64) -> f64 {
    M_PER_DEG_LAT * lat.to_radians().cos()
}

/// Horizontal distance in meters between two lat/lon pairs (degrees).
pub fn distance_m(from: (f64, f64), to: (f64, f64)) -> f64 {
    let mid_lat = (from.0 + to.0) / 2.0;
    let dy = (to.0 - from.0) * M_PER_DEG_LAT;
    let dx = (to.1 - from.1) * m_per_deg_lon(mid_lat);
    dx.hypot(dy)
}

/// Initial bearing from one point toward another, degrees in [0, 360).
pub fn bearing_deg(from: (f64, f64), to: (f64, f64)) -> f64 {
    let mid_lat = (from.0 + to.0) / 2.0;
    let dy = (to.0 - from.0) * M_PER_DEG_LAT;
    let dx = (to.1 - from.1) * m_per_deg_lon(mid_lat);
    dx.atan2(dy).to_degrees().rem_euclid(360.0)
}

/// Moves `step_m` meters from `from` toward `to`. Lands exactly on `to`
/// when the step overshoots.
pub fn step_towards(from: (f64, f64), to: (f64, f64), step_m: f64) -> (f64, f64) {
    let total = distance_m(from, to);
    if total <= step_m || total == 0.0 {
        return to;
    }
    let fraction = step_m / total;
    (
        from.0 + (to.0 - from.0) * fraction,
        from.1 + (to.1 - from.1) * fraction,
    )
}

/// Offsets a point by the given north/east displacement in meters.
pub fn offset_m(point: (f64, f64), north_m: f64, east_m: f64) -> (f64, f64) {
    (
        point.0 + north_m / M_PER_DEG_LAT,
        point.1 + east_m / m_per_deg_lon(point.0),
    )
}
