//! # Geographic Utilities
//!
//! Distance and unit helpers shared by the route builder, the resolver and
//! the geofence matcher.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_km`] | Great-circle distance between two points, in kilometers |
//! | [`km_to_m`] | The one km → m conversion used at the geofence boundary |
//! | [`round_km`] | Round a km value to reporting precision (10 m) |
//! | [`polyline_length_km`] | Total length of a track in kilometers |
//! | [`compute_bounds`] | Bounding box of a set of points |
//!
//! ## Haversine Formula
//!
//! ```text
//! a = sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)
//! d = 2·R·atan2(√a, √(1−a))
//! ```
//!
//! with R = 6371 km. `a` is clamped to `[0, 1]` so rounding noise on
//! identical or antipodal points never yields NaN.

use geo::{BoundingRect, Coord, LineString};
use crate::{Bounds, GeoPoint};

/// Mean Earth radius used for every distance in this crate.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Number of meters in a kilometer.
pub const METERS_PER_KM: f64 = 1000.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two points, in kilometers.
///
/// Inputs are assumed valid; callers validate at their boundary.
///
/// Hand-written rather than `geo::Haversine`, which uses a 6371.0088 km mean
/// radius; km marks here are defined against exactly [`EARTH_RADIUS_KM`].
///
/// # Example
///
/// ```rust
/// use race_route::{GeoPoint, geo_utils};
///
/// let madrid = GeoPoint::new(40.4168, -3.7038);
/// let barcelona = GeoPoint::new(41.3851, 2.1734);
///
/// let km = geo_utils::haversine_km(&madrid, &barcelona);
/// assert!((km - 504.0).abs() < 2.0);
/// ```
#[inline]
pub fn haversine_km(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlon = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Convert kilometers to meters.
///
/// Geofence radii are meters while route distances are kilometers; this is
/// the only place the two meet.
#[inline]
pub fn km_to_m(km: f64) -> f64 {
    km * METERS_PER_KM
}

/// Round a kilometer value to 2 decimals (10 m resolution).
#[inline]
pub fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

/// Total length of a polyline in kilometers. Empty or single-point input is 0.
pub fn polyline_length_km(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_km(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a set of points.
///
/// Returns `None` for empty input.
///
/// ```rust
/// use race_route::{GeoPoint, geo_utils};
///
/// let bounds = geo_utils::compute_bounds(&[
///     GeoPoint::new(51.50, -0.13),
///     GeoPoint::new(51.51, -0.12),
/// ]).unwrap();
/// assert_eq!(bounds.min_lat, 51.50);
/// assert_eq!(bounds.max_lng, -0.12);
/// ```
pub fn compute_bounds(points: &[GeoPoint]) -> Option<Bounds> {
    let line = to_line_string(points);
    let rect = line.bounding_rect()?;

    Some(Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

/// Convert points to a `geo` line string (x = longitude, y = latitude).
pub fn to_line_string(points: &[GeoPoint]) -> LineString<f64> {
    points
        .iter()
        .map(|p| Coord { x: p.longitude, y: p.latitude })
        .collect::<Vec<_>>()
        .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
