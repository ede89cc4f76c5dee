//! Nearest-on-route resolution.
//!
//! Assigns a km mark to an arbitrary position (waypoint, checkpoint, live fix)
//! by finding the closest route point. The scan is linear: tracks are a few
//! thousand points and imports a few dozen waypoints.

use log::debug;

use crate::geo_utils::{haversine_km, round_km};
use crate::route::{Route, RoutePoint};
use crate::{GeoPoint, Result, RouteError};

/// Closest route point to a query position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NearestOnRoute {
    /// Along-track distance of the matched point, rounded to 2 decimals
    pub cumulative_distance_km: f64,
    /// Index of the matched point in the route
    pub matched_index: u64,
    /// Great-circle distance from the query to the matched point (unrounded)
    pub straight_line_distance_km: f64,
}

/// Resolve the closest point of `route` to `query`.
///
/// Ties go to the lowest index. Fails with
/// [`RouteError::InvalidCoordinate`] if the query is not a valid coordinate.
///
/// # Example
/// ```
/// use race_route::{GeoPoint, Route, resolve};
///
/// let route = Route::build(&[
///     GeoPoint::new(0.0, 0.0),
///     GeoPoint::new(0.0, 0.001),
///     GeoPoint::new(0.0, 0.002),
/// ]).unwrap();
///
/// let start = resolve(&route, &GeoPoint::new(0.0, 0.0)).unwrap();
/// assert_eq!(start.matched_index, 0);
/// assert_eq!(start.cumulative_distance_km, 0.0);
/// ```
pub fn resolve(route: &Route, query: &GeoPoint) -> Result<NearestOnRoute> {
    resolve_points(route.points(), query)
}

/// Slice-level form of [`resolve`].
///
/// Fails with [`RouteError::EmptyRoute`] when `points` is empty; an empty
/// route never resolves to 0 km.
pub fn resolve_points(points: &[RoutePoint], query: &GeoPoint) -> Result<NearestOnRoute> {
    query.validate()?;

    let (index, distance_km) = points
        .iter()
        .enumerate()
        .map(|(i, rp)| (i, haversine_km(&rp.point, query)))
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            // Strict comparison keeps the first minimum
            Some((_, best_d)) if d >= best_d => best,
            _ => Some((i, d)),
        })
        .ok_or(RouteError::EmptyRoute)?;

    Ok(NearestOnRoute {
        cumulative_distance_km: round_km(points[index].cumulative_distance_km),
        matched_index: index as u64,
        straight_line_distance_km: distance_km,
    })
}

// ============================================================================
// Waypoint snapping
// ============================================================================

/// A named point of interest to place on the route.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Waypoint {
    pub id: String,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub location: GeoPoint,
}

/// A waypoint with its resolved km mark.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnappedWaypoint {
    pub waypoint: Waypoint,
    pub nearest: NearestOnRoute,
    /// Whether the waypoint lies within `max_offset_km` of the route
    pub on_route: bool,
}

/// Configuration for waypoint snapping.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SnapConfig {
    /// Maximum straight-line offset from the route for a waypoint to count
    /// as on-route. Default: 0.5 km
    pub max_offset_km: f64,

    /// Sort the result by km mark (roadbook order). Equal marks keep input
    /// order. Default: true
    pub sort_by_km: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            max_offset_km: 0.5,
            sort_by_km: true,
        }
    }
}

/// Resolve the km mark of every waypoint.
///
/// Fails on the first waypoint with an invalid location, reporting its index
/// in `waypoints`.
///
/// # Example
/// ```
/// use race_route::{GeoPoint, Route, SnapConfig, Waypoint, snap_waypoints};
///
/// let track: Vec<GeoPoint> = (0..=100).map(|i| GeoPoint::new(0.0, i as f64 * 0.001)).collect();
/// let route = Route::build(&track).unwrap();
///
/// let waypoints = vec![
///     Waypoint { id: "aid-2".into(), name: "Aid 2".into(), location: GeoPoint::new(0.0001, 0.08) },
///     Waypoint { id: "aid-1".into(), name: "Aid 1".into(), location: GeoPoint::new(0.0001, 0.03) },
/// ];
///
/// let snapped = snap_waypoints(&route, &waypoints, &SnapConfig::default()).unwrap();
/// assert_eq!(snapped[0].waypoint.id, "aid-1");
/// assert_eq!(snapped[0].nearest.cumulative_distance_km, 3.34);
/// ```
pub fn snap_waypoints(
    route: &Route,
    waypoints: &[Waypoint],
    config: &SnapConfig,
) -> Result<Vec<SnappedWaypoint>> {
    for (i, wp) in waypoints.iter().enumerate() {
        wp.location.validate_at(Some(i))?;
    }

    #[cfg(feature = "parallel")]
    let resolved: Vec<NearestOnRoute> = {
        use rayon::prelude::*;
        waypoints
            .par_iter()
            .map(|wp| resolve(route, &wp.location))
            .collect::<Result<_>>()?
    };

    #[cfg(not(feature = "parallel"))]
    let resolved: Vec<NearestOnRoute> = waypoints
        .iter()
        .map(|wp| resolve(route, &wp.location))
        .collect::<Result<_>>()?;

    let mut snapped: Vec<SnappedWaypoint> = waypoints
        .iter()
        .zip(resolved)
        .map(|(wp, nearest)| SnappedWaypoint {
            waypoint: wp.clone(),
            on_route: nearest.straight_line_distance_km <= config.max_offset_km,
            nearest,
        })
        .collect();

    if config.sort_by_km {
        // sort_by is stable: equal km marks keep import order
        snapped.sort_by(|a, b| {
            a.nearest
                .cumulative_distance_km
                .total_cmp(&b.nearest.cumulative_distance_km)
        });
    }

    debug!(
        "[Resolver] Snapped {} waypoints onto {:.2} km route ({} off-route)",
        snapped.len(),
        route.total_distance_km(),
        snapped.iter().filter(|s| !s.on_route).count()
    );

    Ok(snapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equator_route() -> Route {
        Route::build(&[
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.0, 0.002),
        ])
        .unwrap()
    }

    fn waypoint(id: &str, lat: f64, lon: f64) -> Waypoint {
        Waypoint {
            id: id.to_string(),
            name: id.to_uppercase(),
            location: GeoPoint::new(lat, lon),
        }
    }

    #[test]
    fn test_resolve_identity_at_start() {
        let route = equator_route();
        let result = resolve(&route, &route.start().point).unwrap();
        assert_eq!(result.matched_index, 0);
        assert_eq!(result.cumulative_distance_km, 0.0);
        assert_eq!(result.straight_line_distance_km, 0.0);
    }

    #[test]
    fn test_resolve_between_points() {
        let route = equator_route();
        let result = resolve(&route, &GeoPoint::new(0.0, 0.0015)).unwrap();

        // Exactly halfway: both neighbours are at the same distance (up to
        // rounding), so accept either and check the km mark follows the index
        assert!(result.matched_index == 1 || result.matched_index == 2);
        let expected = round_km(route.points()[result.matched_index as usize].cumulative_distance_km);
        assert_eq!(result.cumulative_distance_km, expected);
    }

    #[test]
    fn test_resolve_nearer_to_end() {
        let route = equator_route();
        let result = resolve(&route, &GeoPoint::new(0.0, 0.0018)).unwrap();
        assert_eq!(result.matched_index, 2);
        assert_eq!(result.cumulative_distance_km, 0.22);
        assert!((result.straight_line_distance_km - 0.0222).abs() < 0.0005);
    }

    #[test]
    fn test_resolve_tie_takes_first_index() {
        // Out-and-back: index 0 and index 2 are the same location
        let route = Route::build(&[
            GeoPoint::new(10.0, 10.0),
            GeoPoint::new(10.0, 10.01),
            GeoPoint::new(10.0, 10.0),
        ])
        .unwrap();
        let result = resolve(&route, &GeoPoint::new(10.0, 10.0)).unwrap();
        assert_eq!(result.matched_index, 0);
        assert_eq!(result.cumulative_distance_km, 0.0);
    }

    #[test]
    fn test_resolve_single_point_route() {
        let route = Route::build(&[GeoPoint::new(0.0, 0.0)]).unwrap();
        let result = resolve(&route, &GeoPoint::new(0.0, 0.01)).unwrap();
        assert_eq!(result.matched_index, 0);
        assert_eq!(result.cumulative_distance_km, 0.0);
        assert!((result.straight_line_distance_km - 1.112).abs() < 0.001);
    }

    #[test]
    fn test_resolve_empty_points_fails() {
        let result = resolve_points(&[], &GeoPoint::new(0.0, 0.0));
        assert_eq!(result, Err(RouteError::EmptyRoute));
    }

    #[test]
    fn test_resolve_invalid_query_fails() {
        let route = equator_route();
        assert!(matches!(
            resolve(&route, &GeoPoint::new(f64::NAN, 0.0)),
            Err(RouteError::InvalidCoordinate { index: None, .. })
        ));
        assert!(matches!(
            resolve(&route, &GeoPoint::new(0.0, 181.0)),
            Err(RouteError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_snap_waypoints_sorted_and_flagged() {
        let track: Vec<GeoPoint> = (0..=50).map(|i| GeoPoint::new(42.0, 1.0 + i as f64 * 0.001)).collect();
        let route = Route::build(&track).unwrap();

        let waypoints = vec![
            waypoint("finish", 42.0, 1.05),
            waypoint("far-away", 42.1, 1.02),
            waypoint("start", 42.0, 1.0),
        ];
        let snapped = snap_waypoints(&route, &waypoints, &SnapConfig::default()).unwrap();

        let ids: Vec<&str> = snapped.iter().map(|s| s.waypoint.id.as_str()).collect();
        assert_eq!(ids, vec!["start", "far-away", "finish"]);
        assert!(snapped[0].on_route);
        assert!(!snapped[1].on_route);
        assert!(snapped[2].on_route);
        assert_eq!(snapped[2].nearest.matched_index, 50);
    }

    #[test]
    fn test_snap_waypoints_keeps_input_order_when_unsorted() {
        let route = equator_route();
        let waypoints = vec![waypoint("b", 0.0, 0.002), waypoint("a", 0.0, 0.0)];
        let config = SnapConfig { sort_by_km: false, ..SnapConfig::default() };
        let snapped = snap_waypoints(&route, &waypoints, &config).unwrap();
        assert_eq!(snapped[0].waypoint.id, "b");
        assert_eq!(snapped[1].waypoint.id, "a");
    }

    #[test]
    fn test_snap_waypoints_equal_marks_are_stable() {
        let route = equator_route();
        let waypoints = vec![
            waypoint("first", 0.0001, 0.001),
            waypoint("second", -0.0001, 0.001),
        ];
        let snapped = snap_waypoints(&route, &waypoints, &SnapConfig::default()).unwrap();
        assert_eq!(snapped[0].waypoint.id, "first");
        assert_eq!(snapped[1].waypoint.id, "second");
    }

    #[test]
    fn test_snap_waypoints_invalid_location_fails() {
        let route = equator_route();
        let waypoints = vec![waypoint("ok", 0.0, 0.0), waypoint("bad", 95.0, 0.0)];
        assert!(matches!(
            snap_waypoints(&route, &waypoints, &SnapConfig::default()),
            Err(RouteError::InvalidCoordinate { index: Some(1), .. })
        ));
    }

    #[test]
    fn test_snap_waypoints_empty_input() {
        let route = equator_route();
        let snapped = snap_waypoints(&route, &[], &SnapConfig::default()).unwrap();
        assert!(snapped.is_empty());
    }
}
