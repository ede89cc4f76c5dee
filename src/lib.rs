//! # Race Route
//!
//! Route distance mapping for race events.
//!
//! This library provides:
//! - Cumulative along-track distance for a parsed GPS track ([`Route::build`])
//! - Nearest-on-route lookup to assign km marks to checkpoints and waypoints ([`resolve`])
//! - Geofence matching of live positions against timing points ([`match_geofences`])
//!
//! All computations are pure and synchronous. Route and waypoint distances are
//! kilometers; geofence radii and proximity distances are meters.
//!
//! ## Features
//!
//! - **`parallel`** - Snap waypoint batches with rayon
//! - **`serde`** - Serialize/deserialize the public data types
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use race_route::{GeoPoint, Route, resolve};
//!
//! let route = Route::build(&[
//!     GeoPoint::new(0.0, 0.0),
//!     GeoPoint::new(0.0, 0.001),
//!     GeoPoint::new(0.0, 0.002),
//! ]).unwrap();
//!
//! let nearest = resolve(&route, &GeoPoint::new(0.0001, 0.0019)).unwrap();
//! assert_eq!(nearest.matched_index, 2);
//! assert_eq!(nearest.cumulative_distance_km, 0.22);
//! ```

pub mod error;
pub mod geo_utils;
pub mod geofence;
pub mod live;
pub mod resolver;
pub mod route;

pub use error::{Result, RouteError};
pub use geofence::{
    attribute_crossing, distance_to_finish, match_geofences, nearest_reference,
    validate_references, GeofenceConfig, GeofenceMatch, GeofenceSet, OverlapPolicy,
    ReferencePoint, DEFAULT_RADIUS_M,
};
pub use live::{annotate_positions, CrossingEvent, CrossingTracker, LivePosition, PositionAnnotation};
pub use resolver::{resolve, resolve_points, snap_waypoints, NearestOnRoute, SnapConfig, SnappedWaypoint, Waypoint};
pub use route::{Route, RoutePoint, RouteStats};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RaceRouteRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate with optional elevation.
///
/// # Example
/// ```
/// use race_route::GeoPoint;
/// let madrid = GeoPoint::new(40.4168, -3.7038);
/// let summit = GeoPoint::with_elevation(42.6314, 0.6573, 3404.0);
/// assert!(madrid.is_valid() && summit.elevation.is_some());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    #[cfg_attr(feature = "serde", serde(rename = "lat", alias = "latitude"))]
    pub latitude: f64,
    #[cfg_attr(feature = "serde", serde(rename = "lon", alias = "longitude", alias = "lng"))]
    pub longitude: f64,
    /// Meters above sea level, when the track source has it.
    #[cfg_attr(feature = "serde", serde(rename = "ele", alias = "elevation", default))]
    pub elevation: Option<f64>,
}

impl GeoPoint {
    /// Create a new point without elevation.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, elevation: None }
    }

    /// Create a new point with elevation in meters.
    pub fn with_elevation(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self { latitude, longitude, elevation: Some(elevation) }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Like [`GeoPoint::is_valid`], but reports the offending coordinate.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(None)
    }

    pub(crate) fn validate_at(&self, index: Option<usize>) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(RouteError::InvalidCoordinate {
                index,
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// Bounding box of a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for empty input.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        geo_utils::compute_bounds(points)
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::info;

    /// Build a route and return its annotated points.
    #[uniffi::export]
    pub fn ffi_build_route(points: Vec<GeoPoint>) -> std::result::Result<Vec<RoutePoint>, RouteError> {
        init_logging();
        info!("[RaceRoute] build_route called with {} points", points.len());
        let route = Route::build(&points)?;
        info!("[RaceRoute] Built route: {:.2} km", route.total_distance_km());
        Ok(route.points().to_vec())
    }

    /// Resolve the km mark of a query point against a track.
    #[uniffi::export]
    pub fn ffi_resolve(track: Vec<GeoPoint>, query: GeoPoint) -> std::result::Result<NearestOnRoute, RouteError> {
        init_logging();
        let route = Route::build(&track)?;
        resolve(&route, &query)
    }

    /// Snap a batch of waypoints onto a track.
    #[uniffi::export]
    pub fn ffi_snap_waypoints(
        track: Vec<GeoPoint>,
        waypoints: Vec<Waypoint>,
        config: SnapConfig,
    ) -> std::result::Result<Vec<SnappedWaypoint>, RouteError> {
        init_logging();
        info!(
            "[RaceRoute] snap_waypoints called: {} track points, {} waypoints",
            track.len(),
            waypoints.len()
        );
        let route = Route::build(&track)?;
        snap_waypoints(&route, &waypoints, &config)
    }

    /// All geofences containing a live position, nearest first.
    #[uniffi::export]
    pub fn ffi_match_geofences(
        position: GeoPoint,
        references: Vec<ReferencePoint>,
        config: GeofenceConfig,
    ) -> std::result::Result<Vec<GeofenceMatch>, RouteError> {
        init_logging();
        match_geofences(&position, &references, &config)
    }

    /// Closest reference point regardless of radius.
    #[uniffi::export]
    pub fn ffi_nearest_reference(
        position: GeoPoint,
        references: Vec<ReferencePoint>,
    ) -> std::result::Result<Option<GeofenceMatch>, RouteError> {
        init_logging();
        nearest_reference(&position, &references)
    }

    /// Distance to the finish reference in meters, if one exists.
    #[uniffi::export]
    pub fn ffi_distance_to_finish(
        position: GeoPoint,
        references: Vec<ReferencePoint>,
    ) -> std::result::Result<Option<f64>, RouteError> {
        init_logging();
        distance_to_finish(&position, &references)
    }

    /// Get default geofence configuration.
    #[uniffi::export]
    pub fn default_geofence_config() -> GeofenceConfig {
        GeofenceConfig::default()
    }

    /// Get default waypoint snapping configuration.
    #[uniffi::export]
    pub fn default_snap_config() -> SnapConfig {
        SnapConfig::default()
    }
}

// ============================================================================
// Tests
// ============================================================================
