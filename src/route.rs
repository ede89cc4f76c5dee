//! Route construction with cumulative along-track distance.
//!
//! A [`Route`] is built once from an ordered track and never mutated; editing
//! the underlying points means building a new route.

use geo::algorithm::simplify::SimplifyIdx;
use geo::LineString;

use crate::geo_utils::{self, haversine_km};
use crate::{Bounds, GeoPoint, Result, RouteError};

/// A track point annotated with its distance from the start of the route.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutePoint {
    pub point: GeoPoint,
    /// Along-track distance from index 0, in kilometers.
    pub cumulative_distance_km: f64,
}

/// Summary figures for a route (roadbook header).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteStats {
    pub point_count: u64,
    pub total_distance_km: f64,
    /// Sum of positive elevation deltas between consecutive points with elevation
    pub elevation_gain_m: f64,
    /// Sum of negative elevation deltas, as a positive number
    pub elevation_loss_m: f64,
    pub min_elevation_m: Option<f64>,
    pub max_elevation_m: Option<f64>,
    pub bounds: Bounds,
}

/// An ordered, non-empty sequence of route points.
///
/// Index 0 is at 0 km and `cumulative_distance_km` never decreases along the
/// sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    points: Vec<RoutePoint>,
    bounds: Bounds,
}

impl Route {
    /// Build a route from an ordered track.
    ///
    /// Point `i` gets the sum of Haversine distances between consecutive
    /// points `0..=i`. Duplicate consecutive points contribute 0.
    ///
    /// Fails with [`RouteError::EmptyRoute`] on empty input and with
    /// [`RouteError::InvalidCoordinate`] on the first NaN, infinite or
    /// out-of-range point.
    ///
    /// # Example
    /// ```
    /// use race_route::{GeoPoint, Route};
    ///
    /// let route = Route::build(&[
    ///     GeoPoint::new(0.0, 0.0),
    ///     GeoPoint::new(0.0, 0.001),
    ///     GeoPoint::new(0.0, 0.002),
    /// ]).unwrap();
    ///
    /// assert_eq!(route.len(), 3);
    /// assert!((route.total_distance_km() - 0.222).abs() < 0.001);
    /// ```
    pub fn build(points: &[GeoPoint]) -> Result<Self> {
        let bounds = geo_utils::compute_bounds(points).ok_or(RouteError::EmptyRoute)?;

        let mut annotated = Vec::with_capacity(points.len());
        let mut cumulative = 0.0;
        let mut prev: Option<&GeoPoint> = None;

        for (i, point) in points.iter().enumerate() {
            point.validate_at(Some(i))?;

            if let Some(prev) = prev {
                cumulative += haversine_km(prev, point);
            }
            annotated.push(RoutePoint {
                point: *point,
                cumulative_distance_km: cumulative,
            });
            prev = Some(point);
        }

        Ok(Self { points: annotated, bounds })
    }

    /// All route points in traversal order.
    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RoutePoint> {
        self.points.get(index)
    }

    pub fn start(&self) -> &RoutePoint {
        &self.points[0]
    }

    pub fn end(&self) -> &RoutePoint {
        &self.points[self.points.len() - 1]
    }

    /// Along-track length of the whole route, in kilometers.
    pub fn total_distance_km(&self) -> f64 {
        self.end().cumulative_distance_km
    }

    /// Bounding box of the route.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Distance, elevation and extent summary.
    pub fn stats(&self) -> RouteStats {
        let mut gain = 0.0;
        let mut loss = 0.0;
        let mut min_ele: Option<f64> = None;
        let mut max_ele: Option<f64> = None;
        let mut prev_ele: Option<f64> = None;

        for ele in self
            .points
            .iter()
            .filter_map(|rp| rp.point.elevation)
            .filter(|e| e.is_finite())
        {
            if let Some(prev) = prev_ele {
                let delta = ele - prev;
                if delta > 0.0 {
                    gain += delta;
                } else {
                    loss -= delta;
                }
            }
            min_ele = Some(min_ele.map_or(ele, |m| m.min(ele)));
            max_ele = Some(max_ele.map_or(ele, |m| m.max(ele)));
            prev_ele = Some(ele);
        }

        RouteStats {
            point_count: self.points.len() as u64,
            total_distance_km: self.total_distance_km(),
            elevation_gain_m: gain,
            elevation_loss_m: loss,
            min_elevation_m: min_ele,
            max_elevation_m: max_ele,
            bounds: self.bounds,
        }
    }

    /// The route as a `geo` line string (x = longitude, y = latitude).
    pub fn to_line_string(&self) -> LineString<f64> {
        let points: Vec<GeoPoint> = self.points.iter().map(|rp| rp.point).collect();
        geo_utils::to_line_string(&points)
    }

    /// Douglas-Peucker simplified subset of the route for map display.
    ///
    /// Kept points retain their original cumulative distance, so km labels on
    /// the simplified polyline still match the full track. The first and last
    /// points are always kept. `tolerance_deg` is in degrees (0.0001 ≈ 11 m).
    pub fn display_polyline(&self, tolerance_deg: f64) -> Vec<RoutePoint> {
        if self.points.len() <= 2 {
            return self.points.clone();
        }

        self.to_line_string()
            .simplify_idx(&tolerance_deg)
            .into_iter()
            .map(|i| self.points[i])
            .collect()
    }
}
