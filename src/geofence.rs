//! # Geofence Matching
//!
//! Classifies a live position against a set of timing points/checkpoints,
//! each with a circular geofence.
//!
//! Distances here are meters. Route geometry is kilometers; the conversion
//! happens once, in [`geo_utils::km_to_m`].
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`match_geofences`] | Every geofence containing the position, nearest first |
//! | [`nearest_reference`] | Closest reference point regardless of radius |
//! | [`distance_to_finish`] | Distance to the reference named "finish"/"meta" |
//! | [`attribute_crossing`] | The single geofence a crossing is attributed to |
//! | [`validate_references`] | Every problem in a reference set |
//!
//! [`GeofenceSet`] holds a validated reference set keyed by ID with an R-tree
//! over geofence envelopes, for per-fix matching against large sets.

use std::collections::{BTreeMap, HashSet};

use log::debug;
use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::{self, haversine_km, EARTH_RADIUS_KM};
use crate::{GeoPoint, Result, RouteError};

/// Geofence radius used when a reference point has none.
pub const DEFAULT_RADIUS_M: f64 = 50.0;

/// Envelope padding factor applied on top of the exact spherical bound.
const ENVELOPE_MARGIN: f64 = 1.1;

// ============================================================================
// Types
// ============================================================================

/// A named timing point or checkpoint with a circular geofence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferencePoint {
    pub id: String,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub location: GeoPoint,
    /// Geofence radius in meters. `None` uses the configured default (50 m).
    #[cfg_attr(feature = "serde", serde(rename = "radius", alias = "radius_meters", default))]
    pub radius_meters: Option<f64>,
}

impl ReferencePoint {
    /// Create a reference point using the default radius.
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location,
            radius_meters: None,
        }
    }

    /// Set an explicit radius in meters.
    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.radius_meters = Some(radius_m);
        self
    }

    /// Radius in meters, falling back to `default_radius_m`.
    pub fn effective_radius_m(&self, default_radius_m: f64) -> f64 {
        self.radius_meters.unwrap_or(default_radius_m)
    }

    /// Whether this is the finish line ("finish" or "meta" anywhere in the
    /// name, case-insensitive).
    pub fn is_finish(&self) -> bool {
        let name = self.name.to_lowercase();
        name.contains("finish") || name.contains("meta")
    }

    /// Great-circle distance from `position`, in meters.
    pub fn distance_m(&self, position: &GeoPoint) -> f64 {
        geo_utils::km_to_m(haversine_km(&self.location, position))
    }

    fn radius_if_valid(&self, default_radius_m: f64) -> Option<f64> {
        let radius = self.effective_radius_m(default_radius_m);
        (radius.is_finite() && radius > 0.0).then_some(radius)
    }

    fn check(&self, index: usize, default_radius_m: f64) -> Result<()> {
        self.location.validate_at(Some(index))?;
        if self.radius_if_valid(default_radius_m).is_none() {
            return Err(RouteError::InvalidRadius {
                id: self.id.clone(),
                radius: self.effective_radius_m(default_radius_m),
            });
        }
        Ok(())
    }
}

/// How to attribute a crossing when several geofences contain the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OverlapPolicy {
    /// The reference point closest to the position wins.
    #[default]
    Nearest,
    /// The tightest geofence wins (e.g. a timing mat inside an aid-station
    /// zone); equal radii fall back to distance.
    SmallestRadius,
}

/// Configuration for geofence matching.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeofenceConfig {
    /// Radius for reference points without one. Default: 50.0 meters
    pub default_radius_m: f64,

    /// Attribution rule for overlapping geofences. Default: nearest
    pub overlap_policy: OverlapPolicy,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            default_radius_m: DEFAULT_RADIUS_M,
            overlap_policy: OverlapPolicy::Nearest,
        }
    }
}

/// A reference point and its distance from the queried position.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeofenceMatch {
    pub reference: ReferencePoint,
    pub distance_m: f64,
}

// ============================================================================
// Stateless matching
// ============================================================================

/// All reference points whose geofence contains `position`, nearest first.
///
/// A point exactly on the boundary matches. References with an invalid
/// location or a radius that is not positive never match. Equal distances
/// keep input order.
///
/// # Example
/// ```
/// use race_route::{GeoPoint, GeofenceConfig, ReferencePoint, match_geofences};
///
/// let cp = ReferencePoint::new("cp1", "Checkpoint 1", GeoPoint::new(0.0, 0.0));
/// let config = GeofenceConfig::default();
///
/// // ~30 m north
/// let hits = match_geofences(&GeoPoint::new(0.00027, 0.0), &[cp.clone()], &config).unwrap();
/// assert_eq!(hits.len(), 1);
///
/// // ~100 m north
/// let hits = match_geofences(&GeoPoint::new(0.0009, 0.0), &[cp], &config).unwrap();
/// assert!(hits.is_empty());
/// ```
pub fn match_geofences(
    position: &GeoPoint,
    references: &[ReferencePoint],
    config: &GeofenceConfig,
) -> Result<Vec<GeofenceMatch>> {
    position.validate()?;

    let mut matches: Vec<GeofenceMatch> = references
        .iter()
        .filter_map(|r| within(position, r, config.default_radius_m))
        .collect();
    sort_nearest_first(&mut matches);

    Ok(matches)
}

/// The closest reference point, ignoring radii.
///
/// Returns `None` only when no reference has a valid location. Ties go to
/// the earliest reference.
pub fn nearest_reference(
    position: &GeoPoint,
    references: &[ReferencePoint],
) -> Result<Option<GeofenceMatch>> {
    position.validate()?;
    Ok(nearest_of(position, references.iter()))
}

/// Distance in meters to the first reference point named "finish"/"meta".
///
/// Returns `None` when the set has no finish reference.
pub fn distance_to_finish(
    position: &GeoPoint,
    references: &[ReferencePoint],
) -> Result<Option<f64>> {
    position.validate()?;
    Ok(finish_distance_of(position, references.iter()))
}

/// The geofence a crossing at `position` is attributed to, under the
/// configured [`OverlapPolicy`].
pub fn attribute_crossing(
    position: &GeoPoint,
    references: &[ReferencePoint],
    config: &GeofenceConfig,
) -> Result<Option<GeofenceMatch>> {
    let matches = match_geofences(position, references, config)?;
    Ok(pick(matches, config))
}

/// Every problem in a reference set: invalid locations, radii that are not
/// positive and finite, and duplicate IDs.
///
/// Reference points without a radius are checked against
/// `config.default_radius_m`, the radius they would match with.
pub fn validate_references(references: &[ReferencePoint], config: &GeofenceConfig) -> Vec<RouteError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, reference) in references.iter().enumerate() {
        if let Err(e) = reference.location.validate_at(Some(i)) {
            errors.push(e);
        }
        if reference.radius_if_valid(config.default_radius_m).is_none() {
            errors.push(RouteError::InvalidRadius {
                id: reference.id.clone(),
                radius: reference.effective_radius_m(config.default_radius_m),
            });
        }
        if !seen.insert(reference.id.as_str()) {
            errors.push(RouteError::DuplicateReference { id: reference.id.clone() });
        }
    }

    errors
}

fn within(position: &GeoPoint, reference: &ReferencePoint, default_radius_m: f64) -> Option<GeofenceMatch> {
    if !reference.location.is_valid() {
        return None;
    }
    let radius = reference.radius_if_valid(default_radius_m)?;
    let distance_m = reference.distance_m(position);

    (distance_m <= radius).then(|| GeofenceMatch {
        reference: reference.clone(),
        distance_m,
    })
}

fn nearest_of<'a>(
    position: &GeoPoint,
    references: impl Iterator<Item = &'a ReferencePoint>,
) -> Option<GeofenceMatch> {
    references
        .filter(|r| r.location.is_valid())
        .map(|r| (r, r.distance_m(position)))
        .fold(None, |best: Option<(&ReferencePoint, f64)>, (r, d)| match best {
            Some((_, best_d)) if d >= best_d => best,
            _ => Some((r, d)),
        })
        .map(|(r, d)| GeofenceMatch {
            reference: r.clone(),
            distance_m: d,
        })
}

fn finish_distance_of<'a>(
    position: &GeoPoint,
    mut references: impl Iterator<Item = &'a ReferencePoint>,
) -> Option<f64> {
    references
        .find(|r| r.is_finish() && r.location.is_valid())
        .map(|r| r.distance_m(position))
}

fn sort_nearest_first(matches: &mut [GeofenceMatch]) {
    // Stable: equal distances keep their incoming order
    matches.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
}

/// Pick the attributed match from a nearest-first list.
pub(crate) fn pick(matches: Vec<GeofenceMatch>, config: &GeofenceConfig) -> Option<GeofenceMatch> {
    match config.overlap_policy {
        OverlapPolicy::Nearest => matches.into_iter().next(),
        OverlapPolicy::SmallestRadius => matches.into_iter().fold(None, |best, m| match best {
            Some(b)
                if m.reference.effective_radius_m(config.default_radius_m)
                    >= b.reference.effective_radius_m(config.default_radius_m) =>
            {
                Some(b)
            }
            _ => Some(m),
        }),
    }
}

// ============================================================================
// Indexed reference set
// ============================================================================

/// R-tree entry: a reference point's geofence envelope in (lon, lat) degrees.
#[derive(Debug, Clone)]
struct GeofenceEnvelope {
    /// Position in the reference list (input order)
    idx: usize,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for GeofenceEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

impl GeofenceEnvelope {
    /// Bounding box that contains every point within `radius_m` of `center`.
    ///
    /// Latitude spans exactly the angular radius; longitude uses
    /// asin(sin δ / cos φ), the widest longitude offset of a spherical cap.
    /// Caps that touch a pole or wrap the antimeridian get the full
    /// longitude range.
    fn around(idx: usize, center: &GeoPoint, radius_m: f64) -> Self {
        let delta = radius_m * ENVELOPE_MARGIN / geo_utils::km_to_m(EARTH_RADIUS_KM);
        let dlat = delta.to_degrees();

        let min_lat = center.latitude - dlat;
        let max_lat = center.latitude + dlat;

        let ratio = delta.sin() / center.latitude.to_radians().cos();
        let (min_lng, max_lng) = if min_lat <= -90.0 || max_lat >= 90.0 || !(0.0..1.0).contains(&ratio) {
            (-180.0, 180.0)
        } else {
            let dlng = ratio.asin().to_degrees();
            let (lo, hi) = (center.longitude - dlng, center.longitude + dlng);
            if lo < -180.0 || hi > 180.0 { (-180.0, 180.0) } else { (lo, hi) }
        };

        Self {
            idx,
            min: [min_lng, min_lat.max(-90.0)],
            max: [max_lng, max_lat.min(90.0)],
        }
    }
}

/// A validated reference set keyed by reference ID.
///
/// Built once from the current reference data and never patched; rebuild it
/// when the upstream set changes. Query results are identical to the
/// stateless functions called with the same references in the same order.
///
/// # Example
/// ```
/// use race_route::{GeoPoint, GeofenceConfig, GeofenceSet, ReferencePoint};
///
/// let set = GeofenceSet::new(
///     vec![
///         ReferencePoint::new("start", "Start", GeoPoint::new(42.0, 1.0)),
///         ReferencePoint::new("finish", "Finish", GeoPoint::new(42.1, 1.0)).with_radius(100.0),
///     ],
///     GeofenceConfig::default(),
/// ).unwrap();
///
/// let hits = set.matches(&GeoPoint::new(42.1005, 1.0)).unwrap();
/// assert_eq!(hits[0].reference.id, "finish");
/// assert!(set.distance_to_finish(&GeoPoint::new(42.0, 1.0)).unwrap().unwrap() > 11_000.0);
/// ```
#[derive(Debug, Clone)]
pub struct GeofenceSet {
    references: Vec<ReferencePoint>,
    by_id: BTreeMap<String, usize>,
    tree: RTree<GeofenceEnvelope>,
    config: GeofenceConfig,
}

impl GeofenceSet {
    /// Validate `references` and index them.
    ///
    /// Fails on the first invalid location, invalid radius (after applying
    /// `config.default_radius_m`) or duplicate ID.
    pub fn new(references: Vec<ReferencePoint>, config: GeofenceConfig) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        let mut envelopes = Vec::with_capacity(references.len());

        for (i, reference) in references.iter().enumerate() {
            reference.check(i, config.default_radius_m)?;
            if by_id.insert(reference.id.clone(), i).is_some() {
                return Err(RouteError::DuplicateReference { id: reference.id.clone() });
            }
            envelopes.push(GeofenceEnvelope::around(
                i,
                &reference.location,
                reference.effective_radius_m(config.default_radius_m),
            ));
        }

        debug!(
            "[Geofence] Indexed {} reference points ({} finish)",
            references.len(),
            references.iter().filter(|r| r.is_finish()).count()
        );

        Ok(Self {
            references,
            by_id,
            tree: RTree::bulk_load(envelopes),
            config,
        })
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn config(&self) -> &GeofenceConfig {
        &self.config
    }

    /// Look up a reference point by ID.
    pub fn get(&self, id: &str) -> Option<&ReferencePoint> {
        self.by_id.get(id).map(|&i| &self.references[i])
    }

    /// Reference points in their original order.
    pub fn references(&self) -> &[ReferencePoint] {
        &self.references
    }

    /// All geofences containing `position`, nearest first.
    pub fn matches(&self, position: &GeoPoint) -> Result<Vec<GeofenceMatch>> {
        position.validate()?;

        let query = AABB::from_point([position.longitude, position.latitude]);
        let mut candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|e| e.idx)
            .collect();
        // Restore input order so ties resolve like the stateless matcher
        candidates.sort_unstable();

        let mut matches: Vec<GeofenceMatch> = candidates
            .into_iter()
            .filter_map(|i| within(position, &self.references[i], self.config.default_radius_m))
            .collect();
        sort_nearest_first(&mut matches);

        Ok(matches)
    }

    /// Closest reference point regardless of radius.
    pub fn nearest(&self, position: &GeoPoint) -> Result<Option<GeofenceMatch>> {
        position.validate()?;
        Ok(nearest_of(position, self.references.iter()))
    }

    /// Distance in meters to the finish reference, if the set has one.
    pub fn distance_to_finish(&self, position: &GeoPoint) -> Result<Option<f64>> {
        position.validate()?;
        Ok(finish_distance_of(position, self.references.iter()))
    }

    /// The geofence a crossing at `position` is attributed to.
    pub fn attribute(&self, position: &GeoPoint) -> Result<Option<GeofenceMatch>> {
        let matches = self.matches(position)?;
        Ok(pick(matches, &self.config))
    }
}
