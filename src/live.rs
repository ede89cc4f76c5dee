//! Live position handling for the race map.
//!
//! - [`annotate_positions`] recomputes per-participant display state from the
//!   latest fixes. It is pure: call it again whenever positions, the route or
//!   the reference set change.
//! - [`CrossingTracker`] turns a stream of fixes into checkpoint-crossing
//!   events. The caller owns it; nothing here is shared.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;

use crate::geofence::{pick, GeofenceMatch, GeofenceSet};
use crate::resolver::resolve;
use crate::route::Route;
use crate::{GeoPoint, Result};

/// A participant's latest GPS fix.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LivePosition {
    pub participant_id: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub position: GeoPoint,
}

/// Derived display state for one participant.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionAnnotation {
    pub position: GeoPoint,
    /// Km mark of the nearest route point (2 decimals), when a route is loaded
    pub km_on_route: Option<f64>,
    /// Straight-line distance to that route point, in km
    pub offset_from_route_km: Option<f64>,
    /// Closest reference point regardless of radius
    pub nearest_reference: Option<GeofenceMatch>,
    /// Geofence the participant is currently inside, per the overlap policy
    pub inside: Option<GeofenceMatch>,
    pub distance_to_finish_m: Option<f64>,
}

/// Annotate the latest position of every participant.
///
/// The result is keyed by participant ID; when a participant appears more
/// than once the later entry wins. Fails with
/// [`crate::RouteError::InvalidCoordinate`] (indexed into `positions`) on
/// the first invalid fix.
pub fn annotate_positions(
    positions: &[LivePosition],
    route: Option<&Route>,
    geofences: &GeofenceSet,
) -> Result<BTreeMap<String, PositionAnnotation>> {
    let mut annotations = BTreeMap::new();

    for (i, live) in positions.iter().enumerate() {
        let position = live.position;
        position.validate_at(Some(i))?;

        let nearest_on_route = route.map(|r| resolve(r, &position)).transpose()?;

        let annotation = PositionAnnotation {
            position,
            km_on_route: nearest_on_route.map(|n| n.cumulative_distance_km),
            offset_from_route_km: nearest_on_route.map(|n| n.straight_line_distance_km),
            nearest_reference: geofences.nearest(&position)?,
            inside: geofences.attribute(&position)?,
            distance_to_finish_m: geofences.distance_to_finish(&position)?,
        };
        annotations.insert(live.participant_id.clone(), annotation);
    }

    debug!(
        "[Live] Annotated {} participants from {} fixes ({} inside a geofence)",
        annotations.len(),
        positions.len(),
        annotations.values().filter(|a| a.inside.is_some()).count()
    );

    Ok(annotations)
}

/// A participant entering a geofence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrossingEvent {
    pub participant_id: String,
    pub reference_id: String,
    pub reference_name: String,
    /// Distance from the reference point at the fix that triggered the event
    pub distance_m: f64,
}

/// Detects checkpoint crossings from successive fixes.
///
/// Each fix is attributed to one geofence under the set's
/// [`crate::OverlapPolicy`]. A crossing is reported the first time a
/// geofence is attributed during a stay inside it: entering from outside,
/// or moving directly from one geofence into another. A participant standing
/// in overlapping geofences gets each of them reported at most once, however
/// the attribution flips between them. Leaving a geofence and coming back
/// reports it again.
///
/// # Example
/// ```
/// use race_route::{CrossingTracker, GeoPoint, GeofenceConfig, GeofenceSet, ReferencePoint};
///
/// let set = GeofenceSet::new(
///     vec![ReferencePoint::new("cp1", "CP1", GeoPoint::new(42.0, 1.0))],
///     GeofenceConfig::default(),
/// ).unwrap();
/// let mut tracker = CrossingTracker::new(set);
///
/// assert!(tracker.observe("bib-7", &GeoPoint::new(42.01, 1.0)).unwrap().is_none());
/// let event = tracker.observe("bib-7", &GeoPoint::new(42.0001, 1.0)).unwrap().unwrap();
/// assert_eq!(event.reference_id, "cp1");
/// assert!(tracker.observe("bib-7", &GeoPoint::new(42.0, 1.0)).unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CrossingTracker {
    geofences: GeofenceSet,
    /// participant_id -> reported geofences the participant is still inside
    reported: HashMap<String, BTreeSet<String>>,
}

impl CrossingTracker {
    pub fn new(geofences: GeofenceSet) -> Self {
        Self {
            geofences,
            reported: HashMap::new(),
        }
    }

    pub fn geofences(&self) -> &GeofenceSet {
        &self.geofences
    }

    /// Replace the reference set. Reference points that no longer exist are
    /// forgotten.
    pub fn set_geofences(&mut self, geofences: GeofenceSet) {
        self.reported.retain(|_, ids| {
            ids.retain(|id| geofences.get(id).is_some());
            !ids.is_empty()
        });
        self.geofences = geofences;
    }

    /// Reference IDs already reported for a participant's ongoing stay, in
    /// ID order. Empty when they are outside every reported geofence.
    pub fn current(&self, participant_id: &str) -> Vec<&str> {
        self.reported
            .get(participant_id)
            .map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Feed one fix. Returns the crossing it completes, if any.
    ///
    /// An invalid position fails without touching the participant's state.
    pub fn observe(&mut self, participant_id: &str, position: &GeoPoint) -> Result<Option<CrossingEvent>> {
        let matches = self.geofences.matches(position)?;
        let attributed = pick(matches.clone(), self.geofences.config());

        let mut reported = self.reported.remove(participant_id).unwrap_or_default();
        reported.retain(|id| matches.iter().any(|m| &m.reference.id == id));

        let event = match attributed {
            Some(hit) if reported.insert(hit.reference.id.clone()) => Some(CrossingEvent {
                participant_id: participant_id.to_string(),
                reference_id: hit.reference.id,
                reference_name: hit.reference.name,
                distance_m: hit.distance_m,
            }),
            _ => None,
        };

        if !reported.is_empty() {
            self.reported.insert(participant_id.to_string(), reported);
        }
        Ok(event)
    }

    /// Forget a participant's state (e.g. after a DNF or bib swap).
    pub fn reset(&mut self, participant_id: &str) {
        self.reported.remove(participant_id);
    }

    pub fn clear(&mut self) {
        self.reported.clear();
    }
}
