//! End-to-end flow: load a track, place checkpoints, follow runners.

use race_route::{
    annotate_positions, resolve, snap_waypoints, validate_references, CrossingTracker, GeoPoint,
    GeofenceConfig, GeofenceSet, ReferencePoint, Route, RouteError, SnapConfig, Waypoint,
};

/// Out-and-back loop east of Barcelona: 3 km east along 41.4N, then back
/// 100 m further north.
fn track() -> Vec<GeoPoint> {
    let out = (0..=30).map(|i| GeoPoint::with_elevation(41.4, 2.2 + i as f64 * 0.0012, 10.0 + i as f64));
    let back = (0..=30)
        .rev()
        .map(|i| GeoPoint::with_elevation(41.4009, 2.2 + i as f64 * 0.0012, 10.0 + i as f64));
    out.chain(back).collect()
}

fn checkpoints() -> Vec<ReferencePoint> {
    vec![
        ReferencePoint::new("start", "Start", GeoPoint::new(41.4, 2.2)),
        ReferencePoint::new("turn", "Turnaround", GeoPoint::new(41.40045, 2.236)).with_radius(120.0),
        ReferencePoint::new("finish", "Finish / Meta", GeoPoint::new(41.4009, 2.2)),
    ]
}

#[test]
fn route_distances_and_stats() {
    let route = Route::build(&track()).unwrap();
    let stats = route.stats();

    // 2 x 30 x 0.0012 deg of longitude at 41.4N (~100 m each) plus the 100 m link
    assert!((stats.total_distance_km - 6.1).abs() < 0.1, "got {}", stats.total_distance_km);
    assert_eq!(stats.elevation_gain_m, 30.0);
    assert_eq!(stats.elevation_loss_m, 30.0);

    for w in route.points().windows(2) {
        assert!(w[0].cumulative_distance_km <= w[1].cumulative_distance_km);
    }
}

#[test]
fn checkpoint_km_marks_follow_the_course() {
    let route = Route::build(&track()).unwrap();
    let waypoints: Vec<Waypoint> = checkpoints()
        .into_iter()
        .map(|r| Waypoint { id: r.id, name: r.name, location: r.location })
        .collect();

    let snapped = snap_waypoints(&route, &waypoints, &SnapConfig::default()).unwrap();
    let ids: Vec<&str> = snapped.iter().map(|s| s.waypoint.id.as_str()).collect();
    assert_eq!(ids, vec!["start", "turn", "finish"]);

    assert_eq!(snapped[0].nearest.cumulative_distance_km, 0.0);
    assert!((snapped[2].nearest.cumulative_distance_km - route.total_distance_km()).abs() < 0.01);
    assert!(snapped.iter().all(|s| s.on_route));
}

#[test]
fn identity_on_first_point() {
    let route = Route::build(&track()).unwrap();
    let nearest = resolve(&route, &route.start().point).unwrap();
    assert_eq!(nearest.matched_index, 0);
    assert_eq!(nearest.cumulative_distance_km, 0.0);
}

#[test]
fn live_tracking_reports_each_checkpoint_once() {
    let set = GeofenceSet::new(checkpoints(), GeofenceConfig::default()).unwrap();
    let mut tracker = CrossingTracker::new(set);

    let mut crossings = Vec::new();
    for fix in track() {
        if let Some(event) = tracker.observe("bib-42", &fix).unwrap() {
            crossings.push(event.reference_id);
        }
    }

    // The start and finish geofences (50 m) are 100 m apart, so they never overlap
    assert_eq!(crossings, vec!["start", "turn", "finish"]);
}

#[test]
fn live_annotations_match_stateless_queries() {
    let route = Route::build(&track()).unwrap();
    let refs = checkpoints();
    let set = GeofenceSet::new(refs.clone(), GeofenceConfig::default()).unwrap();

    let positions: Vec<_> = track()
        .into_iter()
        .enumerate()
        .map(|(i, p)| race_route::LivePosition { participant_id: format!("p{i}"), position: p })
        .collect();
    let annotations = annotate_positions(&positions, Some(&route), &set).unwrap();
    assert_eq!(annotations.len(), positions.len());

    for live in &positions {
        let a = &annotations[&live.participant_id];
        assert_eq!(a.nearest_reference, race_route::nearest_reference(&live.position, &refs).unwrap());
        assert_eq!(a.distance_to_finish_m, race_route::distance_to_finish(&live.position, &refs).unwrap());
        assert_eq!(a.offset_from_route_km, Some(0.0));
    }
}

#[test]
fn bad_reference_data_is_flagged() {
    let mut refs = checkpoints();
    refs.push(ReferencePoint::new("broken", "Broken mat", GeoPoint::new(41.4, 2.21)).with_radius(0.0));

    let errors = validate_references(&refs, &GeofenceConfig::default());
    assert_eq!(errors, vec![RouteError::InvalidRadius { id: "broken".into(), radius: 0.0 }]);
    assert!(GeofenceSet::new(refs, GeofenceConfig::default()).is_err());
}
