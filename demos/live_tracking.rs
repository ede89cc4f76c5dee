//! Follow runners through timing points.
//!
//! Run with: cargo run --example live_tracking

use race_route::{
    annotate_positions, CrossingTracker, GeoPoint, GeofenceConfig, GeofenceSet, LivePosition,
    OverlapPolicy, ReferencePoint, Route,
};

fn main() {
    let track: Vec<GeoPoint> = (0..=40).map(|i| GeoPoint::new(42.0, 1.0 + i as f64 * 0.001)).collect();
    let route = Route::build(&track).expect("demo track is valid");

    let references = vec![
        ReferencePoint::new("start", "Start", GeoPoint::new(42.0, 1.0)),
        ReferencePoint::new("aid", "Aid station zone", GeoPoint::new(42.0, 1.02)).with_radius(250.0),
        ReferencePoint::new("mat", "Timing mat", GeoPoint::new(42.0, 1.021)).with_radius(15.0),
        ReferencePoint::new("finish", "Finish", GeoPoint::new(42.0, 1.04)),
    ];
    let config = GeofenceConfig {
        overlap_policy: OverlapPolicy::SmallestRadius,
        ..GeofenceConfig::default()
    };
    let set = GeofenceSet::new(references, config).expect("demo references are valid");

    println!("Live Tracking Example\n");

    let mut tracker = CrossingTracker::new(set.clone());
    for fix in route.points().iter().map(|rp| rp.point) {
        if let Ok(Some(event)) = tracker.observe("bib-12", &fix) {
            println!("  bib-12 crossed {} ({:.0} m from centre)", event.reference_name, event.distance_m);
        }
    }

    let positions = vec![
        LivePosition { participant_id: "bib-7".into(), position: GeoPoint::new(42.0002, 1.013) },
        LivePosition { participant_id: "bib-3".into(), position: GeoPoint::new(42.0, 1.021) },
    ];
    match annotate_positions(&positions, Some(&route), &set) {
        Ok(annotations) => {
            println!();
            for (id, a) in annotations {
                println!(
                    "  {id}: km {:.2}, inside {}, {:.0} m to finish",
                    a.km_on_route.unwrap_or_default(),
                    a.inside.map(|m| m.reference.name).unwrap_or_else(|| "-".into()),
                    a.distance_to_finish_m.unwrap_or_default()
                );
            }
        }
        Err(e) => eprintln!("Annotation failed: {e}"),
    }
}
