//! Assign km marks to imported checkpoints.
//!
//! Run with: cargo run --example checkpoint_import

use race_route::{snap_waypoints, GeoPoint, Route, SnapConfig, Waypoint};

fn main() {
    // A 10 km out-and-back along the coast (roughly 100 m per point)
    let track: Vec<GeoPoint> = (0..=50)
        .map(|i| GeoPoint::with_elevation(41.38, 2.19 + i as f64 * 0.0012, 5.0 + (i % 10) as f64 * 3.0))
        .chain((0..=50).rev().map(|i| GeoPoint::with_elevation(41.381, 2.19 + i as f64 * 0.0012, 5.0)))
        .collect();

    let route = match Route::build(&track) {
        Ok(route) => route,
        Err(e) => {
            eprintln!("Could not build route: {e}");
            return;
        }
    };

    let stats = route.stats();
    println!("Checkpoint Import Example\n");
    println!(
        "Route: {} points, {:.2} km, +{:.0} m / -{:.0} m\n",
        stats.point_count, stats.total_distance_km, stats.elevation_gain_m, stats.elevation_loss_m
    );

    let waypoints = vec![
        Waypoint { id: "wp-3".into(), name: "Finish".into(), location: GeoPoint::new(41.381, 2.19) },
        Waypoint { id: "wp-2".into(), name: "Turnaround".into(), location: GeoPoint::new(41.3805, 2.25) },
        Waypoint { id: "wp-1".into(), name: "Aid station".into(), location: GeoPoint::new(41.3801, 2.22) },
        Waypoint { id: "wp-x".into(), name: "Parking".into(), location: GeoPoint::new(41.39, 2.21) },
    ];

    match snap_waypoints(&route, &waypoints, &SnapConfig::default()) {
        Ok(snapped) => {
            for s in snapped {
                println!(
                    "  {:<12} km {:>6.2}  (offset {:>4.0} m){}",
                    s.waypoint.name,
                    s.nearest.cumulative_distance_km,
                    s.nearest.straight_line_distance_km * 1000.0,
                    if s.on_route { "" } else { "  OFF ROUTE" }
                );
            }
        }
        Err(e) => eprintln!("Import failed: {e}"),
    }

    println!("\nDisplay polyline: {} of {} points", route.display_polyline(0.0001).len(), route.len());
}
