//! Trip store on a real database file.

use ride_tracker::{
    LiveTracker, OdometerReading, RoutePoint, TrackerConfig, TripStore, VehicleType,
};

const T0: i64 = 1_700_000_000_000;

fn record_trip(vehicle: VehicleType, fixes: i64, start_ms: i64) -> ride_tracker::RecordedTrip {
    let mut tracker = LiveTracker::new(vehicle, TrackerConfig::default());
    tracker.start(start_ms).unwrap();
    for i in 0..fixes {
        let fix = RoutePoint::new(45.0, 7.0 + i as f64 * 0.00005, start_ms + i * 1000)
            .with_accuracy(4.0)
            .with_speed(4.0);
        tracker.on_fix(fix);
    }
    tracker.finish(start_ms + fixes * 1000).unwrap()
}

#[test]
fn test_trips_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trips.db");
    let path = path.to_str().unwrap();

    let (first, second) = {
        let store = TripStore::open(path).unwrap();
        let first = store
            .save_trip(&record_trip(VehicleType::EBike, 120, T0))
            .unwrap();
        let second = store
            .save_trip(&record_trip(VehicleType::Unicycle, 40, T0 + 600_000))
            .unwrap();
        store
            .add_odometer_reading(&OdometerReading::new("ebike-1", 1_204.0, T0))
            .unwrap();
        store
            .add_odometer_reading(&OdometerReading::new("ebike-1", 1_210.5, T0 + 86_400_000))
            .unwrap();
        (first, second)
    };

    let store = TripStore::open(path).unwrap();
    let trips = store.list_trips().unwrap();
    assert_eq!(trips.len(), 2);
    assert_eq!(trips[0].id, second);
    assert_eq!(trips[1].id, first);
    assert_eq!(trips[1].vehicle, VehicleType::EBike);

    let points = store.load_points(first).unwrap().unwrap();
    assert_eq!(points.len(), 120);
    assert_eq!(points[0].speed_mps, Some(4.0));

    let totals = store.totals().unwrap();
    assert_eq!(totals.trip_count, 2);
    assert!(totals.distance_km > 0.0);
    assert!(totals.co2_saved_g > 0.0);

    let log = store.odometer_log("ebike-1").unwrap();
    assert!((log.total_distance_km("ebike-1") - 6.5).abs() < 1e-9);
}

#[test]
fn test_store_matches_fresh_analysis() {
    let store = TripStore::in_memory().unwrap();
    let trip = record_trip(VehicleType::Bike, 90, T0);
    let id = store.save_trip(&trip).unwrap();

    let stored = store.load_trip(id).unwrap().unwrap();
    let fresh = trip.analyze(&Default::default());
    assert_eq!(stored.statistics, fresh);
    assert_eq!(stored.point_count, 90);
}
