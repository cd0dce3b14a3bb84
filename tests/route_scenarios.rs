//! End-to-end scenarios: raw fixes in, statistics out.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ride_tracker::geo_utils::haversine_points;
use ride_tracker::{
    analyze_route, filter_outliers, haversine_distance, total_distance, AnalyzerConfig,
    FixOutcome, ForegroundHost, GpsPoint, RoutePoint, RouteStatistics, TrackerConfig, TrackingService,
    TrackingState, VehicleType,
};

const T0: i64 = 1_700_000_000_000;
/// ~2.78 m of longitude at the equator (10 km/h at 1 Hz)
const STEP_10_KMH: f64 = 0.000025;

fn ride(start_index: i64, count: i64, start_ts: i64) -> Vec<RoutePoint> {
    (0..count)
        .map(|i| {
            RoutePoint::new(0.0, (start_index + i) as f64 * STEP_10_KMH, start_ts + i * 1000)
                .with_accuracy(5.0)
        })
        .collect()
}

#[test]
fn test_distance_symmetry_and_identity() {
    let a = RoutePoint::new(48.2082, 16.3738, 0);
    let b = RoutePoint::new(47.0707, 15.4395, 0);
    assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
    assert_eq!(haversine_distance(&a, &a), 0.0);
    // Vienna to Graz, ~145 km
    assert!((haversine_distance(&a, &b) - 145_000.0).abs() < 2_000.0);

    let p = GpsPoint::new(-33.86, 151.21);
    assert_eq!(haversine_points(&p, &p), 0.0);
}

#[test]
fn test_total_distance_degenerate() {
    assert_eq!(total_distance(&[]), 0.0);
    assert_eq!(total_distance(&[RoutePoint::new(1.0, 2.0, 0)]), 0.0);
}

#[test]
fn test_steady_ten_kmh_ride() {
    let stats = analyze_route(&ride(0, 10, T0), VehicleType::Scooter);

    assert_eq!(stats.segment_count, 1);
    assert!((stats.moving_percentage - 100.0).abs() < 1e-9);
    assert!((stats.average_speed_kmh - 10.0).abs() < 0.5);
    assert!((stats.total_distance_m - 25.0).abs() < 0.5);
    assert_eq!(stats.pause_count, 0);
    assert_eq!(stats.points_rejected, 0);
}

#[test]
fn test_stationary_dwell() {
    // Five fixes over 20 s, jittering by ~0.5 m
    let points: Vec<RoutePoint> = (0..5)
        .map(|i| {
            let jitter = if i % 2 == 0 { 0.0 } else { 0.000005 };
            RoutePoint::new(0.0, jitter, T0 + i * 5_000).with_accuracy(5.0)
        })
        .collect();

    let stats = analyze_route(&points, VehicleType::Bike);
    assert_eq!(stats.segment_count, 0);
    assert_eq!(stats.moving_percentage, 0.0);
    assert_eq!(stats.pause_count, 1);
    assert_eq!(stats.pauses[0].duration_ms, 20_000);
    assert_eq!(stats.pauses[0].start_time_ms, T0);
    assert_eq!(stats.pauses[0].end_time_ms, T0 + 20_000);
}

#[test]
fn test_session_gap_splits_segments() {
    let mut points = ride(0, 10, T0);
    points.extend(ride(10, 10, T0 + 9_000 + 35_000));

    let stats = analyze_route(&points, VehicleType::Scooter);
    assert_eq!(stats.segment_count, 2);
    assert_eq!(stats.moving_time_ms, 18_000);
    assert_eq!(stats.total_time_ms, 53_000);
    // The gap is never counted as riding
    assert!((stats.total_distance_m - 18.0 * 2.78).abs() < 0.5);
}

#[test]
fn test_inaccurate_fix_dropped() {
    let mut points = ride(0, 7, T0);
    points[3] = points[3].with_accuracy(25.0);

    let filtered = filter_outliers(&points, &AnalyzerConfig::default());
    assert_eq!(filtered.len(), 6);
    assert_eq!(filtered[2], points[2]);
    assert_eq!(filtered[3], points[4]);

    assert_eq!(analyze_route(&points, VehicleType::Bike).points_rejected, 1);
}

#[test]
fn test_shuffled_input_matches_sorted() {
    let sorted = ride(0, 10, T0);
    let mut shuffled = sorted.clone();
    shuffled.swap(2, 7);
    shuffled.swap(0, 5);

    assert_eq!(
        analyze_route(&shuffled, VehicleType::Scooter),
        analyze_route(&sorted, VehicleType::Scooter)
    );
}

#[test]
fn test_too_short_input_is_zeroed() {
    let stats = analyze_route(&ride(0, 1, T0), VehicleType::Unicycle);
    assert_eq!(stats, RouteStatistics::default());
}

#[derive(Default)]
struct Host {
    wake_lock: AtomicBool,
    notifications: AtomicUsize,
}

impl ForegroundHost for Host {
    fn acquire_wake_lock(&self) {
        self.wake_lock.store(true, Ordering::SeqCst);
    }
    fn release_wake_lock(&self) {
        self.wake_lock.store(false, Ordering::SeqCst);
    }
    fn show_notification(&self, _text: &str) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
    }
    fn cancel_notification(&self) {}
}

#[tokio::test]
async fn test_recorded_trip_round_trip_through_service() {
    let _ = env_logger::builder().is_test(true).try_init();
    let host = Arc::new(Host::default());
    let mut service =
        TrackingService::new(Arc::clone(&host), VehicleType::Scooter, TrackerConfig::default());

    let mut subscriber = service.subscribe();
    let watcher = tokio::spawn(async move {
        while let Some(snapshot) = subscriber.changed().await {
            if snapshot.state == TrackingState::Finished {
                return Some(snapshot);
            }
        }
        None
    });

    service.start(T0).unwrap();
    // 20 km/h at 1 Hz, every other fix too noisy to keep
    for i in 0..30 {
        let fix = RoutePoint::new(0.0, i as f64 * 0.00005, T0 + i * 1000)
            .with_accuracy(if i % 2 == 0 { 5.0 } else { 45.0 });
        let outcome = service.on_location(fix);
        if i % 2 == 1 {
            assert_eq!(outcome, FixOutcome::RejectedAccuracy);
        }
    }
    let trip = service.stop(T0 + 30_000).unwrap();
    assert!(!host.wake_lock.load(Ordering::SeqCst));

    let finished = watcher.await.unwrap().unwrap();
    assert_eq!(finished.point_count, 15);
    assert_eq!(finished.distance_m, trip.live.distance_m);

    let stats = trip.analyze(&AnalyzerConfig::default());
    assert_eq!(stats.segment_count, 1);
    assert!((stats.total_distance_m - trip.live.distance_m).abs() < 1e-6);
    assert!((stats.average_speed_kmh - 20.0).abs() < 0.5);
}
