//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose Rust functionality
//! to Kotlin and Swift. Free functions are prefixed with `ffi_` to avoid
//! naming conflicts with the internal API. Lifecycle errors are logged and
//! reported as `false`/`None` so the host never has to catch exceptions.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use crate::analyzer::{analyze_route_with_config, summarize_route, AnalyzerConfig};
use crate::geo_utils::haversine_points;
use crate::tracker::{FixOutcome, LiveTracker, RecordedTrip, TrackerConfig};
use crate::weather::{route_advisory, RouteAdvisory, WeatherConditions};
use crate::{
    co2_saved_grams, init_logging, GpsPoint, RoutePoint, RouteStatistics, RouteSummary,
    TrackingSnapshot, VehicleType,
};

// ============================================================================
// Route Analysis
// ============================================================================

/// Analyze a recorded route with default settings.
#[uniffi::export]
pub fn ffi_analyze_route(points: Vec<RoutePoint>, vehicle: VehicleType) -> RouteStatistics {
    init_logging();
    info!(
        "[RideTrackerRust] analyze_route called for {} with {} points",
        vehicle,
        points.len()
    );
    analyze_route_with_config(&points, vehicle, &AnalyzerConfig::default())
}

/// Analyze a recorded route with custom configuration.
#[uniffi::export]
pub fn ffi_analyze_route_with_config(
    points: Vec<RoutePoint>,
    vehicle: VehicleType,
    config: AnalyzerConfig,
) -> RouteStatistics {
    init_logging();
    analyze_route_with_config(&points, vehicle, &config)
}

/// Summarize a recorded route for the trip detail screen.
#[uniffi::export]
pub fn ffi_summarize_route(points: Vec<RoutePoint>, vehicle: VehicleType) -> RouteSummary {
    init_logging();
    summarize_route(&points, vehicle, &AnalyzerConfig::default())
}

/// Analyze many routes at once (history import).
#[uniffi::export]
pub fn ffi_analyze_routes(routes: Vec<Vec<RoutePoint>>, vehicle: VehicleType) -> Vec<RouteStatistics> {
    init_logging();
    info!("[RideTrackerRust] Analyzing {} routes", routes.len());

    let start = std::time::Instant::now();
    let results = crate::analyzer::analyze_routes_parallel(&routes, vehicle, &AnalyzerConfig::default());
    info!(
        "[RideTrackerRust] Analyzed {} routes in {:?}",
        results.len(),
        start.elapsed()
    );
    results
}

/// Great-circle distance between two coordinates in meters.
#[uniffi::export]
pub fn ffi_haversine(a: GpsPoint, b: GpsPoint) -> f64 {
    haversine_points(&a, &b)
}

#[uniffi::export]
pub fn ffi_co2_saved_grams(distance_m: f64, vehicle: VehicleType) -> f64 {
    co2_saved_grams(distance_m, vehicle)
}

// ============================================================================
// Weather
// ============================================================================

#[uniffi::export]
pub fn ffi_route_advisory(conditions: WeatherConditions) -> RouteAdvisory {
    route_advisory(&conditions)
}

/// Fetch current conditions and return riding advice. Blocks the calling thread.
#[cfg(feature = "http")]
#[uniffi::export]
pub fn ffi_fetch_route_advisory(api_key: String, latitude: f64, longitude: f64) -> Option<RouteAdvisory> {
    init_logging();
    match crate::http::fetch_advisory_sync(&api_key, latitude, longitude) {
        Ok(advice) => Some(advice),
        Err(e) => {
            warn!("[RideTrackerRust] Weather lookup failed: {}", e);
            None
        }
    }
}

// ============================================================================
// Live Tracker
// ============================================================================

/// Live tracker owned by the platform's foreground service.
#[derive(uniffi::Object)]
pub struct TrackerHandle {
    inner: Mutex<LiveTracker>,
}

impl TrackerHandle {
    fn tracker(&self) -> MutexGuard<'_, LiveTracker> {
        // Counters stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn report(operation: &str, result: crate::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("[TrackerHandle] {} failed: {}", operation, e);
                false
            }
        }
    }
}

#[uniffi::export]
impl TrackerHandle {
    #[uniffi::constructor]
    pub fn new(vehicle: VehicleType, config: Option<TrackerConfig>) -> Arc<Self> {
        init_logging();
        Arc::new(Self {
            inner: Mutex::new(LiveTracker::new(vehicle, config.unwrap_or_default())),
        })
    }

    pub fn start(&self, now_ms: i64) -> bool {
        Self::report("start", self.tracker().start(now_ms))
    }

    pub fn pause(&self, now_ms: i64) -> bool {
        Self::report("pause", self.tracker().pause(now_ms))
    }

    pub fn resume(&self, now_ms: i64) -> bool {
        Self::report("resume", self.tracker().resume(now_ms))
    }

    pub fn on_fix(&self, point: RoutePoint) -> FixOutcome {
        self.tracker().on_fix(point)
    }

    pub fn tick(&self, now_ms: i64) {
        self.tracker().tick(now_ms);
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.tracker().snapshot()
    }

    pub fn finish(&self, now_ms: i64) -> Option<RecordedTrip> {
        match self.tracker().finish(now_ms) {
            Ok(trip) => Some(trip),
            Err(e) => {
                warn!("[TrackerHandle] finish failed: {}", e);
                None
            }
        }
    }

    pub fn cancel(&self) {
        self.tracker().cancel();
    }
}
