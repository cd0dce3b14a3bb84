//! # Ride Tracker
//!
//! GPS trip tracking and route analysis for personal micromobility vehicles
//! (scooters, bikes, e-bikes, unicycles).
//!
//! This library provides:
//! - Haversine geodesy and trip distance
//! - Adaptive speed smoothing for live GPS speed readouts
//! - A live sampling state machine that filters noisy fixes while recording
//! - Post-hoc route analysis: outlier rejection, moving segments, pauses
//! - Weather advisory heuristics for riding conditions
//!
//! ## Features
//!
//! - **`parallel`** - Analyze many routes in parallel with rayon
//! - **`http`** - Enable the weather provider client
//! - **`persistence`** - Enable SQLite trip and odometer storage
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use ride_tracker::{analyze_route, RoutePoint, VehicleType};
//!
//! // Ten fixes one second apart, ~2.78 m each (10 km/h)
//! let points: Vec<RoutePoint> = (0..10)
//!     .map(|i| RoutePoint::new(51.5, -0.1 + i as f64 * 0.00004, i * 1000).with_accuracy(5.0))
//!     .collect();
//!
//! let stats = analyze_route(&points, VehicleType::Scooter);
//! println!("{:.1} km/h over {:.0} m", stats.average_speed_kmh, stats.total_distance_m);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Unified error handling
pub mod error;
pub use error::{Result, TrackerError};

// Geographic utilities (distance, bounds, formatting)
pub mod geo_utils;
pub use geo_utils::{haversine_distance, total_distance};

// Adaptive exponential smoothing for live speed
pub mod smoothing;
pub use smoothing::AdaptiveSpeedSmoother;

// Post-hoc route analysis
pub mod analyzer;
pub use analyzer::{
    analyze_route, analyze_route_with_config, detect_moving_segments, detect_pauses,
    filter_outliers, normalize_points, summarize_route, AnalyzerConfig,
};
#[cfg(feature = "parallel")]
pub use analyzer::analyze_routes_parallel;

// Observable tracking state (single writer, many subscribers)
pub mod state;
pub use state::{StateSubscriber, StateWriter, TrackingEvent, TrackingSnapshot, TrackingState};

// Live sampling loop and foreground tracking service
pub mod tracker;
pub use tracker::{
    FixOutcome, ForegroundHost, LiveTracker, RecordedTrip, TrackerConfig, TrackingService,
    WakeLockGuard,
};

// CO2 savings per vehicle
pub mod emissions;
pub use emissions::co2_saved_grams;

// Odometer readings
pub mod odometer;
pub use odometer::{OdometerLog, OdometerReading};

// Weather advisory heuristics
pub mod weather;
pub use weather::{route_advisory, Advisory, RouteAdvisory, WeatherConditions};

// HTTP client for weather conditions
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::WeatherClient;

// SQLite trip storage
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::{StoredTrip, TripStore, TripTotals, VehicleTotals};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("RideTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A plain GPS coordinate with latitude and longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One GPS fix captured while recording a trip.
///
/// Timestamps within a route are expected to be non-decreasing. The analyzer
/// normalizes lists that break this (see [`normalize_points`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RoutePoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Unix timestamp in milliseconds
    pub timestamp_ms: i64,
    /// Altitude in meters (optional)
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters (optional)
    pub accuracy_m: Option<f64>,
    /// Speed reported by the receiver in m/s (optional)
    pub speed_mps: Option<f64>,
}

impl RoutePoint {
    /// Create a point with no optional fields.
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
            altitude: None,
            accuracy_m: None,
            speed_mps: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = Some(accuracy_m);
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Reported accuracy, with non-finite values treated as unreported.
    pub fn known_accuracy(&self) -> Option<f64> {
        self.accuracy_m.filter(|a| a.is_finite())
    }

    /// Coordinates of this fix.
    pub fn position(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.position().is_valid()
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from route points.
    pub fn from_points(points: &[RoutePoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

// ============================================================================
// Vehicles
// ============================================================================

/// Kind of personal vehicle a trip was recorded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum VehicleType {
    Scooter,
    Bike,
    EBike,
    Unicycle,
}

/// Per-vehicle plausibility and pause thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct VehicleThresholds {
    /// Slowest speed still counted as riding (km/h)
    pub min_speed_kmh: f64,
    /// Fastest plausible speed for this vehicle (km/h)
    pub max_speed_kmh: f64,
    /// At or below this speed the rider is considered stopped (km/h)
    pub pause_speed_kmh: f64,
    /// Maximum drift between fixes during a pause (meters)
    pub pause_radius_m: f64,
    /// Shortest dwell reported as a pause
    pub min_pause_duration_ms: i64,
    /// Fewest fixes needed to confirm a pause
    pub min_points_for_pause: u32,
}

impl VehicleType {
    /// All supported vehicle types.
    pub const ALL: [VehicleType; 4] = [
        VehicleType::Scooter,
        VehicleType::Bike,
        VehicleType::EBike,
        VehicleType::Unicycle,
    ];

    pub fn thresholds(&self) -> VehicleThresholds {
        match self {
            VehicleType::Scooter => VehicleThresholds {
                min_speed_kmh: 3.0,
                max_speed_kmh: 45.0,
                pause_speed_kmh: 2.0,
                pause_radius_m: 10.0,
                min_pause_duration_ms: 10_000,
                min_points_for_pause: 3,
            },
            VehicleType::Bike | VehicleType::EBike => VehicleThresholds {
                min_speed_kmh: 3.0,
                max_speed_kmh: 60.0,
                pause_speed_kmh: 2.0,
                pause_radius_m: 10.0,
                min_pause_duration_ms: 10_000,
                min_points_for_pause: 3,
            },
            VehicleType::Unicycle => VehicleThresholds {
                min_speed_kmh: 2.0,
                max_speed_kmh: 40.0,
                pause_speed_kmh: 1.5,
                pause_radius_m: 8.0,
                min_pause_duration_ms: 10_000,
                min_points_for_pause: 3,
            },
        }
    }

    /// Stable identifier used for storage and display.
    pub fn label(&self) -> &'static str {
        match self {
            VehicleType::Scooter => "scooter",
            VehicleType::Bike => "bike",
            VehicleType::EBike => "ebike",
            VehicleType::Unicycle => "unicycle",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VehicleType {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scooter" => Ok(VehicleType::Scooter),
            "bike" | "bicycle" => Ok(VehicleType::Bike),
            "ebike" | "e-bike" => Ok(VehicleType::EBike),
            "unicycle" | "monowheel" => Ok(VehicleType::Unicycle),
            other => Err(TrackerError::ConfigError {
                message: format!("unknown vehicle type '{}'", other),
            }),
        }
    }
}

// ============================================================================
// Analysis Results
// ============================================================================

/// A maximal run of consecutive fixes classified as real motion.
///
/// Always holds at least two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingSegment {
    pub points: Vec<RoutePoint>,
}

impl MovingSegment {
    pub fn start_time(&self) -> i64 {
        self.points.first().map(|p| p.timestamp_ms).unwrap_or(0)
    }

    pub fn end_time(&self) -> i64 {
        self.points.last().map(|p| p.timestamp_ms).unwrap_or(0)
    }

    /// Time spent moving in this segment (ms).
    pub fn duration_ms(&self) -> i64 {
        self.end_time() - self.start_time()
    }

    /// Distance covered in this segment (meters).
    pub fn distance_m(&self) -> f64 {
        total_distance(&self.points)
    }
}

/// A detected dwell where the rider stayed within a small radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Pause {
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub duration_ms: i64,
    /// Mean position of the fixes in the dwell
    pub location: GpsPoint,
}

/// Aggregate statistics derived from a recorded route.
///
/// Too-short inputs produce [`RouteStatistics::default`], which is all zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct RouteStatistics {
    pub total_distance_m: f64,
    pub total_distance_km: f64,
    /// Time spent inside moving segments
    pub moving_time_ms: i64,
    /// First moving point to last moving point
    pub total_time_ms: i64,
    /// First to last retained point, pauses included
    pub elapsed_time_ms: i64,
    /// Distance over moving time
    pub average_speed_kmh: f64,
    /// Distance over elapsed time
    pub average_overall_speed_kmh: f64,
    pub max_speed_kmh: f64,
    /// Moving time as a percentage (0-100) of total time
    pub moving_percentage: f64,
    pub pause_count: u32,
    pub pause_time_ms: i64,
    pub pauses: Vec<Pause>,
    pub segment_count: u32,
    pub points_retained: u32,
    pub points_rejected: u32,
}

impl RouteStatistics {
    /// Serialize to JSON for hosts that consume statistics as a string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// User-facing summary of a finished trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteSummary {
    pub vehicle: VehicleType,
    pub distance_km: f64,
    pub moving_time_ms: i64,
    pub elapsed_time_ms: i64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub pause_count: u32,
    pub co2_saved_g: f64,
    pub bounds: Option<Bounds>,
    /// Simplified polyline for map previews
    pub preview: Vec<GpsPoint>,
}

// ============================================================================
// Tests
// ============================================================================
