//! # Route Analyzer
//!
//! Post-hoc statistics for a finished recording. The analyzer re-derives
//! everything from the raw fix list instead of trusting the live counters,
//! which saw the fixes one at a time and could not look ahead.
//!
//! ## Pipeline
//!
//! 1. **Normalize**: drop invalid coordinates, sort by timestamp, drop
//!    duplicate timestamps
//! 2. **Outlier filter**: reject interior fixes with implausible speed,
//!    speed jumps, poor accuracy or teleport-sized steps
//! 3. **Moving segments**: runs of fix pairs that look like riding,
//!    split at session gaps
//! 4. **Pauses**: runs of fix pairs that stay put for long enough
//! 5. **Aggregate**: distance, moving time, speeds, percentages
//!
//! Every stage degrades to an empty result for fewer than two points.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::emissions::co2_saved_grams;
use crate::geo_utils::{haversine_distance, ms_to_kmh, simplify_for_display, speed_kmh};
use crate::{
    Bounds, GpsPoint, MovingSegment, Pause, Result, RoutePoint, RouteStatistics, RouteSummary,
    TrackerError, VehicleType,
};

/// Configuration for route analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Incoming or outgoing speed above this marks a fix as an outlier.
    /// Default: 80 km/h
    pub outlier_max_speed_kmh: f64,

    /// Difference between incoming and outgoing speed above this marks a fix as an outlier.
    /// Default: 30 km/h
    pub outlier_max_speed_delta_kmh: f64,

    /// Fixes with accuracy at or above this are outliers.
    /// Default: 20 m
    pub outlier_max_accuracy_m: f64,

    /// Step from the previous kept fix above this marks a fix as an outlier.
    /// Default: 200 m
    pub outlier_max_step_m: f64,

    /// Time gap that splits a recording into separate sessions.
    /// Default: 30 s
    pub session_gap_ms: i64,

    /// Minimum step between fixes for a pair to count as moving.
    /// Default: 2.5 m (a 10 km/h ride sampled at 1 Hz covers ~2.8 m)
    pub min_moving_step_m: f64,

    /// Both fixes of a moving pair need accuracy below this.
    /// Default: 15 m
    pub segment_max_accuracy_m: f64,

    /// Longest gap between two fixes of the same pause.
    /// Default: 15 s
    pub pause_max_gap_ms: i64,

    /// Pair speeds at or above this are sensor errors and never count as max speed.
    /// Applies to every retained pair within a session, not only moving pairs.
    /// Default: 100 km/h
    pub max_plausible_speed_kmh: f64,

    /// Douglas-Peucker tolerance for summary previews (degrees).
    /// Default: 0.0001 (~11 meters)
    pub preview_tolerance_deg: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            outlier_max_speed_kmh: 80.0,
            outlier_max_speed_delta_kmh: 30.0,
            outlier_max_accuracy_m: 20.0,
            outlier_max_step_m: 200.0,
            session_gap_ms: 30_000,
            min_moving_step_m: 2.5,
            segment_max_accuracy_m: 15.0,
            pause_max_gap_ms: 15_000,
            max_plausible_speed_kmh: 100.0,
            preview_tolerance_deg: 0.0001,
        }
    }
}

impl AnalyzerConfig {
    /// Parse a JSON override. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AnalyzerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("outlier_max_speed_kmh", self.outlier_max_speed_kmh),
            ("outlier_max_speed_delta_kmh", self.outlier_max_speed_delta_kmh),
            ("outlier_max_accuracy_m", self.outlier_max_accuracy_m),
            ("outlier_max_step_m", self.outlier_max_step_m),
            ("segment_max_accuracy_m", self.segment_max_accuracy_m),
            ("max_plausible_speed_kmh", self.max_plausible_speed_kmh),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrackerError::ConfigError {
                    message: format!("{} must be positive, got {}", name, value),
                });
            }
        }
        if self.session_gap_ms <= 0 || self.pause_max_gap_ms <= 0 {
            return Err(TrackerError::ConfigError {
                message: "gap limits must be positive".to_string(),
            });
        }
        if self.min_moving_step_m < 0.0 || self.preview_tolerance_deg < 0.0 {
            return Err(TrackerError::ConfigError {
                message: "step and tolerance must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Make a raw fix list safe to analyze.
///
/// Drops fixes with invalid coordinates, stable-sorts by timestamp and keeps
/// only the first fix of each timestamp. Clock skew therefore reorders fixes
/// instead of producing negative time deltas.
pub fn normalize_points(points: &[RoutePoint]) -> Vec<RoutePoint> {
    let mut normalized: Vec<RoutePoint> = points.iter().filter(|p| p.is_valid()).copied().collect();
    let invalid = points.len() - normalized.len();

    let out_of_order = normalized
        .windows(2)
        .filter(|w| w[1].timestamp_ms < w[0].timestamp_ms)
        .count();
    if out_of_order > 0 {
        normalized.sort_by_key(|p| p.timestamp_ms);
    }

    let before_dedup = normalized.len();
    normalized.dedup_by_key(|p| p.timestamp_ms);
    let duplicates = before_dedup - normalized.len();

    if invalid + out_of_order + duplicates > 0 {
        warn!(
            "[RouteAnalyzer] Normalized input: {} invalid, {} out of order, {} duplicate timestamps",
            invalid, out_of_order, duplicates
        );
    }

    normalized
}

// ============================================================================
// Outlier Filtering
// ============================================================================

/// Remove implausible interior fixes. First and last fixes are always kept.
///
/// Each interior fix is compared against the last kept fix (incoming) and
/// the next raw fix (outgoing).
pub fn filter_outliers(points: &[RoutePoint], config: &AnalyzerConfig) -> Vec<RoutePoint> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut kept: Vec<RoutePoint> = Vec::with_capacity(points.len());
    kept.push(points[0]);

    for i in 1..points.len() - 1 {
        let prev = kept[kept.len() - 1];
        let curr = points[i];
        let next = points[i + 1];

        let speed_in = speed_kmh(&prev, &curr);
        let speed_out = speed_kmh(&curr, &next);

        let too_fast = speed_in > config.outlier_max_speed_kmh
            || speed_out > config.outlier_max_speed_kmh;
        let speed_jump = (speed_in - speed_out).abs() > config.outlier_max_speed_delta_kmh;
        let inaccurate = curr
            .known_accuracy()
            .map_or(false, |a| a >= config.outlier_max_accuracy_m);
        let teleport = haversine_distance(&prev, &curr) > config.outlier_max_step_m;

        if !(too_fast || speed_jump || inaccurate || teleport) {
            kept.push(curr);
        }
    }

    kept.push(points[points.len() - 1]);

    let rejected = points.len() - kept.len();
    if rejected > 0 {
        debug!(
            "[RouteAnalyzer] Filtered {} outliers from {} points",
            rejected,
            points.len()
        );
    }
    kept
}

// ============================================================================
// Segment Detection
// ============================================================================

/// Split a filtered route into moving segments.
///
/// A pair of consecutive fixes is moving when its speed lies within the
/// vehicle's plausible range, the step exceeds the jitter floor and both
/// fixes are accurate enough. Contiguous moving pairs form a segment; a
/// gap longer than `session_gap_ms` closes the current segment and the pair
/// spanning the gap is never counted.
pub fn detect_moving_segments(
    points: &[RoutePoint],
    vehicle: VehicleType,
    config: &AnalyzerConfig,
) -> Vec<MovingSegment> {
    let thresholds = vehicle.thresholds();
    let mut segments = Vec::new();
    let mut current: Vec<RoutePoint> = Vec::new();

    for pair in points.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let dt = curr.timestamp_ms - prev.timestamp_ms;

        if dt > config.session_gap_ms {
            close_segment(&mut current, &mut segments);
            continue;
        }

        let speed = speed_kmh(prev, curr);
        let distance = haversine_distance(prev, curr);
        let accurate = [prev, curr].iter().all(|p| {
            p.known_accuracy()
                .map_or(true, |a| a < config.segment_max_accuracy_m)
        });

        let moving = dt > 0
            && speed >= thresholds.min_speed_kmh
            && speed <= thresholds.max_speed_kmh
            && distance > config.min_moving_step_m
            && accurate;

        if moving {
            if current.is_empty() {
                current.push(*prev);
            }
            current.push(*curr);
        } else {
            close_segment(&mut current, &mut segments);
        }
    }
    close_segment(&mut current, &mut segments);

    debug!(
        "[RouteAnalyzer] {} moving segments from {} points",
        segments.len(),
        points.len()
    );
    segments
}

fn close_segment(current: &mut Vec<RoutePoint>, segments: &mut Vec<MovingSegment>) {
    if current.len() >= 2 {
        segments.push(MovingSegment {
            points: std::mem::take(current),
        });
    } else {
        current.clear();
    }
}

// ============================================================================
// Pause Detection
// ============================================================================

/// Find dwells where the rider stayed within the vehicle's pause radius.
///
/// A pair is stationary when its speed is at or below the pause speed, the
/// step is inside the pause radius and the fixes are less than
/// `pause_max_gap_ms` apart. A run of stationary pairs is reported only if
/// it holds enough fixes and lasts long enough.
pub fn detect_pauses(
    points: &[RoutePoint],
    vehicle: VehicleType,
    config: &AnalyzerConfig,
) -> Vec<Pause> {
    let thresholds = vehicle.thresholds();
    let mut pauses = Vec::new();
    let mut candidate: Vec<RoutePoint> = Vec::new();

    let mut flush = |candidate: &mut Vec<RoutePoint>| {
        if let Some(pause) = confirm_pause(
            candidate,
            thresholds.min_points_for_pause,
            thresholds.min_pause_duration_ms,
        ) {
            pauses.push(pause);
        }
        candidate.clear();
    };

    for pair in points.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let dt = curr.timestamp_ms - prev.timestamp_ms;

        let stationary = dt >= 0
            && dt < config.pause_max_gap_ms
            && speed_kmh(prev, curr) <= thresholds.pause_speed_kmh
            && haversine_distance(prev, curr) < thresholds.pause_radius_m;

        if stationary {
            if candidate.is_empty() {
                candidate.push(*prev);
            }
            candidate.push(*curr);
        } else {
            flush(&mut candidate);
        }
    }
    flush(&mut candidate);

    debug!("[RouteAnalyzer] {} pauses detected", pauses.len());
    pauses
}

fn confirm_pause(candidate: &[RoutePoint], min_points: u32, min_duration_ms: i64) -> Option<Pause> {
    let first = candidate.first()?;
    let last = candidate.last()?;
    let duration_ms = last.timestamp_ms - first.timestamp_ms;

    if candidate.len() < min_points as usize || duration_ms < min_duration_ms {
        return None;
    }

    let n = candidate.len() as f64;
    let location = GpsPoint::new(
        candidate.iter().map(|p| p.latitude).sum::<f64>() / n,
        candidate.iter().map(|p| p.longitude).sum::<f64>() / n,
    );

    Some(Pause {
        start_time_ms: first.timestamp_ms,
        end_time_ms: last.timestamp_ms,
        duration_ms,
        location,
    })
}

// ============================================================================
// Aggregation
// ============================================================================

/// Analyze a finished route with default configuration.
pub fn analyze_route(points: &[RoutePoint], vehicle: VehicleType) -> RouteStatistics {
    analyze_route_with_config(points, vehicle, &AnalyzerConfig::default())
}

/// Analyze a finished route.
///
/// Returns zeroed statistics when fewer than two usable points remain.
pub fn analyze_route_with_config(
    points: &[RoutePoint],
    vehicle: VehicleType,
    config: &AnalyzerConfig,
) -> RouteStatistics {
    let normalized = normalize_points(points);
    if normalized.len() < 2 {
        debug!(
            "[RouteAnalyzer] {} usable points, returning empty statistics",
            normalized.len()
        );
        return RouteStatistics::default();
    }

    let filtered = filter_outliers(&normalized, config);
    let segments = detect_moving_segments(&filtered, vehicle, config);
    let pauses = detect_pauses(&filtered, vehicle, config);

    let total_distance_m: f64 = segments.iter().map(|s| s.distance_m()).sum();
    let moving_time_ms: i64 = segments.iter().map(|s| s.duration_ms()).sum();

    let max_speed_kmh = filtered
        .windows(2)
        .filter(|w| w[1].timestamp_ms - w[0].timestamp_ms <= config.session_gap_ms)
        .map(|w| speed_kmh(&w[0], &w[1]))
        .filter(|&speed| speed < config.max_plausible_speed_kmh)
        .fold(0.0, f64::max);

    let total_time_ms = match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => last.end_time() - first.start_time(),
        _ => 0,
    };
    let elapsed_time_ms = filtered[filtered.len() - 1].timestamp_ms - filtered[0].timestamp_ms;

    let average_speed_kmh = speed_over(total_distance_m, moving_time_ms);
    let average_overall_speed_kmh = speed_over(total_distance_m, elapsed_time_ms);

    let moving_percentage = if total_time_ms > 0 {
        (moving_time_ms as f64 / total_time_ms as f64 * 100.0).min(100.0)
    } else {
        0.0
    };

    let pause_time_ms = pauses.iter().map(|p| p.duration_ms).sum();

    let stats = RouteStatistics {
        total_distance_m,
        total_distance_km: total_distance_m / 1000.0,
        moving_time_ms,
        total_time_ms,
        elapsed_time_ms,
        average_speed_kmh,
        average_overall_speed_kmh,
        max_speed_kmh,
        moving_percentage,
        pause_count: pauses.len() as u32,
        pause_time_ms,
        pauses,
        segment_count: segments.len() as u32,
        points_retained: filtered.len() as u32,
        points_rejected: (points.len() - filtered.len()) as u32,
    };

    debug!(
        "[RouteAnalyzer] {:.0}m in {} segments, moving {}ms of {}ms, {} pauses",
        stats.total_distance_m,
        stats.segment_count,
        stats.moving_time_ms,
        stats.total_time_ms,
        stats.pause_count
    );

    stats
}

fn speed_over(distance_m: f64, duration_ms: i64) -> f64 {
    if duration_ms <= 0 {
        return 0.0;
    }
    ms_to_kmh(distance_m / (duration_ms as f64 / 1000.0))
}

/// Build the user-facing summary for a finished trip.
pub fn summarize_route(
    points: &[RoutePoint],
    vehicle: VehicleType,
    config: &AnalyzerConfig,
) -> RouteSummary {
    let stats = analyze_route_with_config(points, vehicle, config);
    let normalized = normalize_points(points);

    RouteSummary {
        vehicle,
        distance_km: stats.total_distance_km,
        moving_time_ms: stats.moving_time_ms,
        elapsed_time_ms: stats.elapsed_time_ms,
        average_speed_kmh: stats.average_speed_kmh,
        max_speed_kmh: stats.max_speed_kmh,
        pause_count: stats.pause_count,
        co2_saved_g: co2_saved_grams(stats.total_distance_m, vehicle),
        bounds: Bounds::from_points(&normalized),
        preview: simplify_for_display(&normalized, config.preview_tolerance_deg),
    }
}

/// Analyze many routes in sequence.
pub fn analyze_routes(
    routes: &[Vec<RoutePoint>],
    vehicle: VehicleType,
    config: &AnalyzerConfig,
) -> Vec<RouteStatistics> {
    routes
        .iter()
        .map(|points| analyze_route_with_config(points, vehicle, config))
        .collect()
}

/// Analyze many routes in parallel (e.g. re-analysis after a config change).
///
/// Small batches are analyzed sequentially.
#[cfg(feature = "parallel")]
pub fn analyze_routes_parallel(
    routes: &[Vec<RoutePoint>],
    vehicle: VehicleType,
    config: &AnalyzerConfig,
) -> Vec<RouteStatistics> {
    if routes.len() < 4 {
        return analyze_routes(routes, vehicle, config);
    }

    routes
        .par_iter()
        .map(|points| analyze_route_with_config(points, vehicle, config))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
