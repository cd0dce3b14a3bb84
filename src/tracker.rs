//! # Live Tracking
//!
//! Turns the stream of location callbacks delivered while a trip is being
//! recorded into running distance, speed and moving-time counters.
//!
//! [`LiveTracker`] is the pure state machine: it never reads a clock, every
//! input carries its own timestamp. [`TrackingService`] wraps it with the
//! foreground-service duties (wake lock, notification) and publishes
//! snapshots through the single [`StateWriter`].
//!
//! ## Fix filtering
//!
//! - accuracy worse than `max_accuracy_m` (30 m) is rejected; a fix without
//!   accuracy is assumed to be `assumed_accuracy_m` (100 m)
//! - a fix closer than `min_distance_m` (3 m) to the last accepted fix is
//!   rejected for distance, but still updates speed so the readout drops to
//!   zero when the rider stops

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::analyzer::{analyze_route_with_config, summarize_route, AnalyzerConfig};
use crate::geo_utils::{haversine_distance, ms_to_kmh};
use crate::smoothing::AdaptiveSpeedSmoother;
use crate::state::{self, StateSubscriber, StateWriter, TrackingEvent, TrackingSnapshot, TrackingState};
use crate::{Result, RoutePoint, RouteStatistics, RouteSummary, TrackerError, VehicleType};

/// Configuration for the live sampling loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TrackerConfig {
    /// Location request interval handed to the platform.
    /// Default: 1000 ms
    pub sample_interval_ms: i64,

    /// Fixes with accuracy above this are rejected.
    /// Default: 30 m
    pub max_accuracy_m: f64,

    /// Fixes closer than this to the last accepted fix add no distance.
    /// Default: 3 m
    pub min_distance_m: f64,

    /// Minimum time between foreground notification refreshes.
    /// Default: 5000 ms
    pub notification_interval_ms: i64,

    /// Accuracy assumed when a fix does not report one.
    /// Default: 100 m
    pub assumed_accuracy_m: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1_000,
            max_accuracy_m: 30.0,
            min_distance_m: 3.0,
            notification_interval_ms: 5_000,
            assumed_accuracy_m: 100.0,
        }
    }
}

impl TrackerConfig {
    /// Parse a JSON override. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms <= 0 || self.notification_interval_ms < 0 {
            return Err(TrackerError::ConfigError {
                message: "intervals must be positive".to_string(),
            });
        }
        if !(self.max_accuracy_m > 0.0) || self.min_distance_m < 0.0 {
            return Err(TrackerError::ConfigError {
                message: format!(
                    "invalid accuracy ceiling {} or minimum distance {}",
                    self.max_accuracy_m, self.min_distance_m
                ),
            });
        }
        Ok(())
    }
}

/// What the tracker did with a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum FixOutcome {
    Accepted,
    RejectedAccuracy,
    RejectedTooClose,
    RejectedOutOfOrder,
    RejectedInvalid,
    /// Not recording
    Ignored,
}

/// A finished recording, ready for analysis or storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RecordedTrip {
    pub vehicle: VehicleType,
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
    pub points: Vec<RoutePoint>,
    /// Live counters at the moment recording stopped
    pub live: TrackingSnapshot,
}

impl RecordedTrip {
    pub fn analyze(&self, config: &AnalyzerConfig) -> RouteStatistics {
        analyze_route_with_config(&self.points, self.vehicle, config)
    }

    pub fn summarize(&self, config: &AnalyzerConfig) -> RouteSummary {
        summarize_route(&self.points, self.vehicle, config)
    }
}

// ============================================================================
// Live Tracker
// ============================================================================

/// Running trip state fed by location fixes.
#[derive(Debug, Clone)]
pub struct LiveTracker {
    config: TrackerConfig,
    vehicle: VehicleType,
    state: TrackingState,
    smoother: AdaptiveSpeedSmoother,
    points: Vec<RoutePoint>,

    // None at the start of each leg (after start or resume)
    last_accepted: Option<RoutePoint>,
    last_observed_ms: Option<i64>,

    started_at_ms: i64,
    last_tick_ms: i64,
    elapsed_ms: i64,
    distance_m: f64,
    moving_time_ms: i64,
    current_speed_kmh: f64,
    max_speed_kmh: f64,
}

impl LiveTracker {
    pub fn new(vehicle: VehicleType, config: TrackerConfig) -> Self {
        Self {
            config,
            vehicle,
            state: TrackingState::Idle,
            smoother: AdaptiveSpeedSmoother::new(),
            points: Vec::new(),
            last_accepted: None,
            last_observed_ms: None,
            started_at_ms: 0,
            last_tick_ms: 0,
            elapsed_ms: 0,
            distance_m: 0.0,
            moving_time_ms: 0,
            current_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn vehicle(&self) -> VehicleType {
        self.vehicle
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    fn invalid_state(&self, operation: &str) -> TrackerError {
        TrackerError::InvalidState {
            operation: operation.to_string(),
            state: self.state.label().to_string(),
        }
    }

    /// Begin a new recording. Allowed from idle or after a finished trip.
    pub fn start(&mut self, now_ms: i64) -> Result<()> {
        if !matches!(self.state, TrackingState::Idle | TrackingState::Finished) {
            return Err(self.invalid_state("start"));
        }
        *self = Self::new(self.vehicle, self.config.clone());
        self.state = TrackingState::Recording;
        self.started_at_ms = now_ms;
        self.last_tick_ms = now_ms;
        Ok(())
    }

    /// Suspend recording. The next fix after resuming starts a new leg.
    pub fn pause(&mut self, now_ms: i64) -> Result<()> {
        if self.state != TrackingState::Recording {
            return Err(self.invalid_state("pause"));
        }
        self.tick(now_ms);
        self.state = TrackingState::Paused;
        self.end_leg();
        Ok(())
    }

    pub fn resume(&mut self, now_ms: i64) -> Result<()> {
        if self.state != TrackingState::Paused {
            return Err(self.invalid_state("resume"));
        }
        self.state = TrackingState::Recording;
        self.last_tick_ms = now_ms;
        Ok(())
    }

    fn end_leg(&mut self) {
        self.last_accepted = None;
        self.last_observed_ms = None;
        self.smoother.reset();
        self.current_speed_kmh = 0.0;
    }

    /// Advance the elapsed-time counter while recording.
    pub fn tick(&mut self, now_ms: i64) {
        if self.state == TrackingState::Recording && now_ms > self.last_tick_ms {
            self.elapsed_ms += now_ms - self.last_tick_ms;
            self.last_tick_ms = now_ms;
        }
    }

    /// Process one location fix.
    pub fn on_fix(&mut self, fix: RoutePoint) -> FixOutcome {
        if self.state != TrackingState::Recording {
            return FixOutcome::Ignored;
        }
        if !fix.is_valid() {
            return FixOutcome::RejectedInvalid;
        }

        let accuracy = fix.known_accuracy().unwrap_or(self.config.assumed_accuracy_m);
        if accuracy > self.config.max_accuracy_m {
            debug!(
                "[LiveTracker] Rejected fix with accuracy {:.0}m",
                accuracy
            );
            return FixOutcome::RejectedAccuracy;
        }

        let prev = match self.last_accepted {
            Some(prev) => prev,
            None => {
                // First fix of a leg: nothing to measure against yet
                if let Some(speed) = fix.speed_mps {
                    self.observe_speed(ms_to_kmh(speed), 0);
                }
                self.accept(fix, 0.0);
                return FixOutcome::Accepted;
            }
        };

        let last_observed = self.last_observed_ms.unwrap_or(prev.timestamp_ms);
        if fix.timestamp_ms <= last_observed {
            return FixOutcome::RejectedOutOfOrder;
        }

        let distance = haversine_distance(&prev, &fix);
        let dt_ms = fix.timestamp_ms - prev.timestamp_ms;
        let raw_speed_kmh = fix
            .speed_mps
            .map(ms_to_kmh)
            .unwrap_or_else(|| ms_to_kmh(distance / (dt_ms as f64 / 1000.0)));

        self.observe_speed(raw_speed_kmh, fix.timestamp_ms - last_observed);
        self.last_observed_ms = Some(fix.timestamp_ms);
        self.tick(fix.timestamp_ms);

        if distance < self.config.min_distance_m {
            return FixOutcome::RejectedTooClose;
        }

        self.accept(fix, distance);
        FixOutcome::Accepted
    }

    fn observe_speed(&mut self, raw_speed_kmh: f64, interval_ms: i64) {
        let smoothed = self.smoother.update(raw_speed_kmh.max(0.0));
        self.current_speed_kmh = smoothed;
        self.max_speed_kmh = self.max_speed_kmh.max(smoothed);

        if smoothed >= self.vehicle.thresholds().pause_speed_kmh {
            self.moving_time_ms += interval_ms;
        }
    }

    fn accept(&mut self, fix: RoutePoint, distance: f64) {
        self.distance_m += distance;
        self.points.push(fix);
        self.last_accepted = Some(fix);
        self.last_observed_ms = Some(fix.timestamp_ms);
        self.tick(fix.timestamp_ms);
    }

    /// Current counters as an immutable snapshot.
    pub fn snapshot(&self) -> TrackingSnapshot {
        let average_speed_kmh = if self.moving_time_ms > 0 {
            ms_to_kmh(self.distance_m / (self.moving_time_ms as f64 / 1000.0))
        } else {
            0.0
        };

        TrackingSnapshot {
            state: self.state,
            vehicle: Some(self.vehicle),
            started_at_ms: self.started_at_ms,
            distance_m: self.distance_m,
            speed_kmh: self.current_speed_kmh,
            max_speed_kmh: self.max_speed_kmh,
            average_speed_kmh,
            moving_time_ms: self.moving_time_ms,
            elapsed_time_ms: self.elapsed_ms,
            point_count: self.points.len() as u32,
            last_point: self.points.last().copied(),
        }
    }

    /// Stop recording and hand over everything captured.
    pub fn finish(&mut self, now_ms: i64) -> Result<RecordedTrip> {
        if !matches!(self.state, TrackingState::Recording | TrackingState::Paused) {
            return Err(self.invalid_state("finish"));
        }
        self.tick(now_ms);
        self.state = TrackingState::Finished;
        self.current_speed_kmh = 0.0;
        let live = self.snapshot();

        Ok(RecordedTrip {
            vehicle: self.vehicle,
            started_at_ms: self.started_at_ms,
            ended_at_ms: now_ms,
            points: std::mem::take(&mut self.points),
            live,
        })
    }

    /// Drop the recording without producing a trip.
    pub fn cancel(&mut self) {
        *self = Self::new(self.vehicle, self.config.clone());
    }
}

// ============================================================================
// Foreground Service
// ============================================================================

/// Platform duties of a foreground tracking service.
///
/// Implementations wrap the OS wake lock and ongoing notification; methods
/// take `&self` because platform handles are shared with callbacks.
pub trait ForegroundHost: Send + Sync {
    fn acquire_wake_lock(&self);
    fn release_wake_lock(&self);
    fn show_notification(&self, text: &str);
    fn cancel_notification(&self);
}

/// Holds the CPU wake lock until dropped.
pub struct WakeLockGuard<H: ForegroundHost> {
    host: Arc<H>,
}

impl<H: ForegroundHost> WakeLockGuard<H> {
    pub fn acquire(host: Arc<H>) -> Self {
        host.acquire_wake_lock();
        Self { host }
    }
}

impl<H: ForegroundHost> Drop for WakeLockGuard<H> {
    fn drop(&mut self) {
        self.host.release_wake_lock();
    }
}

/// Foreground tracking service: one recording at a time, one state writer.
///
/// Observers bind with [`TrackingService::subscribe`] and unbind by dropping
/// their subscriber.
pub struct TrackingService<H: ForegroundHost> {
    host: Arc<H>,
    tracker: LiveTracker,
    writer: StateWriter,
    wake_lock: Option<WakeLockGuard<H>>,
    last_notification_ms: Option<i64>,
}

impl<H: ForegroundHost> TrackingService<H> {
    pub fn new(host: Arc<H>, vehicle: VehicleType, config: TrackerConfig) -> Self {
        let (writer, _) = state::channel();
        Self {
            host,
            tracker: LiveTracker::new(vehicle, config),
            writer,
            wake_lock: None,
            last_notification_ms: None,
        }
    }

    pub fn subscribe(&self) -> StateSubscriber {
        self.writer.subscribe()
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        self.tracker.snapshot()
    }

    pub fn is_holding_wake_lock(&self) -> bool {
        self.wake_lock.is_some()
    }

    pub fn start(&mut self, now_ms: i64) -> Result<()> {
        self.tracker.start(now_ms)?;
        self.wake_lock = Some(WakeLockGuard::acquire(Arc::clone(&self.host)));
        self.writer.apply(TrackingEvent::Started {
            vehicle: self.tracker.vehicle(),
            started_at_ms: now_ms,
        });
        self.last_notification_ms = None;
        self.refresh_notification(now_ms);
        info!(
            "[TrackingService] Started {} recording",
            self.tracker.vehicle()
        );
        Ok(())
    }

    /// Location callback. Fixes arriving while not recording are ignored.
    pub fn on_location(&mut self, fix: RoutePoint) -> FixOutcome {
        let outcome = self.tracker.on_fix(fix);
        if outcome != FixOutcome::Ignored {
            self.writer.apply(TrackingEvent::Sample(self.tracker.snapshot()));
            self.refresh_notification(fix.timestamp_ms);
        }
        outcome
    }

    pub fn pause(&mut self, now_ms: i64) -> Result<()> {
        self.tracker.pause(now_ms)?;
        self.writer.apply(TrackingEvent::Paused);
        self.force_notification(now_ms);
        info!("[TrackingService] Paused");
        Ok(())
    }

    pub fn resume(&mut self, now_ms: i64) -> Result<()> {
        self.tracker.resume(now_ms)?;
        self.writer.apply(TrackingEvent::Resumed);
        self.force_notification(now_ms);
        info!("[TrackingService] Resumed");
        Ok(())
    }

    /// Finish the recording, release the wake lock and remove the notification.
    pub fn stop(&mut self, now_ms: i64) -> Result<RecordedTrip> {
        let trip = self.tracker.finish(now_ms)?;
        self.writer.apply(TrackingEvent::Stopped(trip.live.clone()));
        self.release();
        info!(
            "[TrackingService] Stopped: {} points, {:.0}m",
            trip.points.len(),
            trip.live.distance_m
        );
        Ok(trip)
    }

    /// Abandon the recording; captured points are discarded.
    pub fn cancel(&mut self) {
        let discarded = self.tracker.points().len();
        self.tracker.cancel();
        self.writer.apply(TrackingEvent::Cancelled);
        self.release();
        info!("[TrackingService] Cancelled, discarded {} points", discarded);
    }

    fn release(&mut self) {
        self.wake_lock = None;
        self.last_notification_ms = None;
        self.host.cancel_notification();
    }

    fn refresh_notification(&mut self, now_ms: i64) {
        let due = self.last_notification_ms.map_or(true, |last| {
            now_ms - last >= self.tracker.config().notification_interval_ms
        });
        if due {
            self.force_notification(now_ms);
        }
    }

    fn force_notification(&mut self, now_ms: i64) {
        self.host
            .show_notification(&self.tracker.snapshot().notification_text());
        self.last_notification_ms = Some(now_ms);
    }
}

impl<H: ForegroundHost> Drop for TrackingService<H> {
    fn drop(&mut self) {
        if self.wake_lock.is_some() {
            self.release();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const T0: i64 = 1_700_000_000_000;
    /// ~5.56 m of longitude at the equator (20 km/h at 1 Hz)
    const STEP_20_KMH: f64 = 0.00005;

    fn fix(index: i64, ts: i64) -> RoutePoint {
        RoutePoint::new(0.0, index as f64 * STEP_20_KMH, ts).with_accuracy(5.0)
    }

    fn recording() -> LiveTracker {
        let mut tracker = LiveTracker::new(VehicleType::Scooter, TrackerConfig::default());
        tracker.start(T0).unwrap();
        tracker
    }

    #[derive(Default)]
    struct TestHost {
        wake_lock: AtomicBool,
        notifications: Mutex<Vec<String>>,
        cancelled: AtomicUsize,
    }

    impl ForegroundHost for TestHost {
        fn acquire_wake_lock(&self) {
            self.wake_lock.store(true, Ordering::SeqCst);
        }
        fn release_wake_lock(&self) {
            self.wake_lock.store(false, Ordering::SeqCst);
        }
        fn show_notification(&self, text: &str) {
            self.notifications.lock().unwrap().push(text.to_string());
        }
        fn cancel_notification(&self) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_ignored_when_idle() {
        let mut tracker = LiveTracker::new(VehicleType::Bike, TrackerConfig::default());
        assert_eq!(tracker.on_fix(fix(0, T0)), FixOutcome::Ignored);
        assert!(tracker.points().is_empty());
    }

    #[test]
    fn test_rejects_inaccurate_and_unknown_accuracy() {
        let mut tracker = recording();
        let noisy = fix(0, T0).with_accuracy(40.0);
        assert_eq!(tracker.on_fix(noisy), FixOutcome::RejectedAccuracy);

        let mut unknown = fix(0, T0);
        unknown.accuracy_m = None;
        assert_eq!(tracker.on_fix(unknown), FixOutcome::RejectedAccuracy);

        // NaN accuracy is unreported accuracy
        let garbled = fix(0, T0).with_accuracy(f64::NAN);
        assert_eq!(tracker.on_fix(garbled), FixOutcome::RejectedAccuracy);

        assert_eq!(
            tracker.on_fix(RoutePoint::new(f64::NAN, 0.0, T0).with_accuracy(3.0)),
            FixOutcome::RejectedInvalid
        );
        assert!(tracker.points().is_empty());
    }

    #[test]
    fn test_steady_ride_accumulates() {
        let mut tracker = recording();
        for i in 0..10 {
            assert_eq!(tracker.on_fix(fix(i, T0 + i * 1000)), FixOutcome::Accepted);
        }

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.point_count, 10);
        assert!((snapshot.distance_m - 50.0).abs() < 0.5);
        assert_eq!(snapshot.moving_time_ms, 9_000);
        assert_eq!(snapshot.elapsed_time_ms, 9_000);
        assert!((snapshot.speed_kmh - 20.0).abs() < 0.5);
        assert!((snapshot.average_speed_kmh - 20.0).abs() < 0.5);
    }

    #[test]
    fn test_too_close_adds_no_distance_but_slows_down() {
        let mut tracker = recording();
        for i in 0..5 {
            tracker.on_fix(fix(i, T0 + i * 1000));
        }
        let distance = tracker.snapshot().distance_m;

        // Standing still at the last position
        let mut outcome = FixOutcome::Accepted;
        for i in 5..10 {
            outcome = tracker.on_fix(fix(4, T0 + i * 1000));
        }
        assert_eq!(outcome, FixOutcome::RejectedTooClose);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.distance_m, distance);
        assert_eq!(snapshot.point_count, 5);
        assert!(snapshot.speed_kmh < 1.0);
        assert_eq!(snapshot.moving_time_ms, 4_000);
        assert_eq!(snapshot.elapsed_time_ms, 9_000);
    }

    #[test]
    fn test_receiver_speed_preferred() {
        let mut tracker = recording();
        tracker.on_fix(fix(0, T0).with_speed(2.0));
        tracker.on_fix(fix(1, T0 + 1000).with_speed(2.0));
        // 2 m/s reported beats the 20 km/h implied by the step
        assert!((tracker.snapshot().speed_kmh - 7.2).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut tracker = recording();
        tracker.on_fix(fix(0, T0 + 2000));
        assert_eq!(tracker.on_fix(fix(1, T0 + 1000)), FixOutcome::RejectedOutOfOrder);
        assert_eq!(tracker.on_fix(fix(1, T0 + 2000)), FixOutcome::RejectedOutOfOrder);
    }

    #[test]
    fn test_pause_does_not_bridge_distance() {
        let mut tracker = recording();
        for i in 0..5 {
            tracker.on_fix(fix(i, T0 + i * 1000));
        }
        tracker.pause(T0 + 5_000).unwrap();
        assert_eq!(tracker.on_fix(fix(5, T0 + 6_000)), FixOutcome::Ignored);
        assert_eq!(tracker.snapshot().speed_kmh, 0.0);

        tracker.resume(T0 + 65_000).unwrap();
        // ~110 m further along, must not be added
        for i in 0..3 {
            tracker.on_fix(fix(25 + i, T0 + 66_000 + i * 1000));
        }

        let snapshot = tracker.snapshot();
        assert!((snapshot.distance_m - 6.0 * 5.56).abs() < 0.5);
        assert_eq!(snapshot.elapsed_time_ms, 5_000 + 3_000);
        assert_eq!(snapshot.point_count, 8);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut tracker = LiveTracker::new(VehicleType::Bike, TrackerConfig::default());
        assert!(matches!(tracker.pause(T0), Err(TrackerError::InvalidState { .. })));
        assert!(tracker.finish(T0).is_err());

        tracker.start(T0).unwrap();
        assert!(tracker.start(T0).is_err());
        assert!(tracker.resume(T0).is_err());
    }

    #[test]
    fn test_finish_hands_over_points() {
        let mut tracker = recording();
        for i in 0..10 {
            tracker.on_fix(fix(i, T0 + i * 1000));
        }
        let trip = tracker.finish(T0 + 10_000).unwrap();

        assert_eq!(tracker.state(), TrackingState::Finished);
        assert_eq!(trip.points.len(), 10);
        assert_eq!(trip.live.point_count, 10);
        assert_eq!(trip.live.state, TrackingState::Finished);
        assert_eq!(trip.ended_at_ms, T0 + 10_000);

        let stats = trip.analyze(&AnalyzerConfig::default());
        assert_eq!(stats.segment_count, 1);
        assert!((stats.average_speed_kmh - 20.0).abs() < 0.5);

        // A finished tracker can record again
        tracker.start(T0 + 20_000).unwrap();
        assert_eq!(tracker.snapshot().point_count, 0);
    }

    #[test]
    fn test_cancel_discards() {
        let mut tracker = recording();
        tracker.on_fix(fix(0, T0));
        tracker.cancel();
        assert_eq!(tracker.state(), TrackingState::Idle);
        assert!(tracker.points().is_empty());
    }

    #[test]
    fn test_config_from_json() {
        let config = TrackerConfig::from_json(r#"{"max_accuracy_m": 25.0}"#).unwrap();
        assert_eq!(config.max_accuracy_m, 25.0);
        assert_eq!(config.min_distance_m, 3.0);
        assert!(TrackerConfig::from_json(r#"{"sample_interval_ms": 0}"#).is_err());
    }

    #[test]
    fn test_service_lifecycle() {
        let host = Arc::new(TestHost::default());
        let mut service =
            TrackingService::new(Arc::clone(&host), VehicleType::Scooter, TrackerConfig::default());
        let subscriber = service.subscribe();

        service.start(T0).unwrap();
        assert!(host.wake_lock.load(Ordering::SeqCst));
        assert!(service.is_holding_wake_lock());
        assert_eq!(host.notifications.lock().unwrap().len(), 1);

        for i in 0..=10 {
            service.on_location(fix(i, T0 + i * 1000));
        }
        // Refreshed at start, then every 5 s of fixes
        assert_eq!(host.notifications.lock().unwrap().len(), 3);
        assert_eq!(subscriber.latest().point_count, 11);
        assert_eq!(subscriber.latest().state, TrackingState::Recording);

        let trip = service.stop(T0 + 11_000).unwrap();
        assert_eq!(trip.points.len(), 11);
        assert!(!host.wake_lock.load(Ordering::SeqCst));
        assert!(!service.is_holding_wake_lock());
        assert_eq!(host.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(subscriber.latest().state, TrackingState::Finished);

        // Late callbacks after stop are dropped
        assert_eq!(service.on_location(fix(12, T0 + 12_000)), FixOutcome::Ignored);
    }

    #[test]
    fn test_service_cancel_releases() {
        let host = Arc::new(TestHost::default());
        let mut service =
            TrackingService::new(Arc::clone(&host), VehicleType::Bike, TrackerConfig::default());
        service.start(T0).unwrap();
        service.on_location(fix(0, T0 + 1000));
        service.cancel();

        assert!(!host.wake_lock.load(Ordering::SeqCst));
        assert_eq!(service.subscribe().latest().state, TrackingState::Idle);
    }

    #[test]
    fn test_service_drop_releases_wake_lock() {
        let host = Arc::new(TestHost::default());
        {
            let mut service =
                TrackingService::new(Arc::clone(&host), VehicleType::Bike, TrackerConfig::default());
            service.start(T0).unwrap();
            assert!(host.wake_lock.load(Ordering::SeqCst));
        }
        assert!(!host.wake_lock.load(Ordering::SeqCst));
    }

    #[test]
    fn test_service_pause_updates_notification() {
        let host = Arc::new(TestHost::default());
        let mut service =
            TrackingService::new(Arc::clone(&host), VehicleType::Bike, TrackerConfig::default());
        service.start(T0).unwrap();
        service.pause(T0 + 500).unwrap();

        let notifications = host.notifications.lock().unwrap();
        assert!(notifications.last().unwrap().starts_with("Paused"));
    }
}
