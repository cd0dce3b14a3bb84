//! Observable tracking state.
//!
//! The tracking service is the only writer. Screens, widgets and the
//! notification all read from subscribers and only ever see whole snapshots;
//! a subscriber that falls behind skips straight to the latest one.
//!
//! ```rust
//! use ride_tracker::state::{channel, TrackingEvent, TrackingState};
//! use ride_tracker::VehicleType;
//!
//! let (writer, subscriber) = channel();
//! writer.apply(TrackingEvent::Started { vehicle: VehicleType::Bike, started_at_ms: 0 });
//! assert_eq!(subscriber.latest().state, TrackingState::Recording);
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::geo_utils::{format_distance, format_duration, format_speed};
use crate::{RoutePoint, VehicleType};

/// Lifecycle of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TrackingState {
    #[default]
    Idle,
    Recording,
    Paused,
    Finished,
}

impl TrackingState {
    pub fn label(&self) -> &'static str {
        match self {
            TrackingState::Idle => "idle",
            TrackingState::Recording => "recording",
            TrackingState::Paused => "paused",
            TrackingState::Finished => "finished",
        }
    }
}

/// Point-in-time view of the live tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrackingSnapshot {
    pub state: TrackingState,
    pub vehicle: Option<VehicleType>,
    pub started_at_ms: i64,
    pub distance_m: f64,
    /// Smoothed current speed
    pub speed_kmh: f64,
    pub max_speed_kmh: f64,
    /// Distance over moving time
    pub average_speed_kmh: f64,
    pub moving_time_ms: i64,
    /// Recording time, user pauses excluded
    pub elapsed_time_ms: i64,
    pub point_count: u32,
    pub last_point: Option<RoutePoint>,
}

impl TrackingSnapshot {
    /// One-line text for the foreground notification.
    pub fn notification_text(&self) -> String {
        match self.state {
            TrackingState::Paused => format!(
                "Paused · {} · {}",
                format_distance(self.distance_m),
                format_duration(self.elapsed_time_ms)
            ),
            _ => format!(
                "{} · {} · {}",
                format_distance(self.distance_m),
                format_speed(self.speed_kmh),
                format_duration(self.elapsed_time_ms)
            ),
        }
    }
}

/// State-update messages applied by the single writer.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    Started {
        vehicle: VehicleType,
        started_at_ms: i64,
    },
    Sample(TrackingSnapshot),
    Paused,
    Resumed,
    Stopped(TrackingSnapshot),
    Cancelled,
}

/// Write half of the tracking state. Not clonable: there is one writer.
#[derive(Debug)]
pub struct StateWriter {
    tx: watch::Sender<TrackingSnapshot>,
}

/// Read half of the tracking state. Clone freely, one per observer.
#[derive(Debug, Clone)]
pub struct StateSubscriber {
    rx: watch::Receiver<TrackingSnapshot>,
}

/// Create a tracking-state container starting in [`TrackingState::Idle`].
pub fn channel() -> (StateWriter, StateSubscriber) {
    let (tx, rx) = watch::channel(TrackingSnapshot::default());
    (StateWriter { tx }, StateSubscriber { rx })
}

impl StateWriter {
    /// Apply an event and notify subscribers. Works with zero subscribers.
    pub fn apply(&self, event: TrackingEvent) {
        self.tx.send_modify(|snapshot| match event {
            TrackingEvent::Started {
                vehicle,
                started_at_ms,
            } => {
                *snapshot = TrackingSnapshot {
                    state: TrackingState::Recording,
                    vehicle: Some(vehicle),
                    started_at_ms,
                    ..TrackingSnapshot::default()
                };
            }
            TrackingEvent::Sample(next) => *snapshot = next,
            TrackingEvent::Paused => {
                snapshot.state = TrackingState::Paused;
                snapshot.speed_kmh = 0.0;
            }
            TrackingEvent::Resumed => snapshot.state = TrackingState::Recording,
            TrackingEvent::Stopped(last) => {
                *snapshot = TrackingSnapshot {
                    state: TrackingState::Finished,
                    speed_kmh: 0.0,
                    ..last
                };
            }
            TrackingEvent::Cancelled => *snapshot = TrackingSnapshot::default(),
        });
    }

    pub fn current(&self) -> TrackingSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> StateSubscriber {
        StateSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl StateSubscriber {
    /// Latest snapshot without waiting.
    pub fn latest(&self) -> TrackingSnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. Returns `None` once the writer is gone.
    pub async fn changed(&mut self) -> Option<TrackingSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
