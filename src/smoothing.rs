//! Adaptive exponential smoothing for live speed readouts.
//!
//! GPS speed jitters by a few km/h even at constant cruising speed, but a
//! rider pulling away or braking must see the change immediately. The
//! smoother picks its weight for the newest sample from the size of the
//! change:
//!
//! | case                                   | α    |
//! |----------------------------------------|------|
//! | crossing the start/stop threshold      | 0.98 |
//! | change above 5 km/h                    | 0.85 |
//! | change above 2 km/h                    | 0.65 |
//! | otherwise                              | 0.35 |

use serde::{Deserialize, Serialize};

/// Speed separating "stopped" from "moving" for transition detection (km/h).
pub const START_STOP_THRESHOLD_KMH: f64 = 1.5;
pub const LARGE_CHANGE_KMH: f64 = 5.0;
pub const MEDIUM_CHANGE_KMH: f64 = 2.0;

pub const ALPHA_TRANSITION: f64 = 0.98;
pub const ALPHA_LARGE_CHANGE: f64 = 0.85;
pub const ALPHA_MEDIUM_CHANGE: f64 = 0.65;
pub const ALPHA_STABLE: f64 = 0.35;

/// Exponential moving average over speed with a variable smoothing factor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaptiveSpeedSmoother {
    smoothed_speed: f64,
    previous_speed: f64,
    initialized: bool,
}

impl AdaptiveSpeedSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw speed (km/h) and return the smoothed value.
    ///
    /// The first sample seeds the state and is returned unchanged.
    pub fn update(&mut self, raw_speed_kmh: f64) -> f64 {
        if !self.initialized {
            self.smoothed_speed = raw_speed_kmh;
            self.previous_speed = raw_speed_kmh;
            self.initialized = true;
            return raw_speed_kmh;
        }

        let alpha = Self::smoothing_factor(self.previous_speed, raw_speed_kmh);
        // Same as α*new + (1-α)*smoothed, but exact when new == smoothed
        self.smoothed_speed += alpha * (raw_speed_kmh - self.smoothed_speed);
        self.previous_speed = raw_speed_kmh;
        self.smoothed_speed
    }

    /// Weight given to the newest sample, by priority of the matching case.
    pub fn smoothing_factor(previous_kmh: f64, new_kmh: f64) -> f64 {
        let starting = previous_kmh < START_STOP_THRESHOLD_KMH && new_kmh >= START_STOP_THRESHOLD_KMH;
        let stopping = previous_kmh >= START_STOP_THRESHOLD_KMH && new_kmh < START_STOP_THRESHOLD_KMH;
        let delta = (new_kmh - previous_kmh).abs();

        if starting || stopping {
            ALPHA_TRANSITION
        } else if delta > LARGE_CHANGE_KMH {
            ALPHA_LARGE_CHANGE
        } else if delta > MEDIUM_CHANGE_KMH {
            ALPHA_MEDIUM_CHANGE
        } else {
            ALPHA_STABLE
        }
    }

    /// Current smoothed speed (km/h), 0 before the first sample.
    pub fn current(&self) -> f64 {
        self.smoothed_speed
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn reset(&mut self) {
        self.smoothed_speed = 0.0;
        self.previous_speed = 0.0;
        self.initialized = false;
    }
}
