//! Odometer readings entered by hand for each vehicle.
//!
//! Readings are kept per vehicle in time order. An odometer never runs
//! backwards, so a reading below an earlier one (or above a later one) is
//! rejected as a typo.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{Result, TrackerError};

/// One odometer value reported for a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct OdometerReading {
    pub vehicle_id: String,
    pub value_km: f64,
    /// Unix timestamp in milliseconds
    pub recorded_at_ms: i64,
}

impl OdometerReading {
    pub fn new(vehicle_id: impl Into<String>, value_km: f64, recorded_at_ms: i64) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            value_km,
            recorded_at_ms,
        }
    }
}

/// Time-ordered odometer readings for any number of vehicles.
#[derive(Debug, Clone, Default)]
pub struct OdometerLog {
    readings: HashMap<String, Vec<OdometerReading>>,
}

impl OdometerLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from stored readings, skipping any that fail validation.
    pub fn from_readings(readings: impl IntoIterator<Item = OdometerReading>) -> Self {
        let mut log = Self::new();
        for reading in readings {
            if let Err(e) = log.add_reading(reading) {
                warn!("[OdometerLog] Skipping stored reading: {}", e);
            }
        }
        log
    }

    /// Validate and insert a reading at its place in time.
    pub fn add_reading(&mut self, reading: OdometerReading) -> Result<()> {
        let reject = |message: String| TrackerError::InvalidReading {
            vehicle_id: reading.vehicle_id.clone(),
            message,
        };

        if !reading.value_km.is_finite() || reading.value_km < 0.0 {
            return Err(reject(format!("invalid value {}", reading.value_km)));
        }

        let entries = self.readings.entry(reading.vehicle_id.clone()).or_default();
        let index = entries.partition_point(|r| r.recorded_at_ms <= reading.recorded_at_ms);

        if let Some(previous) = index.checked_sub(1).and_then(|i| entries.get(i)) {
            if reading.value_km < previous.value_km {
                return Err(reject(format!(
                    "{:.1} km is below the earlier reading of {:.1} km",
                    reading.value_km, previous.value_km
                )));
            }
        }
        if let Some(next) = entries.get(index) {
            if reading.value_km > next.value_km {
                return Err(reject(format!(
                    "{:.1} km is above the later reading of {:.1} km",
                    reading.value_km, next.value_km
                )));
            }
        }

        entries.insert(index, reading);
        Ok(())
    }

    pub fn readings(&self, vehicle_id: &str) -> &[OdometerReading] {
        self.readings
            .get(vehicle_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn latest(&self, vehicle_id: &str) -> Option<&OdometerReading> {
        self.readings(vehicle_id).last()
    }

    pub fn vehicle_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.readings.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Distance covered between the first and last reading inside `[from_ms, to_ms]`.
    pub fn distance_between(&self, vehicle_id: &str, from_ms: i64, to_ms: i64) -> f64 {
        let mut window = self
            .readings(vehicle_id)
            .iter()
            .filter(|r| r.recorded_at_ms >= from_ms && r.recorded_at_ms <= to_ms);

        match (window.next(), window.last()) {
            (Some(first), Some(last)) => last.value_km - first.value_km,
            _ => 0.0,
        }
    }

    /// Distance covered since the first reading.
    pub fn total_distance_km(&self, vehicle_id: &str) -> f64 {
        let readings = self.readings(vehicle_id);
        match (readings.first(), readings.last()) {
            (Some(first), Some(last)) => last.value_km - first.value_km,
            _ => 0.0,
        }
    }

    /// Distance covered since `since_ms`, measured from the last reading at or
    /// before it (or the first reading if none is that old).
    pub fn distance_since(&self, vehicle_id: &str, since_ms: i64) -> f64 {
        let readings = self.readings(vehicle_id);
        let Some(latest) = readings.last() else {
            return 0.0;
        };
        let baseline = readings
            .iter()
            .rev()
            .find(|r| r.recorded_at_ms <= since_ms)
            .or_else(|| readings.first())
            .map(|r| r.value_km)
            .unwrap_or(latest.value_km);
        latest.value_km - baseline
    }
}
