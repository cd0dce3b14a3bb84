//! # Trip Store
//!
//! SQLite storage for finished trips and odometer readings.
//!
//! Trip rows keep the analyzed statistics as JSON next to a few flat columns
//! (distance, moving time, CO2, max speed) so aggregate totals are plain SQL.
//! The raw fixes are stored as a MessagePack blob and only decoded on demand.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use log::{debug, info};

use crate::analyzer::{analyze_route_with_config, AnalyzerConfig};
use crate::emissions::co2_saved_grams;
use crate::odometer::{OdometerLog, OdometerReading};
use crate::tracker::RecordedTrip;
use crate::{Result, RoutePoint, RouteStatistics, TrackerError, VehicleType};

// ============================================================================
// Types
// ============================================================================

/// Trip metadata and statistics as stored, without the raw fixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct StoredTrip {
    pub id: i64,
    pub vehicle: VehicleType,
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
    pub statistics: RouteStatistics,
    pub co2_saved_g: f64,
    pub point_count: u32,
}

/// Aggregates for one vehicle type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct VehicleTotals {
    pub vehicle: VehicleType,
    pub trip_count: u32,
    pub distance_km: f64,
    pub moving_time_ms: i64,
    pub co2_saved_g: f64,
    pub max_speed_kmh: f64,
    pub longest_trip_km: f64,
}

/// Lifetime aggregates across all stored trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TripTotals {
    pub trip_count: u32,
    pub distance_km: f64,
    pub moving_time_ms: i64,
    pub co2_saved_g: f64,
    pub max_speed_kmh: f64,
    pub longest_trip_km: f64,
    pub per_vehicle: Vec<VehicleTotals>,
}

fn conversion_error(column: usize, kind: Type, err: TrackerError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, kind, Box::new(err))
}

fn vehicle_column(row: &Row<'_>, column: usize) -> rusqlite::Result<VehicleType> {
    let label: String = row.get(column)?;
    label
        .parse()
        .map_err(|e| conversion_error(column, Type::Text, e))
}

// ============================================================================
// Store
// ============================================================================

pub struct TripStore {
    db: Connection,
    config: AnalyzerConfig,
}

impl TripStore {
    /// Open (or create) a store at the given database path.
    pub fn open(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        info!("[TripStore] Opened {}", db_path);

        Ok(Self {
            db,
            config: AnalyzerConfig::default(),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Analyzer settings used when saving trips.
    pub fn with_config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trips (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vehicle TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                ended_at INTEGER NOT NULL,
                distance_m REAL NOT NULL,
                moving_time_ms INTEGER NOT NULL,
                max_speed_kmh REAL NOT NULL,
                co2_saved_g REAL NOT NULL,
                statistics TEXT NOT NULL,
                points BLOB NOT NULL,
                point_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS odometer_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vehicle_id TEXT NOT NULL,
                value_km REAL NOT NULL,
                recorded_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trips_started ON trips(started_at);
            CREATE INDEX IF NOT EXISTS idx_odometer_vehicle ON odometer_readings(vehicle_id, recorded_at);
        "#,
        )
    }

    // ========================================================================
    // Trips
    // ========================================================================

    /// Analyze and store a finished trip. Returns the new trip id.
    pub fn save_trip(&self, trip: &RecordedTrip) -> Result<i64> {
        if trip.points.len() < 2 {
            return Err(TrackerError::InsufficientPoints {
                context: "save_trip".to_string(),
                point_count: trip.points.len(),
                minimum_required: 2,
            });
        }

        let stats = analyze_route_with_config(&trip.points, trip.vehicle, &self.config);
        let co2 = co2_saved_grams(stats.total_distance_m, trip.vehicle);
        let points_blob = rmp_serde::to_vec(&trip.points).map_err(|e| {
            TrackerError::PersistenceError {
                message: format!("Failed to encode points: {}", e),
            }
        })?;

        self.db.execute(
            "INSERT INTO trips (vehicle, started_at, ended_at, distance_m, moving_time_ms,
                                max_speed_kmh, co2_saved_g, statistics, points, point_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                trip.vehicle.label(),
                trip.started_at_ms,
                trip.ended_at_ms,
                stats.total_distance_m,
                stats.moving_time_ms,
                stats.max_speed_kmh,
                co2,
                stats.to_json(),
                points_blob,
                trip.points.len() as i64,
            ],
        )?;

        let id = self.db.last_insert_rowid();
        info!(
            "[TripStore] Saved trip {} ({}, {:.0}m, {} points)",
            id,
            trip.vehicle,
            stats.total_distance_m,
            trip.points.len()
        );
        Ok(id)
    }

    fn trip_from_row(row: &Row<'_>) -> rusqlite::Result<StoredTrip> {
        let statistics_json: String = row.get(4)?;
        let statistics: RouteStatistics = serde_json::from_str(&statistics_json)
            .map_err(|e| conversion_error(4, Type::Text, e.into()))?;
        let point_count: i64 = row.get(6)?;

        Ok(StoredTrip {
            id: row.get(0)?,
            vehicle: vehicle_column(row, 1)?,
            started_at_ms: row.get(2)?,
            ended_at_ms: row.get(3)?,
            statistics,
            co2_saved_g: row.get(5)?,
            point_count: point_count as u32,
        })
    }

    pub fn load_trip(&self, id: i64) -> Result<Option<StoredTrip>> {
        let trip = self
            .db
            .query_row(
                "SELECT id, vehicle, started_at, ended_at, statistics, co2_saved_g, point_count
                 FROM trips WHERE id = ?",
                params![id],
                Self::trip_from_row,
            )
            .optional()?;
        Ok(trip)
    }

    /// Raw fixes of a stored trip.
    pub fn load_points(&self, id: i64) -> Result<Option<Vec<RoutePoint>>> {
        let blob: Option<Vec<u8>> = self
            .db
            .query_row("SELECT points FROM trips WHERE id = ?", params![id], |row| {
                row.get(0)
            })
            .optional()?;

        blob.map(|bytes| {
            rmp_serde::from_slice(&bytes).map_err(|e| TrackerError::PersistenceError {
                message: format!("Failed to decode points of trip {}: {}", id, e),
            })
        })
        .transpose()
    }

    /// All trips, newest first.
    pub fn list_trips(&self) -> Result<Vec<StoredTrip>> {
        let mut stmt = self.db.prepare(
            "SELECT id, vehicle, started_at, ended_at, statistics, co2_saved_g, point_count
             FROM trips ORDER BY started_at DESC, id DESC",
        )?;
        let trips = stmt
            .query_map([], Self::trip_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("[TripStore] Listed {} trips", trips.len());
        Ok(trips)
    }

    /// Returns false when no trip had that id.
    pub fn delete_trip(&self, id: i64) -> Result<bool> {
        let deleted = self.db.execute("DELETE FROM trips WHERE id = ?", params![id])?;
        if deleted > 0 {
            info!("[TripStore] Deleted trip {}", id);
        }
        Ok(deleted > 0)
    }

    /// Lifetime totals, overall and per vehicle type.
    pub fn totals(&self) -> Result<TripTotals> {
        let mut stmt = self.db.prepare(
            "SELECT vehicle, COUNT(*), SUM(distance_m), SUM(moving_time_ms), SUM(co2_saved_g),
                    MAX(max_speed_kmh), MAX(distance_m)
             FROM trips GROUP BY vehicle ORDER BY vehicle",
        )?;
        let per_vehicle = stmt
            .query_map([], |row| {
                let trip_count: i64 = row.get(1)?;
                let distance_m: f64 = row.get(2)?;
                let longest_m: f64 = row.get(6)?;
                Ok(VehicleTotals {
                    vehicle: vehicle_column(row, 0)?,
                    trip_count: trip_count as u32,
                    distance_km: distance_m / 1000.0,
                    moving_time_ms: row.get(3)?,
                    co2_saved_g: row.get(4)?,
                    max_speed_kmh: row.get(5)?,
                    longest_trip_km: longest_m / 1000.0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut totals = TripTotals::default();
        for v in &per_vehicle {
            totals.trip_count += v.trip_count;
            totals.distance_km += v.distance_km;
            totals.moving_time_ms += v.moving_time_ms;
            totals.co2_saved_g += v.co2_saved_g;
            totals.max_speed_kmh = totals.max_speed_kmh.max(v.max_speed_kmh);
            totals.longest_trip_km = totals.longest_trip_km.max(v.longest_trip_km);
        }
        totals.per_vehicle = per_vehicle;
        Ok(totals)
    }

    // ========================================================================
    // Odometer
    // ========================================================================

    /// Validate against the vehicle's stored readings, then store.
    pub fn add_odometer_reading(&self, reading: &OdometerReading) -> Result<()> {
        let mut log = self.odometer_log(&reading.vehicle_id)?;
        log.add_reading(reading.clone())?;

        self.db.execute(
            "INSERT INTO odometer_readings (vehicle_id, value_km, recorded_at) VALUES (?, ?, ?)",
            params![reading.vehicle_id, reading.value_km, reading.recorded_at_ms],
        )?;
        debug!(
            "[TripStore] Odometer {} = {:.1} km",
            reading.vehicle_id, reading.value_km
        );
        Ok(())
    }

    /// All readings of one vehicle.
    pub fn odometer_log(&self, vehicle_id: &str) -> Result<OdometerLog> {
        let mut stmt = self.db.prepare(
            "SELECT vehicle_id, value_km, recorded_at FROM odometer_readings
             WHERE vehicle_id = ? ORDER BY recorded_at, id",
        )?;
        let readings = stmt
            .query_map(params![vehicle_id], |row| {
                Ok(OdometerReading {
                    vehicle_id: row.get(0)?,
                    value_km: row.get(1)?,
                    recorded_at_ms: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(OdometerLog::from_readings(readings))
    }
}
