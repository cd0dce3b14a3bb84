//! Unified error handling for the ride-tracker library.
//!
//! Pure numeric code (distance, smoothing, route analysis) never fails: it
//! returns zeroed results for inputs that are too short. This error type is
//! used at the edges only: tracking lifecycle, odometer data entry,
//! configuration overrides, persistence and network access.

use std::fmt;

/// Unified error type for ride-tracker operations.
#[derive(Debug, Clone)]
pub enum TrackerError {
    /// Not enough points to produce the requested result
    InsufficientPoints {
        context: String,
        point_count: usize,
        minimum_required: usize,
    },
    /// Point has invalid GPS coordinates
    InvalidCoordinates { latitude: f64, longitude: f64 },
    /// Odometer reading rejected
    InvalidReading { vehicle_id: String, message: String },
    /// Operation not allowed in the current tracking state
    InvalidState { operation: String, state: String },
    /// Persistence/storage error
    PersistenceError { message: String },
    /// HTTP/API error
    HttpError {
        message: String,
        status_code: Option<u16>,
    },
    /// Configuration error
    ConfigError { message: String },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::InsufficientPoints {
                context,
                point_count,
                minimum_required,
            } => {
                write!(
                    f,
                    "{} has {} points, minimum {} required",
                    context, point_count, minimum_required
                )
            }
            TrackerError::InvalidCoordinates {
                latitude,
                longitude,
            } => {
                write!(f, "Invalid coordinates ({}, {})", latitude, longitude)
            }
            TrackerError::InvalidReading {
                vehicle_id,
                message,
            } => {
                write!(
                    f,
                    "Invalid odometer reading for '{}': {}",
                    vehicle_id, message
                )
            }
            TrackerError::InvalidState { operation, state } => {
                write!(f, "Cannot {} while tracker is {}", operation, state)
            }
            TrackerError::PersistenceError { message } => {
                write!(f, "Persistence error: {}", message)
            }
            TrackerError::HttpError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
            TrackerError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            TrackerError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::ConfigError {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::PersistenceError {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        TrackerError::HttpError {
            status_code: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Result type alias for ride-tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackerError::InsufficientPoints {
            context: "trip-1".to_string(),
            point_count: 1,
            minimum_required: 2,
        };
        assert!(err.to_string().contains("trip-1"));
        assert!(err.to_string().contains("1 points"));

        let err = TrackerError::InvalidState {
            operation: "pause".to_string(),
            state: "idle".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot pause while tracker is idle");
    }

    #[test]
    fn test_config_error_from_json() {
        let err: TrackerError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, TrackerError::ConfigError { .. }));
    }
}
