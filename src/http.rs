//! HTTP client for current weather conditions with rate limiting.
//!
//! Talks to an OpenWeatherMap One Call style endpoint and maps the response
//! onto [`WeatherConditions`] for the advisory rules:
//! - Sliding-window rate limiting (60 req/min, the free-tier quota)
//! - Automatic retry with exponential backoff on 429
//! - Concurrent lookups for several waypoints of a route

use futures::future::join_all;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::geo_utils::ms_to_kmh;
use crate::weather::{route_advisory, RouteAdvisory, WeatherConditions};
use crate::{GpsPoint, Result, TrackerError};

// API rate limits
const REQUESTS_PER_WINDOW: usize = 60;
const WINDOW_MS: u64 = 60_000;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 15;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

/// API response for the One Call endpoint (metric units)
#[derive(Debug, Deserialize)]
struct OneCallResponse {
    current: CurrentWeather,
    #[serde(default)]
    hourly: Vec<HourlyForecast>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    dt: i64,
    sunrise: Option<i64>,
    sunset: Option<i64>,
    temp: Option<f64>,
    humidity: Option<f64>,
    dew_point: Option<f64>,
    uvi: Option<f64>,
    visibility: Option<f64>,
    /// m/s
    wind_speed: Option<f64>,
    wind_gust: Option<f64>,
    #[serde(default)]
    weather: Vec<ConditionEntry>,
    rain: Option<RainVolume>,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    id: u32,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RainVolume {
    #[serde(rename = "1h")]
    last_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HourlyForecast {
    dt: i64,
    pop: Option<f64>,
}

impl From<OneCallResponse> for WeatherConditions {
    fn from(response: OneCallResponse) -> Self {
        let current = response.current;
        let condition = current.weather.into_iter().next();

        let is_daytime = match (current.sunrise, current.sunset) {
            (Some(rise), Some(set)) => Some(current.dt >= rise && current.dt < set),
            _ => None,
        };

        // Highest chance of rain among forecast hours starting within the next hour
        let horizon = current.dt + 3_600;
        let precipitation_probability = response
            .hourly
            .iter()
            .filter(|h| h.dt <= horizon)
            .filter_map(|h| h.pop)
            .fold(None, |max: Option<f64>, p| Some(max.map_or(p, |m| m.max(p))));

        WeatherConditions {
            condition_code: condition.as_ref().map(|c| c.id),
            description: condition.and_then(|c| c.description),
            temperature_c: current.temp,
            humidity_pct: current.humidity,
            dew_point_c: current.dew_point,
            wind_speed_kmh: current.wind_speed.map(ms_to_kmh),
            wind_gust_kmh: current.wind_gust.map(ms_to_kmh),
            uv_index: current.uvi,
            visibility_m: current.visibility,
            precipitation_probability,
            rain_last_hour_mm: current.rain.and_then(|r| r.last_hour),
            hours_since_rain: None,
            is_daytime,
        }
    }
}

/// Rate limiter using sliding window
struct RateLimiter {
    request_times: Mutex<VecDeque<Instant>>,
    consecutive_429s: AtomicU32,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            request_times: Mutex::new(VecDeque::with_capacity(limit + 1)),
            consecutive_429s: AtomicU32::new(0),
            limit,
            window,
        }
    }

    /// Wait for a free slot in the window and claim it in the same critical section
    async fn wait_if_needed(&self) {
        loop {
            let wait_time = {
                let mut times = self.request_times.lock().await;
                let now = Instant::now();

                // Prune old requests outside window
                while times
                    .front()
                    .map_or(false, |&t| now.duration_since(t) >= self.window)
                {
                    times.pop_front();
                }

                if times.len() >= self.limit {
                    times
                        .front()
                        .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                } else {
                    times.push_back(now);
                    None
                }
            };

            match wait_time {
                Some(duration) => {
                    debug!("[WeatherClient] Rate limit: waiting {:?}", duration);
                    tokio::time::sleep(duration).await;
                }
                None => break,
            }
        }
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        // Exponential backoff: 2s, 4s, 8s, capped at 16s
        let backoff_ms = 1000 * (1u64 << count.min(4));
        Duration::from_millis(backoff_ms)
    }
}

/// Weather provider client
pub struct WeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl WeatherClient {
    /// Create a client for the given API key
    pub fn new(api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TrackerError::HttpError {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limiter: Arc::new(RateLimiter::new(
                REQUESTS_PER_WINDOW,
                Duration::from_millis(WINDOW_MS),
            )),
        })
    }

    /// Point the client at another One Call compatible endpoint
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Fetch current conditions at a location
    pub async fn current_conditions(&self, latitude: f64, longitude: f64) -> Result<WeatherConditions> {
        let position = GpsPoint::new(latitude, longitude);
        if !position.is_valid() {
            return Err(TrackerError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }

        let mut retries = 0;

        loop {
            self.rate_limiter.wait_if_needed().await;

            let response = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("units", "metric".to_string()),
                    ("exclude", "minutely,daily,alerts".to_string()),
                    ("appid", self.api_key.clone()),
                ])
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        retries += 1;
                        if retries > MAX_RETRIES {
                            return Err(TrackerError::HttpError {
                                message: "Max retries exceeded (429)".to_string(),
                                status_code: Some(status.as_u16()),
                            });
                        }

                        let backoff = self.rate_limiter.record_429();
                        warn!(
                            "[WeatherClient] 429, retry {} after {:?}",
                            retries, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    if !status.is_success() {
                        return Err(TrackerError::HttpError {
                            message: format!("HTTP {}", status),
                            status_code: Some(status.as_u16()),
                        });
                    }

                    self.rate_limiter.record_success();
                    let data: OneCallResponse = resp.json().await?;
                    return Ok(data.into());
                }
                Err(e) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(e.into());
                    }

                    let backoff = Duration::from_millis(500 * (1 << retries));
                    warn!(
                        "[WeatherClient] Request error: {}, retry {} after {:?}",
                        e, retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// Fetch conditions and run the advisory rules on them
    pub async fn advisory(&self, latitude: f64, longitude: f64) -> Result<RouteAdvisory> {
        let conditions = self.current_conditions(latitude, longitude).await?;
        Ok(route_advisory(&conditions))
    }

    /// Fetch conditions for several waypoints concurrently, in input order
    pub async fn conditions_along(&self, waypoints: &[GpsPoint]) -> Vec<Result<WeatherConditions>> {
        let start = Instant::now();
        let results = join_all(
            waypoints
                .iter()
                .map(|p| self.current_conditions(p.latitude, p.longitude)),
        )
        .await;

        info!(
            "[WeatherClient] Fetched {} waypoints ({} ok) in {:.2}s",
            waypoints.len(),
            results.iter().filter(|r| r.is_ok()).count(),
            start.elapsed().as_secs_f64()
        );
        results
    }
}

/// Synchronous wrapper for FFI - runs the async code on a tokio runtime
#[cfg(feature = "ffi")]
pub fn fetch_advisory_sync(api_key: &str, latitude: f64, longitude: f64) -> Result<RouteAdvisory> {
    use tokio::runtime::Runtime;

    let rt = Runtime::new().map_err(|e| TrackerError::Internal {
        message: format!("Failed to create tokio runtime: {}", e),
    })?;
    let client = WeatherClient::new(api_key)?;
    rt.block_on(client.advisory(latitude, longitude))
}
