//! # Weather Advisory
//!
//! Rule tables that turn current weather-provider fields into riding advice.
//! Every check returns an [`Advisory`]: a flag plus the reason shown to the
//! rider. Checks run in a fixed order and the first matching rule supplies
//! the reason.
//!
//! Condition codes follow the OpenWeatherMap grouping: 2xx thunderstorm,
//! 3xx drizzle, 5xx rain, 6xx snow, 7xx atmosphere, 800 clear, 80x clouds.

use serde::{Deserialize, Serialize};

/// Sustained wind above this is unsafe on small wheels (km/h).
pub const MAX_WIND_KMH: f64 = 40.0;
pub const MAX_GUST_KMH: f64 = 60.0;
pub const MIN_TEMPERATURE_C: f64 = 0.0;
pub const MAX_TEMPERATURE_C: f64 = 35.0;
pub const MAX_UV_INDEX: f64 = 8.0;
pub const MIN_VISIBILITY_M: f64 = 3_000.0;
/// Precipitation probability (0-1) treated as "rain expected".
pub const RAIN_PROBABILITY_THRESHOLD: f64 = 0.6;

const RAIN_KEYWORDS: [&str; 5] = ["rain", "drizzle", "shower", "thunderstorm", "storm"];
const STORM_KEYWORDS: [&str; 2] = ["thunder", "storm"];
const SNOW_KEYWORDS: [&str; 3] = ["snow", "sleet", "blizzard"];

/// Current conditions as reported by a weather provider. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct WeatherConditions {
    pub condition_code: Option<u32>,
    pub description: Option<String>,
    pub temperature_c: Option<f64>,
    /// Relative humidity, 0-100
    pub humidity_pct: Option<f64>,
    pub dew_point_c: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_gust_kmh: Option<f64>,
    pub uv_index: Option<f64>,
    pub visibility_m: Option<f64>,
    /// Probability of precipitation over the next hour, 0-1
    pub precipitation_probability: Option<f64>,
    pub rain_last_hour_mm: Option<f64>,
    pub hours_since_rain: Option<f64>,
    pub is_daytime: Option<bool>,
}

impl WeatherConditions {
    fn description_has(&self, keywords: &[&str]) -> bool {
        self.description
            .as_deref()
            .map(|d| {
                let d = d.to_ascii_lowercase();
                keywords.iter().any(|k| d.contains(k))
            })
            .unwrap_or(false)
    }

    fn code_in(&self, range: std::ops::RangeInclusive<u32>) -> bool {
        self.condition_code.map_or(false, |c| range.contains(&c))
    }

    /// Reported dew point, or one derived from temperature and humidity.
    pub fn effective_dew_point_c(&self) -> Option<f64> {
        self.dew_point_c
            .or_else(|| dew_point_c(self.temperature_c?, self.humidity_pct?))
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Advisory {
    pub flag: bool,
    pub reason: String,
}

impl Advisory {
    fn yes(reason: impl Into<String>) -> Self {
        Self {
            flag: true,
            reason: reason.into(),
        }
    }

    fn no(reason: impl Into<String>) -> Self {
        Self {
            flag: false,
            reason: reason.into(),
        }
    }
}

/// Combined advice for starting a ride now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteAdvisory {
    /// False when it is raining or conditions are extreme
    pub ride_ok: bool,
    pub raining: bool,
    pub wet_road: bool,
    pub rain_expected: bool,
    pub extreme: bool,
    pub reasons: Vec<String>,
}

/// Dew point (°C) from the Magnus formula.
pub fn dew_point_c(temperature_c: f64, humidity_pct: f64) -> Option<f64> {
    const A: f64 = 17.62;
    const B: f64 = 243.12;

    if !temperature_c.is_finite() || !(humidity_pct > 0.0) || humidity_pct > 100.0 {
        return None;
    }
    let gamma = (humidity_pct / 100.0).ln() + A * temperature_c / (B + temperature_c);
    Some(B * gamma / (A - gamma))
}

/// Active precipitation. Category and keyword matches win over measurements.
pub fn is_raining(conditions: &WeatherConditions) -> Advisory {
    if conditions.code_in(200..=599) {
        let label = conditions.description.as_deref().unwrap_or("precipitation");
        return Advisory::yes(format!("Raining ({})", label));
    }
    if conditions.description_has(&RAIN_KEYWORDS) {
        return Advisory::yes(format!(
            "Raining ({})",
            conditions.description.as_deref().unwrap_or_default()
        ));
    }
    if let Some(mm) = conditions.rain_last_hour_mm.filter(|mm| *mm > 0.0) {
        return Advisory::yes(format!("{:.1} mm of rain in the last hour", mm));
    }
    Advisory::no("No rain")
}

/// Hours a road needs to dry after rain, by air temperature.
fn drying_hours(temperature_c: Option<f64>) -> f64 {
    match temperature_c {
        Some(t) if t >= 25.0 => 1.0,
        Some(t) if t >= 15.0 => 2.0,
        Some(t) if t >= 5.0 => 4.0,
        Some(_) => 6.0,
        None => 4.0,
    }
}

/// Whether the road surface is likely wet.
pub fn is_road_wet(conditions: &WeatherConditions) -> Advisory {
    let raining = is_raining(conditions);
    if raining.flag {
        return raining;
    }

    if let Some(hours) = conditions.hours_since_rain.filter(|h| *h >= 0.0) {
        if hours < drying_hours(conditions.temperature_c) {
            return Advisory::yes(format!("Road still wet, rained {:.1} h ago", hours));
        }
    }

    if let (Some(temp), Some(dew), Some(humidity)) = (
        conditions.temperature_c,
        conditions.effective_dew_point_c(),
        conditions.humidity_pct,
    ) {
        if temp - dew <= 2.0 && humidity >= 90.0 {
            return Advisory::yes(format!("Condensation likely ({:.0}% humidity)", humidity));
        }
    }

    Advisory::no("Road dry")
}

/// Rain likely within the next hour.
pub fn rain_expected_soon(conditions: &WeatherConditions) -> Advisory {
    match conditions.precipitation_probability {
        Some(p) if p >= RAIN_PROBABILITY_THRESHOLD => Advisory::yes(format!(
            "{:.0}% chance of rain in the next hour",
            p * 100.0
        )),
        _ => Advisory::no("No rain expected"),
    }
}

/// Every extreme condition present, highest priority first.
pub fn extreme_causes(conditions: &WeatherConditions) -> Vec<String> {
    let mut causes = Vec::new();

    if conditions.code_in(200..=299) || conditions.description_has(&STORM_KEYWORDS) {
        causes.push("Thunderstorm".to_string());
    }
    if conditions.code_in(600..=699) || conditions.description_has(&SNOW_KEYWORDS) {
        causes.push("Snow".to_string());
    }
    if let Some(gust) = conditions.wind_gust_kmh.filter(|g| *g > MAX_GUST_KMH) {
        causes.push(format!("Wind gusts {:.0} km/h", gust));
    }
    if let Some(wind) = conditions.wind_speed_kmh.filter(|w| *w > MAX_WIND_KMH) {
        causes.push(format!("Strong wind {:.0} km/h", wind));
    }
    if let Some(temp) = conditions
        .temperature_c
        .filter(|t| *t < MIN_TEMPERATURE_C || *t > MAX_TEMPERATURE_C)
    {
        causes.push(format!("Temperature {:.0}°C", temp));
    }
    if let Some(visibility) = conditions.visibility_m.filter(|v| *v < MIN_VISIBILITY_M) {
        causes.push(format!("Low visibility {:.0} m", visibility));
    }
    // UV only matters while the sun is up
    if conditions.is_daytime.unwrap_or(true) {
        if let Some(uv) = conditions.uv_index.filter(|uv| *uv > MAX_UV_INDEX) {
            causes.push(format!("UV index {:.0}", uv));
        }
    }

    causes
}

/// Extreme conditions, attributed to the highest-priority cause.
pub fn extreme_conditions(conditions: &WeatherConditions) -> Advisory {
    match extreme_causes(conditions).into_iter().next() {
        Some(cause) => Advisory::yes(cause),
        None => Advisory::no("Conditions normal"),
    }
}

/// Run every check and combine them into one piece of advice.
pub fn route_advisory(conditions: &WeatherConditions) -> RouteAdvisory {
    let raining = is_raining(conditions);
    let wet_road = is_road_wet(conditions);
    let rain_expected = rain_expected_soon(conditions);
    let extreme = extreme_conditions(conditions);

    let mut reasons = Vec::new();
    if raining.flag {
        reasons.push(raining.reason.clone());
    } else if wet_road.flag {
        reasons.push(wet_road.reason.clone());
    }
    if rain_expected.flag {
        reasons.push(rain_expected.reason.clone());
    }
    if extreme.flag {
        reasons.push(extreme.reason.clone());
    }

    RouteAdvisory {
        ride_ok: !raining.flag && !extreme.flag,
        raining: raining.flag,
        wet_road: wet_road.flag,
        rain_expected: rain_expected.flag,
        extreme: extreme.flag,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_day() -> WeatherConditions {
        WeatherConditions {
            condition_code: Some(800),
            description: Some("clear sky".to_string()),
            temperature_c: Some(20.0),
            humidity_pct: Some(50.0),
            wind_speed_kmh: Some(10.0),
            wind_gust_kmh: Some(15.0),
            uv_index: Some(4.0),
            visibility_m: Some(10_000.0),
            is_daytime: Some(true),
            ..WeatherConditions::default()
        }
    }

    #[test]
    fn test_clear_day_is_fine() {
        let advice = route_advisory(&clear_day());
        assert!(advice.ride_ok);
        assert!(!advice.raining && !advice.wet_road && !advice.rain_expected && !advice.extreme);
        assert!(advice.reasons.is_empty());
    }

    #[test]
    fn test_rain_by_code_keyword_and_measurement() {
        let by_code = WeatherConditions {
            condition_code: Some(501),
            description: None,
            ..clear_day()
        };
        assert!(is_raining(&by_code).flag);

        let by_keyword = WeatherConditions {
            condition_code: None,
            description: Some("Light Showers".to_string()),
            ..clear_day()
        };
        assert!(is_raining(&by_keyword).flag);

        let measured = WeatherConditions {
            rain_last_hour_mm: Some(0.4),
            ..clear_day()
        };
        let advisory = is_raining(&measured);
        assert!(advisory.flag);
        assert_eq!(advisory.reason, "0.4 mm of rain in the last hour");

        assert!(!is_raining(&clear_day()).flag);
    }

    #[test]
    fn test_active_rain_wins_over_wet_road_inference() {
        let conditions = WeatherConditions {
            condition_code: Some(500),
            description: Some("light rain".to_string()),
            humidity_pct: Some(95.0),
            hours_since_rain: Some(0.5),
            ..clear_day()
        };
        let wet = is_road_wet(&conditions);
        assert!(wet.flag);
        assert_eq!(wet.reason, "Raining (light rain)");
    }

    #[test]
    fn test_drying_window_depends_on_temperature() {
        let warm = WeatherConditions {
            hours_since_rain: Some(1.5),
            temperature_c: Some(28.0),
            ..clear_day()
        };
        assert!(!is_road_wet(&warm).flag);

        let cold = WeatherConditions {
            temperature_c: Some(3.0),
            ..warm
        };
        assert!(is_road_wet(&cold).flag);
    }

    #[test]
    fn test_condensation_from_derived_dew_point() {
        let foggy = WeatherConditions {
            temperature_c: Some(8.0),
            humidity_pct: Some(95.0),
            dew_point_c: None,
            ..clear_day()
        };
        let wet = is_road_wet(&foggy);
        assert!(wet.flag);
        assert!(wet.reason.starts_with("Condensation"));
    }

    #[test]
    fn test_dew_point_magnus() {
        // 20°C at 50% is about 9.3°C
        let dew = dew_point_c(20.0, 50.0).unwrap();
        assert!((dew - 9.26).abs() < 0.1);
        // Saturated air: dew point equals temperature
        assert!((dew_point_c(15.0, 100.0).unwrap() - 15.0).abs() < 1e-9);
        assert!(dew_point_c(15.0, 0.0).is_none());
    }

    #[test]
    fn test_rain_expected() {
        let likely = WeatherConditions {
            precipitation_probability: Some(0.7),
            ..clear_day()
        };
        let advisory = rain_expected_soon(&likely);
        assert!(advisory.flag);
        assert_eq!(advisory.reason, "70% chance of rain in the next hour");

        let unlikely = WeatherConditions {
            precipitation_probability: Some(0.3),
            ..clear_day()
        };
        assert!(!rain_expected_soon(&unlikely).flag);

        // Expected rain is a warning, not a blocker
        assert!(route_advisory(&likely).ride_ok);
    }

    #[test]
    fn test_each_extreme_threshold() {
        let cases = [
            WeatherConditions { wind_speed_kmh: Some(45.0), ..clear_day() },
            WeatherConditions { wind_gust_kmh: Some(65.0), ..clear_day() },
            WeatherConditions { temperature_c: Some(-2.0), ..clear_day() },
            WeatherConditions { temperature_c: Some(37.0), ..clear_day() },
            WeatherConditions { uv_index: Some(9.0), ..clear_day() },
            WeatherConditions { visibility_m: Some(1_500.0), ..clear_day() },
        ];
        for conditions in &cases {
            assert!(extreme_conditions(conditions).flag, "{:?}", conditions);
        }

        let boundaries = WeatherConditions {
            wind_speed_kmh: Some(40.0),
            wind_gust_kmh: Some(60.0),
            temperature_c: Some(35.0),
            uv_index: Some(8.0),
            visibility_m: Some(3_000.0),
            ..clear_day()
        };
        assert!(!extreme_conditions(&boundaries).flag);
    }

    #[test]
    fn test_uv_ignored_at_night() {
        let night = WeatherConditions {
            uv_index: Some(10.0),
            is_daytime: Some(false),
            ..clear_day()
        };
        assert!(!extreme_conditions(&night).flag);
    }

    #[test]
    fn test_extreme_cause_priority() {
        let everything = WeatherConditions {
            condition_code: Some(211),
            description: Some("thunderstorm with snow".to_string()),
            wind_speed_kmh: Some(50.0),
            wind_gust_kmh: Some(80.0),
            temperature_c: Some(-5.0),
            visibility_m: Some(500.0),
            uv_index: Some(10.0),
            ..clear_day()
        };
        let causes = extreme_causes(&everything);
        assert_eq!(causes.len(), 7);
        assert_eq!(causes[0], "Thunderstorm");
        assert_eq!(causes[1], "Snow");
        assert_eq!(causes[2], "Wind gusts 80 km/h");
        assert_eq!(causes[3], "Strong wind 50 km/h");
        assert_eq!(causes[4], "Temperature -5°C");
        assert_eq!(causes[5], "Low visibility 500 m");
        assert_eq!(causes[6], "UV index 10");

        let gusts_and_wind = WeatherConditions {
            wind_speed_kmh: Some(50.0),
            wind_gust_kmh: Some(70.0),
            ..clear_day()
        };
        assert_eq!(extreme_conditions(&gusts_and_wind).reason, "Wind gusts 70 km/h");
    }

    #[test]
    fn test_route_advisory_blocks_rain_and_extremes() {
        let storm = WeatherConditions {
            condition_code: Some(202),
            description: Some("heavy thunderstorm".to_string()),
            precipitation_probability: Some(0.9),
            ..clear_day()
        };
        let advice = route_advisory(&storm);
        assert!(!advice.ride_ok);
        assert!(advice.raining && advice.wet_road && advice.extreme);
        assert_eq!(
            advice.reasons,
            vec![
                "Raining (heavy thunderstorm)".to_string(),
                "90% chance of rain in the next hour".to_string(),
                "Thunderstorm".to_string(),
            ]
        );

        let windy = WeatherConditions {
            wind_speed_kmh: Some(55.0),
            ..clear_day()
        };
        assert!(!route_advisory(&windy).ride_ok);
    }

    #[test]
    fn test_conditions_from_partial_json() {
        let conditions: WeatherConditions =
            serde_json::from_str(r#"{"temperature_c": 12.5, "description": "mist"}"#).unwrap();
        assert_eq!(conditions.temperature_c, Some(12.5));
        assert!(conditions.wind_speed_kmh.is_none());
        assert!(route_advisory(&conditions).ride_ok);
    }
}
