use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Note attached to any value produced by the 1:1 fallback policy.
pub const FALLBACK_NOTE: &str = "fallback";

/// Normalized exchange rates for one base currency.
///
/// `rates[code]` is how many units of `code` buy one unit of `base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSnapshot {
    pub base: String,
    pub rates: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

impl ExchangeRateSnapshot {
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.to_ascii_uppercase()).copied()
    }
}

/// Answer to "how many `to` for one `from`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
    /// Set when the quote is degraded (stale cache or 1:1 fallback).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ExchangeQuote {
    pub fn identity(code: &str) -> Self {
        Self {
            from: code.to_string(),
            to: code.to_string(),
            rate: 1.0,
            timestamp: Utc::now(),
            note: None,
        }
    }

    pub fn fallback(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            rate: 1.0,
            timestamp: Utc::now(),
            note: Some(FALLBACK_NOTE.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.note.is_some()
    }
}

/// Which upstream produced a weather snapshot. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherSource {
    #[serde(rename = "openweather")]
    OpenWeather,
    #[serde(rename = "open-meteo")]
    OpenMeteo,
}

impl WeatherSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherSource::OpenWeather => "openweather",
            WeatherSource::OpenMeteo => "open-meteo",
        }
    }
}

impl std::fmt::Display for WeatherSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_mps: f64,
    pub condition: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temperature_c: f64,
    pub condition: String,
    pub icon: String,
}

/// Current conditions plus a short daily forecast for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub current: CurrentWeather,
    pub forecast: Vec<ForecastDay>,
    pub source: WeatherSource,
    pub updated_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// Maximum number of forecast days kept in a snapshot.
    pub const FORECAST_DAYS: usize = 5;

    /// Builds a snapshot, ordering the forecast by date and keeping at most
    /// [`Self::FORECAST_DAYS`] distinct days.
    pub fn new(current: CurrentWeather, mut forecast: Vec<ForecastDay>, source: WeatherSource) -> Self {
        forecast.sort_by_key(|day| day.date);
        forecast.dedup_by_key(|day| day.date);
        forecast.truncate(Self::FORECAST_DAYS);

        Self { current, forecast, source, updated_at: Utc::now() }
    }
}
