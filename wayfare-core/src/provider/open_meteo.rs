use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::MalformedPayload,
    model::{CurrentWeather, ForecastDay},
};

const PROVIDER: &str = "open-meteo";
const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Condition label and icon name for a WMO weather code.
pub fn describe_code(code: i64) -> (&'static str, &'static str) {
    match code {
        0 => ("Clear", "clear"),
        1 => ("Mostly Clear", "clear"),
        2 => ("Partly Cloudy", "clouds"),
        3 => ("Cloudy", "clouds"),
        45 | 48 => ("Fog", "mist"),
        51 | 53 | 55 => ("Drizzle", "drizzle"),
        56 | 57 => ("Freezing Drizzle", "drizzle"),
        61 | 63 => ("Rain", "rain"),
        65 => ("Heavy Rain", "rain"),
        66 | 67 => ("Freezing Rain", "rain"),
        71 | 73 => ("Snow", "snow"),
        75 => ("Heavy Snow", "snow"),
        77 => ("Snow Grains", "snow"),
        80 | 81 => ("Rain Showers", "rain"),
        82 => ("Heavy Showers", "rain"),
        85 | 86 => ("Snow Showers", "snow"),
        95 | 96 | 99 => ("Thunderstorm", "storm"),
        _ => ("Unknown", "na"),
    }
}

fn describe(code: Option<f64>) -> (String, String) {
    // codes arrive as JSON numbers; anything fractional is not a WMO code
    let code = code.filter(|c| c.fract() == 0.0).map_or(-1, |c| c as i64);
    let (condition, icon) = describe_code(code);
    (condition.to_string(), icon.to_string())
}

pub(crate) fn geocode_url(city: &str) -> String {
    format!("{GEOCODING_URL}?name={}&count=1&language=en&format=json", urlencoding::encode(city))
}

pub(crate) fn forecast_url(point: Coordinates) -> String {
    format!(
        "{FORECAST_URL}?latitude={}&longitude={}\
         &current=temperature_2m,relative_humidity_2m,wind_speed_10m,weather_code\
         &daily=weather_code,temperature_2m_max,temperature_2m_min\
         &wind_speed_unit=ms&timezone=auto&forecast_days=5",
        point.latitude, point.longitude
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub(crate) struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<Coordinates>,
}

/// First geocoding match for the city.
pub(crate) fn normalize_geocode(raw: &Value) -> Result<Coordinates, MalformedPayload> {
    let parsed = GeocodeResponse::deserialize(raw)
        .map_err(|e| MalformedPayload::new(PROVIDER, format!("geocoding: {e}")))?;

    parsed
        .results
        .into_iter()
        .next()
        .filter(|p| p.latitude.is_finite() && p.longitude.is_finite())
        .ok_or_else(|| MalformedPayload::new(PROVIDER, "no geocoding match"))
}

#[derive(Debug, Deserialize)]
struct OmCurrent {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    weather_code: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    current: OmCurrent,
    daily: OmDaily,
}

pub(crate) fn normalize_forecast(
    raw: &Value,
) -> Result<(CurrentWeather, Vec<ForecastDay>), MalformedPayload> {
    let parsed = OmForecastResponse::deserialize(raw)
        .map_err(|e| MalformedPayload::new(PROVIDER, format!("forecast: {e}")))?;

    let OmCurrent { temperature_2m, relative_humidity_2m, wind_speed_10m, weather_code } =
        parsed.current;
    if ![temperature_2m, relative_humidity_2m, wind_speed_10m].iter().all(|v| v.is_finite()) {
        return Err(MalformedPayload::new(PROVIDER, "current weather has non-finite readings"));
    }

    let (condition, icon) = describe(weather_code);
    let current = CurrentWeather {
        temperature_c: temperature_2m,
        humidity_pct: relative_humidity_2m,
        wind_speed_mps: wind_speed_10m,
        condition,
        icon,
    };

    let daily = &parsed.daily;
    let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten().filter(|v| v.is_finite());

    let forecast = daily
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, date)| {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let max = at(&daily.temperature_2m_max, i)?;
            let min = at(&daily.temperature_2m_min, i)?;
            let (condition, icon) = describe(at(&daily.weather_code, i));
            Some(ForecastDay { date, temperature_c: (max + min) / 2.0, condition, icon })
        })
        .collect();

    Ok((current, forecast))
}
