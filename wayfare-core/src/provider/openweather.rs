use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::MalformedPayload,
    model::{CurrentWeather, ForecastDay},
};

const PROVIDER: &str = "openweather";
const API_BASE: &str = "https://api.openweathermap.org/data/2.5";

const UNKNOWN_CONDITION: &str = "Unknown";
const DEFAULT_ICON: &str = "01d";

pub(crate) fn current_url(city: &str, api_key: &str) -> String {
    format!("{API_BASE}/weather?q={}&units=metric&appid={api_key}", urlencoding::encode(city))
}

pub(crate) fn forecast_url(city: &str, api_key: &str) -> String {
    format!("{API_BASE}/forecast?q={}&units=metric&appid={api_key}", urlencoding::encode(city))
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt_txt: String,
    main: OwForecastMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

fn label(weather: &[OwWeather]) -> (String, String) {
    weather.first().map_or_else(
        || (UNKNOWN_CONDITION.to_string(), DEFAULT_ICON.to_string()),
        |w| (w.main.clone(), w.icon.clone()),
    )
}

pub(crate) fn normalize_current(raw: &Value) -> Result<CurrentWeather, MalformedPayload> {
    let parsed = OwCurrentResponse::deserialize(raw)
        .map_err(|e| MalformedPayload::new(PROVIDER, format!("current weather: {e}")))?;

    let OwMain { temp, humidity } = parsed.main;
    if ![temp, humidity, parsed.wind.speed].iter().all(|v| v.is_finite()) {
        return Err(MalformedPayload::new(PROVIDER, "current weather has non-finite readings"));
    }

    let (condition, icon) = label(&parsed.weather);

    Ok(CurrentWeather {
        temperature_c: temp,
        humidity_pct: humidity,
        wind_speed_mps: parsed.wind.speed,
        condition,
        icon,
    })
}

/// Collapses the 3-hourly forecast into one entry per calendar day, using the
/// reading closest to midday. Unparseable slots are skipped.
pub(crate) fn normalize_forecast(raw: &Value) -> Result<Vec<ForecastDay>, MalformedPayload> {
    let parsed = OwForecastResponse::deserialize(raw)
        .map_err(|e| MalformedPayload::new(PROVIDER, format!("forecast: {e}")))?;

    let mut by_day: BTreeMap<NaiveDate, Vec<(NaiveDateTime, &OwForecastEntry)>> = BTreeMap::new();
    for entry in parsed.list.iter().filter(|e| e.main.temp.is_finite()) {
        if let Ok(at) = NaiveDateTime::parse_from_str(&entry.dt_txt, "%Y-%m-%d %H:%M:%S") {
            by_day.entry(at.date()).or_default().push((at, entry));
        }
    }

    let days = by_day
        .into_iter()
        .filter_map(|(date, slots)| {
            let (_, best) = slots
                .into_iter()
                .min_by_key(|(at, _)| (i64::from(at.hour()) - 12).abs())?;
            let (condition, icon) = label(&best.weather);
            Some(ForecastDay { date, temperature_c: best.main.temp, condition, icon })
        })
        .collect();

    Ok(days)
}
