use async_trait::async_trait;

use crate::{
    error::ProviderFailure,
    fetch::BoundedFetcher,
    model::{WeatherSnapshot, WeatherSource},
};

use super::{Provider, ProviderId, open_meteo, openweather};

/// Weather upstreams.
#[derive(Clone, PartialEq, Eq)]
pub enum WeatherProvider {
    /// Keyed current + 5-day/3-hour forecast API, two requests in parallel.
    OpenWeather { api_key: String },
    /// Credential-free geocode, then forecast by coordinates.
    OpenMeteo,
}

impl std::fmt::Debug for WeatherProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeatherProvider::OpenWeather { .. } => {
                f.debug_struct("OpenWeather").field("api_key", &"<redacted>").finish()
            }
            WeatherProvider::OpenMeteo => f.write_str("OpenMeteo"),
        }
    }
}

impl WeatherProvider {
    async fn fetch_openweather(
        &self,
        fetcher: &BoundedFetcher,
        city: &str,
        api_key: &str,
    ) -> Result<WeatherSnapshot, ProviderFailure> {
        let unreachable = |stage| ProviderFailure::Unreachable { provider: "openweather", stage };

        let current_url = openweather::current_url(city, api_key);
        let forecast_url = openweather::forecast_url(city, api_key);
        let (current, forecast) =
            tokio::join!(fetcher.fetch(&current_url), fetcher.fetch(&forecast_url));

        let current = openweather::normalize_current(&current.ok_or_else(|| unreachable("current"))?)?;
        let forecast =
            openweather::normalize_forecast(&forecast.ok_or_else(|| unreachable("forecast"))?)?;

        Ok(WeatherSnapshot::new(current, forecast, WeatherSource::OpenWeather))
    }

    async fn fetch_open_meteo(
        &self,
        fetcher: &BoundedFetcher,
        city: &str,
    ) -> Result<WeatherSnapshot, ProviderFailure> {
        let unreachable = |stage| ProviderFailure::Unreachable { provider: "open-meteo", stage };

        let geo = fetcher.fetch(&open_meteo::geocode_url(city)).await.ok_or_else(|| unreachable("geocode"))?;
        let point = open_meteo::normalize_geocode(&geo)?;

        let raw = fetcher
            .fetch(&open_meteo::forecast_url(point))
            .await
            .ok_or_else(|| unreachable("forecast"))?;
        let (current, forecast) = open_meteo::normalize_forecast(&raw)?;

        Ok(WeatherSnapshot::new(current, forecast, WeatherSource::OpenMeteo))
    }
}

#[async_trait]
impl Provider for WeatherProvider {
    type Snapshot = WeatherSnapshot;

    fn id(&self) -> ProviderId {
        match self {
            WeatherProvider::OpenWeather { .. } => ProviderId::OpenWeather,
            WeatherProvider::OpenMeteo => ProviderId::OpenMeteo,
        }
    }

    fn stages(&self) -> u32 {
        match self {
            WeatherProvider::OpenWeather { .. } => 1,
            WeatherProvider::OpenMeteo => 2,
        }
    }

    /// Trimmed, lower-cased, single-spaced city name.
    fn cache_key(query: &str) -> String {
        query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }

    async fn fetch(
        &self,
        fetcher: &BoundedFetcher,
        city: &str,
    ) -> Result<WeatherSnapshot, ProviderFailure> {
        match self {
            WeatherProvider::OpenWeather { api_key } => {
                self.fetch_openweather(fetcher, city, api_key).await
            }
            WeatherProvider::OpenMeteo => self.fetch_open_meteo(fetcher, city).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    pub(crate) fn openweather_current() -> Value {
        json!({"main": {"temp": 21.0, "humidity": 50}, "wind": {"speed": 3.0}, "weather": [{"main": "Clear", "icon": "01d"}]})
    }

    pub(crate) fn openweather_forecast() -> Value {
        let list: Vec<Value> = (1..=6)
            .rev()
            .map(|day| {
                json!({"dt_txt": format!("2026-07-0{day} 12:00:00"), "main": {"temp": 20.0 + day as f64}, "weather": [{"main": "Clouds", "icon": "03d"}]})
            })
            .collect();
        json!({ "list": list })
    }

    pub(crate) fn geocode() -> Value {
        json!({"results": [{"name": "Lisbon", "latitude": 38.72, "longitude": -9.14}]})
    }

    pub(crate) fn open_meteo_forecast() -> Value {
        json!({
            "current": {"temperature_2m": 19.0, "relative_humidity_2m": 70, "wind_speed_10m": 5.0, "weather_code": 3},
            "daily": {
                "time": ["2026-07-01", "2026-07-02", "2026-07-03", "2026-07-04", "2026-07-05"],
                "weather_code": [0, 2, 61, 95, 3],
                "temperature_2m_max": [25.0, 24.0, 22.0, 21.0, 23.0],
                "temperature_2m_min": [15.0, 14.0, 12.0, 11.0, 13.0]
            }
        })
    }
}
