use crate::{
    Config,
    error::ProviderFailure,
    fetch::BoundedFetcher,
    provider::{rates::RateProvider, weather::WeatherProvider},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug};

pub mod open_meteo;
pub mod openweather;
pub mod rates;
pub mod weather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    OpenMeteo,
    ExchangeRateHost,
    Frankfurter,
    OpenErApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::OpenMeteo => "open-meteo",
            ProviderId::ExchangeRateHost => "exchangerate-host",
            ProviderId::Frankfurter => "frankfurter",
            ProviderId::OpenErApi => "open-er-api",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenWeather,
            ProviderId::OpenMeteo,
            ProviderId::ExchangeRateHost,
            ProviderId::Frankfurter,
            ProviderId::OpenErApi,
        ]
    }

    /// Providers that are only tried when a credential is configured.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::OpenWeather)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        ProviderId::all().iter().copied().find(|id| id.as_str() == lower).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, open-meteo, \
                 exchangerate-host, frankfurter, open-er-api."
            )
        })
    }
}

/// One upstream integration: builds its request(s) from a query and
/// normalizes the raw answer into the pipeline's snapshot type.
///
/// Implemented by one enum per pipeline, one variant per upstream.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    type Snapshot: Clone + Debug + Send + Sync + 'static;

    fn id(&self) -> ProviderId;

    /// Sequential upstream calls per attempt, for latency bounds.
    fn stages(&self) -> u32 {
        1
    }

    /// Canonical form of a query, used as cache key and passed to `fetch`.
    fn cache_key(query: &str) -> String;

    async fn fetch(
        &self,
        fetcher: &BoundedFetcher,
        query: &str,
    ) -> Result<Self::Snapshot, ProviderFailure>;
}

/// Weather providers in priority order: OpenWeather when its key is
/// configured, then open-meteo.
pub fn weather_providers_from_config(config: &Config) -> Vec<WeatherProvider> {
    let mut providers = Vec::with_capacity(2);

    if let Some(api_key) = config.provider_api_key(ProviderId::OpenWeather) {
        providers.push(WeatherProvider::OpenWeather { api_key: api_key.to_owned() });
    }
    providers.push(WeatherProvider::OpenMeteo);

    providers
}

/// Rate providers in priority order: the configured `latest?base=` host,
/// then Frankfurter, then open.er-api.
pub fn rate_providers_from_config(config: &Config) -> Vec<RateProvider> {
    vec![
        RateProvider::LatestByBase { api_base: config.rates_api_base().to_owned() },
        RateProvider::Frankfurter,
        RateProvider::OpenErApi,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_parse_ignores_case() {
        assert_eq!(ProviderId::try_from("OpenWeather").unwrap(), ProviderId::OpenWeather);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn weather_chain_skips_openweather_without_key() {
        let cfg = Config::default();
        let ids: Vec<_> = weather_providers_from_config(&cfg).iter().map(|p| p.id()).collect();
        assert_eq!(ids, [ProviderId::OpenMeteo]);
    }

    #[test]
    fn weather_chain_prefers_openweather_when_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "KEY".to_string()).unwrap();

        let ids: Vec<_> = weather_providers_from_config(&cfg).iter().map(|p| p.id()).collect();
        assert_eq!(ids, [ProviderId::OpenWeather, ProviderId::OpenMeteo]);
    }

    #[test]
    fn rate_chain_has_fixed_order() {
        let cfg = Config::default();
        let ids: Vec<_> = rate_providers_from_config(&cfg).iter().map(|p| p.id()).collect();
        assert_eq!(
            ids,
            [ProviderId::ExchangeRateHost, ProviderId::Frankfurter, ProviderId::OpenErApi]
        );
    }
}
