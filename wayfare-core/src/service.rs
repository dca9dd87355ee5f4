//! Entry points used by the front ends.

use std::sync::Arc;

use tracing::warn;

use crate::{
    Config,
    cache::TtlCache,
    chain::ProviderChain,
    convert::{Conversion, convert_to_base, with_fallback},
    error::{RateError, Unavailable, UnsupportedCurrency},
    fetch::{BoundedFetcher, HttpTransport, Transport},
    model::{ExchangeQuote, ExchangeRateSnapshot, WeatherSnapshot},
    provider::{
        Provider, rate_providers_from_config, rates::RateProvider, weather::WeatherProvider,
        weather_providers_from_config,
    },
    resolver::{CachedResolver, Resolved},
};

/// Note on quotes computed from a stale rates snapshot.
pub const STALE_NOTE: &str = "stale";

/// Exchange-rate and weather lookups for one process. Cheap to clone; clones
/// share caches.
#[derive(Debug, Clone)]
pub struct TravelData {
    rates: Arc<CachedResolver<RateProvider>>,
    weather: Arc<CachedResolver<WeatherProvider>>,
}

impl TravelData {
    pub fn new(
        rates: Arc<CachedResolver<RateProvider>>,
        weather: Arc<CachedResolver<WeatherProvider>>,
    ) -> Self {
        Self { rates, weather }
    }

    /// Builds both pipelines from config over real HTTP.
    pub fn from_config(config: &Config) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let rates = resolver(
            config,
            rate_providers_from_config(config),
            BoundedFetcher::new(transport.clone(), config.rates_timeout()),
            config.rates_ttl(),
        );
        let weather = resolver(
            config,
            weather_providers_from_config(config),
            BoundedFetcher::new(transport, config.weather_timeout()),
            config.weather_ttl(),
        );

        Self::new(Arc::new(rates), Arc::new(weather))
    }

    pub fn rates(&self) -> &CachedResolver<RateProvider> {
        &self.rates
    }

    pub fn weather(&self) -> &CachedResolver<WeatherProvider> {
        &self.weather
    }

    pub async fn exchange_rates(&self, base: &str) -> Result<Resolved<ExchangeRateSnapshot>, Unavailable> {
        self.rates.get(base).await
    }

    /// Rate for one unit of `base` in `target`. Identical codes answer 1.0
    /// without touching the network or the cache.
    pub async fn resolve_exchange_rate(&self, base: &str, target: &str) -> Result<ExchangeQuote, RateError> {
        let base = base.trim().to_ascii_uppercase();
        let target = target.trim().to_ascii_uppercase();

        if base == target {
            return Ok(ExchangeQuote::identity(&base));
        }

        let resolved = self.rates.get(&base).await?;
        let rate = resolved
            .value
            .rate(&target)
            .filter(|r| r.is_finite() && *r > 0.0)
            .ok_or_else(|| UnsupportedCurrency(target.clone()))?;

        Ok(ExchangeQuote {
            from: base,
            to: target,
            rate,
            timestamp: resolved.value.timestamp,
            note: resolved.is_degraded().then(|| STALE_NOTE.to_string()),
        })
    }

    /// Quote with the 1:1 fallback applied on any failure.
    pub async fn exchange_rate_or_fallback(&self, base: &str, target: &str) -> ExchangeQuote {
        let result = self.resolve_exchange_rate(base, target).await;
        with_fallback(result, |_| {
            ExchangeQuote::fallback(&base.trim().to_ascii_uppercase(), &target.trim().to_ascii_uppercase())
        })
    }

    pub async fn resolve_city_weather(&self, city: &str) -> Option<Resolved<WeatherSnapshot>> {
        match self.weather.get(city).await {
            Ok(resolved) => Some(resolved),
            Err(err) => {
                warn!(error = %err, "weather unavailable");
                None
            }
        }
    }

    /// Converts an expense into the trip's base currency. Any failure stores
    /// the amount at 1:1 with the fallback note.
    pub async fn convert_expense(&self, amount: f64, currency: &str, base: &str) -> Conversion {
        let currency_original = currency.trim().to_ascii_uppercase();
        let currency_base = base.trim().to_ascii_uppercase();

        if currency_original == currency_base {
            return Conversion {
                amount_original: amount,
                currency_original,
                amount_base: amount,
                currency_base,
                note: None,
            };
        }

        let converted = match self.exchange_rates(&currency_base).await {
            Ok(resolved) => convert_to_base(amount, &currency_original, &currency_base, &resolved.value.rates)
                .map(|amount_base| (amount_base, resolved.is_degraded()))
                .map_err(RateError::from),
            Err(err) => Err(err.into()),
        };

        with_fallback(
            converted.map(|(amount_base, stale)| Conversion {
                amount_original: amount,
                currency_original: currency_original.clone(),
                amount_base,
                currency_base: currency_base.clone(),
                note: stale.then(|| STALE_NOTE.to_string()),
            }),
            |_| Conversion::fallback(amount, &currency_original, &currency_base),
        )
    }
}

fn resolver<P: Provider>(
    config: &Config,
    providers: Vec<P>,
    fetcher: BoundedFetcher,
    ttl: std::time::Duration,
) -> CachedResolver<P> {
    let mut chain = ProviderChain::new(providers, fetcher);
    if let Some(deadline) = config.overall_deadline() {
        chain = chain.with_deadline(deadline);
    }

    let cache = match config.cache.capacity {
        Some(capacity) => TtlCache::with_capacity(capacity),
        None => TtlCache::new(),
    };

    CachedResolver::new(chain, Arc::new(cache), ttl)
}
