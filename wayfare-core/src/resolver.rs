//! Cache in front of a provider chain.
//!
//! Per key: `Empty -> Fresh -> Stale -> Fresh`. A stale entry is only served
//! when a refresh fails, and is then flagged as degraded.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::{cache::TtlCache, chain::ProviderChain, error::Unavailable, provider::Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Fetched from a provider for this call.
    Fresh,
    /// Served from cache within its TTL.
    Cached,
    /// Every provider failed; this is the last known answer.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub freshness: Freshness,
}

impl<T> Resolved<T> {
    pub fn is_degraded(&self) -> bool {
        self.freshness == Freshness::Stale
    }
}

#[derive(Debug)]
pub struct CachedResolver<P: Provider> {
    chain: ProviderChain<P>,
    cache: Arc<TtlCache<P::Snapshot>>,
    ttl: Duration,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl<P: Provider> CachedResolver<P> {
    pub fn new(chain: ProviderChain<P>, cache: Arc<TtlCache<P::Snapshot>>, ttl: Duration) -> Self {
        Self { chain, cache, ttl, in_flight: DashMap::new() }
    }

    pub fn chain(&self) -> &ProviderChain<P> {
        &self.chain
    }

    pub fn cache(&self) -> &Arc<TtlCache<P::Snapshot>> {
        &self.cache
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resolves `query`, preferring a fresh cache entry, then the providers,
    /// then a stale cache entry.
    ///
    /// Concurrent misses on one key share a single upstream resolution.
    pub async fn get(&self, query: &str) -> Result<Resolved<P::Snapshot>, Unavailable> {
        let key = P::cache_key(query);

        if let Some(value) = self.fresh(&key) {
            debug!(key, "cache hit");
            return Ok(Resolved { value, freshness: Freshness::Cached });
        }

        let gate = self.in_flight.entry(key.clone()).or_default().clone();
        let guard = gate.lock().await;

        // someone else may have refreshed the key while we waited
        let outcome = match self.fresh(&key) {
            Some(value) => Ok(Resolved { value, freshness: Freshness::Cached }),
            None => self.refresh(&key).await,
        };

        drop(guard);
        self.in_flight.remove_if(&key, |_, shared| Arc::ptr_eq(shared, &gate) && Arc::strong_count(shared) <= 2);

        outcome
    }

    async fn refresh(&self, key: &str) -> Result<Resolved<P::Snapshot>, Unavailable> {
        if let Some(value) = self.chain.resolve(key).await {
            self.cache.insert(key, value.clone(), self.ttl);
            return Ok(Resolved { value, freshness: Freshness::Fresh });
        }

        match self.cache.get(key) {
            Some(entry) => {
                warn!(key, "providers exhausted, serving stale cache entry");
                Ok(Resolved { value: entry.value, freshness: Freshness::Stale })
            }
            None => Err(Unavailable { key: key.to_string() }),
        }
    }

    fn fresh(&self, key: &str) -> Option<P::Snapshot> {
        self.cache.get(key).filter(|entry| entry.is_fresh(Instant::now())).map(|entry| entry.value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::fetch::{
        BoundedFetcher,
        stub::{Reply, StubTransport},
    };
    use crate::provider::rates::RateProvider;

    const PRIMARY: &str = "https://primary.test";
    const BACKUP: &str = "https://api.frankfurter.app";
    const TTL: Duration = Duration::from_secs(30 * 60);

    fn resolver(stub: &Arc<StubTransport>) -> CachedResolver<RateProvider> {
        let chain = ProviderChain::new(
            vec![RateProvider::LatestByBase { api_base: PRIMARY.into() }, RateProvider::Frankfurter],
            BoundedFetcher::new(stub.clone(), Duration::from_secs(4)),
        );
        CachedResolver::new(chain, Arc::new(TtlCache::new()), TTL)
    }

    fn rates(eur: f64) -> Reply {
        Reply::Json(json!({"date": "2026-10-16", "rates": {"EUR": eur}}))
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_within_ttl_is_served_from_cache() {
        let stub = Arc::new(StubTransport::new().route(PRIMARY, rates(0.92)));
        let resolver = resolver(&stub);

        let first = resolver.get("usd").await.unwrap();
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        let second = resolver.get("USD").await.unwrap();

        assert_eq!(first.freshness, Freshness::Fresh);
        assert_eq!(second.freshness, Freshness::Cached);
        assert_eq!(stub.call_count(), 1);
        assert_eq!(
            serde_json::to_vec(&first.value).unwrap(),
            serde_json::to_vec(&second.value).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_refreshed() {
        let stub = Arc::new(StubTransport::new().route(PRIMARY, rates(0.92)));
        let resolver = resolver(&stub);

        resolver.get("USD").await.unwrap();
        tokio::time::advance(TTL).await;
        stub.set_route(PRIMARY, rates(0.95));

        let refreshed = resolver.get("USD").await.unwrap();

        assert_eq!(refreshed.freshness, Freshness::Fresh);
        assert_eq!(refreshed.value.rate("EUR"), Some(0.95));
        assert_eq!(stub.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_is_served_when_providers_fail() {
        let stub = Arc::new(StubTransport::new().route(PRIMARY, rates(0.92)));
        let resolver = resolver(&stub);

        resolver.get("USD").await.unwrap();
        tokio::time::advance(TTL + Duration::from_secs(60)).await;
        stub.set_route(PRIMARY, Reply::Fail);

        let degraded = resolver.get("USD").await.unwrap();

        assert!(degraded.is_degraded());
        assert_eq!(degraded.value.rate("EUR"), Some(0.92));
        assert_eq!(stub.calls_to(BACKUP), 1);
    }

    #[tokio::test]
    async fn unavailable_without_cache() {
        let stub = Arc::new(StubTransport::new());
        let resolver = resolver(&stub);

        let err = resolver.get("usd").await.unwrap_err();

        assert_eq!(err, Unavailable { key: "USD".into() });
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_fetch() {
        let stub = Arc::new(
            StubTransport::new()
                .route(PRIMARY, Reply::Delayed(Duration::from_secs(1), json!({"rates": {"EUR": 0.9}}))),
        );
        let resolver = Arc::new(resolver(&stub));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.get("USD").await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(stub.call_count(), 1);
        assert!(resolver.in_flight.is_empty());
    }

    #[tokio::test]
    async fn different_keys_resolve_independently() {
        let stub = Arc::new(StubTransport::new().route(PRIMARY, rates(0.9)));
        let resolver = resolver(&stub);

        resolver.get("USD").await.unwrap();
        resolver.get("GBP").await.unwrap();

        assert_eq!(stub.call_count(), 2);
        assert_eq!(resolver.cache().len(), 2);
    }

    #[tokio::test]
    async fn evicted_key_is_fetched_again() {
        let stub = Arc::new(StubTransport::new().route(PRIMARY, rates(0.9)));
        let resolver = resolver(&stub);

        resolver.get("USD").await.unwrap();
        resolver.cache().evict("USD");
        resolver.get("USD").await.unwrap();

        assert_eq!(stub.call_count(), 2);
    }
}
