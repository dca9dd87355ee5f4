//! Ordered provider fallback.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{fetch::BoundedFetcher, provider::Provider};

/// Tries providers strictly in the configured order and returns the first
/// normalized snapshot.
///
/// Without an overall deadline the worst case is the sum of every provider's
/// per-call timeouts, see [`ProviderChain::worst_case_latency`].
#[derive(Debug)]
pub struct ProviderChain<P> {
    providers: Vec<P>,
    fetcher: BoundedFetcher,
    deadline: Option<Duration>,
}

impl<P: Provider> ProviderChain<P> {
    pub fn new(providers: Vec<P>, fetcher: BoundedFetcher) -> Self {
        Self { providers, fetcher, deadline: None }
    }

    /// Caps the time spent across all providers for one resolution.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn worst_case_latency(&self) -> Duration {
        let sum = self
            .providers
            .iter()
            .map(|p| self.fetcher.timeout().saturating_mul(p.stages()))
            .fold(Duration::ZERO, Duration::saturating_add);

        self.deadline.map_or(sum, |deadline| sum.min(deadline))
    }

    /// `None` means every provider failed (or the deadline hit); callers decide
    /// what to do about it.
    pub async fn resolve(&self, query: &str) -> Option<P::Snapshot> {
        let Some(deadline) = self.deadline else {
            return self.try_in_order(query).await;
        };

        match tokio::time::timeout(deadline, self.try_in_order(query)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(query, ?deadline, "provider chain deadline exceeded");
                None
            }
        }
    }

    async fn try_in_order(&self, query: &str) -> Option<P::Snapshot> {
        for provider in &self.providers {
            let id = provider.id();
            debug!(provider = %id, query, "trying provider");

            match provider.fetch(&self.fetcher, query).await {
                Ok(snapshot) => {
                    info!(provider = %id, query, "provider answered");
                    return Some(snapshot);
                }
                Err(failure) => {
                    warn!(provider = %id, query, error = %failure, "provider failed");
                }
            }
        }

        warn!(query, tried = self.providers.len(), "all providers exhausted");
        None
    }
}
