//! Single bounded upstream calls.
//!
//! [`Transport`] is the raw network primitive; [`BoundedFetcher`] puts a hard
//! deadline around it and folds every failure into `None`.

use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TransportError;

/// One GET request returning a JSON body.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        // reqwest errors embed the full URL, query and key included
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.without_url()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        res.json::<Value>().await.map_err(|e| TransportError::Http(e.without_url()))
    }
}

/// Performs one request with a hard deadline. Never retries, never errors.
#[derive(Debug, Clone)]
pub struct BoundedFetcher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl BoundedFetcher {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches `url`, returning `None` on timeout, transport error, non-2xx
    /// status or an undecodable body. On timeout the request future is dropped.
    pub async fn fetch(&self, url: &str) -> Option<Value> {
        let target = strip_query(url);

        match tokio::time::timeout(self.timeout, self.transport.get_json(url)).await {
            Ok(Ok(body)) => {
                debug!(url = target, "upstream answered");
                Some(body)
            }
            Ok(Err(err)) => {
                warn!(url = target, error = %err, "upstream request failed");
                None
            }
            Err(_) => {
                let err = TransportError::Timeout(self.timeout);
                warn!(url = target, error = %err, "upstream request abandoned");
                None
            }
        }
    }
}

// Query strings may carry API keys.
fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}
