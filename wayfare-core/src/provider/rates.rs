use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{MalformedPayload, ProviderFailure},
    fetch::BoundedFetcher,
    model::ExchangeRateSnapshot,
};

use super::{Provider, ProviderId};

pub const DEFAULT_LATEST_API_BASE: &str = "https://api.exchangerate.host";
const FRANKFURTER_API_BASE: &str = "https://api.frankfurter.app";
const OPEN_ER_API_BASE: &str = "https://open.er-api.com";

/// Exchange-rate upstreams. All of them quote `rates[code]` as units of
/// `code` per one unit of the requested base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateProvider {
    /// `GET {api_base}/latest?base=XXX`, answering `{rates, date}`.
    LatestByBase { api_base: String },
    /// `GET /latest?from=XXX`, answering `{base, date, rates}`.
    Frankfurter,
    /// `GET /v6/latest/XXX`, answering `{result, base_code, rates, time_last_update_*}`.
    OpenErApi,
}

impl RateProvider {
    pub fn url(&self, base: &str) -> String {
        let code = urlencoding::encode(base);
        match self {
            RateProvider::LatestByBase { api_base } => {
                format!("{}/latest?base={code}", api_base.trim_end_matches('/'))
            }
            RateProvider::Frankfurter => format!("{FRANKFURTER_API_BASE}/latest?from={code}"),
            RateProvider::OpenErApi => format!("{OPEN_ER_API_BASE}/v6/latest/{code}"),
        }
    }

    /// Extracts a snapshot for `base` from a raw payload, dropping unusable
    /// rate entries.
    pub fn normalize(&self, raw: &Value, base: &str) -> Result<ExchangeRateSnapshot, MalformedPayload> {
        let provider = self.id().as_str();
        let malformed = |reason: &str| MalformedPayload::new(provider, reason);

        let body = raw.as_object().ok_or_else(|| malformed("payload is not a JSON object"))?;

        if body.get("result").and_then(Value::as_str) == Some("error")
            || body.get("success").and_then(Value::as_bool) == Some(false)
        {
            return Err(malformed("upstream reported an error"));
        }

        let answered = body.get("base").or_else(|| body.get("base_code")).and_then(Value::as_str);
        if let Some(answered) = answered.filter(|code| !code.eq_ignore_ascii_case(base)) {
            return Err(MalformedPayload::new(
                provider,
                format!("asked for base {base}, got {answered}"),
            ));
        }

        let raw_rates = body
            .get("rates")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("missing rates object"))?;

        let mut rates = BTreeMap::new();
        let mut unusable = 0;
        for (code, value) in raw_rates {
            let Some(rate) = value.as_f64().filter(|r| r.is_finite() && *r > 0.0) else {
                unusable += 1;
                continue;
            };

            // first spelling wins when codes differ only in case
            let code = code.to_ascii_uppercase();
            if rates.contains_key(&code) {
                debug!(provider, code = %code, "ignored duplicate rate entry");
                continue;
            }
            rates.insert(code, rate);
        }

        if unusable > 0 {
            debug!(provider, dropped = unusable, "discarded unusable rate entries");
        }

        if rates.is_empty() {
            return Err(malformed("no usable rates in payload"));
        }

        Ok(ExchangeRateSnapshot {
            base: base.to_ascii_uppercase(),
            rates,
            timestamp: reported_timestamp(body).unwrap_or_else(Utc::now),
        })
    }
}

#[async_trait]
impl Provider for RateProvider {
    type Snapshot = ExchangeRateSnapshot;

    fn id(&self) -> ProviderId {
        match self {
            RateProvider::LatestByBase { .. } => ProviderId::ExchangeRateHost,
            RateProvider::Frankfurter => ProviderId::Frankfurter,
            RateProvider::OpenErApi => ProviderId::OpenErApi,
        }
    }

    fn cache_key(query: &str) -> String {
        query.trim().to_ascii_uppercase()
    }

    async fn fetch(
        &self,
        fetcher: &BoundedFetcher,
        base: &str,
    ) -> Result<ExchangeRateSnapshot, ProviderFailure> {
        let raw = fetcher
            .fetch(&self.url(base))
            .await
            .ok_or(ProviderFailure::Unreachable { provider: self.id().as_str(), stage: "latest" })?;

        Ok(self.normalize(&raw, base)?)
    }
}

/// Reads the provider's own timestamp from whichever field it uses.
fn reported_timestamp(body: &serde_json::Map<String, Value>) -> Option<DateTime<Utc>> {
    if let Some(date) = body.get("date").and_then(Value::as_str) {
        if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Some(midnight) =
            NaiveDate::parse_from_str(date, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Some(midnight.and_utc());
        }
    }

    for field in ["time_last_update_unix", "timestamp"] {
        if let Some(dt) = body.get(field).and_then(Value::as_i64).and_then(|s| DateTime::from_timestamp(s, 0))
        {
            return Some(dt);
        }
    }

    body.get("time_last_update_utc")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn host() -> RateProvider {
        RateProvider::LatestByBase { api_base: DEFAULT_LATEST_API_BASE.to_string() }
    }

    #[test]
    fn builds_provider_urls() {
        assert_eq!(host().url("EUR"), "https://api.exchangerate.host/latest?base=EUR");
        assert_eq!(
            RateProvider::LatestByBase { api_base: "http://local/".into() }.url("EUR"),
            "http://local/latest?base=EUR"
        );
        assert_eq!(RateProvider::Frankfurter.url("GBP"), "https://api.frankfurter.app/latest?from=GBP");
        assert_eq!(RateProvider::OpenErApi.url("JPY"), "https://open.er-api.com/v6/latest/JPY");
    }

    #[test]
    fn normalizes_latest_by_base_payload() {
        let raw = json!({"base": "USD", "date": "2026-10-16", "rates": {"EUR": 0.92, "gbp": 0.79}});

        let snapshot = host().normalize(&raw, "USD").unwrap();

        assert_eq!(snapshot.base, "USD");
        assert_eq!(snapshot.rate("EUR"), Some(0.92));
        assert_eq!(snapshot.rate("GBP"), Some(0.79));
        assert_eq!(snapshot.timestamp.to_rfc3339(), "2026-10-16T00:00:00+00:00");
    }

    #[test]
    fn reads_last_update_fields() {
        let unix = json!({"result": "success", "base_code": "USD", "time_last_update_unix": 1_700_000_000, "rates": {"EUR": 0.9}});
        let snapshot = RateProvider::OpenErApi.normalize(&unix, "USD").unwrap();
        assert_eq!(snapshot.timestamp.timestamp(), 1_700_000_000);

        let utc = json!({"base_code": "USD", "time_last_update_utc": "Tue, 14 Nov 2023 22:13:20 +0000", "rates": {"EUR": 0.9}});
        let snapshot = RateProvider::OpenErApi.normalize(&utc, "USD").unwrap();
        assert_eq!(snapshot.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_timestamp_uses_fetch_time() {
        let before = Utc::now();
        let snapshot = RateProvider::Frankfurter.normalize(&json!({"rates": {"EUR": 0.9}}), "USD").unwrap();
        assert!(snapshot.timestamp >= before);
    }

    #[test]
    fn discards_non_positive_and_non_numeric_rates() {
        let raw = json!({"rates": {"EUR": 0.9, "XXX": 0, "YYY": -2.5, "ZZZ": "1.2", "NUL": null}});

        let snapshot = host().normalize(&raw, "USD").unwrap();

        assert_eq!(snapshot.rates.len(), 1);
        assert!(snapshot.rates.values().all(|r| r.is_finite() && *r > 0.0));
    }

    #[test]
    fn case_duplicates_keep_first_entry() {
        let raw = json!({"rates": {"EUR": 0.9, "eur": 5.0}});

        let snapshot = host().normalize(&raw, "USD").unwrap();

        assert_eq!(snapshot.rates.len(), 1);
        assert_eq!(snapshot.rate("EUR"), Some(0.9));
    }

    #[test]
    fn rejects_payload_without_usable_rates() {
        let err = host().normalize(&json!({"rates": {"EUR": 0}}), "USD").unwrap_err();
        assert!(err.reason.contains("no usable rates"));

        let err = host().normalize(&json!({"date": "2026-01-01"}), "USD").unwrap_err();
        assert!(err.reason.contains("missing rates"));

        assert!(host().normalize(&json!([1, 2]), "USD").is_err());
    }

    #[test]
    fn rejects_error_and_wrong_base_answers() {
        let err = RateProvider::OpenErApi
            .normalize(&json!({"result": "error", "error-type": "unsupported-code"}), "USD")
            .unwrap_err();
        assert!(err.reason.contains("error"));

        let err = RateProvider::Frankfurter
            .normalize(&json!({"base": "EUR", "rates": {"USD": 1.1}}), "USD")
            .unwrap_err();
        assert!(err.reason.contains("asked for base USD"));
    }

    #[test]
    fn cache_key_is_upper_case_code() {
        assert_eq!(RateProvider::cache_key(" eur "), "EUR");
    }
}
