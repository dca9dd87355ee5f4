use std::{collections::BTreeMap, fmt::Display};

use serde::Serialize;
use tracing::warn;

use crate::{error::UnsupportedCurrency, model::FALLBACK_NOTE};

/// Converts `amount` of `from` into `base`.
///
/// `rates[code]` is units of `code` per one unit of `base`, so the result is
/// `amount / rates[from]`. Codes compare case-insensitively.
pub fn convert_to_base(
    amount: f64,
    from: &str,
    base: &str,
    rates: &BTreeMap<String, f64>,
) -> Result<f64, UnsupportedCurrency> {
    let from = from.trim().to_ascii_uppercase();

    if from == base.trim().to_ascii_uppercase() {
        return Ok(amount);
    }

    match rates.get(&from) {
        Some(&rate) if rate.is_finite() && rate > 0.0 => Ok(amount / rate),
        _ => Err(UnsupportedCurrency(from)),
    }
}

/// The single degradation policy: on failure, log and substitute the value
/// produced by `on_failure`, which must mark itself as degraded.
pub fn with_fallback<T, E: Display>(result: Result<T, E>, on_failure: impl FnOnce(&E) -> T) -> T {
    result.unwrap_or_else(|err| {
        warn!(error = %err, "applying 1:1 fallback");
        on_failure(&err)
    })
}

/// An amount expressed in a trip's base currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub amount_original: f64,
    pub currency_original: String,
    pub amount_base: f64,
    pub currency_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Conversion {
    /// Stores the amount at 1:1, flagged with the fallback note.
    pub fn fallback(amount: f64, from: &str, base: &str) -> Self {
        Self {
            amount_original: amount,
            currency_original: from.trim().to_ascii_uppercase(),
            amount_base: amount,
            currency_base: base.trim().to_ascii_uppercase(),
            note: Some(FALLBACK_NOTE.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.note.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(code, rate)| (code.to_string(), *rate)).collect()
    }

    #[test]
    fn same_currency_is_unchanged() {
        assert_eq!(convert_to_base(42.5, "usd", "USD", &BTreeMap::new()), Ok(42.5));
    }

    #[test]
    fn divides_by_rate() {
        let table = rates(&[("EUR", 0.8), ("JPY", 150.0)]);

        assert_eq!(convert_to_base(100.0, "EUR", "USD", &table), Ok(100.0 / 0.8));
        assert_eq!(convert_to_base(3000.0, "jpy", "usd", &table), Ok(20.0));
    }

    #[test]
    fn rejects_missing_or_unusable_rates() {
        let table = rates(&[
            ("ZER", 0.0),
            ("NEG", -1.0),
            ("NAN", f64::NAN),
            ("INF", f64::INFINITY),
        ]);

        for code in ["GBP", "ZER", "NEG", "NAN", "INF"] {
            assert_eq!(
                convert_to_base(10.0, code, "USD", &table),
                Err(UnsupportedCurrency(code.to_string())),
                "{code} should be unsupported"
            );
        }
    }

    #[test]
    fn fallback_policy_marks_result() {
        let table = rates(&[]);

        let conversion = with_fallback(
            convert_to_base(12.0, "EUR", "USD", &table).map(|amount_base| Conversion {
                amount_original: 12.0,
                currency_original: "EUR".into(),
                amount_base,
                currency_base: "USD".into(),
                note: None,
            }),
            |_| Conversion::fallback(12.0, "eur", "usd"),
        );

        assert_eq!(conversion.amount_base, 12.0);
        assert_eq!(conversion.currency_original, "EUR");
        assert!(conversion.is_degraded());
    }

    #[test]
    fn fallback_policy_passes_success_through() {
        let value = with_fallback(Ok::<_, UnsupportedCurrency>(3.0), |_| 1.0);
        assert_eq!(value, 3.0);
    }
}
