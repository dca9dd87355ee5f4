//! Core library for the `wayfare` trip planner.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Bounded upstream fetches and ordered provider fallback
//! - A shared TTL cache that degrades to stale answers
//! - Exchange-rate and weather snapshots, currency conversion, budget status
//!
//! It is used by `wayfare-cli`, but can also be embedded in a web service.

pub mod budget;
pub mod cache;
pub mod chain;
pub mod config;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod model;
pub mod provider;
pub mod resolver;
pub mod service;

pub use budget::{BudgetStatus, budget_status};
pub use config::{Config, ProviderConfig};
pub use convert::{Conversion, convert_to_base, with_fallback};
pub use error::{RateError, Unavailable, UnsupportedCurrency};
pub use model::{ExchangeQuote, ExchangeRateSnapshot, WeatherSnapshot};
pub use provider::{Provider, ProviderId};
pub use resolver::{Freshness, Resolved};
pub use service::TravelData;
