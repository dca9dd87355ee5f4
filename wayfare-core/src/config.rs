use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path, path::PathBuf, time::Duration};

use crate::provider::{ProviderId, rates::DEFAULT_LATEST_API_BASE};

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Exchange-rate pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Host of the primary `latest?base=` provider.
    pub api_base: Option<String>,
    pub ttl_secs: u64,
    pub timeout_secs: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self { api_base: None, ttl_secs: 30 * 60, timeout_secs: 4 }
    }
}

/// Weather pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub ttl_secs: u64,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self { ttl_secs: 15 * 60, timeout_secs: 5 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries per pipeline cache; unbounded when absent.
    pub capacity: Option<usize>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// default_base_currency = "EUR"
///
/// [providers.openweather]
/// api_key = "..."
///
/// [rates]
/// ttl_secs = 1800
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Currency used when a command does not name one.
    pub default_base_currency: Option<String>,

    /// Cap on one whole provider chain resolution.
    pub overall_deadline_secs: Option<u64>,

    pub providers: HashMap<String, ProviderConfig>,

    pub rates: RatesConfig,

    pub weather: WeatherConfig,

    pub cache: CacheConfig,
}

impl Config {
    pub const FALLBACK_BASE_CURRENCY: &'static str = "USD";

    /// Load config from disk (or defaults if it doesn't exist yet), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_from(&Self::config_file_path()?)?;
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// `OPENWEATHER_API_KEY` and `EXCHANGE_API_BASE` take precedence over the file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENWEATHER_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.providers
                .insert(ProviderId::OpenWeather.as_str().to_string(), ProviderConfig { api_key: key });
        }

        if let Some(base) = lookup("EXCHANGE_API_BASE").filter(|b| !b.trim().is_empty()) {
            self.rates.api_base = Some(base);
        }
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "wayfare", "wayfare-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace the API key of a keyed provider.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) -> Result<()> {
        if !provider_id.requires_api_key() {
            return Err(anyhow!("Provider '{provider_id}' does not use an API key."));
        }

        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });
        Ok(())
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        !provider_id.requires_api_key() || self.provider_api_key(provider_id).is_some()
    }

    pub fn base_currency(&self) -> String {
        self.default_base_currency
            .as_deref()
            .unwrap_or(Self::FALLBACK_BASE_CURRENCY)
            .trim()
            .to_ascii_uppercase()
    }

    pub fn rates_api_base(&self) -> &str {
        self.rates.api_base.as_deref().unwrap_or(DEFAULT_LATEST_API_BASE)
    }

    pub fn rates_ttl(&self) -> Duration {
        Duration::from_secs(self.rates.ttl_secs)
    }

    pub fn rates_timeout(&self) -> Duration {
        Duration::from_secs(self.rates.timeout_secs)
    }

    pub fn weather_ttl(&self) -> Duration {
        Duration::from_secs(self.weather.ttl_secs)
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_secs(self.weather.timeout_secs)
    }

    pub fn overall_deadline(&self) -> Option<Duration> {
        self.overall_deadline_secs.map(Duration::from_secs)
    }
}
