use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::Password;
use tracing::{debug, info};
use wayfare_core::{
    Config, ProviderId, RateError, Resolved, TravelData, WeatherSnapshot, budget_status,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "wayfare", version, about = "Exchange rates and weather for trip planning")]
pub struct Cli {
    /// Log provider attempts and cache decisions to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store credentials for a keyed provider, e.g. "openweather".
    Configure {
        provider: String,
    },

    /// Show current weather and a 5-day forecast for a city.
    Weather {
        city: String,
    },

    /// Show the exchange rate from a base currency into another.
    Rate {
        /// Base currency, e.g. "EUR". Defaults to the configured base.
        base: Option<String>,

        #[arg(long, default_value = "USD")]
        to: String,

        /// Answer 1:1 (flagged) instead of failing.
        #[arg(long)]
        fallback: bool,
    },

    /// Convert an amount into the base currency.
    Convert {
        amount: f64,
        from: String,

        #[arg(long)]
        base: Option<String>,
    },

    /// Summarize budget usage for a total budget and amount spent.
    Budget {
        total: f64,
        spent: f64,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;
        debug!(
            base = %config.base_currency(),
            openweather = config.is_provider_configured(ProviderId::OpenWeather),
            "configuration loaded"
        );

        match self.command {
            Command::Configure { provider } => configure(&provider)?,
            Command::Weather { city } => {
                let data = TravelData::from_config(&config);
                match data.resolve_city_weather(&city).await {
                    Some(weather) => print_weather(&city, &weather),
                    None => {
                        return Err(anyhow!(
                            "Weather unavailable for '{city}'.\n\
                             Hint: run `wayfare configure openweather` to add an OpenWeather API key."
                        ));
                    }
                }
            }
            Command::Rate { base, to, fallback } => {
                let base = base.unwrap_or_else(|| config.base_currency());
                let data = TravelData::from_config(&config);

                let quote = if fallback {
                    data.exchange_rate_or_fallback(&base, &to).await
                } else {
                    data.resolve_exchange_rate(&base, &to).await.map_err(|err| match err {
                        RateError::UnsupportedCurrency(_) => anyhow!("Unsupported target currency: {err}"),
                        RateError::Unavailable(_) => anyhow!("Exchange rates unavailable: {err}"),
                    })?
                };

                println!("1 {} = {:.6} {}", quote.from, quote.rate, quote.to);
                println!("as of {}", quote.timestamp.format("%Y-%m-%d %H:%M UTC"));
                if let Some(note) = &quote.note {
                    println!("warning: degraded result ({note})");
                }
            }
            Command::Convert { amount, from, base } => {
                let base = base.unwrap_or_else(|| config.base_currency());
                let data = TravelData::from_config(&config);

                let conversion = data.convert_expense(amount, &from, &base).await;

                println!(
                    "{:.2} {} = {:.2} {}",
                    conversion.amount_original,
                    conversion.currency_original,
                    conversion.amount_base,
                    conversion.currency_base
                );
                if let Some(note) = &conversion.note {
                    println!("warning: degraded result ({note})");
                }
            }
            Command::Budget { total, spent } => {
                let status = budget_status(total, spent);

                println!("used {:.1}% of budget, {:.2} remaining", status.usage_pct, status.remaining);
                if status.exceeded {
                    println!("warning: budget exceeded");
                } else if status.warning {
                    println!("warning: over 80% of budget used");
                }
            }
        }

        Ok(())
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    if !id.requires_api_key() {
        println!("Provider '{id}' needs no configuration.");
        return Ok(());
    }

    // file contents only, so environment overrides are not persisted
    let path = Config::config_file_path()?;
    let mut config = Config::load_from(&path)?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string())?;
    config.save_to(&path)?;
    info!(provider = %id, path = %path.display(), "stored provider credentials");

    println!("Saved credentials for '{id}' to {}", path.display());
    Ok(())
}

fn print_weather(city: &str, weather: &Resolved<WeatherSnapshot>) {
    let snapshot = &weather.value;
    let current = &snapshot.current;

    println!("{city} ({})", snapshot.source);
    println!(
        "  now: {:.1}°C, {} [{}], humidity {:.0}%, wind {:.1} m/s",
        current.temperature_c, current.condition, current.icon, current.humidity_pct, current.wind_speed_mps
    );

    for day in &snapshot.forecast {
        println!("  {}: {:.1}°C, {}", day.date.format("%a %d %b"), day.temperature_c, day.condition);
    }

    println!("  updated {}", snapshot.updated_at.format("%Y-%m-%d %H:%M UTC"));
    if weather.is_degraded() {
        println!("warning: providers unreachable, showing last known weather");
    }
}
