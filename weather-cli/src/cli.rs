use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{ArgAction, Args, Parser, Subcommand};
use inquire::Password;
use tokio_util::sync::CancellationToken;
use weather_core::{
    AggregateError, Aggregator, Config, Location, ProviderId, WeatherReport, providers_from_config,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Average temperature across weather providers")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,

        /// API key; prompted for when omitted.
        #[arg(long)]
        api_key: Option<String>,

        /// Alternative endpoint for the provider's API.
        #[arg(long)]
        base_url: Option<String>,
    },

    /// List known providers and whether they are configured.
    Providers,

    /// Show the average temperature for a city across all configured providers.
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Country code, e.g. "gb".
    country: String,

    /// City name, e.g. "London".
    city: String,

    /// Give up after this many seconds (overrides `query_timeout_secs`).
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Leave the Celsius value out of the report.
    #[arg(long)]
    kelvin_only: bool,

    /// OpenWeather API key for this run only.
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    openweather_key: Option<String>,

    /// WeatherAPI.com API key for this run only.
    #[arg(long, env = "WEATHERAPI_API_KEY", hide_env_values = true)]
    weatherapi_key: Option<String>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider, api_key, base_url } => {
                configure(&provider, api_key, base_url)
            }
            Command::Providers => list_providers(),
            Command::Show(args) => show(args).await,
        }
    }
}

fn configure(
    provider: &str,
    api_key: Option<String>,
    base_url: Option<String>,
) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = match api_key {
        Some(key) => key,
        None => Password::new(&format!("API key for {id}:"))
            .without_confirmation()
            .prompt()
            .context("Failed to read API key")?,
    };

    if api_key.trim().is_empty() {
        anyhow::bail!("API key for '{id}' must not be empty");
    }

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    if let Some(url) = base_url {
        config.set_provider_base_url(id, url)?;
    }

    let path = config.save()?;
    println!("Saved {id} credentials to {}", path.display());
    Ok(())
}

fn list_providers() -> anyhow::Result<()> {
    let config = Config::load()?;

    for id in ProviderId::all() {
        let state = if config.is_provider_configured(*id) { "configured" } else { "not configured" };
        println!("{:<12} {state}", id.as_str());
    }

    Ok(())
}

async fn show(args: ShowArgs) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    apply_key_overrides(&mut config, args.openweather_key, args.weatherapi_key);

    let deadline = args.timeout.map(Duration::from_secs).or_else(|| config.query_timeout());
    let aggregator = Aggregator::new(providers_from_config(&config)?).with_deadline(deadline);
    let location = Location::new(args.country, args.city);
    tracing::info!(%location, providers = aggregator.provider_count(), "querying");

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let result = aggregator
        .query_until(&location, &cancel)
        .await
        .map_err(|err| explain_query_error(err, &location))?;

    let report = WeatherReport::new(&location, &result, !args.kelvin_only);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render(&report));
    }

    Ok(())
}

/// Keys given on the command line or in the environment win for this run.
/// They are never saved.
fn apply_key_overrides(
    config: &mut Config,
    openweather: Option<String>,
    weatherapi: Option<String>,
) {
    for (id, key) in [(ProviderId::OpenWeather, openweather), (ProviderId::WeatherApi, weatherapi)] {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            config.upsert_provider_api_key(id, key);
        }
    }
}

fn explain_query_error(err: AggregateError, location: &Location) -> anyhow::Error {
    match err {
        AggregateError::NoProviders => anyhow::anyhow!(
            "No weather providers configured.\n\
             Hint: run `weather configure <provider>` or set {} / {}.",
            ProviderId::OpenWeather.api_key_env(),
            ProviderId::WeatherApi.api_key_env(),
        ),
        err => anyhow::Error::new(err).context(format!("Could not get temperature for {location}")),
    }
}

fn render(report: &WeatherReport) -> String {
    let celsius = report.temp_c.map(|c| format!(" ({c:.2} °C)")).unwrap_or_default();
    format!(
        "{}: {:.2} K{celsius}, averaged over {} provider(s) in {} at {}",
        report.city,
        report.temp,
        report.providers,
        report.took,
        report.queried_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn report(temp_c: Option<f64>) -> WeatherReport {
        WeatherReport {
            city: "London".into(),
            temp: 290.0,
            temp_c,
            took: "12ms".into(),
            providers: 2,
            queried_at: Utc::now(),
        }
    }

    #[test]
    fn render_includes_celsius_when_present() {
        let line = render(&report(Some(16.85)));
        assert!(line.starts_with("London: 290.00 K (16.85 °C), averaged over 2 provider(s) in 12ms"));
    }

    #[test]
    fn render_omits_celsius_when_absent() {
        let line = render(&report(None));
        assert!(line.starts_with("London: 290.00 K, averaged"));
    }

    #[test]
    fn show_parses_location_and_flags() {
        let cli = Cli::try_parse_from([
            "weather", "-v", "show", "gb", "London", "--timeout", "3", "--json", "--kelvin-only",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Show(args) => {
                assert_eq!(args.country, "gb");
                assert_eq!(args.city, "London");
                assert_eq!(args.timeout, Some(3));
                assert!(args.json);
                assert!(args.kelvin_only);
            }
            other => panic!("expected show, got {other:?}"),
        }
    }

    #[test]
    fn override_key_replaces_file_key_and_keeps_base_url() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "FILE_KEY".into());
        cfg.set_provider_base_url(ProviderId::OpenWeather, "http://mirror.local".into()).unwrap();

        apply_key_overrides(&mut cfg, Some("FLAG_KEY".into()), None);

        let provider = cfg.provider_config(ProviderId::OpenWeather).unwrap();
        assert_eq!(provider.api_key, "FLAG_KEY");
        assert_eq!(provider.base_url.as_deref(), Some("http://mirror.local"));
        assert!(!cfg.is_provider_configured(ProviderId::WeatherApi));
    }

    #[test]
    fn empty_override_key_is_ignored() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "FILE_KEY".into());

        apply_key_overrides(&mut cfg, Some(String::new()), Some(String::new()));

        assert_eq!(cfg.provider_api_key(ProviderId::WeatherApi), Some("FILE_KEY"));
        assert!(!cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[tokio::test]
    async fn empty_provider_set_explains_how_to_configure() {
        let location = Location::new("gb", "London");
        let err = Aggregator::new(Vec::new()).query(&location).await.unwrap_err();

        let msg = explain_query_error(err, &location).to_string();
        assert!(msg.contains("No weather providers configured"));
        assert!(msg.contains("weather configure"));
        assert!(msg.contains("OPENWEATHER_API_KEY"));
        assert!(msg.contains("WEATHERAPI_API_KEY"));
    }

    #[test]
    fn other_query_errors_keep_their_cause() {
        let location = Location::new("gb", "London");
        let err = explain_query_error(AggregateError::Cancelled, &location);

        assert_eq!(err.to_string(), "Could not get temperature for gb/London");
        assert_eq!(err.root_cause().to_string(), "query cancelled");
    }

    #[test]
    fn show_requires_country_and_city() {
        assert!(Cli::try_parse_from(["weather", "show", "gb"]).is_err());
    }

    #[test]
    fn configure_accepts_inline_key() {
        let cli =
            Cli::try_parse_from(["weather", "configure", "openweather", "--api-key", "K"]).unwrap();

        match cli.command {
            Command::Configure { provider, api_key, base_url } => {
                assert_eq!(provider, "openweather");
                assert_eq!(api_key.as_deref(), Some("K"));
                assert!(base_url.is_none());
            }
            other => panic!("expected configure, got {other:?}"),
        }
    }
}
