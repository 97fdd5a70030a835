//! `heliotime` CLI: sunrise, sunset and twilight times from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # One day for a coordinate pair
//! heliotime sun --lat 51.5074 --lon -0.1278 --date 2025-09-01
//!
//! # A week for a city, without twilight
//! heliotime sun --city Reykjavik --country Iceland \
//!     --start-date 2025-06-01 --end-date 2025-06-07 --no-twilight
//!
//! # Compare against open-meteo while developing
//! heliotime --crosscheck-provider open-meteo sun --gps "59.91,10.75" --dev-crosscheck
//!
//! # Solar position for one instant
//! heliotime position --lat 39.742476 --lon -105.1786 --at 2003-10-17T19:30:30Z
//!
//! # Effective configuration after file and environment overrides
//! MAX_RANGE_DAYS=31 heliotime config
//! ```
//!
//! Results go to stdout as JSON. Failures go to stderr as
//! `{"error": kind, "message": ..., "status": code}` with a non-zero exit.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use helio_engine::cache::{CacheStore, InMemoryStore, JsonFileStore, SystemClock};
use helio_engine::config::{EngineConfig, Environment};
use helio_engine::location::{validate_coordinates, BoundaryTimezoneLookup};
use helio_engine::providers::{sun_times_provider, NominatimGeocoder};
use helio_engine::spa::solar_position_with_delta_t;
use helio_engine::{
    delta_t, AtmosphericParams, CrossCheckValidator, GeoLocation, GeocodeCache, HelioError,
    HelioTime, LocationQuery, LocationResolver, SunOptions, SunRequest,
};
use serde_json::json;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "heliotime",
    version,
    about = "Sunrise, sunset and twilight times for any place on Earth"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with engine settings (overridden by the flags below)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Deployment environment: dev or prod
    #[arg(long = "env", env = "ENV", global = true)]
    environment: Option<Environment>,

    #[arg(long, env = "MAX_RANGE_DAYS", global = true)]
    max_range_days: Option<u32>,

    #[arg(long, env = "CACHE_TTL_SECONDS", global = true)]
    cache_ttl_seconds: Option<u64>,

    /// Persist geocoding results in this JSON file instead of memory
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,

    /// Timeout for every external call, in milliseconds
    #[arg(long, global = true)]
    provider_timeout_ms: Option<u64>,

    /// Cross-check every request, not only those asking for it
    #[arg(
        long,
        env = "DEV_CROSSCHECK",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    crosscheck: Option<bool>,

    /// Cross-check provider: open-meteo or sunrise-sunset
    #[arg(long, env = "DEV_CROSSCHECK_PROVIDER", global = true)]
    crosscheck_provider: Option<String>,

    #[arg(long, env = "DEV_CROSSCHECK_TOLERANCE_SECONDS", global = true)]
    crosscheck_tolerance_seconds: Option<u32>,

    /// Fail the request when the provider disagrees beyond tolerance
    #[arg(
        long,
        env = "DEV_CROSSCHECK_ENFORCE",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    crosscheck_enforce: Option<bool>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Single-line JSON output
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute sunrise, sunset, solar noon and twilight for a date or range
    Sun(SunArgs),
    /// Solar zenith, azimuth and elevation at one instant
    Position(PositionArgs),
    /// Print the effective engine configuration
    Config,
}

#[derive(Args)]
struct SunArgs {
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,
    /// "lat,lon" in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    gps: Option<String>,
    #[arg(long)]
    postal_code: Option<String>,
    /// ISO 3166-1 alpha-2 country of the postal code
    #[arg(long)]
    country_code: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    country: Option<String>,

    /// Single date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    end_date: Option<NaiveDate>,

    #[arg(long)]
    elevation_m: Option<f64>,
    #[arg(long)]
    pressure_hpa: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    temperature_c: Option<f64>,
    /// IANA zone for the output, replacing the looked-up one
    #[arg(long)]
    tz: Option<String>,
    /// Lower the horizon for the observer's elevation
    #[arg(long)]
    altitude_correction: bool,
    /// Skip civil, nautical and astronomical twilight
    #[arg(long)]
    no_twilight: bool,
    /// Attach a cross-check report (dev environment only)
    #[arg(long)]
    dev_crosscheck: bool,
}

impl SunArgs {
    fn into_request(self) -> SunRequest {
        SunRequest {
            location: LocationQuery {
                lat: self.lat,
                lon: self.lon,
                gps: self.gps,
                postal_code: self.postal_code,
                country_code: self.country_code,
                city: self.city,
                country: self.country,
            },
            date: self.date,
            start_date: self.start_date,
            end_date: self.end_date,
            options: SunOptions {
                elevation_m: self.elevation_m,
                pressure_hpa: self.pressure_hpa,
                temperature_c: self.temperature_c,
                tz: self.tz,
                altitude_correction: self.altitude_correction,
                include_twilight: !self.no_twilight,
                dev_crosscheck: self.dev_crosscheck,
            },
        }
    }
}

#[derive(Args)]
struct PositionArgs {
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,
    /// RFC 3339 instant; defaults to now
    #[arg(long)]
    at: Option<DateTime<Utc>>,
    #[arg(long, default_value_t = 0.0)]
    elevation_m: f64,
    #[arg(long)]
    pressure_hpa: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    temperature_c: Option<f64>,
    /// TT − UT in seconds; estimated from the instant when omitted
    #[arg(long, allow_hyphen_values = true)]
    delta_t: Option<f64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    debug!(?config, "effective configuration");

    let output = match cli.command {
        Commands::Sun(args) => {
            let engine = build_engine(config, cli.cache_file.as_deref())?;
            let response = engine.compute(&args.into_request())?;
            serde_json::to_value(&response).context("Failed to serialize response")?
        }
        Commands::Position(args) => position(&args, &config)?,
        Commands::Config => {
            serde_json::to_value(&config).context("Failed to serialize configuration")?
        }
    };

    let text = if cli.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    println!("{}", text);
    Ok(())
}

/// File settings first, then flags and environment variables on top.
fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Invalid config file: {}", path.display()))?
        }
        None => EngineConfig::default(),
    };

    if let Some(environment) = cli.environment {
        config.environment = environment;
    }
    if let Some(days) = cli.max_range_days {
        config.max_range_days = days;
    }
    if let Some(ttl) = cli.cache_ttl_seconds {
        config.cache_ttl_seconds = ttl;
    }
    if let Some(timeout) = cli.provider_timeout_ms {
        config.provider_timeout_ms = timeout;
    }
    if let Some(enabled) = cli.crosscheck {
        config.crosscheck.enabled = enabled;
    }
    if let Some(provider) = &cli.crosscheck_provider {
        config.crosscheck.provider = provider.trim().to_string();
    }
    if let Some(tolerance) = cli.crosscheck_tolerance_seconds {
        config.crosscheck.tolerance_seconds = tolerance;
    }
    if let Some(enforce) = cli.crosscheck_enforce {
        config.crosscheck.enforce = enforce;
    }
    Ok(config)
}

fn build_engine(config: EngineConfig, cache_file: Option<&Path>) -> Result<HelioTime> {
    let store: Arc<dyn CacheStore> = match cache_file {
        Some(path) => Arc::new(JsonFileStore::new(path)),
        None => Arc::new(InMemoryStore::new()),
    };
    let cache = GeocodeCache::new(store, Arc::new(SystemClock));
    let geocoder =
        NominatimGeocoder::new(config.provider_timeout_ms).context("Failed to build geocoder")?;
    let resolver = LocationResolver::new(
        Arc::new(geocoder),
        Arc::new(BoundaryTimezoneLookup),
        cache,
        config.cache_ttl_seconds,
    );

    let crosscheck = if config.environment == Environment::Dev {
        match sun_times_provider(&config.crosscheck.provider, config.provider_timeout_ms) {
            Ok(provider) => Some(CrossCheckValidator::from_config(provider, &config.crosscheck)),
            Err(err) => {
                warn!(provider = %config.crosscheck.provider, error = %err, "cross-check disabled");
                None
            }
        }
    } else {
        None
    };

    let engine = HelioTime::new(config, resolver);
    Ok(match crosscheck {
        Some(validator) => engine.with_crosscheck(validator),
        None => engine,
    })
}

fn position(args: &PositionArgs, config: &EngineConfig) -> Result<serde_json::Value> {
    validate_coordinates(args.lat, args.lon)?;
    let location = GeoLocation::new(args.lat, args.lon, args.elevation_m, "UTC");
    location.validate()?;

    let atmosphere = AtmosphericParams {
        pressure_hpa: args.pressure_hpa.unwrap_or(config.default_atmosphere.pressure_hpa),
        temperature_c: args.temperature_c.unwrap_or(config.default_atmosphere.temperature_c),
    };
    atmosphere.validate()?;

    let instant = args.at.unwrap_or_else(Utc::now);
    let delta_t = args
        .delta_t
        .or(config.delta_t_seconds)
        .unwrap_or_else(|| delta_t::estimate(&instant));
    let pos = solar_position_with_delta_t(&instant, &location, &atmosphere, delta_t)?;

    Ok(json!({
        "instant": instant.to_rfc3339(),
        "lat": args.lat,
        "lon": args.lon,
        "delta_t": delta_t,
        "zenith": pos.zenith,
        "azimuth": pos.azimuth,
        "elevation": pos.elevation(),
        "geometric_elevation": pos.geometric_elevation,
    }))
}

fn init_tracing(verbose: u8, log_json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Engine errors keep their kind and status; anything else is a CLI failure.
fn report_error(err: &anyhow::Error) {
    let body = match err.chain().find_map(|cause| cause.downcast_ref::<HelioError>()) {
        Some(helio) => json!({
            "error": helio.kind(),
            "message": helio.to_string(),
            "status": helio.status_code(),
        }),
        None => json!({
            "error": "cli_error",
            "message": format!("{:#}", err),
            "status": 1,
        }),
    };
    eprintln!("{}", body);
}
