//! Engine configuration passed explicitly into every component.
//!
//! Nothing in the engine reads process-wide state; the CLI (or any other host)
//! builds an [`EngineConfig`] and hands it to [`crate::HelioTime`] or to the
//! free functions that need it.

use serde::{Deserialize, Serialize};

use crate::spa::AtmosphericParams;

/// 90 days.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 7_776_000;
pub const DEFAULT_MAX_RANGE_DAYS: u32 = 366;
pub const DEFAULT_CROSSCHECK_TOLERANCE_SECONDS: u32 = 120;
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;

/// Deployment environment. Per-request cross-checks are ignored in `Prod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Prod,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Cross-check validator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossCheckConfig {
    /// Run the cross-check on every request, not only when asked for.
    pub enabled: bool,
    /// Name of the provider to use (`open-meteo` or `sunrise-sunset`).
    pub provider: String,
    pub tolerance_seconds: u32,
    /// Surface tolerance breaches as `CrossCheckFailed` instead of metadata.
    pub enforce: bool,
}

impl Default for CrossCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "open-meteo".to_string(),
            tolerance_seconds: DEFAULT_CROSSCHECK_TOLERANCE_SECONDS,
            enforce: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub environment: Environment,
    pub cache_ttl_seconds: u64,
    pub max_range_days: u32,
    pub default_atmosphere: AtmosphericParams,
    /// Fixed TT − UT in seconds. `None` uses the built-in estimate.
    pub delta_t_seconds: Option<f64>,
    /// Upper bound for every external call (geocoder and cross-check).
    pub provider_timeout_ms: u64,
    pub crosscheck: CrossCheckConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Dev,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
            default_atmosphere: AtmosphericParams::default(),
            delta_t_seconds: None,
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            crosscheck: CrossCheckConfig::default(),
        }
    }
}
