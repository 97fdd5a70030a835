//! Request-level facade: location resolution, day computation, cross-check.

use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{EngineConfig, Environment};
use crate::crosscheck::{CrossCheckReport, CrossCheckValidator};
use crate::error::{HelioError, Result};
use crate::events::DayEventRecord;
use crate::location::{GeoLocation, LocationInput, LocationQuery, LocationResolver};
use crate::range::{compute_range, range_day_count, SunOptions};

/// Identifier of the position algorithm reported with every response.
pub const ALGORITHM: &str = "NREL_SPA_2005";

/// One sun-events request: location, dates and options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunRequest {
    #[serde(flatten)]
    pub location: LocationQuery,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub options: SunOptions,
}

impl SunRequest {
    /// Inclusive date span. No dates at all means today (UTC).
    pub fn date_span(&self) -> Result<(NaiveDate, NaiveDate)> {
        match (self.date, self.start_date, self.end_date) {
            (Some(date), None, None) => Ok((date, date)),
            (None, Some(start), Some(end)) => Ok((start, end)),
            (None, None, None) => {
                let today = Utc::now().date_naive();
                Ok((today, today))
            }
            (Some(_), _, _) => Err(HelioError::InvalidInput(
                "give either date or start_date/end_date, not both".to_string(),
            )),
            _ => Err(HelioError::InvalidInput(
                "start_date and end_date must be given together".to_string(),
            )),
        }
    }
}

/// Echo of the effective request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEcho {
    pub lat: f64,
    pub lon: f64,
    pub elevation_m: f64,
    pub timezone: String,
    pub pressure_hpa: f64,
    pub temperature_c: f64,
    pub algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub computed_in_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_crosscheck: Option<CrossCheckReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunResponse {
    pub request: RequestEcho,
    pub days: Vec<DayEventRecord>,
    pub meta: ResponseMeta,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// The engine as a whole.
pub struct HelioTime {
    config: EngineConfig,
    resolver: LocationResolver,
    crosscheck: Option<CrossCheckValidator>,
}

impl HelioTime {
    pub fn new(config: EngineConfig, resolver: LocationResolver) -> Self {
        Self {
            config,
            resolver,
            crosscheck: None,
        }
    }

    pub fn with_crosscheck(mut self, validator: CrossCheckValidator) -> Self {
        self.crosscheck = Some(validator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// Resolve the request's location. A `tz` override on a coordinate input
    /// skips the boundary lookup entirely.
    pub fn resolve_location(&self, request: &SunRequest) -> Result<GeoLocation> {
        let input = LocationInput::from_query(&request.location)?;
        match (input.coordinates()?, request.options.tz.as_deref()) {
            (Some((lat, lon)), Some(tz)) => Ok(GeoLocation::new(lat, lon, 0.0, tz)),
            _ => self.resolver.resolve(&input),
        }
    }

    /// Serve one request end to end.
    ///
    /// # Errors
    /// Any [`HelioError`]; `CrossCheckFailed` only in enforcing mode.
    pub fn compute(&self, request: &SunRequest) -> Result<SunResponse> {
        let started = Instant::now();

        let (start, end) = request.date_span()?;
        range_day_count(start, end, self.config.max_range_days)?;

        let resolved = self.resolve_location(request)?;
        let location = request.options.apply_to(&resolved)?;
        let atmosphere = request.options.atmosphere(&self.config.default_atmosphere)?;

        let days = compute_range(&location, start, end, &request.options, &self.config)?;
        let dev_crosscheck = self.maybe_cross_check(request, &location, &days)?;

        let computed_in_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            days = days.len(),
            timezone = %location.timezone_id,
            computed_in_ms,
            "sun request served"
        );

        let single = start == end;
        Ok(SunResponse {
            request: RequestEcho {
                lat: round_to(location.latitude, 6),
                lon: round_to(location.longitude, 6),
                elevation_m: round_to(location.elevation_m, 1),
                timezone: location.timezone_id.clone(),
                pressure_hpa: atmosphere.pressure_hpa,
                temperature_c: atmosphere.temperature_c,
                algorithm: ALGORITHM.to_string(),
                date: single.then_some(start),
                start_date: (!single).then_some(start),
                end_date: (!single).then_some(end),
            },
            days,
            meta: ResponseMeta {
                computed_in_ms,
                dev_crosscheck,
            },
        })
    }

    fn maybe_cross_check(
        &self,
        request: &SunRequest,
        location: &GeoLocation,
        days: &[DayEventRecord],
    ) -> Result<Option<CrossCheckReport>> {
        let requested = request.options.dev_crosscheck;
        if !(self.config.crosscheck.enabled || requested) {
            return Ok(None);
        }
        if self.config.environment == Environment::Prod {
            if requested {
                warn!("cross-check requested in production; ignoring");
            }
            return Ok(None);
        }
        let Some(validator) = &self.crosscheck else {
            warn!("cross-check requested but no provider is configured");
            return Ok(None);
        };
        validator.cross_check_range(location, days).map(Some)
    }
}
