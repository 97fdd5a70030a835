//! Date-Range Orchestrator: one [`DayEventRecord`] per local calendar day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::dst::{local_day_window, parse_timezone};
use crate::error::{HelioError, Result};
use crate::events::{day_events, DayEventRecord, EventSettings};
use crate::location::GeoLocation;
use crate::spa::AtmosphericParams;

/// Request options applied uniformly to every day of a range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunOptions {
    /// Observer elevation in metres; overrides the resolved location's.
    pub elevation_m: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub temperature_c: Option<f64>,
    /// IANA zone that replaces the resolved one for local dates and output offsets.
    pub tz: Option<String>,
    pub altitude_correction: bool,
    pub include_twilight: bool,
    pub dev_crosscheck: bool,
}

impl Default for SunOptions {
    fn default() -> Self {
        Self {
            elevation_m: None,
            pressure_hpa: None,
            temperature_c: None,
            tz: None,
            altitude_correction: false,
            include_twilight: true,
            dev_crosscheck: false,
        }
    }
}

impl SunOptions {
    /// `location` with the elevation and time-zone overrides applied and validated.
    pub fn apply_to(&self, location: &GeoLocation) -> Result<GeoLocation> {
        let mut effective = location.clone();
        if let Some(elevation_m) = self.elevation_m {
            effective.elevation_m = elevation_m;
        }
        if let Some(tz) = self.tz.as_deref() {
            parse_timezone(tz)?;
            effective.timezone_id = tz.to_string();
        }
        effective.validate()?;
        Ok(effective)
    }

    /// Atmosphere from the overrides, falling back to `defaults`.
    pub fn atmosphere(&self, defaults: &AtmosphericParams) -> Result<AtmosphericParams> {
        let atmosphere = AtmosphericParams {
            pressure_hpa: self.pressure_hpa.unwrap_or(defaults.pressure_hpa),
            temperature_c: self.temperature_c.unwrap_or(defaults.temperature_c),
        };
        atmosphere.validate()?;
        Ok(atmosphere)
    }

    pub fn event_settings(&self, config: &EngineConfig) -> EventSettings {
        EventSettings {
            altitude_correction: self.altitude_correction,
            include_twilight: self.include_twilight,
            delta_t: config.delta_t_seconds,
        }
    }
}

/// Inclusive number of days in `[start, end]`, checked against `max_days`.
pub fn range_day_count(start: NaiveDate, end: NaiveDate, max_days: u32) -> Result<u32> {
    if end < start {
        return Err(HelioError::InvalidInput(format!(
            "end_date {} is before start_date {}",
            end, start
        )));
    }
    let days = (end - start).num_days() + 1;
    if days > i64::from(max_days) {
        return Err(HelioError::InvalidInput(format!(
            "range of {} days exceeds the maximum of {} days",
            days, max_days
        )));
    }
    u32::try_from(days)
        .map_err(|_| HelioError::InvalidInput(format!("range of {} days is too long", days)))
}

/// Compute the events of every local day from `start` to `end` inclusive.
///
/// Records are returned in ascending date order. Each day is computed on its
/// own, so one day's result never depends on its neighbours. A date the zone
/// skips entirely has no local day and therefore no record.
///
/// # Errors
/// `InvalidInput` for an inverted or over-long range and for any invalid
/// option; errors from [`crate::sun_events`] are passed through.
pub fn compute_range(
    location: &GeoLocation,
    start: NaiveDate,
    end: NaiveDate,
    options: &SunOptions,
    config: &EngineConfig,
) -> Result<Vec<DayEventRecord>> {
    let days = range_day_count(start, end, config.max_range_days)?;
    let location = options.apply_to(location)?;
    let atmosphere = options.atmosphere(&config.default_atmosphere)?;
    let settings = options.event_settings(config);
    let tz = parse_timezone(&location.timezone_id)?;

    debug!(
        %start,
        %end,
        days,
        latitude = location.latitude,
        longitude = location.longitude,
        timezone = %location.timezone_id,
        "computing sun events"
    );

    let mut records = Vec::with_capacity(days as usize);
    for date in start.iter_days().take(days as usize) {
        let Some(window) = local_day_window(date, &tz)? else {
            debug!(%date, timezone = %location.timezone_id, "date skipped by the zone");
            continue;
        };
        records.push(day_events(&window, &tz, &location, &atmosphere, &settings)?);
    }
    Ok(records)
}
