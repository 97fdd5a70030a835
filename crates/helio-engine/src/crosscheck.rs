//! Cross-Check Validator: compare computed sunrise/sunset with an external provider.
//!
//! Only sunrise and sunset are compared. A provider that cannot be reached
//! or times out produces [`CrossCheckOutcome::Skipped`]; that never fails a
//! request. In enforcing mode a tolerance breach becomes
//! [`HelioError::CrossCheckFailed`], otherwise it is only reported.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::CrossCheckConfig;
use crate::error::{HelioError, ProviderError, Result};
use crate::events::DayEventRecord;
use crate::location::GeoLocation;

/// Sunrise and sunset as reported by a provider. `None` means the provider
/// says the event does not happen that day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteSunTimes {
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

/// External source of sunrise/sunset times for one local date.
pub trait SunTimesProvider: Send + Sync {
    /// Short identifier reported in results (`open-meteo`, `sunrise-sunset`).
    fn name(&self) -> &str;

    fn sun_times(
        &self,
        date: NaiveDate,
        location: &GeoLocation,
    ) -> std::result::Result<RemoteSunTimes, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

impl std::fmt::Display for SunEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SunEvent::Sunrise => write!(f, "sunrise"),
            SunEvent::Sunset => write!(f, "sunset"),
        }
    }
}

/// Comparison of one event on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossCheckResult {
    pub provider: String,
    pub event: SunEvent,
    pub local_value: Option<DateTime<FixedOffset>>,
    pub remote_value: Option<DateTime<Utc>>,
    /// Absolute difference; `None` unless both values exist.
    pub delta_seconds: Option<i64>,
    pub within_tolerance: bool,
}

/// Compare one local value against the provider's value.
///
/// Both absent counts as agreement. Exactly one absent never does.
pub fn compare_event(
    provider: &str,
    event: SunEvent,
    local_value: Option<DateTime<FixedOffset>>,
    remote_value: Option<DateTime<Utc>>,
    tolerance_seconds: u32,
) -> CrossCheckResult {
    let (delta_seconds, within_tolerance) = match (local_value, remote_value) {
        (Some(local), Some(remote)) => {
            let delta = (local.with_timezone(&Utc) - remote).num_seconds().abs();
            (Some(delta), delta <= i64::from(tolerance_seconds))
        }
        (None, None) => (None, true),
        _ => (None, false),
    };
    CrossCheckResult {
        provider: provider.to_string(),
        event,
        local_value,
        remote_value,
        delta_seconds,
        within_tolerance,
    }
}

/// All comparisons of one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayComparison {
    pub date: NaiveDate,
    pub provider: String,
    pub results: Vec<CrossCheckResult>,
    pub max_delta_seconds: i64,
    pub tolerance_seconds: u32,
    pub within_tolerance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrossCheckOutcome {
    /// The provider could not be consulted.
    Skipped {
        date: NaiveDate,
        provider: String,
        reason: String,
    },
    Compared(DayComparison),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossCheckStatus {
    WithinTolerance,
    ExceededTolerance,
    /// Every day was skipped.
    FetchFailed,
}

/// Aggregate over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossCheckReport {
    pub provider: String,
    pub days_checked: usize,
    pub max_delta_seconds: i64,
    pub tolerance_seconds: u32,
    pub status: CrossCheckStatus,
    pub failed_days: Vec<NaiveDate>,
    pub days: Vec<CrossCheckOutcome>,
}

pub struct CrossCheckValidator {
    provider: Arc<dyn SunTimesProvider>,
    tolerance_seconds: u32,
    enforce: bool,
}

impl CrossCheckValidator {
    pub fn new(provider: Arc<dyn SunTimesProvider>, tolerance_seconds: u32, enforce: bool) -> Self {
        Self {
            provider,
            tolerance_seconds,
            enforce,
        }
    }

    pub fn from_config(provider: Arc<dyn SunTimesProvider>, config: &CrossCheckConfig) -> Self {
        Self::new(provider, config.tolerance_seconds, config.enforce)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Compare one day's sunrise and sunset with the provider.
    ///
    /// # Errors
    /// `CrossCheckFailed` in enforcing mode when either event is out of tolerance.
    pub fn cross_check(
        &self,
        location: &GeoLocation,
        record: &DayEventRecord,
    ) -> Result<CrossCheckOutcome> {
        let provider = self.provider_name().to_string();
        let remote = match self.provider.sun_times(record.date, location) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(
                    provider = %provider,
                    date = %record.date,
                    error = %e,
                    "cross-check provider unavailable"
                );
                return Ok(CrossCheckOutcome::Skipped {
                    date: record.date,
                    provider,
                    reason: e.to_string(),
                });
            }
        };

        let tolerance = self.tolerance_seconds;
        let results = vec![
            compare_event(&provider, SunEvent::Sunrise, record.sunrise, remote.sunrise, tolerance),
            compare_event(&provider, SunEvent::Sunset, record.sunset, remote.sunset, tolerance),
        ];
        let max_delta_seconds = results.iter().filter_map(|r| r.delta_seconds).max().unwrap_or(0);
        let within_tolerance = results.iter().all(|r| r.within_tolerance);

        info!(
            provider = %provider,
            date = %record.date,
            max_delta_seconds,
            within_tolerance,
            "cross-check compared"
        );

        if !within_tolerance && self.enforce {
            let breaches: Vec<String> = results
                .iter()
                .filter(|r| !r.within_tolerance)
                .map(|r| match r.delta_seconds {
                    Some(d) => format!("{} off by {}s", r.event, d),
                    None => format!("{} present on only one side", r.event),
                })
                .collect();
            let message = format!(
                "{} on {}: {} (tolerance {}s)",
                provider,
                record.date,
                breaches.join(", "),
                self.tolerance_seconds
            );
            error!(%message, "cross-check tolerance exceeded");
            return Err(HelioError::CrossCheckFailed(message));
        }

        Ok(CrossCheckOutcome::Compared(DayComparison {
            date: record.date,
            provider,
            results,
            max_delta_seconds,
            tolerance_seconds: self.tolerance_seconds,
            within_tolerance,
        }))
    }

    /// Cross-check every record of a range and aggregate.
    ///
    /// # Errors
    /// `CrossCheckFailed` in enforcing mode on the first day out of tolerance.
    pub fn cross_check_range(
        &self,
        location: &GeoLocation,
        records: &[DayEventRecord],
    ) -> Result<CrossCheckReport> {
        let mut days = Vec::with_capacity(records.len());
        let mut failed_days = Vec::new();
        let mut max_delta_seconds = 0;
        let mut compared = 0usize;

        for record in records {
            let outcome = self.cross_check(location, record)?;
            if let CrossCheckOutcome::Compared(day) = &outcome {
                compared += 1;
                max_delta_seconds = max_delta_seconds.max(day.max_delta_seconds);
                if !day.within_tolerance {
                    failed_days.push(day.date);
                }
            }
            days.push(outcome);
        }

        let status = if compared == 0 && !records.is_empty() {
            CrossCheckStatus::FetchFailed
        } else if failed_days.is_empty() {
            CrossCheckStatus::WithinTolerance
        } else {
            CrossCheckStatus::ExceededTolerance
        };

        Ok(CrossCheckReport {
            provider: self.provider_name().to_string(),
            days_checked: records.len(),
            max_delta_seconds,
            tolerance_seconds: self.tolerance_seconds,
            status,
            failed_days,
            days,
        })
    }
}
