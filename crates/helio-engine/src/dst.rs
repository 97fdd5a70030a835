//! Local calendar days as UTC intervals, with DST handling.
//!
//! A local day runs from local midnight to the next local midnight. On DST
//! transition days that span is 23 or 25 hours. In a handful of zones the
//! clocks change *at* midnight, so midnight itself can be missing (a gap) or
//! occur twice (an overlap); [`DstPolicy`] decides how such a wall-clock time
//! maps onto an instant.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{HelioError, Result};

/// Policy for wall-clock times that fall in a DST gap or overlap.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DstPolicy {
    /// Gap: move to the first valid wall-clock time after it.
    /// Overlap: take the earlier instant.
    #[default]
    ShiftForward,
    /// Gap: fail. Overlap: take the earlier instant.
    Strict,
}

/// Half-open UTC interval `[start, end)` covered by one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDay {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LocalDay {
    /// Length of the day in seconds (86400, or ±3600 on DST days).
    pub fn length_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Parse an IANA zone identifier.
pub fn parse_timezone(timezone: &str) -> Result<Tz> {
    timezone
        .parse::<Tz>()
        .map_err(|_| HelioError::InvalidInput(format!("unknown IANA time zone '{}'", timezone)))
}

/// Resolve a wall-clock time in `tz` to a UTC instant under `policy`.
pub fn resolve_local(tz: &Tz, local: NaiveDateTime, policy: DstPolicy) -> Result<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => match policy {
            DstPolicy::Strict => Err(HelioError::InvalidInput(format!(
                "local time {} does not exist in {}",
                local,
                tz.name()
            ))),
            DstPolicy::ShiftForward => {
                // Gaps are at most a few hours; walk forward a minute at a time.
                let mut candidate = local;
                for _ in 0..(24 * 60) {
                    candidate += Duration::minutes(1);
                    if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
                        return Ok(dt.with_timezone(&Utc));
                    }
                }
                Err(HelioError::InternalComputation(format!(
                    "no valid wall-clock time after {} in {}",
                    local,
                    tz.name()
                )))
            }
        },
    }
}

/// UTC interval covered by `date` in zone `tz`.
///
/// `None` when the zone skips the whole calendar day, as Pacific/Apia did
/// with 2011-12-30 when it moved across the date line.
pub fn local_day_window(date: NaiveDate, tz: &Tz) -> Result<Option<LocalDay>> {
    let next = date
        .succ_opt()
        .ok_or_else(|| HelioError::InvalidInput(format!("date {} has no successor", date)))?;
    let start = resolve_local(tz, midnight(date)?, DstPolicy::ShiftForward)?;
    let end = resolve_local(tz, midnight(next)?, DstPolicy::ShiftForward)?;
    Ok((end > start).then_some(LocalDay { date, start, end }))
}

fn midnight(date: NaiveDate) -> Result<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| HelioError::InvalidInput(format!("date {} has no midnight", date)))
}
