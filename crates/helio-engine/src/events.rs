//! Sun Event Resolver: threshold crossings of the solar elevation curve.
//!
//! For one local calendar day the geometric elevation is sampled once per
//! minute over the DST-aware UTC window of that day. The same samples serve
//! every threshold:
//!
//! - a sign change of `elevation - threshold` between two neighbouring
//!   samples brackets a crossing, which is then bisected to below 10 ms
//! - the rising event is the first upward crossing, the setting event the
//!   last downward crossing
//! - solar noon is the highest sample, refined by golden-section search
//!
//! Thresholds already include refraction and the solar semi-diameter, so
//! they are compared against the elevation *before* refraction. The horizon
//! refraction in the sunrise/sunset threshold follows the air density of the
//! requested atmosphere; twilight thresholds are purely geometric.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, SubsecRound, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::delta_t;
use crate::dst::{local_day_window, parse_timezone, LocalDay};
use crate::error::{HelioError, Result};
use crate::location::GeoLocation;
use crate::spa::{solar_position_with_delta_t, AtmosphericParams, ATMOSPHERIC_REFRACTION};

/// Sampling step of the coarse elevation scan.
const SAMPLE_STEP_SECONDS: i64 = 60;
/// Bisection and golden-section stop once the bracket is this narrow.
const REFINE_TOLERANCE_SECONDS: f64 = 0.01;
const KELVIN: f64 = 273.15;

/// Elevation thresholds that define the daily events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeThreshold {
    /// Upper limb on the horizon: 0.5667° refraction + 0.26667° semi-diameter.
    Sunrise,
    Civil,
    Nautical,
    Astronomical,
}

impl AltitudeThreshold {
    pub const ALL: [AltitudeThreshold; 4] = [
        AltitudeThreshold::Sunrise,
        AltitudeThreshold::Civil,
        AltitudeThreshold::Nautical,
        AltitudeThreshold::Astronomical,
    ];

    /// Threshold elevation in degrees.
    pub fn degrees(self) -> f64 {
        match self {
            AltitudeThreshold::Sunrise => -0.833,
            AltitudeThreshold::Civil => -6.0,
            AltitudeThreshold::Nautical => -12.0,
            AltitudeThreshold::Astronomical => -18.0,
        }
    }

    /// Threshold under `atmosphere`. Only the horizon event carries a
    /// refraction term; twilight thresholds are purely geometric.
    pub fn degrees_for(self, atmosphere: &AtmosphericParams) -> f64 {
        match self {
            AltitudeThreshold::Sunrise => {
                self.degrees() + ATMOSPHERIC_REFRACTION - horizon_refraction(atmosphere)
            }
            _ => self.degrees(),
        }
    }

    /// Threshold under `atmosphere`, lowered by the horizon dip seen from
    /// `elevation_m` above the terrain.
    pub fn corrected_degrees(self, atmosphere: &AtmosphericParams, elevation_m: f64) -> f64 {
        self.degrees_for(atmosphere) - horizon_dip(elevation_m)
    }
}

/// Refraction at the horizon in degrees.
///
/// The standard 0.5667° holds for the standard atmosphere (1013.25 hPa,
/// 15 °C) and scales with air density: proportional to pressure, inversely
/// to absolute temperature.
pub fn horizon_refraction(atmosphere: &AtmosphericParams) -> f64 {
    let standard = AtmosphericParams::default();
    ATMOSPHERIC_REFRACTION * (atmosphere.pressure_hpa / standard.pressure_hpa)
        * ((standard.temperature_c + KELVIN) / (atmosphere.temperature_c + KELVIN))
}

/// Horizon dip in degrees for an observer `elevation_m` metres up.
pub fn horizon_dip(elevation_m: f64) -> f64 {
    if elevation_m > 0.0 {
        1.76 * elevation_m.sqrt() / 60.0
    } else {
        0.0
    }
}

/// Per-computation switches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Lower every threshold by the horizon dip of the observer's elevation.
    pub altitude_correction: bool,
    /// Compute civil, nautical and astronomical twilight.
    pub include_twilight: bool,
    /// Fixed ΔT in seconds; `None` estimates it for the day.
    pub delta_t: Option<f64>,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            altitude_correction: false,
            include_twilight: true,
            delta_t: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayFlags {
    pub polar_day: bool,
    pub polar_night: bool,
    pub no_civil_twilight: bool,
}

/// Events of one local calendar day. Instants carry the local UTC offset
/// in effect at that instant and are rounded to whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayEventRecord {
    pub date: NaiveDate,
    pub sunrise: Option<DateTime<FixedOffset>>,
    pub sunset: Option<DateTime<FixedOffset>>,
    pub solar_noon: DateTime<FixedOffset>,
    pub civil_dawn: Option<DateTime<FixedOffset>>,
    pub civil_dusk: Option<DateTime<FixedOffset>>,
    pub nautical_dawn: Option<DateTime<FixedOffset>>,
    pub nautical_dusk: Option<DateTime<FixedOffset>>,
    pub astronomical_dawn: Option<DateTime<FixedOffset>>,
    pub astronomical_dusk: Option<DateTime<FixedOffset>>,
    pub day_length_sec: i64,
    pub flags: DayFlags,
}

/// Rising and setting instants for one threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Crossings {
    rising: Option<DateTime<Utc>>,
    setting: Option<DateTime<Utc>>,
}

/// Geometric elevation curve of one day.
struct ElevationCurve<'a> {
    location: &'a GeoLocation,
    atmosphere: &'a AtmosphericParams,
    delta_t: f64,
    samples: Vec<(DateTime<Utc>, f64)>,
}

impl<'a> ElevationCurve<'a> {
    fn sample(
        window: &LocalDay,
        location: &'a GeoLocation,
        atmosphere: &'a AtmosphericParams,
        delta_t: f64,
    ) -> Result<Self> {
        let mut curve = Self {
            location,
            atmosphere,
            delta_t,
            samples: Vec::with_capacity(1_510),
        };
        let step = Duration::seconds(SAMPLE_STEP_SECONDS);
        let mut t = window.start;
        while t < window.end {
            let e = curve.elevation_at(t)?;
            curve.samples.push((t, e));
            t += step;
        }
        let e = curve.elevation_at(window.end)?;
        curve.samples.push((window.end, e));
        Ok(curve)
    }

    fn elevation_at(&self, t: DateTime<Utc>) -> Result<f64> {
        let position =
            solar_position_with_delta_t(&t, self.location, self.atmosphere, self.delta_t)?;
        Ok(position.geometric_elevation)
    }

    fn always_above(&self, threshold: f64) -> bool {
        self.samples.iter().all(|&(_, e)| e >= threshold)
    }

    fn always_below(&self, threshold: f64) -> bool {
        self.samples.iter().all(|&(_, e)| e < threshold)
    }

    /// Every crossing of `threshold`, refined, in time order, with its direction
    /// (`true` for upward).
    fn crossings(&self, threshold: f64) -> Result<Vec<(DateTime<Utc>, bool)>> {
        let mut found = Vec::new();
        for pair in self.samples.windows(2) {
            let (t0, e0) = pair[0];
            let (t1, e1) = pair[1];
            let upward = e0 < threshold && e1 >= threshold;
            let downward = e0 >= threshold && e1 < threshold;
            if upward || downward {
                found.push((self.bisect(t0, t1, threshold, upward)?, upward));
            }
        }
        Ok(found)
    }

    fn crossings_for(&self, threshold: f64) -> Result<Crossings> {
        let all = self.crossings(threshold)?;
        Ok(Crossings {
            rising: all.iter().find(|(_, up)| *up).map(|(t, _)| *t),
            setting: all.iter().rev().find(|(_, up)| !*up).map(|(t, _)| *t),
        })
    }

    /// Narrow `[lo, hi]` around the crossing until it is below the tolerance.
    fn bisect(
        &self,
        mut lo: DateTime<Utc>,
        mut hi: DateTime<Utc>,
        threshold: f64,
        upward: bool,
    ) -> Result<DateTime<Utc>> {
        while seconds_between(lo, hi) > REFINE_TOLERANCE_SECONDS {
            let mid = midpoint(lo, hi);
            let above = self.elevation_at(mid)? >= threshold;
            if above == upward {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Ok(midpoint(lo, hi))
    }

    /// Instant of maximum elevation.
    fn culmination(&self) -> Result<DateTime<Utc>> {
        let mut best = 0;
        for (i, &(_, e)) in self.samples.iter().enumerate() {
            if e > self.samples[best].1 {
                best = i;
            }
        }
        let lo = self.samples[best.saturating_sub(1)].0;
        let hi = self.samples[(best + 1).min(self.samples.len() - 1)].0;
        self.golden_section_max(lo, hi)
    }

    fn golden_section_max(&self, lo: DateTime<Utc>, hi: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
        let at = |s: f64| lo + duration_from_seconds(s);

        let (mut a, mut b) = (0.0, seconds_between(lo, hi));
        let mut c = b - inv_phi * (b - a);
        let mut d = a + inv_phi * (b - a);
        let mut fc = self.elevation_at(at(c))?;
        let mut fd = self.elevation_at(at(d))?;
        while b - a > REFINE_TOLERANCE_SECONDS {
            if fc > fd {
                b = d;
                d = c;
                fd = fc;
                c = b - inv_phi * (b - a);
                fc = self.elevation_at(at(c))?;
            } else {
                a = c;
                c = d;
                fc = fd;
                d = a + inv_phi * (b - a);
                fd = self.elevation_at(at(d))?;
            }
        }
        Ok(at((a + b) / 2.0))
    }

    /// Seconds above `threshold` within the window.
    fn seconds_above(&self, threshold: f64) -> Result<i64> {
        let (Some(&(start, first)), Some(&(end, _))) =
            (self.samples.first(), self.samples.last())
        else {
            return Ok(0);
        };
        let mut above = first >= threshold;
        let mut since = start;
        let mut total = Duration::zero();
        for (t, upward) in self.crossings(threshold)? {
            if above && !upward {
                total += t - since;
            }
            above = upward;
            since = t;
        }
        if above {
            total += end - since;
        }
        Ok((total.num_milliseconds() as f64 / 1000.0).round() as i64)
    }
}

fn seconds_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (b - a).num_microseconds().map(|us| us as f64 / 1.0e6).unwrap_or(f64::MAX)
}

fn duration_from_seconds(s: f64) -> Duration {
    Duration::microseconds((s * 1.0e6).round() as i64)
}

fn midpoint(a: DateTime<Utc>, b: DateTime<Utc>) -> DateTime<Utc> {
    a + (b - a) / 2
}

fn to_local(t: DateTime<Utc>, tz: &Tz) -> DateTime<FixedOffset> {
    t.round_subsecs(0).with_timezone(tz).fixed_offset()
}

/// Compute all events of `date` (local calendar day) at `location`.
///
/// # Errors
/// `InvalidInput` for out-of-range coordinates, elevation, atmosphere, an
/// unknown time zone or a date the zone skips entirely; `InternalComputation`
/// if the position algorithm fails.
pub fn sun_events(
    date: NaiveDate,
    location: &GeoLocation,
    atmosphere: &AtmosphericParams,
    settings: &EventSettings,
) -> Result<DayEventRecord> {
    location.validate()?;
    atmosphere.validate()?;
    let tz = parse_timezone(&location.timezone_id)?;
    let window = local_day_window(date, &tz)?.ok_or_else(|| {
        HelioError::InvalidInput(format!(
            "date {} does not exist in {}",
            date, location.timezone_id
        ))
    })?;
    day_events(&window, &tz, location, atmosphere, settings)
}

/// Events within an already resolved local day. Inputs are assumed validated.
pub(crate) fn day_events(
    window: &LocalDay,
    tz: &Tz,
    location: &GeoLocation,
    atmosphere: &AtmosphericParams,
    settings: &EventSettings,
) -> Result<DayEventRecord> {
    let delta_t = settings
        .delta_t
        .unwrap_or_else(|| delta_t::estimate(&midpoint(window.start, window.end)));

    let curve = ElevationCurve::sample(window, location, atmosphere, delta_t)?;
    let threshold = |t: AltitudeThreshold| {
        if settings.altitude_correction {
            t.corrected_degrees(atmosphere, location.elevation_m)
        } else {
            t.degrees_for(atmosphere)
        }
    };

    let mut flags = DayFlags::default();
    let sunrise_threshold = threshold(AltitudeThreshold::Sunrise);
    let sun = if curve.always_above(sunrise_threshold) {
        flags.polar_day = true;
        Crossings::default()
    } else if curve.always_below(sunrise_threshold) {
        flags.polar_night = true;
        Crossings::default()
    } else {
        curve.crossings_for(sunrise_threshold)?
    };

    let mut twilight = [Crossings::default(); 3];
    if settings.include_twilight {
        for (slot, band) in twilight.iter_mut().zip(&AltitudeThreshold::ALL[1..]) {
            *slot = curve.crossings_for(threshold(*band))?;
        }
        let civil = twilight[0];
        flags.no_civil_twilight = civil.rising.is_none() || civil.setting.is_none();
    }

    let sunrise = sun.rising.map(|t| to_local(t, tz));
    let sunset = sun.setting.map(|t| to_local(t, tz));
    let day_length_sec = match (sunrise, sunset) {
        (Some(rise), Some(set)) if set > rise => (set - rise).num_seconds(),
        _ if flags.polar_day => window.length_seconds(),
        _ if flags.polar_night => 0,
        _ => curve.seconds_above(sunrise_threshold)?,
    };

    let local = |t: Option<DateTime<Utc>>| t.map(|t| to_local(t, tz));
    Ok(DayEventRecord {
        date: window.date,
        sunrise,
        sunset,
        solar_noon: to_local(curve.culmination()?, tz),
        civil_dawn: local(twilight[0].rising),
        civil_dusk: local(twilight[0].setting),
        nautical_dawn: local(twilight[1].rising),
        nautical_dusk: local(twilight[1].setting),
        astronomical_dawn: local(twilight[2].rising),
        astronomical_dusk: local(twilight[2].setting),
        day_length_sec,
        flags,
    })
}
