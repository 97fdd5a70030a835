//! HTTP collaborators: Nominatim geocoding and two public sunrise/sunset APIs.
//!
//! All calls use a blocking `reqwest` client with a hard timeout. Timeouts
//! map to [`ProviderError::Timeout`], transport failures to `Unreachable`,
//! and unexpected payloads to `Malformed`.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::crosscheck::{RemoteSunTimes, SunTimesProvider};
use crate::dst::{parse_timezone, resolve_local, DstPolicy};
use crate::error::{HelioError, ProviderError};
use crate::location::{GeoLocation, GeocodeMatch, GeocodeRequest, Geocoder};

const USER_AGENT: &str = concat!(
    "HelioTime/",
    env!("CARGO_PKG_VERSION"),
    " (sunrise-sunset calculation service)"
);

pub const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com";
pub const SUNRISE_SUNSET_BASE_URL: &str = "https://api.sunrise-sunset.org";

/// Minimum spacing between Nominatim requests (usage policy: 1 req/s).
const NOMINATIM_DELAY: Duration = Duration::from_secs(1);

fn build_client(timeout_ms: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::Unreachable(format!("failed to build HTTP client: {}", e)))
}

fn classify(e: reqwest::Error, timeout_ms: u64) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout_ms)
    } else if e.is_decode() {
        ProviderError::Malformed(e.to_string())
    } else {
        ProviderError::Unreachable(e.to_string())
    }
}

fn get_json<T: for<'de> Deserialize<'de>>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    timeout_ms: u64,
) -> Result<T, ProviderError> {
    debug!(url, "provider request");
    client
        .get(url)
        .query(query)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| classify(e, timeout_ms))?
        .json::<T>()
        .map_err(|e| classify(e, timeout_ms))
}

// ── Nominatim ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    extratags: Option<NominatimTags>,
}

#[derive(Debug, Deserialize)]
struct NominatimTags {
    ele: Option<String>,
}

/// OpenStreetMap Nominatim forward geocoder.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    timeout_ms: u64,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    pub fn new(timeout_ms: u64) -> Result<Self, ProviderError> {
        Self::with_base_url(NOMINATIM_BASE_URL, timeout_ms)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout_ms: u64,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout_ms)?,
            base_url: base_url.into(),
            timeout_ms,
            last_request: Mutex::new(None),
        })
    }

    fn throttle(&self) {
        if let Ok(mut last) = self.last_request.lock() {
            if let Some(previous) = *last {
                let elapsed = previous.elapsed();
                if elapsed < NOMINATIM_DELAY {
                    thread::sleep(NOMINATIM_DELAY - elapsed);
                }
            }
            *last = Some(Instant::now());
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, request: &GeocodeRequest) -> Result<Option<GeocodeMatch>, ProviderError> {
        self.throttle();
        let places: Vec<NominatimPlace> = get_json(
            &self.client,
            &format!("{}/search", self.base_url),
            &[
                ("q", request.query_text()),
                ("format", "json".to_string()),
                ("limit", "1".to_string()),
                ("extratags", "1".to_string()),
            ],
            self.timeout_ms,
        )?;

        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };
        let parse = |s: &str| {
            s.parse::<f64>().map_err(|_| {
                ProviderError::Malformed(format!("coordinate '{}' is not a number", s))
            })
        };
        let elevation_m = place
            .extratags
            .and_then(|t| t.ele)
            .and_then(|e| e.trim().trim_end_matches('m').trim().parse::<f64>().ok());
        Ok(Some(GeocodeMatch {
            latitude: parse(&place.lat)?,
            longitude: parse(&place.lon)?,
            elevation_m,
        }))
    }
}

// ── Open-Meteo ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    daily: OpenMeteoDaily,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoDaily {
    #[serde(default)]
    sunrise: Vec<Option<String>>,
    #[serde(default)]
    sunset: Vec<Option<String>>,
}

/// Open-Meteo forecast API, queried in the location's own time zone.
pub struct OpenMeteoProvider {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl OpenMeteoProvider {
    pub fn new(timeout_ms: u64) -> Result<Self, ProviderError> {
        Self::with_base_url(OPEN_METEO_BASE_URL, timeout_ms)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout_ms: u64,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout_ms)?,
            base_url: base_url.into(),
            timeout_ms,
        })
    }
}

/// Parse Open-Meteo's zone-less local timestamp (`2025-09-01T06:14`).
///
/// A wall-clock time inside a DST gap cannot come from a real conversion and
/// is reported as malformed.
fn parse_local_stamp(stamp: &str, location: &GeoLocation) -> Result<DateTime<Utc>, ProviderError> {
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(stamp, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| ProviderError::Malformed(format!("unparseable timestamp '{}'", stamp)))?;
    let malformed = |e: HelioError| ProviderError::Malformed(e.to_string());
    let tz = parse_timezone(&location.timezone_id).map_err(malformed)?;
    resolve_local(&tz, naive, DstPolicy::Strict).map_err(malformed)
}

impl SunTimesProvider for OpenMeteoProvider {
    fn name(&self) -> &str {
        "open-meteo"
    }

    fn sun_times(
        &self,
        date: NaiveDate,
        location: &GeoLocation,
    ) -> Result<RemoteSunTimes, ProviderError> {
        let day = date.format("%Y-%m-%d").to_string();
        let response: OpenMeteoResponse = get_json(
            &self.client,
            &format!("{}/v1/forecast", self.base_url),
            &[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("daily", "sunrise,sunset".to_string()),
                ("timezone", location.timezone_id.clone()),
                ("start_date", day.clone()),
                ("end_date", day),
            ],
            self.timeout_ms,
        )?;

        let first = |values: &[Option<String>]| -> Result<Option<DateTime<Utc>>, ProviderError> {
            match values.first().and_then(|v| v.as_deref()).filter(|s| !s.is_empty()) {
                Some(stamp) => parse_local_stamp(stamp, location).map(Some),
                None => Ok(None),
            }
        };
        Ok(RemoteSunTimes {
            sunrise: first(&response.daily.sunrise)?,
            sunset: first(&response.daily.sunset)?,
        })
    }
}

// ── sunrise-sunset.org ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SunriseSunsetResponse {
    status: String,
    #[serde(default)]
    results: Option<SunriseSunsetResults>,
}

#[derive(Debug, Deserialize)]
struct SunriseSunsetResults {
    sunrise: Option<String>,
    sunset: Option<String>,
}

/// sunrise-sunset.org JSON API (`formatted=0`, UTC timestamps).
pub struct SunriseSunsetOrgProvider {
    client: Client,
    base_url: String,
    timeout_ms: u64,
}

impl SunriseSunsetOrgProvider {
    pub fn new(timeout_ms: u64) -> Result<Self, ProviderError> {
        Self::with_base_url(SUNRISE_SUNSET_BASE_URL, timeout_ms)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout_ms: u64,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout_ms)?,
            base_url: base_url.into(),
            timeout_ms,
        })
    }
}

/// The API reports "never" as the Unix epoch (`1970-01-01T00:00:01+00:00`).
fn parse_utc_stamp(stamp: Option<&str>) -> Result<Option<DateTime<Utc>>, ProviderError> {
    let Some(stamp) = stamp.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let parsed = DateTime::parse_from_rfc3339(stamp)
        .map_err(|_| ProviderError::Malformed(format!("unparseable timestamp '{}'", stamp)))?
        .with_timezone(&Utc);
    Ok((parsed.year() > 1970).then_some(parsed))
}

impl SunTimesProvider for SunriseSunsetOrgProvider {
    fn name(&self) -> &str {
        "sunrise-sunset"
    }

    fn sun_times(
        &self,
        date: NaiveDate,
        location: &GeoLocation,
    ) -> Result<RemoteSunTimes, ProviderError> {
        let response: SunriseSunsetResponse = get_json(
            &self.client,
            &format!("{}/json", self.base_url),
            &[
                ("lat", location.latitude.to_string()),
                ("lng", location.longitude.to_string()),
                ("date", date.format("%Y-%m-%d").to_string()),
                ("formatted", "0".to_string()),
                ("tzid", location.timezone_id.clone()),
            ],
            self.timeout_ms,
        )?;
        if response.status != "OK" {
            return Err(ProviderError::Malformed(format!(
                "API returned status {}",
                response.status
            )));
        }
        let results = response
            .results
            .ok_or_else(|| ProviderError::Malformed("missing results".to_string()))?;
        Ok(RemoteSunTimes {
            sunrise: parse_utc_stamp(results.sunrise.as_deref())?,
            sunset: parse_utc_stamp(results.sunset.as_deref())?,
        })
    }
}

/// Build the named cross-check provider (`open-meteo` or `sunrise-sunset`).
pub fn sun_times_provider(
    name: &str,
    timeout_ms: u64,
) -> Result<Arc<dyn SunTimesProvider>, ProviderError> {
    match name {
        "open-meteo" => Ok(Arc::new(OpenMeteoProvider::new(timeout_ms)?)),
        "sunrise-sunset" | "sunrise-sunset.org" => {
            Ok(Arc::new(SunriseSunsetOrgProvider::new(timeout_ms)?))
        }
        other => Err(ProviderError::Unreachable(format!(
            "unknown cross-check provider '{}'",
            other
        ))),
    }
}
