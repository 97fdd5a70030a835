//! Location Resolver: heterogeneous location input → [`GeoLocation`].
//!
//! Four input forms are accepted, and exactly one must be present:
//!
//! - `lat` + `lon`
//! - `gps` as `"lat,lon"`
//! - `postal_code` + `country_code`
//! - `city` + `country`
//!
//! Coordinate forms go straight to the static time-zone boundary lookup.
//! Textual forms are normalized, looked up in the [`GeocodeCache`], and only
//! on a miss sent to the external [`Geocoder`]; the result is written back
//! with the configured TTL.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use tzf_rs::DefaultFinder;

use crate::cache::GeocodeCache;
use crate::error::{HelioError, ProviderError, Result};

/// A validated geographic location with its IANA time zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation_m: f64,
    pub timezone_id: String,
}

impl GeoLocation {
    pub fn new(
        latitude: f64,
        longitude: f64,
        elevation_m: f64,
        timezone_id: impl Into<String>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            elevation_m,
            timezone_id: timezone_id.into(),
        }
    }

    /// Check coordinate bounds and elevation. Must pass before any solar computation.
    pub fn validate(&self) -> Result<()> {
        validate_coordinates(self.latitude, self.longitude)?;
        if !self.elevation_m.is_finite() || self.elevation_m < 0.0 {
            return Err(HelioError::InvalidInput(format!(
                "elevation_m {} must be a finite value >= 0",
                self.elevation_m
            )));
        }
        Ok(())
    }
}

/// Reject latitudes outside [-90, 90] and longitudes outside [-180, 180].
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(HelioError::InvalidInput(format!(
            "latitude {} out of range [-90, 90]",
            latitude
        )));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(HelioError::InvalidInput(format!(
            "longitude {} out of range [-180, 180]",
            longitude
        )));
    }
    Ok(())
}

/// Raw location parameters as they arrive from the request layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub gps: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Exactly one location specification form.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    Coordinates { lat: f64, lon: f64 },
    Gps(String),
    PostalCode { postal_code: String, country_code: String },
    City { city: String, country: String },
}

impl LocationInput {
    /// Validate that exactly one complete parameter group is present.
    ///
    /// Half of a group (`lat` without `lon`, `city` without `country`, ...)
    /// is an error, as is more than one group.
    pub fn from_query(query: &LocationQuery) -> Result<Self> {
        let present = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());

        let mut forms = Vec::new();
        let mut partial = Vec::new();

        match (query.lat, query.lon) {
            (Some(lat), Some(lon)) => forms.push(LocationInput::Coordinates { lat, lon }),
            (Some(_), None) => partial.push("lat without lon"),
            (None, Some(_)) => partial.push("lon without lat"),
            (None, None) => {}
        }
        if present(&query.gps) {
            forms.push(LocationInput::Gps(query.gps.clone().unwrap_or_default()));
        }
        match (present(&query.postal_code), present(&query.country_code)) {
            (true, true) => forms.push(LocationInput::PostalCode {
                postal_code: query.postal_code.clone().unwrap_or_default(),
                country_code: query.country_code.clone().unwrap_or_default(),
            }),
            (true, false) => partial.push("postal_code without country_code"),
            (false, true) => partial.push("country_code without postal_code"),
            (false, false) => {}
        }
        match (present(&query.city), present(&query.country)) {
            (true, true) => forms.push(LocationInput::City {
                city: query.city.clone().unwrap_or_default(),
                country: query.country.clone().unwrap_or_default(),
            }),
            (true, false) => partial.push("city without country"),
            (false, true) => partial.push("country without city"),
            (false, false) => {}
        }

        if !partial.is_empty() {
            return Err(HelioError::InvalidInput(format!(
                "incomplete location parameters: {}",
                partial.join(", ")
            )));
        }
        match forms.len() {
            0 => Err(HelioError::InvalidInput(
                "no location given: provide lat+lon, gps, postal_code+country_code, or city+country"
                    .to_string(),
            )),
            1 => Ok(forms.remove(0)),
            n => Err(HelioError::InvalidInput(format!(
                "{} conflicting location forms given; provide exactly one",
                n
            ))),
        }
    }

    /// Validated coordinates for the coordinate forms, `None` for textual ones.
    pub fn coordinates(&self) -> Result<Option<(f64, f64)>> {
        match self {
            LocationInput::Coordinates { lat, lon } => {
                validate_coordinates(*lat, *lon)?;
                Ok(Some((*lat, *lon)))
            }
            LocationInput::Gps(gps) => parse_gps(gps).map(Some),
            LocationInput::PostalCode { .. } | LocationInput::City { .. } => Ok(None),
        }
    }
}

/// Parse a GPS string `"lat,lon"` and range-check it.
pub fn parse_gps(gps: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = gps.trim().split(',').collect();
    if parts.len() != 2 {
        return Err(HelioError::InvalidInput(format!(
            "GPS string '{}' must have the form 'lat,lon'",
            gps
        )));
    }
    let parse = |s: &str| {
        s.trim().parse::<f64>().map_err(|_| {
            HelioError::InvalidInput(format!("GPS component '{}' is not a number", s.trim()))
        })
    };
    let lat = parse(parts[0])?;
    let lon = parse(parts[1])?;
    validate_coordinates(lat, lon)?;
    Ok((lat, lon))
}

/// Kind of textual query, used as the cache's secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Postal,
    City,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Postal => "postal",
            LocationType::City => "city",
        }
    }
}

/// Lower-case, trim, and collapse internal whitespace runs to one space.
pub fn normalize_field(value: &str) -> String {
    value
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized query key: the normalized fields joined with `|`.
pub fn normalized_key(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| normalize_field(f))
        .collect::<Vec<_>>()
        .join("|")
}

/// Content address of a normalized query: SHA-256 hex of `"<type>|<key>"`.
pub fn query_hash(location_type: LocationType, location_key: &str) -> String {
    let digest = Sha256::digest(format!("{}|{}", location_type.as_str(), location_key).as_bytes());
    format!("{:x}", digest)
}

/// A forward-geocoding request.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeRequest {
    Postal { postal_code: String, country_code: String },
    City { city: String, country: String },
}

impl GeocodeRequest {
    /// Free-text form sent to search-style geocoders.
    pub fn query_text(&self) -> String {
        match self {
            GeocodeRequest::Postal {
                postal_code,
                country_code,
            } => format!("{}, {}", postal_code.trim(), country_code.trim()),
            GeocodeRequest::City { city, country } => {
                format!("{}, {}", city.trim(), country.trim())
            }
        }
    }

    pub fn location_type(&self) -> LocationType {
        match self {
            GeocodeRequest::Postal { .. } => LocationType::Postal,
            GeocodeRequest::City { .. } => LocationType::City,
        }
    }

    pub fn location_key(&self) -> String {
        match self {
            GeocodeRequest::Postal {
                postal_code,
                country_code,
            } => normalized_key(&[postal_code, country_code]),
            GeocodeRequest::City { city, country } => normalized_key(&[city, country]),
        }
    }
}

/// A geocoder hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeocodeMatch {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: Option<f64>,
}

/// External forward geocoder. `Ok(None)` means "no match".
///
/// Implementations must bound their own I/O with a timeout and report it as
/// [`ProviderError::Timeout`].
pub trait Geocoder: Send + Sync {
    fn geocode(
        &self,
        request: &GeocodeRequest,
    ) -> std::result::Result<Option<GeocodeMatch>, ProviderError>;
}

/// Coordinates → IANA zone. `None` means "undetermined".
pub trait TimezoneLookup: Send + Sync {
    fn timezone_at(&self, latitude: f64, longitude: f64) -> Option<String>;
}

/// Zone lookup against the static boundary dataset bundled with tzf-rs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundaryTimezoneLookup;

impl TimezoneLookup for BoundaryTimezoneLookup {
    fn timezone_at(&self, latitude: f64, longitude: f64) -> Option<String> {
        static FINDER: OnceLock<DefaultFinder> = OnceLock::new();
        let finder = FINDER.get_or_init(DefaultFinder::new);

        // tzf-rs takes (longitude, latitude).
        let name = finder.get_tz_name(longitude, latitude);
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// Resolves [`LocationInput`]s, consulting the cache for textual forms.
pub struct LocationResolver {
    geocoder: Arc<dyn Geocoder>,
    timezones: Arc<dyn TimezoneLookup>,
    cache: GeocodeCache,
    ttl_seconds: u64,
}

impl LocationResolver {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        timezones: Arc<dyn TimezoneLookup>,
        cache: GeocodeCache,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            geocoder,
            timezones,
            cache,
            ttl_seconds,
        }
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    /// Resolve an input to a validated [`GeoLocation`] with a time zone.
    ///
    /// # Errors
    /// - `InvalidInput` for malformed or out-of-range coordinates
    /// - `GeocodingFailed` when the geocoder finds nothing, errors, or times out
    /// - `TimezoneResolutionFailed` when no zone is known for the coordinates
    pub fn resolve(&self, input: &LocationInput) -> Result<GeoLocation> {
        match input {
            LocationInput::Coordinates { lat, lon } => self.from_coordinates(*lat, *lon, 0.0),
            LocationInput::Gps(gps) => {
                let (lat, lon) = parse_gps(gps)?;
                self.from_coordinates(lat, lon, 0.0)
            }
            LocationInput::PostalCode {
                postal_code,
                country_code,
            } => self.from_text(GeocodeRequest::Postal {
                postal_code: postal_code.clone(),
                country_code: country_code.to_uppercase(),
            }),
            LocationInput::City { city, country } => self.from_text(GeocodeRequest::City {
                city: city.clone(),
                country: country.clone(),
            }),
        }
    }

    /// Look up the IANA zone for validated coordinates.
    pub fn timezone_for(&self, latitude: f64, longitude: f64) -> Result<String> {
        let zone = self.timezones.timezone_at(latitude, longitude).ok_or_else(|| {
            HelioError::TimezoneResolutionFailed(format!(
                "no time zone found for ({}, {})",
                latitude, longitude
            ))
        })?;
        if zone.parse::<chrono_tz::Tz>().is_err() {
            return Err(HelioError::TimezoneResolutionFailed(format!(
                "boundary lookup returned unknown zone '{}' for ({}, {})",
                zone, latitude, longitude
            )));
        }
        debug!(latitude, longitude, timezone = %zone, "resolved time zone");
        Ok(zone)
    }

    fn from_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        elevation_m: f64,
    ) -> Result<GeoLocation> {
        validate_coordinates(latitude, longitude)?;
        let timezone_id = self.timezone_for(latitude, longitude)?;
        Ok(GeoLocation::new(latitude, longitude, elevation_m, timezone_id))
    }

    fn from_text(&self, request: GeocodeRequest) -> Result<GeoLocation> {
        let location_type = request.location_type();
        let location_key = request.location_key();
        let hash = query_hash(location_type, &location_key);

        if let Some(hit) = self.cache.get(&hash) {
            debug!(key = %location_key, "geocode cache hit");
            return Ok(hit);
        }
        debug!(key = %location_key, "geocode cache miss");

        let found = match self.geocoder.geocode(&request) {
            Ok(Some(found)) => found,
            Ok(None) => {
                return Err(HelioError::GeocodingFailed(format!(
                    "no match for '{}'",
                    request.query_text()
                )))
            }
            Err(e) => {
                warn!(query = %request.query_text(), error = %e, "geocoder call failed");
                return Err(HelioError::GeocodingFailed(format!(
                    "geocoder error for '{}': {}",
                    request.query_text(),
                    e
                )));
            }
        };

        validate_coordinates(found.latitude, found.longitude).map_err(|_| {
            HelioError::GeocodingFailed(format!(
                "geocoder returned out-of-range coordinates ({}, {})",
                found.latitude, found.longitude
            ))
        })?;
        let elevation_m = found.elevation_m.filter(|e| e.is_finite() && *e >= 0.0).unwrap_or(0.0);
        let location = self.from_coordinates(found.latitude, found.longitude, elevation_m)?;

        info!(
            query = %request.query_text(),
            latitude = location.latitude,
            longitude = location.longitude,
            timezone = %location.timezone_id,
            "geocoded location"
        );
        self.cache
            .put(&hash, location_type, &location_key, &location, self.ttl_seconds);
        Ok(location)
    }
}
