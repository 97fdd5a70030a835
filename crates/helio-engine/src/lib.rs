//! # helio-engine
//!
//! Deterministic sunrise, sunset and twilight computation for any place on Earth.
//!
//! Solar positions come from the NREL Solar Position Algorithm; event times are
//! found by sampling the elevation curve of each local calendar day and refining
//! every threshold crossing. Locations may be given as coordinates, a GPS
//! string, a postal code or a city; textual forms are geocoded once and cached.
//!
//! ## Modules
//!
//! - [`spa`] — topocentric solar zenith and azimuth (NREL SPA)
//! - [`delta_t`] — TT − UT estimate
//! - [`dst`] — local calendar days as UTC windows
//! - [`events`] — sunrise, sunset, twilight and solar noon for one day
//! - [`range`] — one record per day across an inclusive date range
//! - [`location`] — location input validation, geocoding and zone lookup
//! - [`cache`] — TTL cache of geocoding results
//! - [`crosscheck`] — comparison against an external sunrise/sunset provider
//! - [`service`] — [`HelioTime`], the request-level facade
//! - [`config`] — engine settings
//! - [`error`] — Error types
//! - `providers` — HTTP geocoder and providers (feature `http`)

pub mod cache;
pub mod config;
pub mod crosscheck;
pub mod delta_t;
pub mod dst;
pub mod error;
pub mod events;
pub mod location;
#[cfg(feature = "http")]
pub mod providers;
pub mod range;
pub mod service;
pub mod spa;

pub use cache::{GeocodeCache, GeocodeCacheEntry};
pub use config::EngineConfig;
pub use crosscheck::{CrossCheckResult, CrossCheckValidator, SunTimesProvider};
pub use error::HelioError;
pub use events::{sun_events, AltitudeThreshold, DayEventRecord, DayFlags, EventSettings};
pub use location::{GeoLocation, LocationInput, LocationQuery, LocationResolver};
pub use range::{compute_range, SunOptions};
pub use service::{HelioTime, SunRequest, SunResponse};
pub use spa::{solar_position, AtmosphericParams, SolarPosition};
