//! End-to-end requests through `HelioTime::compute` with in-process collaborators.

use std::sync::Arc;

use chrono::NaiveDate;
use helio_engine::cache::GeocodeCache;
use helio_engine::config::{EngineConfig, Environment};
use helio_engine::crosscheck::{RemoteSunTimes, SunTimesProvider};
use helio_engine::error::ProviderError;
use helio_engine::location::{GeocodeMatch, GeocodeRequest, Geocoder, TimezoneLookup};
use helio_engine::service::ALGORITHM;
use helio_engine::{
    CrossCheckValidator, GeoLocation, HelioError, HelioTime, LocationQuery, LocationResolver,
    SunOptions, SunRequest,
};

struct OsloGeocoder;

impl Geocoder for OsloGeocoder {
    fn geocode(&self, _request: &GeocodeRequest) -> Result<Option<GeocodeMatch>, ProviderError> {
        Ok(Some(GeocodeMatch {
            latitude: 59.9139,
            longitude: 10.7522,
            elevation_m: Some(23.0),
        }))
    }
}

struct Zone(&'static str);

impl TimezoneLookup for Zone {
    fn timezone_at(&self, _latitude: f64, _longitude: f64) -> Option<String> {
        Some(self.0.to_string())
    }
}

/// Reports neither sunrise nor sunset.
struct SilentProvider;

impl SunTimesProvider for SilentProvider {
    fn name(&self) -> &str {
        "silent"
    }

    fn sun_times(
        &self,
        _date: NaiveDate,
        _location: &GeoLocation,
    ) -> Result<RemoteSunTimes, ProviderError> {
        Ok(RemoteSunTimes::default())
    }
}

fn engine(config: EngineConfig, zone: &'static str) -> HelioTime {
    let resolver = LocationResolver::new(
        Arc::new(OsloGeocoder),
        Arc::new(Zone(zone)),
        GeocodeCache::in_memory(),
        config.cache_ttl_seconds,
    );
    HelioTime::new(config, resolver)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn london_request() -> SunRequest {
    SunRequest {
        location: LocationQuery {
            lat: Some(51.5074),
            lon: Some(-0.1278),
            ..LocationQuery::default()
        },
        date: Some(date(2025, 9, 1)),
        ..SunRequest::default()
    }
}

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

#[test]
fn single_date_request_echoes_parameters() {
    let engine = engine(EngineConfig::default(), "Europe/London");
    let response = engine.compute(&london_request()).unwrap();

    assert_eq!(response.days.len(), 1);
    assert_eq!(response.request.timezone, "Europe/London");
    assert_eq!(response.request.algorithm, ALGORITHM);
    assert_eq!(response.request.pressure_hpa, 1013.25);
    assert_eq!(response.request.temperature_c, 15.0);
    assert_eq!(response.request.date, Some(date(2025, 9, 1)));
    assert_eq!(response.request.start_date, None);
    assert!(response.meta.dev_crosscheck.is_none());

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["request"]["algorithm"], "NREL_SPA_2005");
    assert_eq!(json["request"]["date"], "2025-09-01");
    assert!(json["request"].get("start_date").is_none());
    assert!(json["meta"]["computed_in_ms"].is_u64());
    assert!(json["meta"].get("dev_crosscheck").is_none());
}

#[test]
fn range_request_echoes_start_and_end() {
    let request = SunRequest {
        date: None,
        start_date: Some(date(2025, 9, 1)),
        end_date: Some(date(2025, 9, 3)),
        ..london_request()
    };
    let response = engine(EngineConfig::default(), "Europe/London").compute(&request).unwrap();
    assert_eq!(response.days.len(), 3);
    assert_eq!(response.request.date, None);
    assert_eq!(response.request.start_date, Some(date(2025, 9, 1)));
    assert_eq!(response.request.end_date, Some(date(2025, 9, 3)));
}

#[test]
fn no_date_means_today() {
    let request = SunRequest {
        date: None,
        ..london_request()
    };
    let response = engine(EngineConfig::default(), "Europe/London").compute(&request).unwrap();
    assert_eq!(response.days.len(), 1);
    assert!(response.request.date.is_some());
}

#[test]
fn geocoded_elevation_is_used_unless_overridden() {
    let request = SunRequest {
        location: LocationQuery {
            city: Some("Oslo".into()),
            country: Some("Norway".into()),
            ..LocationQuery::default()
        },
        date: Some(date(2025, 9, 1)),
        ..SunRequest::default()
    };
    let engine = engine(EngineConfig::default(), "Europe/Oslo");
    let response = engine.compute(&request).unwrap();
    assert_eq!(response.request.elevation_m, 23.0);
    assert_eq!(response.request.timezone, "Europe/Oslo");

    let overridden = SunRequest {
        options: SunOptions {
            elevation_m: Some(250.0),
            ..SunOptions::default()
        },
        ..request
    };
    assert_eq!(engine.compute(&overridden).unwrap().request.elevation_m, 250.0);
}

#[test]
fn tz_override_bypasses_zone_lookup_for_coordinates() {
    let request = SunRequest {
        options: SunOptions {
            tz: Some("America/New_York".into()),
            ..SunOptions::default()
        },
        ..london_request()
    };
    // The boundary lookup would say "Not/AZone", which would fail.
    let response = engine(EngineConfig::default(), "Not/AZone").compute(&request).unwrap();
    assert_eq!(response.request.timezone, "America/New_York");
    assert_eq!(response.days[0].sunrise.unwrap().offset().local_minus_utc(), -4 * 3600);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn date_and_range_together_are_invalid() {
    let request = SunRequest {
        start_date: Some(date(2025, 9, 1)),
        end_date: Some(date(2025, 9, 2)),
        ..london_request()
    };
    let err = engine(EngineConfig::default(), "Europe/London").compute(&request).unwrap_err();
    assert!(matches!(err, HelioError::InvalidInput(_)));
}

#[test]
fn over_long_range_is_rejected_before_any_work() {
    let request = SunRequest {
        date: None,
        start_date: Some(date(2024, 1, 1)),
        end_date: Some(date(2025, 1, 1)),
        ..london_request()
    };
    let err = engine(EngineConfig::default(), "Europe/London").compute(&request).unwrap_err();
    assert!(matches!(err, HelioError::InvalidInput(_)));
}

// ---------------------------------------------------------------------------
// Cross-check wiring
// ---------------------------------------------------------------------------

#[test]
fn dev_crosscheck_attaches_report_in_dev() {
    let request = SunRequest {
        options: SunOptions {
            dev_crosscheck: true,
            ..SunOptions::default()
        },
        ..london_request()
    };
    let engine = engine(EngineConfig::default(), "Europe/London")
        .with_crosscheck(CrossCheckValidator::new(Arc::new(SilentProvider), 120, false));
    let report = engine.compute(&request).unwrap().meta.dev_crosscheck.expect("report expected");
    assert_eq!(report.provider, "silent");
    assert_eq!(report.days_checked, 1);
    // The provider reports no events, the engine computed both.
    assert_eq!(report.failed_days.len(), 1);
}

#[test]
fn dev_crosscheck_is_ignored_in_prod() {
    let config = EngineConfig {
        environment: Environment::Prod,
        ..EngineConfig::default()
    };
    let request = SunRequest {
        options: SunOptions {
            dev_crosscheck: true,
            ..SunOptions::default()
        },
        ..london_request()
    };
    let validator = CrossCheckValidator::new(Arc::new(SilentProvider), 120, true);
    let engine = engine(config, "Europe/London").with_crosscheck(validator);
    let response = engine.compute(&request).unwrap();
    assert!(response.meta.dev_crosscheck.is_none());
}

#[test]
fn request_deserializes_from_flat_parameters() {
    let request: SunRequest = serde_json::from_str(
        r#"{"lat": 51.5, "lon": -0.12, "date": "2025-09-01", "tz": "UTC", "include_twilight": false}"#,
    )
    .unwrap();
    assert_eq!(request.location.lat, Some(51.5));
    assert_eq!(request.date, Some(date(2025, 9, 1)));
    assert_eq!(request.options.tz.as_deref(), Some("UTC"));
    assert!(!request.options.include_twilight);
}
