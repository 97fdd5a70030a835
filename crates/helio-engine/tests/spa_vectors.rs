//! Solar position reference vectors.
//!
//! The primary vector is the worked example of the NREL SPA technical report
//! (Golden, Colorado, 17 October 2003). The others pin down input validation
//! and basic geometric sanity.

use chrono::{DateTime, TimeZone, Utc};
use helio_engine::spa::{julian_century, julian_day, solar_position, solar_position_with_delta_t};
use helio_engine::{AtmosphericParams, GeoLocation, HelioError};

fn golden() -> GeoLocation {
    GeoLocation::new(39.742476, -105.1786, 1830.14, "Etc/GMT+7")
}

fn golden_atmosphere() -> AtmosphericParams {
    AtmosphericParams {
        pressure_hpa: 820.0,
        temperature_c: 11.0,
    }
}

/// 2003-10-17 12:30:30 at UTC−7.
fn golden_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2003, 10, 17, 19, 30, 30).unwrap()
}

// ---------------------------------------------------------------------------
// NREL worked example
// ---------------------------------------------------------------------------

#[test]
fn nrel_reference_zenith_and_azimuth() {
    let pos = solar_position_with_delta_t(&golden_instant(), &golden(), &golden_atmosphere(), 67.0)
        .expect("reference vector should compute");

    assert!(
        (pos.zenith - 50.11162).abs() < 1e-4,
        "zenith {} should be 50.11162",
        pos.zenith
    );
    assert!(
        (pos.azimuth - 194.34024).abs() < 1e-4,
        "azimuth {} should be 194.34024",
        pos.azimuth
    );
}

#[test]
fn nrel_reference_julian_day() {
    let jd = julian_day(&golden_instant());
    assert!((jd - 2452930.312847).abs() < 1e-6, "got {jd}");
}

#[test]
fn julian_day_of_j2000_epoch() {
    let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
    assert_eq!(julian_day(&j2000), 2451545.0);
    assert_eq!(julian_century(2451545.0), 0.0);
}

#[test]
fn elevation_is_complement_of_zenith() {
    let pos = solar_position_with_delta_t(&golden_instant(), &golden(), &golden_atmosphere(), 67.0)
        .unwrap();
    assert!((pos.elevation() + pos.zenith - 90.0).abs() < 1e-12);
    // Refraction lifts the apparent sun above its geometric position.
    assert!(pos.elevation() > pos.geometric_elevation);
}

// ---------------------------------------------------------------------------
// Determinism and refraction
// ---------------------------------------------------------------------------

#[test]
fn identical_inputs_give_bit_identical_output() {
    let a = solar_position(&golden_instant(), &golden(), &golden_atmosphere()).unwrap();
    let b = solar_position(&golden_instant(), &golden(), &golden_atmosphere()).unwrap();
    assert_eq!(a.zenith.to_bits(), b.zenith.to_bits());
    assert_eq!(a.azimuth.to_bits(), b.azimuth.to_bits());
}

#[test]
fn refraction_vanishes_well_below_horizon() {
    // Local midnight at Golden: the sun is far below the horizon.
    let midnight = Utc.with_ymd_and_hms(2003, 10, 18, 7, 0, 0).unwrap();
    let pos =
        solar_position_with_delta_t(&midnight, &golden(), &golden_atmosphere(), 67.0).unwrap();
    assert!(pos.geometric_elevation < -30.0);
    assert!((pos.elevation() - pos.geometric_elevation).abs() < 1e-12);
}

#[test]
fn higher_pressure_means_more_refraction() {
    let thin = AtmosphericParams {
        pressure_hpa: 500.0,
        temperature_c: 15.0,
    };
    let dense = AtmosphericParams {
        pressure_hpa: 1050.0,
        temperature_c: 15.0,
    };
    // Late afternoon, low sun.
    let instant = Utc.with_ymd_and_hms(2003, 10, 17, 23, 45, 0).unwrap();
    let a = solar_position_with_delta_t(&instant, &golden(), &thin, 67.0).unwrap();
    let b = solar_position_with_delta_t(&instant, &golden(), &dense, 67.0).unwrap();
    assert_eq!(a.geometric_elevation, b.geometric_elevation);
    assert!(b.elevation() > a.elevation());
}

#[test]
fn azimuth_is_in_canonical_range() {
    for hour in 0..24 {
        let instant = Utc.with_ymd_and_hms(2025, 3, 20, hour, 0, 0).unwrap();
        let pos = solar_position(&instant, &golden(), &AtmosphericParams::default()).unwrap();
        assert!((0.0..360.0).contains(&pos.azimuth), "hour {hour}: {}", pos.azimuth);
        assert!((0.0..=180.0).contains(&pos.zenith), "hour {hour}: {}", pos.zenith);
    }
}

#[test]
fn midday_sun_is_south_in_northern_mid_latitudes() {
    let noon = Utc.with_ymd_and_hms(2003, 10, 17, 18, 46, 0).unwrap();
    let pos = solar_position(&noon, &golden(), &AtmosphericParams::default()).unwrap();
    assert!((pos.azimuth - 180.0).abs() < 2.0, "got {}", pos.azimuth);
}

// ---------------------------------------------------------------------------
// Validity range
// ---------------------------------------------------------------------------

#[test]
fn year_outside_validity_range_is_invalid_input() {
    let far_future = Utc.with_ymd_and_hms(6001, 1, 1, 0, 0, 0).unwrap();
    let err = solar_position(&far_future, &golden(), &AtmosphericParams::default()).unwrap_err();
    assert!(matches!(err, HelioError::InvalidInput(_)), "got {err:?}");
}

#[test]
fn atmosphere_validation_rejects_nonsense() {
    let bad = AtmosphericParams {
        pressure_hpa: -1.0,
        temperature_c: 15.0,
    };
    assert!(matches!(bad.validate(), Err(HelioError::InvalidInput(_))));

    let cold = AtmosphericParams {
        pressure_hpa: 1013.25,
        temperature_c: -300.0,
    };
    assert!(matches!(cold.validate(), Err(HelioError::InvalidInput(_))));
    assert!(AtmosphericParams::default().validate().is_ok());
}
