//! Solar Position Core: the NREL Solar Position Algorithm (SPA, 2005 revision).
//!
//! Computes the topocentric zenith and azimuth angles of the sun for an
//! instant and an observer, following Reda & Andreas (NREL/TP-560-34302).
//! Stated uncertainty is ±0.0003° for years -2000 to 6000.
//!
//! The computation is a straight chain of pure functions:
//!
//! 1. Julian day, century, ephemeris day/century/millennium
//! 2. Earth heliocentric longitude, latitude and radius vector (L, B, R)
//! 3. Geocentric longitude and latitude (Θ, β)
//! 4. Nutation in longitude and obliquity (Δψ, Δε), true obliquity ε
//! 5. Aberration (Δτ) and apparent sun longitude (λ)
//! 6. Apparent sidereal time at Greenwich (ν)
//! 7. Geocentric right ascension and declination (α, δ)
//! 8. Observer local hour angle (H)
//! 9. Parallax: topocentric right ascension, declination and hour angle
//! 10. Topocentric elevation, refraction correction, zenith (θ)
//! 11. Topocentric azimuth (Φ), measured eastward from north
//!
//! Nothing here allocates, performs I/O or keeps state, so identical inputs
//! always give bit-identical outputs.

mod terms;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::delta_t;
use crate::error::{HelioError, Result};
use crate::location::GeoLocation;
use terms::{B_TERMS, L_TERMS, PE_TERMS, R_TERMS, Y_TERMS};

const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const J2000_JD: f64 = 2_451_545.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_CENTURY: f64 = 36_525.0;

/// Angular radius of the sun in degrees.
pub const SUN_RADIUS: f64 = 0.26667;
/// Standard atmospheric refraction at the horizon in degrees.
pub const ATMOSPHERIC_REFRACTION: f64 = 0.5667;

const EARTH_RADIUS_METERS: f64 = 6_378_140.0;
const EARTH_FLATTENING_FACTOR: f64 = 0.99664719;
const ABERRATION_CONSTANT: f64 = -20.4898;
const PARALLAX_CONSTANT: f64 = 8.794;
const NUTATION_SCALE: f64 = 36_000_000.0;
const HELIOCENTRIC_SCALE: f64 = 1.0e8;

pub const MIN_YEAR: i32 = -2000;
pub const MAX_YEAR: i32 = 6000;

/// Atmospheric conditions used for the refraction correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosphericParams {
    pub pressure_hpa: f64,
    pub temperature_c: f64,
}

impl Default for AtmosphericParams {
    fn default() -> Self {
        Self {
            pressure_hpa: 1013.25,
            temperature_c: 15.0,
        }
    }
}

impl AtmosphericParams {
    /// Reject values outside the range the refraction model accepts.
    pub fn validate(&self) -> Result<()> {
        let pressure = self.pressure_hpa;
        if !pressure.is_finite() || pressure <= 0.0 || pressure > 5000.0 {
            return Err(HelioError::InvalidInput(format!(
                "pressure_hpa {} out of range (0, 5000]",
                self.pressure_hpa
            )));
        }
        let temperature = self.temperature_c;
        if !temperature.is_finite() || temperature <= -273.0 || temperature >= 6000.0 {
            return Err(HelioError::InvalidInput(format!(
                "temperature_c {} out of range (-273, 6000)",
                self.temperature_c
            )));
        }
        Ok(())
    }
}

/// Topocentric position of the sun.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolarPosition {
    /// Topocentric zenith angle in degrees, refraction corrected.
    pub zenith: f64,
    /// Topocentric azimuth in degrees, eastward from north, in [0, 360).
    pub azimuth: f64,
    /// Topocentric elevation in degrees before refraction.
    pub geometric_elevation: f64,
}

impl SolarPosition {
    /// Apparent (refracted) elevation angle in degrees.
    pub fn elevation(&self) -> f64 {
        90.0 - self.zenith
    }
}

/// The time arguments every later stage depends on.
#[derive(Debug, Clone, Copy)]
struct JulianTimes {
    jd: f64,
    jc: f64,
    jce: f64,
    jme: f64,
}

impl JulianTimes {
    fn new(instant: &DateTime<Utc>, delta_t: f64) -> Self {
        let jd = julian_day(instant);
        let jde = jd + delta_t / SECONDS_PER_DAY;
        let jce = (jde - J2000_JD) / DAYS_PER_CENTURY;
        Self {
            jd,
            jc: (jd - J2000_JD) / DAYS_PER_CENTURY,
            jce,
            jme: jce / 10.0,
        }
    }
}

/// Julian day (UT) of an instant, including the fraction of the day.
pub fn julian_day(instant: &DateTime<Utc>) -> f64 {
    let seconds = instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_nanos()) / 1.0e9;
    UNIX_EPOCH_JD + seconds / SECONDS_PER_DAY
}

/// Julian centuries since J2000.0.
pub fn julian_century(julian_day: f64) -> f64 {
    (julian_day - J2000_JD) / DAYS_PER_CENTURY
}

/// Solar position with ΔT estimated from the instant.
pub fn solar_position(
    instant: &DateTime<Utc>,
    location: &GeoLocation,
    atmosphere: &AtmosphericParams,
) -> Result<SolarPosition> {
    solar_position_with_delta_t(instant, location, atmosphere, delta_t::estimate(instant))
}

/// Solar position with an explicit ΔT (TT − UT) in seconds.
///
/// # Errors
/// `InvalidInput` when the instant falls outside years -2000..=6000;
/// `InternalComputation` if the algorithm produces a non-finite angle.
pub fn solar_position_with_delta_t(
    instant: &DateTime<Utc>,
    location: &GeoLocation,
    atmosphere: &AtmosphericParams,
    delta_t: f64,
) -> Result<SolarPosition> {
    let year = instant.year();
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(HelioError::InvalidInput(format!(
            "year {} outside the algorithm's validity range {}..={}",
            year, MIN_YEAR, MAX_YEAR
        )));
    }

    let t = JulianTimes::new(instant, delta_t);

    let l = normalize_degrees(heliocentric(L_TERMS, t.jme).to_degrees());
    let b = heliocentric(B_TERMS, t.jme).to_degrees();
    let r = heliocentric(R_TERMS, t.jme);

    let theta = normalize_degrees(l + 180.0);
    let beta = -b;

    let (delta_psi, delta_epsilon) = nutation(t.jce);
    let epsilon = mean_obliquity(t.jme) / 3600.0 + delta_epsilon;

    let delta_tau = ABERRATION_CONSTANT / (3600.0 * r);
    let lambda = theta + delta_psi + delta_tau;

    let nu = apparent_sidereal_time(t.jd, t.jc, delta_psi, epsilon);

    let (alpha, delta) = geocentric_equatorial(lambda, epsilon, beta);

    let h = normalize_degrees(nu + location.longitude - alpha);

    let (delta_prime, h_prime) = topocentric_equatorial(r, location, delta, h);

    let phi = location.latitude.to_radians();
    let e0 = (phi.sin() * delta_prime.sin() + phi.cos() * delta_prime.cos() * h_prime.cos())
        .asin()
        .to_degrees();
    let e = e0 + refraction_correction(e0, atmosphere);
    let zenith = 90.0 - e;

    let gamma = h_prime
        .sin()
        .atan2(h_prime.cos() * phi.sin() - delta_prime.tan() * phi.cos())
        .to_degrees();
    let azimuth = normalize_degrees(normalize_degrees(gamma) + 180.0);

    if !zenith.is_finite() || !azimuth.is_finite() {
        return Err(HelioError::InternalComputation(format!(
            "non-finite solar position at {} for ({}, {})",
            instant, location.latitude, location.longitude
        )));
    }

    Ok(SolarPosition {
        zenith,
        azimuth,
        geometric_elevation: e0,
    })
}

/// Normalize an angle in degrees into [0, 360).
pub(crate) fn normalize_degrees(degrees: f64) -> f64 {
    let limited = degrees.rem_euclid(360.0);
    if limited >= 360.0 {
        0.0
    } else {
        limited
    }
}

/// Evaluate one of the L/B/R series: a polynomial in JME whose coefficients
/// are sums of periodic terms. Result in radians (L, B) or AU (R).
fn heliocentric(series: &[&[[f64; 3]]], jme: f64) -> f64 {
    let value = series.iter().rev().fold(0.0, |acc, terms| {
        let sum: f64 = terms.iter().map(|[a, b, c]| a * (b + c * jme).cos()).sum();
        acc * jme + sum
    });
    value / HELIOCENTRIC_SCALE
}

fn third_order(a: f64, b: f64, c: f64, d: f64, x: f64) -> f64 {
    ((d * x + c) * x + b) * x + a
}

/// Nutation in longitude and obliquity, both in degrees.
fn nutation(jce: f64) -> (f64, f64) {
    let x = [
        // Mean elongation of the moon from the sun
        third_order(297.85036, 445_267.111480, -0.0019142, 1.0 / 189_474.0, jce),
        // Mean anomaly of the sun
        third_order(357.52772, 35_999.050340, -0.0001603, -1.0 / 300_000.0, jce),
        // Mean anomaly of the moon
        third_order(134.96298, 477_198.867398, 0.0086972, 1.0 / 56_250.0, jce),
        // Moon's argument of latitude
        third_order(93.27191, 483_202.017538, -0.0036825, 1.0 / 327_270.0, jce),
        // Longitude of the ascending node of the moon's orbit
        third_order(125.04452, -1_934.136261, 0.0020708, 1.0 / 450_000.0, jce),
    ];

    let (mut delta_psi, mut delta_epsilon) = (0.0, 0.0);
    for (y, [a, b, c, d]) in Y_TERMS.iter().zip(PE_TERMS.iter()) {
        let argument: f64 = y
            .iter()
            .zip(x.iter())
            .map(|(&yj, &xj)| f64::from(yj) * xj)
            .sum::<f64>()
            .to_radians();
        delta_psi += (a + b * jce) * argument.sin();
        delta_epsilon += (c + d * jce) * argument.cos();
    }

    (delta_psi / NUTATION_SCALE, delta_epsilon / NUTATION_SCALE)
}

/// Mean obliquity of the ecliptic in arcseconds.
fn mean_obliquity(jme: f64) -> f64 {
    const COEFFS: [f64; 11] = [
        84_381.448, -4_680.93, -1.55, 1_999.25, -51.38, -249.67, -39.05, 7.12, 27.87, 5.79, 2.45,
    ];
    let u = jme / 10.0;
    COEFFS.iter().rev().fold(0.0, |acc, &c| acc * u + c)
}

/// Apparent sidereal time at Greenwich in degrees.
fn apparent_sidereal_time(jd: f64, jc: f64, delta_psi: f64, epsilon: f64) -> f64 {
    let nu0 = normalize_degrees(
        280.46061837
            + 360.98564736629 * (jd - J2000_JD)
            + jc * jc * (0.000387933 - jc / 38_710_000.0),
    );
    nu0 + delta_psi * epsilon.to_radians().cos()
}

/// Geocentric right ascension and declination in degrees.
fn geocentric_equatorial(lambda: f64, epsilon: f64, beta: f64) -> (f64, f64) {
    let (lambda, epsilon, beta) = (lambda.to_radians(), epsilon.to_radians(), beta.to_radians());
    let alpha = (lambda.sin() * epsilon.cos() - beta.tan() * epsilon.sin())
        .atan2(lambda.cos())
        .to_degrees();
    let delta = (beta.sin() * epsilon.cos() + beta.cos() * epsilon.sin() * lambda.sin())
        .asin()
        .to_degrees();
    (normalize_degrees(alpha), delta)
}

/// Parallax-corrected declination δ′ and local hour angle H′, both in radians.
fn topocentric_equatorial(r: f64, location: &GeoLocation, delta: f64, h: f64) -> (f64, f64) {
    let xi = (PARALLAX_CONSTANT / (3600.0 * r)).to_radians();
    let phi = location.latitude.to_radians();
    let delta = delta.to_radians();
    let h_rad = h.to_radians();

    let u = (EARTH_FLATTENING_FACTOR * phi.tan()).atan();
    let height = location.elevation_m / EARTH_RADIUS_METERS;
    let x = u.cos() + height * phi.cos();
    let y = EARTH_FLATTENING_FACTOR * u.sin() + height * phi.sin();

    let denominator = delta.cos() - x * xi.sin() * h_rad.cos();
    let delta_alpha = (-x * xi.sin() * h_rad.sin()).atan2(denominator);
    let delta_prime = ((delta.sin() - y * xi.sin()) * delta_alpha.cos()).atan2(denominator);
    let h_prime = h_rad - delta_alpha;

    (delta_prime, h_prime)
}

/// Bennett refraction scaled for pressure and temperature, in degrees.
///
/// Zero once the sun is below the horizon by more than its radius plus the
/// standard horizon refraction.
fn refraction_correction(e0: f64, atmosphere: &AtmosphericParams) -> f64 {
    if e0 < -(SUN_RADIUS + ATMOSPHERIC_REFRACTION) {
        return 0.0;
    }
    (atmosphere.pressure_hpa / 1010.0) * (283.0 / (273.0 + atmosphere.temperature_c)) * 1.02
        / (60.0 * (e0 + 10.3 / (e0 + 5.11)).to_radians().tan())
}
