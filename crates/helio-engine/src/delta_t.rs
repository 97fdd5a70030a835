//! ΔT = TT − UT estimate in seconds.
//!
//! Piecewise polynomials of Espenak & Meeus (NASA Five Millennium Canon of
//! Solar Eclipses, 2006), evaluated at the decimal year `year + (month − 0.5) / 12`.
//! ΔT only shifts the ephemeris time used for the sun's orbital position, so
//! an error of a few seconds moves event times by far less than a second.

use chrono::{DateTime, Datelike, Utc};

/// Estimated ΔT for the instant.
pub fn estimate(instant: &DateTime<Utc>) -> f64 {
    let y = f64::from(instant.year()) + (f64::from(instant.month()) - 0.5) / 12.0;
    for_decimal_year(y)
}

/// Estimated ΔT for a decimal year.
pub fn for_decimal_year(y: f64) -> f64 {
    if y < -500.0 {
        long_term(y)
    } else if y < 500.0 {
        let u = y / 100.0;
        poly(
            u,
            &[10583.6, -1014.41, 33.78311, -5.952053, -0.1798452, 0.022174192, 0.0090316521],
        )
    } else if y < 1600.0 {
        let u = (y - 1000.0) / 100.0;
        poly(
            u,
            &[1574.2, -556.01, 71.23472, 0.319781, -0.8503463, -0.005050998, 0.0083572073],
        )
    } else if y < 1700.0 {
        let t = y - 1600.0;
        poly(t, &[120.0, -0.9808, -0.01532, 1.0 / 7129.0])
    } else if y < 1800.0 {
        let t = y - 1700.0;
        poly(t, &[8.83, 0.1603, -0.0059285, 0.00013336, -1.0 / 1_174_000.0])
    } else if y < 1860.0 {
        let t = y - 1800.0;
        poly(
            t,
            &[
                13.72,
                -0.332447,
                0.0068612,
                0.0041116,
                -0.00037436,
                0.0000121272,
                -0.0000001699,
                0.000000000875,
            ],
        )
    } else if y < 1900.0 {
        let t = y - 1860.0;
        poly(
            t,
            &[7.62, 0.5737, -0.251754, 0.01680668, -0.0004473624, 1.0 / 233_174.0],
        )
    } else if y < 1920.0 {
        let t = y - 1900.0;
        poly(t, &[-2.79, 1.494119, -0.0598939, 0.0061966, -0.000197])
    } else if y < 1941.0 {
        let t = y - 1920.0;
        poly(t, &[21.20, 0.84493, -0.076100, 0.0020936])
    } else if y < 1961.0 {
        let t = y - 1950.0;
        poly(t, &[29.07, 0.407, -1.0 / 233.0, 1.0 / 2547.0])
    } else if y < 1986.0 {
        let t = y - 1975.0;
        poly(t, &[45.45, 1.067, -1.0 / 260.0, -1.0 / 718.0])
    } else if y < 2005.0 {
        let t = y - 2000.0;
        poly(
            t,
            &[63.86, 0.3345, -0.060374, 0.0017275, 0.000651814, 0.00002373599],
        )
    } else if y < 2050.0 {
        let t = y - 2000.0;
        poly(t, &[62.92, 0.32217, 0.005589])
    } else if y < 2150.0 {
        long_term(y) - 0.5628 * (2150.0 - y)
    } else {
        long_term(y)
    }
}

fn long_term(y: f64) -> f64 {
    let u = (y - 1820.0) / 100.0;
    -20.0 + 32.0 * u * u
}

/// Horner evaluation, coefficients in ascending order.
fn poly(x: f64, coeffs: &[f64]) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn delta_t_2000() {
        // Observed value 63.8 s.
        let dt = for_decimal_year(2000.0);
        assert!((dt - 63.86).abs() < 0.01, "got {dt}");
    }

    #[test]
    fn delta_t_recent_is_plausible() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let dt = estimate(&instant);
        assert!((65.0..80.0).contains(&dt), "got {dt}");
    }

    #[test]
    fn delta_t_is_continuous_at_2050() {
        let before = for_decimal_year(2049.999);
        let after = for_decimal_year(2050.0);
        assert!((before - after).abs() < 1.0, "{before} vs {after}");
    }

    #[test]
    fn delta_t_ancient_grows_quadratically() {
        assert!(for_decimal_year(-1500.0) > for_decimal_year(-1000.0));
    }
}
