//! Heat index boundary.
//!
//! The pipeline treats the heat index as an injected pure function of
//! temperature (°C) and relative humidity (%). The decoder calls whatever
//! function the session was started with; `rothfusz` below is the default
//! collaborator, implementing the NOAA Rothfusz regression with its
//! documented low-range and boundary adjustments.

/// Injected comfort-index function: `(temp_celsius, relative_humidity_percent) -> index`.
///
/// Must be pure, deterministic, and total over valid input ranges.
pub type HeatIndexFn = fn(f64, f64) -> f64;

/// NOAA Rothfusz heat index regression, in degrees Celsius.
pub fn rothfusz(temp_c: f64, rh: f64) -> f64 {
    let t = temp_c * 9.0 / 5.0 + 32.0;

    // Simple formula first; the full regression only applies to its average
    // with the temperature when that average reaches 80 °F.
    let simple = 0.5 * (t + 61.0 + (t - 68.0) * 1.2 + rh * 0.094);
    if (simple + t) / 2.0 < 80.0 {
        return (simple - 32.0) * 5.0 / 9.0;
    }

    let mut hi = -42.379 + 2.04901523 * t + 10.14333127 * rh
        - 0.22475541 * t * rh
        - 0.00683783 * t * t
        - 0.05481717 * rh * rh
        + 0.00122874 * t * t * rh
        + 0.00085282 * t * rh * rh
        - 0.00000199 * t * t * rh * rh;

    if rh < 13.0 && (80.0..=112.0).contains(&t) {
        hi -= ((13.0 - rh) / 4.0) * ((17.0 - (t - 95.0).abs()) / 17.0).sqrt();
    } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
        hi += ((rh - 85.0) / 10.0) * ((87.0 - t) / 5.0);
    }

    (hi - 32.0) * 5.0 / 9.0
}
