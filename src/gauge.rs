//! Market-position gauge.
//!
//! Places a price between the market minimum and maximum reported by the
//! backend, as a percentage in `[0, 100]` that the view layer uses to draw
//! the marker on the min–max bar.
//!
//! ```rust
//! use setu_client::gauge::position;
//!
//! assert_eq!(position(Some(100.0), Some(300.0), Some(200.0)), 50.0);
//! assert_eq!(position(Some(100.0), Some(300.0), Some(900.0)), 100.0);
//! assert_eq!(position(None, Some(300.0), Some(200.0)), 50.0);
//! ```

/// Value returned whenever the inputs cannot place the marker.
pub const NEUTRAL_POSITION: f64 = 50.0;

/// Zero, absent and non-finite inputs count as "no data".
fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// Normalised position of `current` between `min` and `max`.
///
/// Returns [`NEUTRAL_POSITION`] when any input is missing or zero, and when
/// `min == max`.  Every other result is clamped to `[0, 100]`.
pub fn position(min: Option<f64>, max: Option<f64>, current: Option<f64>) -> f64 {
    let (Some(min), Some(max), Some(current)) = (usable(min), usable(max), usable(current))
    else {
        return NEUTRAL_POSITION;
    };

    let span = max - min;
    if span == 0.0 {
        return NEUTRAL_POSITION;
    }

    let pct = (current - min) / span * 100.0;
    if !pct.is_finite() {
        return NEUTRAL_POSITION;
    }
    pct.clamp(0.0, 100.0)
}
