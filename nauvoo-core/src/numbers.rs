//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Split a non-negative minute amount into whole minutes and the leftover fraction.
///
/// Negative or non-finite input yields `(0, 0.0)`.
#[must_use]
pub fn split_whole_minutes(value: f64) -> (u32, f64) {
    if !value.is_finite() || value <= 0.0 {
        return (0, 0.0);
    }
    let max = cast::<u32, f64>(u32::MAX).unwrap_or(f64::MAX);
    let whole = value.floor().min(max);
    let minutes = cast::<f64, u32>(whole).unwrap_or(0);
    (minutes, value - whole)
}

/// Truncate toward zero into u32, returning 0 for negative or non-finite values.
#[must_use]
pub fn truncate_f32_to_u32(value: f32) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    cast::<f32, u32>(value.trunc()).unwrap_or(u32::MAX)
}

/// Convert a small integer into f32 for rate arithmetic.
#[must_use]
pub fn u8_to_f32(value: u8) -> f32 {
    f32::from(value)
}
