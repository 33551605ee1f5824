//! Safe ratio helpers.
//!
//! All division operations are safe against zero denominators and produce
//! `None` (rendered as JSON `null`) rather than NaN / Infinity. "Undefined"
//! is never folded into `0.0`.

/// Round to 2 decimal places: `(v * 100.0).round() / 100.0`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Safe division returning `None` when the denominator is zero.
pub fn safe_div(numerator: i64, denominator: i64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

/// Percentage rounded to 2 decimals, `None` when the denominator is zero.
pub fn safe_pct(numerator: i64, denominator: i64) -> Option<f64> {
    safe_div(numerator, denominator).map(|ratio| round2(ratio * 100.0))
}

/// Percentage of a wide total, `None` when the total is zero.
pub fn share_pct(part: i64, total: i128) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some(round2(part as f64 / total as f64 * 100.0))
    }
}

/// `revenue - quantity * unit_cost`, `None` on overflow.
pub fn profit(revenue: i64, quantity: i64, unit_cost: i64) -> Option<i64> {
    quantity
        .checked_mul(unit_cost)
        .and_then(|cost| revenue.checked_sub(cost))
}

/// Sum that reports overflow as `None` instead of panicking.
pub fn checked_total(values: impl IntoIterator<Item = i64>) -> Option<i64> {
    values
        .into_iter()
        .try_fold(0_i64, |acc, v| acc.checked_add(v))
}

/// Drop non-finite floats that SQLite may hand back for degenerate AVGs.
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
