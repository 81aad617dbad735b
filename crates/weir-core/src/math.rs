//! Checked fixed-point helpers shared by both engines.
//!
//! All reward arithmetic multiplies before dividing and truncates, so the
//! accumulators reproduce reference rounding exactly. Overflow is never
//! silently saturated; callers map `None` to their domain's overflow error.

/// `a * b / d` with a checked multiply, truncating.
///
/// Returns `None` on multiplication overflow or when `d == 0`.
///
/// # Examples
///
/// ```
/// use weir_core::math::mul_div;
/// assert_eq!(mul_div(7, 3, 2), Some(10)); // truncates 10.5
/// assert_eq!(mul_div(u128::MAX, 2, 2), None);
/// assert_eq!(mul_div(1, 1, 0), None);
/// ```
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    a.checked_mul(b)?.checked_div(d)
}
