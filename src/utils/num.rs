//! Integer conversions used by stage arguments (`$limit`, `$skip`, `$size`) and by
//! counters. Out-of-range values either saturate or come back as `None`.

#[inline]
#[must_use]
pub fn usize_to_u64(v: usize) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[inline]
#[must_use]
pub fn i64_to_usize(v: i64) -> Option<usize> {
    usize::try_from(v).ok()
}

#[inline]
#[must_use]
pub fn u64_to_usize_saturating(v: u64) -> usize {
    usize::try_from(v).unwrap_or(usize::MAX)
}

/// Saturating float to integer conversion; NaN maps to zero.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f64_to_i64(v: f64) -> i64 {
    // `as` saturates at the bounds and maps NaN to 0.
    v as i64
}

#[inline]
#[must_use]
pub fn u128_to_u64_saturating(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}
