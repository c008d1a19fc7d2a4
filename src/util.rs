/// Largest magnitude a float can have while every integer up to it is still exactly
/// representable (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9007199254740991_f64;

pub(crate) const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// The integer value of a number condition or property, if it fits without losing precision.
/// Casting larger floats would silently saturate.
pub(crate) fn f64_to_i64_safe(f: f64) -> Option<i64> {
    if f.abs() <= MAX_SAFE_INTEGER {
        Some(f as i64)
    } else {
        None
    }
}

/// Epoch millis of the UTC midnight at or before `millis`.
pub(crate) fn start_of_utc_day(millis: i64) -> i64 {
    millis - millis.rem_euclid(DAY_MILLIS)
}
