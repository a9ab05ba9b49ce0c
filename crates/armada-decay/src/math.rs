//! Pure fixed-point decay math at WAD (10^18) precision.
//!
//! No state, no side effects. All intermediates use u128 for overflow
//! safety; all results round down. Decay factors are clamped into
//! `[0, WAD]` — out-of-range inputs are treated as WAD, never wrapped.

use armada_core::constants::WAD;
use armada_core::error::DecayError;

/// Multiply-then-divide with a u128 intermediate, rounding down.
///
/// # Errors
///
/// - [`DecayError::DivisionByZero`] if `denominator` is zero
/// - [`DecayError::ArithmeticOverflow`] if the result exceeds `u64::MAX`
pub fn mul_div(a: u64, b: u64, denominator: u64) -> Result<u64, DecayError> {
    if denominator == 0 {
        return Err(DecayError::DivisionByZero);
    }
    let wide = a as u128 * b as u128 / denominator as u128;
    u64::try_from(wide).map_err(|_| DecayError::ArithmeticOverflow)
}

/// Like [`mul_div`] but rounding up. Used where rounding down would favor
/// the caller over the pool (share burns).
///
/// # Errors
///
/// Same as [`mul_div`].
pub fn mul_div_up(a: u64, b: u64, denominator: u64) -> Result<u64, DecayError> {
    if denominator == 0 {
        return Err(DecayError::DivisionByZero);
    }
    let d = denominator as u128;
    let wide = (a as u128 * b as u128 + d - 1) / d;
    u64::try_from(wide).map_err(|_| DecayError::ArithmeticOverflow)
}

/// Fixed-point exponentiation: computes `(base/precision)^exp` in fixed-point.
///
/// Uses binary exponentiation for O(log n) multiplications.
/// `base` and return value are in fixed-point with `precision` as denominator.
pub fn fixed_pow(base: u64, exp: u64, precision: u64) -> Result<u64, DecayError> {
    if precision == 0 {
        return Err(DecayError::DivisionByZero);
    }
    if exp == 0 {
        return Ok(precision); // (base/precision)^0 = 1.0
    }

    let p = precision as u128;
    let mut result: u128 = p;
    let mut b: u128 = base as u128;
    let mut e = exp;

    while e > 0 {
        if e & 1 == 1 {
            result = result
                .checked_mul(b)
                .ok_or(DecayError::ArithmeticOverflow)?
                / p;
        }
        e >>= 1;
        if e > 0 {
            b = b
                .checked_mul(b)
                .ok_or(DecayError::ArithmeticOverflow)?
                / p;
        }
    }

    u64::try_from(result).map_err(|_| DecayError::ArithmeticOverflow)
}

/// Linear decay: `current - rate_per_second * elapsed`, saturating at zero.
///
/// `current` above WAD is clamped to WAD before decaying. Never returns a
/// value outside `[0, WAD]`.
pub fn linear_decay(current: u64, rate_per_second: u64, elapsed: u64) -> u64 {
    let current = current.min(WAD);
    let total = rate_per_second as u128 * elapsed as u128;
    if total >= current as u128 {
        0
    } else {
        current - total as u64
    }
}

/// Exponential decay: `current * (1 - rate)^elapsed`, compounding per second.
///
/// `retention = (WAD - rate_per_second)` is raised to `elapsed` via
/// [`fixed_pow`], rounding down. A rate at or above WAD decays fully in one
/// second. Never returns a value outside `[0, WAD]`.
///
/// # Errors
///
/// [`DecayError::ArithmeticOverflow`] if the power computation overflows.
pub fn exponential_decay(
    current: u64,
    rate_per_second: u64,
    elapsed: u64,
) -> Result<u64, DecayError> {
    let current = current.min(WAD);
    if elapsed == 0 || rate_per_second == 0 {
        return Ok(current);
    }
    if rate_per_second >= WAD {
        return Ok(0);
    }

    let retention = WAD - rate_per_second;
    let retention_total = fixed_pow(retention, elapsed, WAD)?;
    mul_div(current, retention_total, WAD)
}
