//! Standard normal helpers with stable tails.
//!
//! The censored likelihood needs `ln Φ(z)` and the inverse Mills ratio
//! `φ(z)/Φ(z)` for arguments many standard deviations below zero, where the
//! naive `Φ(z).ln()` underflows to `-inf`.
//!
//! Numerical notes:
//! - `Φ(z)` is computed as `erfc(-z/√2)/2`, which keeps relative precision in
//!   the lower tail down to roughly `z ≈ -37`.
//! - Below that we switch to the asymptotic series
//!   `ln Φ(z) ≈ ln φ(z) - ln(-z) + ln(1 - 1/z² + 3/z⁴ - 15/z⁶ + 105/z⁸)`.
//! - For `z > 5`, `ln Φ(z) = ln1p(-Φ(-z))` avoids rounding `Φ(z)` to 1.

use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::erf::erfc;

use crate::error::AppError;

/// `ln(√(2π))`.
pub const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Below this argument `ln Φ` uses the asymptotic series.
const ASYMPTOTIC_Z: f64 = -37.0;

/// Above this argument `ln Φ` goes through the upper-tail complement.
const UPPER_Z: f64 = 5.0;

pub fn norm_pdf(z: f64) -> f64 {
    ln_norm_pdf(z).exp()
}

pub fn ln_norm_pdf(z: f64) -> f64 {
    -0.5 * z * z - LN_SQRT_2PI
}

pub fn norm_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Stable `ln Φ(z)`.
pub fn ln_norm_cdf(z: f64) -> f64 {
    if z > UPPER_Z {
        return (-norm_cdf(-z)).ln_1p();
    }
    if z > ASYMPTOTIC_Z {
        return norm_cdf(z).ln();
    }
    let z2 = z * z;
    let inv = 1.0 / z2;
    let series = 1.0 - inv * (1.0 - 3.0 * inv * (1.0 - 5.0 * inv * (1.0 - 7.0 * inv)));
    ln_norm_pdf(z) - (-z).ln() + series.ln()
}

/// Inverse Mills ratio `φ(z)/Φ(z)`, finite for every finite `z`.
pub fn inv_mills(z: f64) -> f64 {
    (ln_norm_pdf(z) - ln_norm_cdf(z)).exp()
}

/// Standard normal quantile.
pub fn norm_quantile(p: f64) -> Result<f64, AppError> {
    if !(p > 0.0 && p < 1.0) {
        return Err(AppError::numeric(format!("Normal quantile requested at p={p}.")));
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::numeric(format!("Normal distribution error: {e}")))?;
    Ok(normal.inverse_cdf(p))
}

/// Two-sided p-value of a standard normal statistic.
pub fn two_sided_p(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    (2.0 * norm_cdf(-z.abs())).min(1.0)
}
