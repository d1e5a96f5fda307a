//! Exact decimal arithmetic for on-chain quantities.
//!
//! Raw token amounts are integers scaled by a per-token decimal exponent.
//! They are converted here into [`BigDecimal`] values without any floating
//! point step, combined through an explicit [`DecimalContext`] and finally
//! rendered as plain decimal strings, the only numeric representation
//! allowed in the snapshot for money, ratios and percentages.

use alloy_primitives::U256;
use bigdecimal::{
    num_bigint::{BigInt, Sign},
    BigDecimal, Zero,
};

use crate::error::DomainError;

/// Working precision, in significant digits, for chained computations.
pub const DEFAULT_PRECISION: u64 = 120;

/// Precision settings applied to divisions and multiplications.
///
/// The context is a plain value passed to every computation that may
/// produce a non-terminating result, so the precision in use is always
/// visible at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalContext {
    precision: u64,
}

impl Default for DecimalContext {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}

impl DecimalContext {
    pub fn new(precision: u64) -> Self {
        Self {
            precision: precision.max(1),
        }
    }

    /// Divide `num` by `den`.
    ///
    /// A terminating quotient is exact and keeps the smallest scale not
    /// below `scale(num) - scale(den)`, so `200 / 1` stays `200` and
    /// `8000 / 10000` is `0.8`. Any other quotient is rounded to the
    /// context precision. Dividing by zero yields zero: every caller
    /// guards its denominators and treats an empty base as a zero ratio.
    pub fn div(&self, num: &BigDecimal, den: &BigDecimal) -> BigDecimal {
        if den.is_zero() {
            return BigDecimal::zero();
        }

        let (n, n_scale) = num.as_bigint_and_exponent();
        let (d, d_scale) = den.as_bigint_and_exponent();
        let ideal_scale = n_scale - d_scale;

        if n.is_zero() {
            return BigDecimal::new(BigInt::zero(), ideal_scale.max(0));
        }

        // Enough extra digits so the quotient carries at least `precision`
        // significant digits whatever the magnitude of the divisor
        let extra = self.precision + digit_count(&d);
        let shifted = n * pow10(extra);
        let quotient = &shifted / &d;
        let remainder = &shifted % &d;
        let scale = ideal_scale + extra as i64;

        if remainder.is_zero() {
            return reduce_to_scale(quotient, scale, ideal_scale);
        }

        // Sticky digit: the exact value lies strictly between the truncated
        // quotient and its successor, keep that information for rounding
        let sticky = if remainder.sign() == Sign::Minus {
            BigInt::from(-1)
        } else {
            BigInt::from(1)
        };
        let value = BigDecimal::new(quotient * BigInt::from(10) + sticky, scale + 1);
        round_half_even(value, self.precision)
    }

    /// Multiply two values, rounding only when the exact product is longer
    /// than the context precision.
    ///
    /// The product keeps the sum of both scales, so `1.000000 * 1` is
    /// `1.000000`.
    pub fn mul(&self, a: &BigDecimal, b: &BigDecimal) -> BigDecimal {
        let (x, x_scale) = a.as_bigint_and_exponent();
        let (y, y_scale) = b.as_bigint_and_exponent();
        self.round(BigDecimal::new(x * y, x_scale + y_scale))
    }

    pub fn round(&self, value: BigDecimal) -> BigDecimal {
        if value.digits() > self.precision {
            round_half_even(value, self.precision)
        } else {
            value
        }
    }
}

/// Build a decimal from a mantissa and a scale: `decimal(105, 2)` is `1.05`.
pub fn decimal(mantissa: i64, scale: i64) -> BigDecimal {
    BigDecimal::new(BigInt::from(mantissa), scale)
}

/// Integer `10^exp` at scale zero, the divisor used to descale protocol values.
pub fn ten_pow(exp: u32) -> BigDecimal {
    BigDecimal::new(pow10(exp as u64), 0)
}

pub fn u256_to_bigint(value: &U256) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>())
}

/// Exact integer value of a 256-bit word.
pub fn from_u256(value: &U256) -> BigDecimal {
    BigDecimal::new(u256_to_bigint(value), 0)
}

/// Convert a raw on-chain amount into token units.
///
/// The result is exact: `raw / 10^decimals` keeps `decimals` fractional
/// digits, so one million raw units of a 6 decimals token is `1.000000`.
/// A non-positive exponent leaves the raw value untouched.
pub fn to_units(raw: &U256, decimals: i64) -> BigDecimal {
    let raw = u256_to_bigint(raw);
    if decimals <= 0 {
        BigDecimal::new(raw, 0)
    } else {
        BigDecimal::new(raw, decimals)
    }
}

/// Render a decimal in plain positional notation.
///
/// Never uses an exponent. A zero value is never signed.
pub fn format_decimal(value: &BigDecimal) -> String {
    let (int, scale) = value.as_bigint_and_exponent();
    let digits = int.magnitude().to_string();

    let body = if int.is_zero() {
        if scale > 0 {
            format!("0.{}", "0".repeat(scale as usize))
        } else {
            "0".to_string()
        }
    } else if scale <= 0 {
        format!("{}{}", digits, "0".repeat(scale.unsigned_abs() as usize))
    } else {
        let scale = scale as usize;
        if digits.len() > scale {
            let (whole, fraction) = digits.split_at(digits.len() - scale);
            format!("{}.{}", whole, fraction)
        } else {
            format!("0.{}{}", "0".repeat(scale - digits.len()), digits)
        }
    };

    if int.sign() == Sign::Minus {
        format!("-{}", body)
    } else {
        body
    }
}

/// Render a non-negative value as an integer string, flooring any fraction.
///
/// Caps and supplies routinely exceed 2^53, so they leave this crate as
/// strings rather than JSON numbers.
pub fn format_uint(value: &BigDecimal) -> Result<String, DomainError> {
    let (int, scale) = value.as_bigint_and_exponent();
    if int.sign() == Sign::Minus {
        return Err(DomainError::NegativeUint(format_decimal(value)));
    }

    let integer = if scale > 0 {
        int / pow10(scale as u64)
    } else {
        int * pow10(scale.unsigned_abs())
    };
    Ok(integer.to_string())
}

// with_prec truncates negative values toward zero, so round the magnitude
fn round_half_even(value: BigDecimal, precision: u64) -> BigDecimal {
    if value.sign() == Sign::Minus {
        -value.abs().with_prec(precision)
    } else {
        value.with_prec(precision)
    }
}

fn pow10(exp: u64) -> BigInt {
    BigInt::from(10u8).pow(exp as u32)
}

fn digit_count(value: &BigInt) -> u64 {
    value.magnitude().to_string().len() as u64
}

// Strip trailing zeros of an exact quotient without going below `min_scale`
fn reduce_to_scale(mut int: BigInt, mut scale: i64, min_scale: i64) -> BigDecimal {
    let ten = BigInt::from(10);
    while scale > min_scale && !int.is_zero() && (&int % &ten).is_zero() {
        int /= &ten;
        scale -= 1;
    }
    BigDecimal::new(int, scale)
}
