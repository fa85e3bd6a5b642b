//! Exact monetary amounts.
//!
//! Amounts are arbitrary-precision rationals end to end; nothing here touches floating
//! point. Two decimal places are only introduced when rendering.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use catalog_core::{DomainError, DomainResult, ValidationError, ValueObject};

/// Non-negative exact amount of currency.
///
/// Equality is by value: `Money::new(10, 1)` equals `Money::new(1000, 100)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    amount: BigRational,
}

impl ValueObject for Money {}

impl Money {
    /// Build `numerator / denominator`.
    pub fn new(numerator: i64, denominator: i64) -> DomainResult<Self> {
        Self::from_parts(BigInt::from(numerator), BigInt::from(denominator))
    }

    /// Build from an arbitrary-precision numerator/denominator pair (e.g. a stored row).
    pub fn from_parts(numerator: BigInt, denominator: BigInt) -> DomainResult<Self> {
        if denominator.is_zero() {
            return Err(DomainError::arithmetic("money: denominator cannot be zero"));
        }
        Self::from_rational(BigRational::new(numerator, denominator))
    }

    pub fn from_rational(amount: BigRational) -> DomainResult<Self> {
        if amount.denom().is_zero() {
            return Err(DomainError::arithmetic("money: denominator cannot be zero"));
        }
        if amount.is_negative() {
            return Err(ValidationError::InvalidPrice.into());
        }
        Ok(Self { amount })
    }

    pub fn zero() -> Self {
        Self {
            amount: BigRational::zero(),
        }
    }

    /// Construct without the sign check. Callers must guarantee `amount >= 0`.
    pub(crate) fn from_non_negative(amount: BigRational) -> Self {
        debug_assert!(!amount.is_negative());
        Self { amount }
    }

    pub fn amount(&self) -> &BigRational {
        &self.amount
    }

    /// Reduced numerator, for lossless persistence.
    pub fn numerator(&self) -> &BigInt {
        self.amount.numer()
    }

    /// Reduced (positive) denominator, for lossless persistence.
    pub fn denominator(&self) -> &BigInt {
        self.amount.denom()
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// `self * factor`. Fails with `InvalidPrice` if the result would be negative.
    pub fn multiply(&self, factor: &BigRational) -> DomainResult<Self> {
        Self::from_rational(&self.amount * factor)
    }

    /// `self - other`. Fails with `InvalidPrice` if the result would be negative.
    pub fn subtract(&self, other: &Money) -> DomainResult<Self> {
        Self::from_rational(&self.amount - &other.amount)
    }

    /// Fixed two-decimal rendering, e.g. `"19.99"`.
    pub fn format(&self) -> String {
        format_decimal(&self.amount, 2)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.format())
    }
}

/// Render a rational with a fixed number of decimal places.
///
/// The last digit is rounded to nearest, halves away from zero.
pub fn format_decimal(value: &BigRational, places: u32) -> String {
    let scale = BigInt::from(10u32).pow(places);
    let scaled = (value * &BigRational::from_integer(scale.clone()))
        .round()
        .to_integer();

    let mut out = String::new();
    if scaled.is_negative() {
        out.push('-');
    }
    let digits = scaled.abs();
    out.push_str(&(&digits / &scale).to_string());
    if places > 0 {
        let fraction = (&digits % &scale).to_string();
        out.push('.');
        out.push_str(&format!("{fraction:0>width$}", width = places as usize));
    }
    out
}
