//! Time-bounded percentage discounts.

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use catalog_core::{DomainResult, ValidationError, ValueObject};

use crate::money::format_decimal;

/// A percentage discount valid over the half-open window `[starts_at, ends_at)`.
///
/// The percentage is exact (e.g. `25` or `25/2` for 12.5%) and lies in `(0, 100]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Discount {
    percentage: BigRational,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl ValueObject for Discount {}

fn hundred() -> BigRational {
    BigRational::from_integer(BigInt::from(100))
}

impl Discount {
    pub fn new(
        percentage: BigRational,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if percentage.is_zero() || percentage.is_negative() || percentage > hundred() {
            return Err(ValidationError::InvalidDiscountPercent.into());
        }
        if starts_at >= ends_at {
            return Err(ValidationError::InvalidDiscountPeriod.into());
        }
        Ok(Self {
            percentage,
            starts_at,
            ends_at,
        })
    }

    /// Whole-number percentage convenience (`Discount::percent(20, ..)` is 20%).
    pub fn percent(
        percentage: i64,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::new(
            BigRational::from_integer(BigInt::from(percentage)),
            starts_at,
            ends_at,
        )
    }

    /// Start inclusive, end exclusive.
    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        self.starts_at <= instant && instant < self.ends_at
    }

    pub fn percentage(&self) -> &BigRational {
        &self.percentage
    }

    /// Percentage rendered with two decimals, e.g. `"25.00"`.
    pub fn percentage_display(&self) -> String {
        format_decimal(&self.percentage, 2)
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    /// Share of the price a customer still pays: `(100 - percentage) / 100`, in `[0, 1)`.
    pub fn retained_fraction(&self) -> BigRational {
        let hundred = hundred();
        (&hundred - &self.percentage) / hundred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::DomainError;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn valid_discount_covers_its_window() {
        let start = at(2025, 1, 1);
        let end = at(2025, 12, 31);
        let d = Discount::percent(20, start, end).unwrap();

        assert!(d.is_valid_at(at(2025, 6, 1)));
        assert!(d.is_valid_at(start));
        assert!(!d.is_valid_at(at(2024, 6, 1)));
        assert!(!d.is_valid_at(end));
        assert!(d.is_valid_at(end - Duration::nanoseconds(1)));
    }

    #[test]
    fn percentage_must_be_in_range() {
        let start = at(2025, 1, 1);
        let end = start + Duration::days(1);

        for bad in [0, -5, 101] {
            let err = Discount::percent(bad, start, end).unwrap_err();
            assert_eq!(
                err,
                DomainError::Validation(ValidationError::InvalidDiscountPercent)
            );
        }

        assert!(Discount::percent(100, start, end).is_ok());
        let fractional = BigRational::new(BigInt::from(25), BigInt::from(2));
        let d = Discount::new(fractional, start, end).unwrap();
        assert_eq!(d.percentage_display(), "12.50");
    }

    #[test]
    fn period_must_be_forward() {
        let now = at(2025, 3, 1);
        for end in [now, now - Duration::hours(1)] {
            let err = Discount::percent(10, now, end).unwrap_err();
            assert_eq!(
                err,
                DomainError::Validation(ValidationError::InvalidDiscountPeriod)
            );
        }
    }

    #[test]
    fn retained_fraction_is_complement() {
        let d = Discount::percent(25, at(2025, 1, 1), at(2025, 2, 1)).unwrap();
        assert_eq!(
            d.retained_fraction(),
            BigRational::new(BigInt::from(3), BigInt::from(4))
        );

        let full = Discount::percent(100, at(2025, 1, 1), at(2025, 2, 1)).unwrap();
        assert!(full.retained_fraction().is_zero());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: validity is exactly `start <= t < end`.
            #[test]
            fn validity_is_half_open(
                start_secs in 0i64..1_000_000,
                len in 1i64..1_000_000,
                probe in -10i64..2_000_010,
            ) {
                let base = at(2025, 1, 1);
                let start = base + Duration::seconds(start_secs);
                let end = start + Duration::seconds(len);
                let t = base + Duration::seconds(probe);

                let d = Discount::percent(10, start, end).unwrap();
                prop_assert_eq!(d.is_valid_at(t), start <= t && t < end);
                prop_assert!(!d.is_valid_at(end));
            }
        }
    }
}
