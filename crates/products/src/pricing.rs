//! Effective price calculation.

use chrono::{DateTime, Utc};

use crate::discount::Discount;
use crate::money::Money;

/// Base price adjusted by `discount` if it is active at `now`; otherwise `base` unchanged.
///
/// Pure: the inputs are never modified.
pub fn effective_price(base: &Money, discount: Option<&Discount>, now: DateTime<Utc>) -> Money {
    match discount {
        Some(d) if d.is_valid_at(now) => {
            // The discount invariant keeps the factor in [0, 1), so the result stays >= 0.
            Money::from_non_negative(base.amount() * d.retained_fraction())
        }
        _ => base.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn no_discount_returns_base() {
        let base = Money::new(10000, 100).unwrap();
        assert_eq!(effective_price(&base, None, now()), base);
    }

    #[test]
    fn active_discount_reduces_price() {
        let base = Money::new(10000, 100).unwrap();
        let d = Discount::percent(20, now() - Duration::hours(1), now() + Duration::hours(24))
            .unwrap();
        assert_eq!(effective_price(&base, Some(&d), now()).format(), "80.00");
    }

    #[test]
    fn expired_discount_is_ignored() {
        let base = Money::new(10000, 100).unwrap();
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 12, 31, 0, 0, 0).unwrap();
        let d = Discount::percent(20, start, end).unwrap();
        assert_eq!(effective_price(&base, Some(&d), now()).format(), "100.00");
    }

    #[test]
    fn discount_ending_now_is_ignored() {
        let base = Money::new(4999, 100).unwrap();
        let d = Discount::percent(25, now() - Duration::hours(1), now()).unwrap();
        assert_eq!(effective_price(&base, Some(&d), now()), base);
    }

    #[test]
    fn quarter_off_keeps_exact_value() {
        let base = Money::new(4999, 100).unwrap();
        let d = Discount::percent(25, now() - Duration::hours(1), now() + Duration::hours(1))
            .unwrap();
        let price = effective_price(&base, Some(&d), now());
        assert_eq!(price, Money::new(149_970, 4000).unwrap());
        assert_eq!(price.format(), "37.49");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: an active discount never raises the price and never goes negative.
            #[test]
            fn discounted_price_is_bounded(cents in 0i64..10_000_000, pct in 1i64..=100) {
                let base = Money::new(cents, 100).unwrap();
                let d = Discount::percent(pct, now() - Duration::hours(1), now() + Duration::hours(1))
                    .unwrap();
                let price = effective_price(&base, Some(&d), now());
                prop_assert!(price <= base);
                prop_assert!(price >= Money::zero());
            }
        }
    }
}
