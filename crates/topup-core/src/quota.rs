//! Currency-to-quota conversion.
//!
//! Quota is a dimensionless integer. Payments arrive in minor currency units
//! (cents); `quota_per_unit` is the number of quota units bought by one major
//! unit (one dollar).

/// Default quota bought by one major currency unit.
pub const DEFAULT_QUOTA_PER_UNIT: f64 = 500_000.0;

/// Minor units per major currency unit.
const MINOR_UNITS_PER_MAJOR: f64 = 100.0;

/// Convert a minor-unit amount to quota, truncating toward zero.
///
/// Float-to-integer casts saturate, so out-of-range products clamp to
/// `i64::MIN`/`i64::MAX` instead of wrapping, and a NaN product yields 0.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn to_quota(minor_amount: i64, quota_per_unit: f64) -> i64 {
    if minor_amount == 0 {
        return 0;
    }
    let quota = (minor_amount as f64 / MINOR_UNITS_PER_MAJOR * quota_per_unit).trunc();
    quota as i64
}

/// Render a quota amount for humans.
///
/// With `in_currency` the value is shown as major currency units
/// (`$2.500000`), otherwise as raw points.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_quota(quota: i64, quota_per_unit: f64, in_currency: bool) -> String {
    if in_currency && quota_per_unit > 0.0 {
        format!("${:.6}", quota as f64 / quota_per_unit)
    } else {
        format!("{quota} quota points")
    }
}

/// Whether `rate` is usable as a conversion rate.
#[must_use]
pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_fractional_major_units() {
        assert_eq!(to_quota(250, 1.0), 2);
        assert_eq!(to_quota(299, 1.0), 2);
        assert_eq!(to_quota(100, 1.0), 1);
        assert_eq!(to_quota(99, 1.0), 0);
    }

    #[test]
    fn zero_amount_is_zero_for_any_rate() {
        for rate in [0.0, 1.0, 500_000.0, f64::MAX, f64::INFINITY, f64::NAN] {
            assert_eq!(to_quota(0, rate), 0);
        }
    }

    #[test]
    fn default_rate_matches_pricing() {
        // $10.00 at the default rate buys 5,000,000 quota.
        assert_eq!(to_quota(1000, DEFAULT_QUOTA_PER_UNIT), 5_000_000);
    }

    #[test]
    fn negative_amount_truncates_toward_zero() {
        assert_eq!(to_quota(-250, 1.0), -2);
    }

    #[test]
    fn huge_products_saturate_without_sign_flip() {
        let quota = to_quota(i64::MAX, DEFAULT_QUOTA_PER_UNIT);
        assert_eq!(quota, i64::MAX);
        assert!(to_quota(i64::MIN, DEFAULT_QUOTA_PER_UNIT) < 0);
    }

    #[test]
    fn never_exceeds_mathematical_product() {
        for amount in [1_i64, 7, 250, 12_345, 9_999_999] {
            let rate = 3.7;
            #[allow(clippy::cast_precision_loss)]
            let exact = amount as f64 / 100.0 * rate;
            #[allow(clippy::cast_precision_loss)]
            let converted = to_quota(amount, rate) as f64;
            assert!(converted <= exact);
            assert!(exact - converted < 1.0);
        }
    }

    #[test]
    fn formats_currency_and_points() {
        assert_eq!(format_quota(1_000_000, 500_000.0, true), "$2.000000");
        assert_eq!(format_quota(1_000_000, 500_000.0, false), "1000000 quota points");
    }

    #[test]
    fn rate_validation() {
        assert!(is_valid_rate(500_000.0));
        assert!(!is_valid_rate(0.0));
        assert!(!is_valid_rate(-1.0));
        assert!(!is_valid_rate(f64::NAN));
        assert!(!is_valid_rate(f64::INFINITY));
    }
}
