// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Coupon records and ranking feature extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of features per coupon row.
pub const FEATURE_COUNT: usize = 8;

/// Shipping value credited to free-shipping coupons, in cart currency.
pub const FREE_SHIPPING_ESTIMATE: f64 = 5.99;

/// Verification age, in days, at which recency decays to `1/e`.
pub const RECENCY_HALF_LIFE_DAYS: f64 = 30.0;

/// Expiry horizon, in days, beyond which a coupon counts as non-urgent.
pub const EXPIRY_HORIZON_DAYS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
    FreeShipping,
}

/// A candidate coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub discount_type: DiscountType,
    /// Percent (0-100) for percentage coupons, currency amount for fixed ones.
    #[serde(default)]
    pub discount_value: f64,
    /// Historical success rate in `[0, 1]`.
    #[serde(default)]
    pub success_rate: f64,
    pub last_verified_ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_purchase: Option<f64>,
}

impl Coupon {
    /// Estimated savings against `cart_total`, never negative or above the cart.
    pub fn estimated_savings(&self, cart_total: f64) -> f64 {
        let raw = match self.discount_type {
            DiscountType::Percentage => cart_total * self.discount_value / 100.0,
            DiscountType::Fixed => self.discount_value,
            DiscountType::FreeShipping => FREE_SHIPPING_ESTIMATE,
        };
        if raw.is_finite() {
            raw.clamp(0.0, cart_total.max(0.0))
        } else {
            0.0
        }
    }

    /// Whether the cart meets this coupon's minimum purchase.
    pub fn is_eligible(&self, cart_total: f64) -> bool {
        self.minimum_purchase.map_or(true, |minimum| minimum <= cart_total)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

/// `exp(-age / half-life)` over the verification age. Future timestamps count as fresh.
pub fn recency(coupon: &Coupon, now: DateTime<Utc>) -> f64 {
    let age_days = (now - coupon.last_verified_ts).num_seconds().max(0) as f64 / 86_400.0;
    (-age_days / RECENCY_HALF_LIFE_DAYS).exp()
}

fn unit(value: f64) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Feature row for one (coupon, cart total) pair.
///
/// Layout: discount-type one-hot (3), savings ratio, success rate, recency,
/// time to expiry, eligibility. Every value is in `[0, 1]`.
pub fn extract_features(coupon: &Coupon, cart_total: f64, now: DateTime<Utc>) -> [f32; FEATURE_COUNT] {
    let savings_ratio = if cart_total > 0.0 {
        coupon.estimated_savings(cart_total) / cart_total
    } else {
        0.0
    };

    let expiry = match coupon.expires_at {
        None => 1.0,
        Some(_) if coupon.is_expired(now) => 0.0,
        Some(expires) => {
            (expires - now).num_seconds() as f64 / 86_400.0 / EXPIRY_HORIZON_DAYS
        }
    };

    [
        unit(f64::from(u8::from(coupon.discount_type == DiscountType::Percentage))),
        unit(f64::from(u8::from(coupon.discount_type == DiscountType::Fixed))),
        unit(f64::from(u8::from(coupon.discount_type == DiscountType::FreeShipping))),
        unit(savings_ratio),
        unit(coupon.success_rate),
        unit(recency(coupon, now)),
        unit(expiry),
        unit(f64::from(u8::from(coupon.is_eligible(cart_total)))),
    ]
}

/// Trust in a coupon working: success rate weighted toward recent verification.
pub fn confidence(coupon: &Coupon, now: DateTime<Utc>) -> f32 {
    let success = if coupon.success_rate.is_finite() {
        coupon.success_rate.clamp(0.0, 1.0)
    } else {
        0.0
    };
    unit(success * (0.5 + 0.5 * recency(coupon, now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(discount_type: DiscountType, value: f64) -> Coupon {
        Coupon {
            id: "c".into(),
            code: None,
            discount_type,
            discount_value: value,
            success_rate: 0.8,
            last_verified_ts: Utc::now(),
            expires_at: None,
            minimum_purchase: None,
        }
    }

    #[test]
    fn test_savings_by_type() {
        assert!((coupon(DiscountType::Percentage, 20.0).estimated_savings(100.0) - 20.0).abs() < 1e-9);
        assert!((coupon(DiscountType::Fixed, 15.0).estimated_savings(100.0) - 15.0).abs() < 1e-9);
        assert!((coupon(DiscountType::FreeShipping, 0.0).estimated_savings(100.0) - 5.99).abs() < 1e-9);
        assert_eq!(coupon(DiscountType::Fixed, 500.0).estimated_savings(100.0), 100.0);
    }

    #[test]
    fn test_features_in_unit_range() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Fixed, 10.0);
        c.expires_at = Some(now + Duration::days(3));
        c.minimum_purchase = Some(200.0);

        let features = extract_features(&c, 100.0, now);
        assert_eq!(features[1], 1.0);
        assert_eq!(features[0] + features[2], 0.0);
        assert!((features[3] - 0.1).abs() < 1e-6);
        assert_eq!(features[7], 0.0);
        assert!(features.iter().all(|f| (0.0..=1.0).contains(f)));
    }

    #[test]
    fn test_confidence_decays_with_age() {
        let now = Utc::now();
        let fresh = coupon(DiscountType::Percentage, 10.0);
        let mut stale = fresh.clone();
        stale.last_verified_ts = now - Duration::days(90);
        assert!(confidence(&fresh, now) > confidence(&stale, now));
        assert!(confidence(&stale, now) >= 0.4);
    }
}
