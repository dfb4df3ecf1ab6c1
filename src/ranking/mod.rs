// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Coupon ranking on top of a loaded ranking session.

mod features;
mod ranker;

pub use features::{
    confidence, extract_features, recency, Coupon, DiscountType, FEATURE_COUNT,
    FREE_SHIPPING_ESTIMATE,
};
pub use ranker::{unranked, CouponRanker, RankedCoupon, FEATURES_INPUT};
