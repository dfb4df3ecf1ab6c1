// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Session-backed coupon scoring.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::features::{confidence, extract_features, Coupon, FEATURE_COUNT};
use crate::engine::{InferenceError, InferenceSession, Tensor, TensorMap};
use crate::telemetry;

/// Input tensor name of the ranking graph.
pub const FEATURES_INPUT: &str = "features";

/// A coupon with its model score and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCoupon {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub score: f32,
    pub confidence: f32,
}

/// Scores coupons with a shared ranking session.
pub struct CouponRanker {
    session: Arc<dyn InferenceSession>,
    scores_output: Option<String>,
}

impl CouponRanker {
    pub fn new(session: Arc<dyn InferenceSession>) -> Self {
        Self { session, scores_output: None }
    }

    /// Read scores from a named output instead of the graph's only output.
    pub fn with_scores_output(mut self, name: impl Into<String>) -> Self {
        self.scores_output = Some(name.into());
        self
    }

    /// Score and sort `coupons` for `cart_total`, highest score first.
    pub async fn rank(
        &self,
        coupons: &[Coupon],
        cart_total: f64,
    ) -> Result<Vec<RankedCoupon>, InferenceError> {
        self.rank_at(coupons, cart_total, Utc::now()).await
    }

    /// [`rank`](Self::rank) with an explicit clock.
    pub async fn rank_at(
        &self,
        coupons: &[Coupon],
        cart_total: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedCoupon>, InferenceError> {
        if !cart_total.is_finite() || cart_total < 0.0 {
            return Err(InferenceError::InputValidation(format!(
                "cart total must be a non-negative number, got {}",
                cart_total
            )));
        }
        if coupons.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<f32> = coupons
            .iter()
            .flat_map(|coupon| extract_features(coupon, cart_total, now))
            .collect();
        let mut inputs = TensorMap::new();
        inputs.insert(
            FEATURES_INPUT.to_string(),
            Tensor::from_f32(vec![coupons.len(), FEATURE_COUNT], rows)?,
        );

        let outputs = self.session.run(inputs).await?;
        let scores = self.scores(&outputs, coupons.len())?;

        let mut ranked: Vec<RankedCoupon> = coupons
            .iter()
            .zip(scores)
            .map(|(coupon, raw)| {
                let score = if !coupon.is_eligible(cart_total) || !raw.is_finite() {
                    0.0
                } else {
                    raw.clamp(0.0, 1.0)
                };
                RankedCoupon {
                    coupon: coupon.clone(),
                    score,
                    confidence: confidence(coupon, now),
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        tracing::debug!(count = ranked.len(), cart_total, "coupons ranked");
        Ok(ranked)
    }

    /// Rank, or return the input order with zero scores if ranking fails.
    pub async fn rank_or_unranked(&self, coupons: &[Coupon], cart_total: f64) -> Vec<RankedCoupon> {
        match self.rank(coupons, cart_total).await {
            Ok(ranked) => ranked,
            Err(e) => {
                tracing::warn!(error = %e, "coupon ranking failed, using unranked order");
                telemetry::record_ranking_fallback();
                unranked(coupons)
            }
        }
    }

    fn scores(&self, outputs: &TensorMap, expected: usize) -> Result<Vec<f32>, InferenceError> {
        let tensor = match &self.scores_output {
            Some(name) => outputs.get(name),
            None if outputs.len() == 1 => outputs.values().next(),
            None => outputs.get("scores"),
        }
        .ok_or_else(|| {
            InferenceError::ModelError("ranking session returned no scores output".into())
        })?;

        // One score per coupon: `[n]`, `[n, 1]` or `[1, n]`. Anything wider
        // (per-class outputs) cannot be mapped back to coupons.
        let scores = tensor.to_f32_vec();
        if scores.len() != expected {
            return Err(InferenceError::ModelError(format!(
                "ranking session returned shape {:?} for {} coupons",
                tensor.shape(),
                expected
            )));
        }
        Ok(scores)
    }
}

/// Input order with zero score and confidence.
pub fn unranked(coupons: &[Coupon]) -> Vec<RankedCoupon> {
    coupons
        .iter()
        .map(|coupon| RankedCoupon { coupon: coupon.clone(), score: 0.0, confidence: 0.0 })
        .collect()
}
