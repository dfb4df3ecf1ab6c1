// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Backend-agnostic tensors exchanged with inference sessions.

use std::collections::HashMap;

use half::f16;

use super::error::InferenceError;

/// Named tensors passed into or returned from a session run.
pub type TensorMap = HashMap<String, Tensor>;

/// Element storage for a tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F16(Vec<f16>),
    I64(Vec<i64>),
}

/// Dense row-major tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    /// Build a tensor, checking the element count against the shape.
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self, InferenceError> {
        let expected: usize = shape.iter().product();
        let actual = match &data {
            TensorData::F32(v) => v.len(),
            TensorData::F16(v) => v.len(),
            TensorData::I64(v) => v.len(),
        };
        if expected != actual {
            return Err(InferenceError::ModelError(format!(
                "tensor shape {:?} needs {} elements, got {}",
                shape, expected, actual
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn from_f32(shape: Vec<usize>, values: Vec<f32>) -> Result<Self, InferenceError> {
        Self::new(shape, TensorData::F32(values))
    }

    pub fn from_i64(shape: Vec<usize>, values: Vec<i64>) -> Result<Self, InferenceError> {
        Self::new(shape, TensorData::I64(values))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the elements out as f32, widening half floats and integers.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match &self.data {
            TensorData::F32(v) => v.clone(),
            TensorData::F16(v) => v.iter().map(|x| x.to_f32()).collect(),
            TensorData::I64(v) => v.iter().map(|&x| x as f32).collect(),
        }
    }

    /// Scores for the final position along the last axis.
    ///
    /// For `[batch, seq, vocab]` logits this is the row the next token is
    /// sampled from.
    pub fn last_row(&self) -> Vec<f32> {
        let width = self.shape.last().copied().unwrap_or(0);
        let values = self.to_f32_vec();
        if width == 0 || values.len() < width {
            return Vec::new();
        }
        values[values.len() - width..].to_vec()
    }
}
