// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-generation KV cache.
//!
//! Holds the attention cache tensors a decoder returned on its last forward
//! pass, renamed to the input names the next pass expects. One cache belongs
//! to exactly one generation and is never shared.

use crate::engine::{Tensor, TensorMap};

/// Tensor naming used to carry cache state between forward passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvNaming {
    /// Output prefix holding fresh cache tensors (e.g. `present.0.key`).
    pub present_prefix: String,
    /// Input prefix the next pass reads them from (e.g. `past_key_values.0.key`).
    pub past_prefix: String,
}

impl Default for KvNaming {
    fn default() -> Self {
        Self {
            present_prefix: "present".to_string(),
            past_prefix: "past_key_values".to_string(),
        }
    }
}

/// Incremental decode state for one generation.
#[derive(Debug, Default)]
pub struct KvCache {
    naming: KvNaming,
    tensors: TensorMap,
    seq_len: usize,
}

impl KvCache {
    pub fn new(naming: KvNaming) -> Self {
        Self {
            naming,
            tensors: TensorMap::new(),
            seq_len: 0,
        }
    }

    /// Replace the cache with the `present*` tensors of a forward pass that
    /// consumed `new_tokens` positions.
    ///
    /// Returns the number of cache tensors captured.
    pub fn absorb(&mut self, outputs: &TensorMap, new_tokens: usize) -> usize {
        self.tensors.clear();
        for (name, tensor) in outputs {
            if let Some(rest) = name.strip_prefix(self.naming.present_prefix.as_str()) {
                let past_name = format!("{}{}", self.naming.past_prefix, rest);
                self.tensors.insert(past_name, tensor.clone());
            }
        }
        self.seq_len += new_tokens;
        self.tensors.len()
    }

    /// Copy the cache tensors into the inputs of the next forward pass.
    pub fn feed(&self, inputs: &mut TensorMap) {
        for (name, tensor) in &self.tensors {
            inputs.insert(name.clone(), tensor.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Positions already covered by the cache.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// True when nothing is retained, including after a prefill that
    /// produced no cache tensors.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty() && self.seq_len == 0
    }

    /// Drop all retained state.
    pub fn clear(&mut self) {
        self.tensors.clear();
        self.seq_len = 0;
    }
}
