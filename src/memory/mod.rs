// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-generation memory for couponlm.
//!
//! Holds the attention key/value cache a generation loop carries between
//! decode steps.

mod kv_cache;

pub use kv_cache::{KvCache, KvNaming};
