// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Execution provider selection.
//!
//! Decides which compute backends a session should request, in order. The
//! portable CPU provider is always the final entry so engine creation can
//! fall back on its own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compute backends a session may run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// NVIDIA CUDA backend
    Cuda,
    /// Apple Metal backend (macOS only)
    Metal,
    /// Portable CPU backend
    Cpu,
}

impl ExecutionProvider {
    pub fn is_accelerated(&self) -> bool {
        !matches!(self, Self::Cpu)
    }
}

impl Default for ExecutionProvider {
    fn default() -> Self {
        Self::Cpu
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionProvider::Cuda => write!(f, "CUDA"),
            ExecutionProvider::Metal => write!(f, "Metal"),
            ExecutionProvider::Cpu => write!(f, "CPU"),
        }
    }
}

/// Provider requested by a model descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPreference {
    /// Use a hardware backend when one is available.
    Accelerated,
    /// CPU only.
    #[default]
    Portable,
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability query failed: {0}")]
    QueryFailed(String),
}

/// Hardware capability query.
#[async_trait::async_trait]
pub trait CapabilityCheck: Send + Sync {
    /// The accelerated provider available on this host, if any.
    async fn accelerated_provider(&self) -> Result<Option<ExecutionProvider>, CapabilityError>;
}

/// Answers from a fixed value. Useful for hosts that already know.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCapability(pub Option<ExecutionProvider>);

#[async_trait::async_trait]
impl CapabilityCheck for StaticCapability {
    async fn accelerated_provider(&self) -> Result<Option<ExecutionProvider>, CapabilityError> {
        Ok(self.0)
    }
}

/// Capability check querying the compiled-in compute backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCapability;

#[async_trait::async_trait]
impl CapabilityCheck for SystemCapability {
    async fn accelerated_provider(&self) -> Result<Option<ExecutionProvider>, CapabilityError> {
        #[cfg(feature = "onnx")]
        {
            if candle_core::utils::cuda_is_available() {
                return Ok(Some(ExecutionProvider::Cuda));
            }
            if candle_core::utils::metal_is_available() {
                return Ok(Some(ExecutionProvider::Metal));
            }
        }
        Ok(None)
    }
}

/// Orders execution providers for a session request.
pub struct ProviderSelector {
    capability: Arc<dyn CapabilityCheck>,
    capability_timeout: Duration,
}

impl ProviderSelector {
    pub fn new(capability: Arc<dyn CapabilityCheck>, capability_timeout: Duration) -> Self {
        Self { capability, capability_timeout }
    }

    /// Provider list for the given preference, most preferred first.
    ///
    /// Never fails: a capability error or timeout means "unavailable".
    pub async fn select(&self, preference: ProviderPreference) -> Vec<ExecutionProvider> {
        let mut providers = Vec::with_capacity(2);

        if preference == ProviderPreference::Accelerated {
            if let Some(accelerated) = self.query_accelerated().await {
                providers.push(accelerated);
            }
        }

        providers.push(ExecutionProvider::Cpu);
        tracing::debug!(?preference, ?providers, "selected execution providers");
        providers
    }

    async fn query_accelerated(&self) -> Option<ExecutionProvider> {
        let answer = self.capability.accelerated_provider();
        match tokio::time::timeout(self.capability_timeout, answer).await {
            Ok(Ok(Some(provider))) if provider.is_accelerated() => Some(provider),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    "accelerator capability check failed, using portable backend"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.capability_timeout.as_millis() as u64,
                    "accelerator capability check timed out, using portable backend"
                );
                None
            }
        }
    }
}

impl Default for ProviderSelector {
    fn default() -> Self {
        Self::new(Arc::new(SystemCapability), Duration::from_millis(2_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_serde() {
        let pref: ProviderPreference = serde_json::from_str("\"accelerated\"").unwrap();
        assert_eq!(pref, ProviderPreference::Accelerated);
        assert_eq!(ExecutionProvider::Metal.to_string(), "Metal");
    }

    #[tokio::test]
    async fn test_static_cpu_is_not_accelerated() {
        let selector =
            ProviderSelector::new(Arc::new(StaticCapability(Some(ExecutionProvider::Cpu))), Duration::from_secs(1));
        let providers = selector.select(ProviderPreference::Accelerated).await;
        assert_eq!(providers, vec![ExecutionProvider::Cpu]);
    }
}
