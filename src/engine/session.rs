// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Session capability interface and engine binding.
//!
//! A session is a loaded, runnable model. The loader is generic over
//! [`InferenceBackend`], which turns fetched bytes into sessions.

use std::sync::Arc;

use super::error::InferenceError;
use super::provider::ExecutionProvider;
use super::tensor::TensorMap;

/// A loaded, runnable model shared by generation and ranking consumers.
#[async_trait::async_trait]
pub trait InferenceSession: Send + Sync {
    /// Run one forward pass.
    ///
    /// Fails with [`InferenceError::NotInitialized`] after [`release`](Self::release).
    async fn run(&self, inputs: TensorMap) -> Result<TensorMap, InferenceError>;

    /// Destroy the underlying resources. Idempotent.
    fn release(&self);

    fn is_released(&self) -> bool;

    /// Execution provider the session actually runs on.
    fn provider(&self) -> ExecutionProvider;
}

/// Graph optimization level requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphOptimizationLevel {
    Disabled,
    Basic,
    #[default]
    All,
}

/// Operator scheduling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

/// Options passed to the engine's create-session call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Providers in preference order. The last entry is always the portable one.
    pub providers: Vec<ExecutionProvider>,
    pub graph_optimization: GraphOptimizationLevel,
    pub enable_mem_pattern: bool,
    pub enable_cpu_mem_arena: bool,
    pub execution_mode: ExecutionMode,
    pub intra_op_threads: usize,
}

impl SessionOptions {
    /// Standard performance options for the given provider list.
    pub fn with_providers(providers: Vec<ExecutionProvider>) -> Self {
        Self {
            providers,
            ..Self::default()
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            providers: vec![ExecutionProvider::Cpu],
            graph_optimization: GraphOptimizationLevel::All,
            enable_mem_pattern: true,
            enable_cpu_mem_arena: true,
            execution_mode: ExecutionMode::Sequential,
            intra_op_threads: num_cpus::get(),
        }
    }
}

/// Engine binding that creates sessions from model bytes.
#[async_trait::async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether this backend can load the given format tag.
    fn supports_format(&self, format: &str) -> bool;

    /// Create a session. Rejected bytes or options surface as
    /// [`InferenceError::ModelError`]; a backend without an engine answers
    /// [`InferenceError::CapabilityNotSupported`].
    async fn create_session(
        &self,
        bytes: Vec<u8>,
        options: &SessionOptions,
    ) -> Result<Arc<dyn InferenceSession>, InferenceError>;
}

/// Backend used when no engine is compiled in. Every create fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBackend;

#[async_trait::async_trait]
impl InferenceBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn supports_format(&self, _format: &str) -> bool {
        true
    }

    async fn create_session(
        &self,
        _bytes: Vec<u8>,
        _options: &SessionOptions,
    ) -> Result<Arc<dyn InferenceSession>, InferenceError> {
        Err(InferenceError::CapabilityNotSupported(
            "ONNX support not compiled in. Enable 'onnx' feature.".into(),
        ))
    }
}

/// Default engine for this build.
pub fn default_backend() -> Arc<dyn InferenceBackend> {
    #[cfg(feature = "onnx")]
    {
        Arc::new(super::onnx::CandleOnnxBackend::new())
    }
    #[cfg(not(feature = "onnx"))]
    {
        Arc::new(UnavailableBackend)
    }
}
