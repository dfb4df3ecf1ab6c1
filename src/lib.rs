// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! couponlm core runtime
//!
//! On-device inference for a quantized chat model and a coupon-ranking model.
//! Model bytes are fetched once, turned into sessions and cached per process;
//! after that nothing here needs the network.
//!
//! # Layout
//!
//! - [`models`]: descriptors, transports, progressive fetch, the session
//!   cache and the loader.
//! - [`engine`]: provider selection, tokenizer, sampling and the
//!   autoregressive generation loop.
//! - [`ranking`]: coupon feature extraction and session-backed scoring.
//! - [`telemetry`]: logging, spans and metrics.

pub mod cli;
pub mod config;
pub mod engine;
pub mod memory;
pub mod models;
pub mod ranking;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use engine::{
    default_backend, CapabilityCheck, ChatMessage, GenerationConfig, GenerationLoop,
    GenerationResult, InferenceBackend, InferenceError, InferenceSession, ProviderSelector,
    SamplingEngine, SystemCapability, Tokenizer, VocabTokenizer,
};
use models::{
    FetchError, LoadError, ModelCache, ModelDescriptor, ModelLoader, ProgressCallback,
    SchemeTransport, Transport,
};
use ranking::CouponRanker;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to set up transports: {0}")]
    Transport(#[from] FetchError),
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub capability_timeout: Duration,
    pub intra_op_threads: usize,
    pub fetch_chunk_size: usize,
    /// Defaults for generations that don't pass their own config.
    pub generation: GenerationConfig,
    /// Fixed sampler seed for reproducible output.
    pub seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            capability_timeout: Duration::from_millis(config::DEFAULT_CAPABILITY_TIMEOUT_MS),
            intra_op_threads: num_cpus::get(),
            fetch_chunk_size: models::transport::DEFAULT_CHUNK_SIZE,
            generation: GenerationConfig::default(),
            seed: None,
        }
    }
}

impl From<&config::EnvConfig> for RuntimeConfig {
    fn from(env: &config::EnvConfig) -> Self {
        Self {
            capability_timeout: env.capability_timeout,
            intra_op_threads: env.intra_op_threads,
            fetch_chunk_size: env.fetch_chunk_size,
            generation: env.generation.clone(),
            seed: env.seed,
        }
    }
}

/// The couponlm runtime instance.
pub struct Runtime {
    config: RuntimeConfig,
    loader: ModelLoader,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Runtime {
    /// Create a runtime with the standard transports, the compiled-in backend
    /// and the system capability check.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let transport = Arc::new(SchemeTransport::standard(config.fetch_chunk_size)?);
        Ok(Self::with_parts(config, transport, default_backend(), Arc::new(SystemCapability)))
    }

    /// Create a runtime from explicit collaborators.
    pub fn with_parts(
        config: RuntimeConfig,
        transport: Arc<dyn Transport>,
        backend: Arc<dyn InferenceBackend>,
        capability: Arc<dyn CapabilityCheck>,
    ) -> Self {
        let loader = ModelLoader::new(Arc::new(ModelCache::new()), transport, backend)
            .with_selector(ProviderSelector::new(capability, config.capability_timeout))
            .with_intra_op_threads(config.intra_op_threads);
        Self {
            config,
            loader,
            tokenizer: Arc::new(VocabTokenizer::default()),
        }
    }

    /// Swap the tokenizer used by new generation loops.
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    pub async fn load_model(
        &self,
        descriptor: &ModelDescriptor,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Arc<dyn InferenceSession>, LoadError> {
        self.loader.load_model(descriptor, on_progress).await
    }

    /// A fresh generation loop over the loaded model `name`.
    pub fn generation_loop(&self, name: &str) -> Result<GenerationLoop, InferenceError> {
        let session = self.loader.session(name)?;
        Ok(GenerationLoop::new(session, Arc::clone(&self.tokenizer))
            .with_sampler(Box::new(SamplingEngine::from_seed_option(self.config.seed))))
    }

    /// One-shot chat completion using the configured generation defaults.
    pub async fn chat(
        &self,
        name: &str,
        messages: &[ChatMessage],
    ) -> Result<GenerationResult, InferenceError> {
        let mut generation = self.generation_loop(name)?;
        generation.generate(messages, &self.config.generation, |_| true).await
    }

    /// A ranker over the loaded ranking model `name`.
    pub fn ranker(&self, name: &str) -> Result<CouponRanker, InferenceError> {
        Ok(CouponRanker::new(self.loader.session(name)?))
    }

    /// Release every loaded model.
    pub fn shutdown(&self) {
        self.loader.unload_all();
    }
}
