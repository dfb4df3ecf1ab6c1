// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model loading: fetch, verify, select providers, create the session.
//!
//! Identity and dedup live in [`ModelCache`]; this module only runs the
//! pipeline on a cache miss.

use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::Instrument;

use super::cache::ModelCache;
use super::descriptor::ModelDescriptor;
use super::fetch::{FetchError, ProgressCallback, ProgressiveFetcher};
use super::transport::Transport;
use crate::engine::{
    InferenceBackend, InferenceError, InferenceSession, ProviderSelector, SessionOptions,
};
use crate::telemetry::{self, SpanExt};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to create session: {0}")]
    ModelCreation(String),

    #[error("Invalid model descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Format '{format}' is not supported by backend '{backend}'")]
    UnsupportedFormat { format: String, backend: String },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Load of '{0}' cancelled by unload")]
    Cancelled(String),
}

/// Everything a cache-miss load needs, cheap to clone into the load task.
#[derive(Clone)]
struct LoadPipeline {
    fetcher: Arc<ProgressiveFetcher>,
    selector: Arc<ProviderSelector>,
    backend: Arc<dyn InferenceBackend>,
    intra_op_threads: usize,
}

impl LoadPipeline {
    async fn load(
        self,
        descriptor: ModelDescriptor,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Arc<dyn InferenceSession>, LoadError> {
        let span = telemetry::load_span(&descriptor.name, &descriptor.path);
        let started = Instant::now();

        let result = self
            .run(&descriptor, on_progress.as_ref())
            .instrument(span.clone())
            .await;

        span.record_result(&result);
        let elapsed = started.elapsed();
        telemetry::record_model_load(&descriptor.name, result.is_ok(), elapsed);

        match &result {
            Ok(session) => tracing::info!(
                model = %descriptor.name,
                provider = %session.provider(),
                elapsed_ms = elapsed.as_millis() as u64,
                "model loaded"
            ),
            Err(e) => tracing::warn!(model = %descriptor.name, error = %e, "model load failed"),
        }
        result
    }

    async fn run(
        &self,
        descriptor: &ModelDescriptor,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Arc<dyn InferenceSession>, LoadError> {
        if !self.backend.supports_format(&descriptor.format) {
            return Err(LoadError::UnsupportedFormat {
                format: descriptor.format.clone(),
                backend: self.backend.name().to_string(),
            });
        }

        tracing::info!(model = %descriptor.name, uri = %descriptor.path, "loading model");
        let bytes = self.fetcher.fetch(&descriptor.path, on_progress).await?;
        tracing::Span::current().record("bytes", bytes.len() as u64);

        if let Some(expected) = &descriptor.sha256 {
            verify_sha256(&bytes, expected)?;
        }
        if descriptor.size > 0 && bytes.len() as u64 != descriptor.size {
            tracing::warn!(
                model = %descriptor.name,
                expected = descriptor.size,
                actual = bytes.len(),
                "fetched size differs from descriptor"
            );
        }

        let providers = self.selector.select(descriptor.provider).await;
        let options = SessionOptions {
            intra_op_threads: self.intra_op_threads,
            ..SessionOptions::with_providers(providers)
        };

        self.backend
            .create_session(bytes, &options)
            .await
            .map_err(|e| LoadError::ModelCreation(e.to_string()))
    }
}

fn verify_sha256(bytes: &[u8], expected: &str) -> Result<(), LoadError> {
    let actual = hex::encode(Sha256::digest(bytes));
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(LoadError::HashMismatch { expected: expected.to_ascii_lowercase(), actual })
    }
}

/// Loads models by descriptor into a shared [`ModelCache`].
pub struct ModelLoader {
    cache: Arc<ModelCache>,
    pipeline: LoadPipeline,
}

impl ModelLoader {
    pub fn new(
        cache: Arc<ModelCache>,
        transport: Arc<dyn Transport>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        Self {
            cache,
            pipeline: LoadPipeline {
                fetcher: Arc::new(ProgressiveFetcher::new(transport)),
                selector: Arc::new(ProviderSelector::default()),
                backend,
                intra_op_threads: num_cpus::get(),
            },
        }
    }

    pub fn with_selector(mut self, selector: ProviderSelector) -> Self {
        self.pipeline.selector = Arc::new(selector);
        self
    }

    pub fn with_intra_op_threads(mut self, threads: usize) -> Self {
        self.pipeline.intra_op_threads = threads.max(1);
        self
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// Return the session for `descriptor`, loading it on first use.
    ///
    /// Concurrent calls for one name share a single fetch and create. Only
    /// the caller that starts the load has its progress callback invoked.
    pub async fn load_model(
        &self,
        descriptor: &ModelDescriptor,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Arc<dyn InferenceSession>, LoadError> {
        descriptor.validate()?;
        self.cache
            .get_or_load(&descriptor.name, || {
                self.pipeline.clone().load(descriptor.clone(), on_progress)
            })
            .await
    }

    pub fn get_session(&self, name: &str) -> Option<Arc<dyn InferenceSession>> {
        self.cache.get(name)
    }

    /// Like [`get_session`](Self::get_session) but with a typed miss.
    pub fn session(&self, name: &str) -> Result<Arc<dyn InferenceSession>, InferenceError> {
        self.cache
            .get(name)
            .ok_or_else(|| InferenceError::UnknownModel(name.to_string()))
    }

    pub fn unload_model(&self, name: &str) -> bool {
        self.cache.unload(name)
    }

    pub fn unload_all(&self) {
        self.cache.unload_all();
    }
}
