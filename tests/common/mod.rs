// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared mocks for integration tests.
//!
//! Transports, backends and sessions that script their behavior and count
//! how often they are used.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use couponlm_core::engine::{
    ExecutionProvider, InferenceBackend, InferenceError, InferenceSession, SessionOptions, Tensor,
    TensorMap,
};
use couponlm_core::models::{FetchError, Transport, TransportResponse};

// === Transport ===

/// Canned response for one URI.
#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub reason: String,
    pub total: Option<u64>,
    pub chunks: Vec<Vec<u8>>,
}

impl Route {
    /// 200 with an advertised length equal to the chunk sum.
    pub fn ok(chunks: Vec<Vec<u8>>) -> Self {
        let total = chunks.iter().map(|c| c.len() as u64).sum();
        Self { status: 200, reason: "OK".into(), total: Some(total), chunks }
    }

    /// 200 with no advertised length.
    pub fn unsized_body(chunks: Vec<Vec<u8>>) -> Self {
        Self { status: 200, reason: "OK".into(), total: None, chunks }
    }

    pub fn status(status: u16, reason: &str) -> Self {
        Self { status, reason: reason.into(), total: None, chunks: Vec::new() }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

/// In-memory transport keyed by URI.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    opens: AtomicUsize,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering each open, keeping loads in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn route(self, uri: &str, route: Route) -> Self {
        self.set_route(uri, route);
        self
    }

    pub fn set_route(&self, uri: &str, route: Route) {
        self.routes.lock().unwrap().insert(uri.to_string(), route);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn open(&self, uri: &str) -> Result<Box<dyn TransportResponse>, FetchError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let route = self
            .routes
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .unwrap_or_else(|| Route::status(404, "Not Found"));
        Ok(Box::new(MockResponse {
            status: route.status,
            reason: route.reason,
            total: route.total,
            chunks: route.chunks.into(),
        }))
    }
}

struct MockResponse {
    status: u16,
    reason: String,
    total: Option<u64>,
    chunks: VecDeque<Vec<u8>>,
}

#[async_trait::async_trait]
impl TransportResponse for MockResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> &str {
        &self.reason
    }

    fn content_length(&self) -> Option<u64> {
        self.total
    }

    async fn chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        tokio::task::yield_now().await;
        Ok(self.chunks.pop_front())
    }
}

// === Sessions ===

/// Session that answers every run with an empty map.
#[derive(Default)]
pub struct NoopSession {
    released: AtomicBool,
    runs: AtomicUsize,
}

impl NoopSession {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl InferenceSession for NoopSession {
    async fn run(&self, _inputs: TensorMap) -> Result<TensorMap, InferenceError> {
        if self.is_released() {
            return Err(InferenceError::NotInitialized("session has been released".into()));
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(TensorMap::new())
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn provider(&self) -> ExecutionProvider {
        ExecutionProvider::Cpu
    }
}

/// What a decoder saw on one forward pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardCall {
    pub input_ids: Vec<i64>,
    pub mask_len: Option<usize>,
    /// Sequence length of the incoming `past_key_values.0`, if any.
    pub past_len: Option<usize>,
}

/// Decoder that favors one scripted token per forward pass.
///
/// Logits put a large score on the scripted token and a low one elsewhere.
/// Once the script runs out, `fallback` is favored. Each pass returns a
/// `present.0` tensor covering every position seen so far.
pub struct ScriptedDecoder {
    vocab_size: usize,
    script: Mutex<VecDeque<u32>>,
    fallback: u32,
    fail_on_call: Option<usize>,
    calls: Mutex<Vec<ForwardCall>>,
    released: AtomicBool,
}

impl ScriptedDecoder {
    pub fn new(vocab_size: usize, script: Vec<u32>, fallback: u32) -> Self {
        Self {
            vocab_size,
            script: Mutex::new(script.into()),
            fallback,
            fail_on_call: None,
            calls: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        }
    }

    /// Fail the forward pass with this zero-based index.
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn calls(&self) -> Vec<ForwardCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl InferenceSession for ScriptedDecoder {
    async fn run(&self, inputs: TensorMap) -> Result<TensorMap, InferenceError> {
        if self.is_released() {
            return Err(InferenceError::NotInitialized("session has been released".into()));
        }

        let input_ids = match inputs.get("input_ids").map(|t| t.data().clone()) {
            Some(couponlm_core::engine::TensorData::I64(ids)) => ids,
            _ => return Err(InferenceError::InputValidation("missing input_ids".into())),
        };
        let past_len = inputs.get("past_key_values.0").map(|t| t.shape()[1]);
        let call = ForwardCall {
            input_ids: input_ids.clone(),
            mask_len: inputs.get("attention_mask").map(|t| t.len()),
            past_len,
        };

        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len() - 1
        };
        if self.fail_on_call == Some(index) {
            return Err(InferenceError::ModelError("scripted failure".into()));
        }

        let favored = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback) as usize;
        let rows = input_ids.len();
        let mut logits = vec![0.0f32; rows * self.vocab_size];
        let last = &mut logits[(rows - 1) * self.vocab_size..];
        for (i, score) in last.iter_mut().enumerate() {
            *score = if i == favored { 20.0 } else { -20.0 };
        }

        let total = past_len.unwrap_or(0) + rows;
        let mut outputs = TensorMap::new();
        outputs.insert(
            "logits".into(),
            Tensor::from_f32(vec![1, rows, self.vocab_size], logits)?,
        );
        outputs.insert("present.0".into(), Tensor::from_f32(vec![1, total], vec![0.0; total])?);
        Ok(outputs)
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn provider(&self) -> ExecutionProvider {
        ExecutionProvider::Cpu
    }
}

/// Ranking session scoring each row as the mean of savings ratio and success rate.
#[derive(Default)]
pub struct LinearRanker {
    fail: bool,
}

impl LinearRanker {
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait::async_trait]
impl InferenceSession for LinearRanker {
    async fn run(&self, inputs: TensorMap) -> Result<TensorMap, InferenceError> {
        if self.fail {
            return Err(InferenceError::ModelError("ranker unavailable".into()));
        }
        let features = inputs
            .get("features")
            .ok_or_else(|| InferenceError::InputValidation("missing features".into()))?;
        let width = features.shape()[1];
        let scores: Vec<f32> = features
            .to_f32_vec()
            .chunks(width)
            .map(|row| 0.5 * row[3] + 0.5 * row[4])
            .collect();
        let mut outputs = TensorMap::new();
        outputs.insert("scores".into(), Tensor::from_f32(vec![scores.len(), 1], scores)?);
        Ok(outputs)
    }

    fn release(&self) {}

    fn is_released(&self) -> bool {
        false
    }

    fn provider(&self) -> ExecutionProvider {
        ExecutionProvider::Cpu
    }
}

// === Backend ===

type SessionFactory = Box<dyn Fn() -> Arc<dyn InferenceSession> + Send + Sync>;

/// Backend that counts creates and hands out sessions from a factory.
pub struct MockBackend {
    factory: SessionFactory,
    creates: AtomicUsize,
    fail: AtomicBool,
    last_options: Mutex<Option<SessionOptions>>,
    last_bytes: Mutex<Vec<u8>>,
}

impl MockBackend {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn InferenceSession> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            creates: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            last_options: Mutex::new(None),
            last_bytes: Mutex::new(Vec::new()),
        }
    }

    pub fn noop() -> Self {
        Self::new(|| Arc::new(NoopSession::default()))
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<SessionOptions> {
        self.last_options.lock().unwrap().clone()
    }

    pub fn last_bytes(&self) -> Vec<u8> {
        self.last_bytes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl InferenceBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_format(&self, format: &str) -> bool {
        format == "onnx"
    }

    async fn create_session(
        &self,
        bytes: Vec<u8>,
        options: &SessionOptions,
    ) -> Result<Arc<dyn InferenceSession>, InferenceError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        *self.last_bytes.lock().unwrap() = bytes;
        if self.fail.load(Ordering::SeqCst) {
            return Err(InferenceError::ModelError("engine rejected model bytes".into()));
        }
        Ok((self.factory)())
    }
}
