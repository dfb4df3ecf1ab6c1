// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Autoregressive generation loop with KV-cache reuse.
//!
//! State machine per request:
//! `Idle → Prefill → Decoding { step } → Done | Cancelled | Failed`.
//!
//! Prefill runs the whole prompt once. Every later forward pass feeds only the
//! newest token plus the retained cache; the prompt is never re-run. A step
//! first advances the cache by the token emitted last, then samples, so each
//! fragment reaches the caller before the next pass starts. Steps are strictly
//! sequential because each needs the previous step's cache.

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use super::config::GenerationConfig;
use super::error::InferenceError;
use super::input::{format_prompt, validate_messages, ChatMessage};
use super::output::{FinishReason, GenerationResult};
use super::sampling::{apply_repetition_penalty, SamplingEngine, TokenSampler};
use super::session::InferenceSession;
use super::streaming::TextStreamSender;
use super::tensor::{Tensor, TensorMap};
use super::tokenizer::Tokenizer;
use crate::memory::{KvCache, KvNaming};
use crate::telemetry::{self, SpanExt};

/// Tensor names of a decoder graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderIo {
    pub input_ids: String,
    /// Attention mask input. `None` for graphs that take no mask.
    pub attention_mask: Option<String>,
    pub logits: String,
    pub kv: KvNaming,
}

impl Default for DecoderIo {
    fn default() -> Self {
        Self {
            input_ids: "input_ids".to_string(),
            attention_mask: Some("attention_mask".to_string()),
            logits: "logits".to_string(),
            kv: KvNaming::default(),
        }
    }
}

/// Lifecycle of the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Prefill,
    /// `step` tokens have been emitted so far.
    Decoding { step: u32 },
    Done(FinishReason),
    Cancelled,
    Failed,
}

impl GenerationState {
    /// Prefill or decoding is under way.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Prefill | Self::Decoding { .. })
    }
}

/// Outcome of one decode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A token was emitted along with the text it adds.
    Token { id: u32, fragment: String },
    /// Generation is over; no token was emitted by this call.
    Finished(FinishReason),
}

/// Drives step-by-step decoding against a shared session.
///
/// Owns its KV cache exclusively. Run one generation at a time per instance.
pub struct GenerationLoop {
    session: Arc<dyn InferenceSession>,
    tokenizer: Arc<dyn Tokenizer>,
    sampler: Box<dyn TokenSampler>,
    io: DecoderIo,
    kv: KvCache,
    state: GenerationState,
    config: GenerationConfig,
    generated: Vec<u32>,
    pending_logits: Vec<f32>,
    /// Emitted token not yet fed through the decoder.
    unfed: Option<u32>,
    generation_id: Uuid,
}

impl GenerationLoop {
    pub fn new(session: Arc<dyn InferenceSession>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        let io = DecoderIo::default();
        Self {
            session,
            tokenizer,
            sampler: Box::new(SamplingEngine::new()),
            kv: KvCache::new(io.kv.clone()),
            io,
            state: GenerationState::Idle,
            config: GenerationConfig::default(),
            generated: Vec::new(),
            pending_logits: Vec::new(),
            unfed: None,
            generation_id: Uuid::nil(),
        }
    }

    pub fn with_sampler(mut self, sampler: Box<dyn TokenSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_io(mut self, io: DecoderIo) -> Self {
        self.kv = KvCache::new(io.kv.clone());
        self.io = io;
        self
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn kv_cache(&self) -> &KvCache {
        &self.kv
    }

    /// Tokens emitted by the current (or last) generation.
    pub fn generated_tokens(&self) -> &[u32] {
        &self.generated
    }

    pub fn generation_id(&self) -> Uuid {
        self.generation_id
    }

    /// Drop retained KV state.
    ///
    /// Required before an unrelated generation on the same instance. An
    /// in-flight generation becomes `Cancelled`.
    pub fn clear_cache(&mut self) {
        self.kv.clear();
        self.pending_logits.clear();
        self.unfed = None;
        if self.state.is_in_flight() {
            tracing::debug!(generation_id = %self.generation_id, "generation cancelled");
            self.state = GenerationState::Cancelled;
        }
    }

    /// Format and encode the history, then run the prompt once with no
    /// prior cache.
    pub async fn prefill(
        &mut self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> Result<(), InferenceError> {
        config.validate()?;
        validate_messages(messages)?;

        if !self.kv.is_empty() {
            tracing::debug!("discarding KV cache left by a previous generation");
        }
        self.kv.clear();
        self.pending_logits.clear();
        self.unfed = None;
        self.generated.clear();
        self.config = config.clone();
        self.generation_id = Uuid::new_v4();
        self.state = GenerationState::Prefill;

        let prompt = format_prompt(messages);
        let mut ids = self.tokenizer.encode(&prompt);
        // An encoded EOS would close the assistant turn we want the model to continue.
        if ids.last() == Some(&self.tokenizer.eos_id()) {
            ids.pop();
        }

        self.forward(&ids).await?;
        self.state = GenerationState::Decoding { step: 0 };
        tracing::debug!(
            generation_id = %self.generation_id,
            prompt_tokens = ids.len(),
            "prefill complete"
        );
        Ok(())
    }

    /// Advance the cache by the previously emitted token, then sample one.
    ///
    /// The returned fragment has not been through the decoder yet; that
    /// happens at the start of the next call.
    pub async fn step(&mut self) -> Result<StepOutcome, InferenceError> {
        let step = match self.state {
            GenerationState::Decoding { step } => step,
            GenerationState::Done(reason) => return Ok(StepOutcome::Finished(reason)),
            other => {
                return Err(InferenceError::NotInitialized(format!(
                    "no generation in progress (state {:?}); call prefill first",
                    other
                )))
            }
        };

        if let Some(last) = self.unfed.take() {
            self.forward(&[last]).await?;
        }

        let mut logits = std::mem::take(&mut self.pending_logits);
        apply_repetition_penalty(&mut logits, &self.generated, self.config.repetition_penalty);
        let token = self.sampler.sample(&logits, &self.config);

        if token == self.tokenizer.eos_id() {
            return Ok(StepOutcome::Finished(self.finish(FinishReason::Stop)));
        }

        let fragment = self.tokenizer.decode_incremental(&self.generated, token);
        self.generated.push(token);
        let step = step + 1;

        if self.generated.len() >= self.config.max_tokens as usize {
            self.finish(FinishReason::MaxTokens);
        } else {
            self.unfed = Some(token);
            self.state = GenerationState::Decoding { step };
        }

        Ok(StepOutcome::Token { id: token, fragment })
    }

    /// Run a full generation, invoking `on_fragment` once per emitted token.
    ///
    /// Returning `false` from the callback cancels the generation.
    pub async fn generate<F>(
        &mut self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
        mut on_fragment: F,
    ) -> Result<GenerationResult, InferenceError>
    where
        F: FnMut(&str) -> bool + Send,
    {
        let span = telemetry::generation_span();
        let result = self
            .run_to_completion(messages, config, &mut on_fragment)
            .instrument(span.clone())
            .await;
        span.record("generation_id", self.generation_id.to_string().as_str());
        span.record_result(&result);

        match &result {
            Ok(output) => {
                span.record("tokens_generated", output.tokens_generated);
                span.record("finish_reason", output.finish_reason.as_str());
                telemetry::record_generation(output.finish_reason, output.tokens_generated);
            }
            Err(_) => telemetry::record_generation_failure(),
        }
        result
    }

    /// Run a full generation pushing fragments into a text stream.
    ///
    /// The stream's final event carries the complete text. If the receiver
    /// goes away the generation is cancelled.
    pub async fn generate_streaming(
        &mut self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
        sender: TextStreamSender,
    ) -> Result<GenerationResult, InferenceError> {
        let output = {
            let sender = &sender;
            self.generate(messages, config, |fragment| sender.fragment(fragment))
                .await?
        };
        sender.finish(output.text.clone());
        Ok(output)
    }

    async fn run_to_completion(
        &mut self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
        on_fragment: &mut (dyn FnMut(&str) -> bool + Send),
    ) -> Result<GenerationResult, InferenceError> {
        self.prefill(messages, config).await?;

        let finish_reason = loop {
            match self.step().await? {
                StepOutcome::Token { fragment, .. } => {
                    if !on_fragment(&fragment) {
                        self.clear_cache();
                        return Err(InferenceError::Cancelled);
                    }
                }
                StepOutcome::Finished(reason) => break reason,
            }
        };

        Ok(GenerationResult {
            text: self.tokenizer.decode(&self.generated),
            tokens_generated: self.generated.len() as u32,
            finish_reason,
        })
    }

    /// One forward pass over `tokens`, feeding the retained cache.
    async fn forward(&mut self, tokens: &[u32]) -> Result<(), InferenceError> {
        let inputs = match self.build_inputs(tokens) {
            Ok(inputs) => inputs,
            Err(e) => return Err(self.fail(e)),
        };
        let outputs = match self.session.run(inputs).await {
            Ok(outputs) => outputs,
            Err(e) => return Err(self.fail(e)),
        };
        let logits = match outputs.get(&self.io.logits) {
            Some(tensor) => tensor.last_row(),
            None => {
                return Err(self.fail(InferenceError::ModelError(format!(
                    "session returned no '{}' output",
                    self.io.logits
                ))))
            }
        };
        if logits.is_empty() {
            return Err(self.fail(InferenceError::ModelError("session returned empty logits".into())));
        }

        self.kv.absorb(&outputs, tokens.len());
        self.pending_logits = logits;
        Ok(())
    }

    fn build_inputs(&self, tokens: &[u32]) -> Result<TensorMap, InferenceError> {
        let mut inputs = TensorMap::new();
        let ids: Vec<i64> = tokens.iter().map(|&t| i64::from(t)).collect();
        inputs.insert(self.io.input_ids.clone(), Tensor::from_i64(vec![1, ids.len()], ids)?);

        if let Some(mask_name) = &self.io.attention_mask {
            let total = self.kv.seq_len() + tokens.len();
            inputs.insert(mask_name.clone(), Tensor::from_i64(vec![1, total], vec![1; total])?);
        }

        self.kv.feed(&mut inputs);
        Ok(inputs)
    }

    fn finish(&mut self, reason: FinishReason) -> FinishReason {
        self.kv.clear();
        self.pending_logits.clear();
        self.unfed = None;
        self.state = GenerationState::Done(reason);
        tracing::debug!(
            generation_id = %self.generation_id,
            tokens = self.generated.len(),
            reason = reason.as_str(),
            "generation finished"
        );
        reason
    }

    fn fail(&mut self, error: InferenceError) -> InferenceError {
        self.kv.clear();
        self.pending_logits.clear();
        self.unfed = None;
        self.state = GenerationState::Failed;
        tracing::warn!(generation_id = %self.generation_id, error = %error, "generation failed");
        error
    }
}
