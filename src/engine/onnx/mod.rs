// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! ONNX inference backend using Candle.
//!
//! Sessions hold a parsed `ModelProto` and evaluate it with candle-onnx on the
//! first device from the provider list that can be opened.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor as CandleTensor};
use candle_onnx::onnx::ModelProto;
use parking_lot::RwLock;

use super::error::InferenceError;
use super::provider::ExecutionProvider;
use super::session::{InferenceBackend, InferenceSession, SessionOptions};
use super::tensor::{Tensor, TensorData, TensorMap};

/// Format tag accepted by this backend.
pub const ONNX_FORMAT: &str = "onnx";

/// Backend that parses ONNX protobufs into candle-evaluated sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct CandleOnnxBackend;

impl CandleOnnxBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl InferenceBackend for CandleOnnxBackend {
    fn name(&self) -> &str {
        "candle-onnx"
    }

    fn supports_format(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case(ONNX_FORMAT)
    }

    async fn create_session(
        &self,
        bytes: Vec<u8>,
        options: &SessionOptions,
    ) -> Result<Arc<dyn InferenceSession>, InferenceError> {
        let model = tokio::task::spawn_blocking(move || parse_model(&bytes))
            .await
            .map_err(|e| InferenceError::ModelError(format!("model parse task failed: {e}")))??;

        if model.graph.is_none() {
            return Err(InferenceError::ModelError("ONNX model has no graph".into()));
        }

        let (device, provider) = open_device(&options.providers);
        tracing::debug!(provider = %provider, "created candle-onnx session");
        Ok(Arc::new(CandleOnnxSession {
            model: RwLock::new(Some(Arc::new(model))),
            device,
            provider,
        }))
    }
}

/// candle-onnx only reads from a path, so the bytes are spilled to a temp file.
fn parse_model(bytes: &[u8]) -> Result<ModelProto, InferenceError> {
    let mut file = tempfile::NamedTempFile::new()
        .map_err(|e| InferenceError::ModelError(format!("failed to stage model: {e}")))?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| InferenceError::ModelError(format!("failed to stage model: {e}")))?;
    candle_onnx::read_file(file.path())
        .map_err(|e| InferenceError::ModelError(format!("invalid ONNX payload: {e}")))
}

/// First provider whose device opens. CPU always succeeds.
fn open_device(providers: &[ExecutionProvider]) -> (Device, ExecutionProvider) {
    for &provider in providers {
        let device = match provider {
            ExecutionProvider::Cuda => Device::new_cuda(0),
            ExecutionProvider::Metal => Device::new_metal(0),
            ExecutionProvider::Cpu => return (Device::Cpu, ExecutionProvider::Cpu),
        };
        match device {
            Ok(device) => return (device, provider),
            Err(e) => tracing::warn!(provider = %provider, error = %e, "provider unavailable, trying next"),
        }
    }
    (Device::Cpu, ExecutionProvider::Cpu)
}

/// A parsed ONNX graph bound to one device.
pub struct CandleOnnxSession {
    model: RwLock<Option<Arc<ModelProto>>>,
    device: Device,
    provider: ExecutionProvider,
}

/// Evaluate the graph synchronously. Runs on the blocking pool.
fn evaluate(
    model: &ModelProto,
    device: &Device,
    inputs: TensorMap,
) -> Result<TensorMap, InferenceError> {
    let mut feeds = HashMap::with_capacity(inputs.len());
    for (name, tensor) in inputs {
        feeds.insert(name, to_candle(&tensor, device)?);
    }

    let outputs = candle_onnx::simple_eval(model, feeds)
        .map_err(|e| InferenceError::ModelError(format!("graph evaluation failed: {e}")))?;

    outputs
        .into_iter()
        .map(|(name, tensor)| from_candle(&tensor).map(|t| (name, t)))
        .collect()
}

#[async_trait::async_trait]
impl InferenceSession for CandleOnnxSession {
    async fn run(&self, inputs: TensorMap) -> Result<TensorMap, InferenceError> {
        let model = self
            .model
            .read()
            .clone()
            .ok_or_else(|| InferenceError::NotInitialized("session has been released".into()))?;
        let device = self.device.clone();

        tokio::task::spawn_blocking(move || evaluate(&model, &device, inputs))
            .await
            .map_err(|e| InferenceError::ModelError(format!("graph evaluation task failed: {e}")))?
    }

    fn release(&self) {
        if self.model.write().take().is_some() {
            tracing::debug!(provider = %self.provider, "released candle-onnx session");
        }
    }

    fn is_released(&self) -> bool {
        self.model.read().is_none()
    }

    fn provider(&self) -> ExecutionProvider {
        self.provider
    }
}

fn candle_err(e: candle_core::Error) -> InferenceError {
    InferenceError::ModelError(e.to_string())
}

fn to_candle(tensor: &Tensor, device: &Device) -> Result<CandleTensor, InferenceError> {
    let shape = tensor.shape().to_vec();
    match tensor.data() {
        TensorData::F32(v) => CandleTensor::from_vec(v.clone(), shape, device),
        TensorData::F16(v) => CandleTensor::from_vec(v.clone(), shape, device),
        TensorData::I64(v) => CandleTensor::from_vec(v.clone(), shape, device),
    }
    .map_err(candle_err)
}

fn from_candle(tensor: &CandleTensor) -> Result<Tensor, InferenceError> {
    let shape = tensor.dims().to_vec();
    let flat = tensor.flatten_all().map_err(candle_err)?;
    let data = match tensor.dtype() {
        DType::I64 => TensorData::I64(flat.to_vec1::<i64>().map_err(candle_err)?),
        DType::F16 => TensorData::F16(flat.to_vec1::<half::f16>().map_err(candle_err)?),
        _ => TensorData::F32(
            flat.to_dtype(DType::F32)
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(candle_err)?,
        ),
    };
    Tensor::new(shape, data)
}
