// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progressive model byte fetching with byte-level progress.

use std::sync::Arc;

use thiserror::Error;

use super::transport::Transport;
use crate::telemetry;

/// Errors raised while fetching model bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Failed to fetch model: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Incomplete download: expected {expected} bytes, received {received}")]
    Incomplete { expected: u64, received: u64 },
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Download progress snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: u64,
    /// `round(loaded / total * 100)`, capped at 100.
    pub percentage: u8,
}

impl LoadProgress {
    pub fn new(loaded: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((loaded as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        Self { loaded, total, percentage }
    }
}

/// Progress observer invoked after each received chunk.
pub type ProgressCallback = Arc<dyn Fn(LoadProgress) + Send + Sync>;

/// Streams bytes from a transport and reports progress.
pub struct ProgressiveFetcher {
    transport: Arc<dyn Transport>,
}

impl ProgressiveFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch the full payload at `uri`.
    ///
    /// Progress is only reported when the source advertises a non-zero total.
    /// The final event has `loaded == total` and `percentage == 100`.
    pub async fn fetch(
        &self,
        uri: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<u8>, FetchError> {
        let mut response = self.transport.open(uri).await?;

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(FetchError::Status {
                status,
                reason: response.status_text().to_string(),
            });
        }

        let total = response.content_length().filter(|&t| t > 0);
        let mut bytes = Vec::with_capacity(total.map_or(0, |t| t as usize));
        let mut loaded = 0u64;

        while let Some(chunk) = response.chunk().await? {
            if chunk.is_empty() {
                continue;
            }
            loaded += chunk.len() as u64;
            bytes.extend_from_slice(&chunk);

            if let Some(total) = total {
                if loaded > total {
                    return Err(FetchError::Incomplete { expected: total, received: loaded });
                }
                if let Some(callback) = on_progress {
                    callback(LoadProgress::new(loaded, total));
                }
            }
        }

        if let Some(total) = total {
            if loaded != total {
                return Err(FetchError::Incomplete { expected: total, received: loaded });
            }
        }

        telemetry::record_bytes_fetched(loaded);
        tracing::debug!(uri = %uri, bytes = loaded, "fetch complete");
        Ok(bytes)
    }
}
