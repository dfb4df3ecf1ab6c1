// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model descriptor parsing and validation.
//!
//! A descriptor names a model, where its bytes live and how it should run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::loader::LoadError;
use crate::engine::ProviderPreference;

/// Immutable description of a loadable model. `name` is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique cache key (e.g., "coupon-chat-q4").
    pub name: String,
    /// URI or filesystem path of the weights.
    pub path: String,
    /// Engine format tag (e.g., "onnx").
    pub format: String,
    /// Expected size in bytes. 0 when unknown.
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
    #[serde(default)]
    pub provider: ProviderPreference,
    /// SHA-256 of the weights, 64 hex characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            format: format.into(),
            size: 0,
            quantization: None,
            provider: ProviderPreference::default(),
            sha256: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_provider(mut self, provider: ProviderPreference) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    /// Load a descriptor file. `.toml` files are read as TOML, anything else as JSON.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoadError::InvalidDescriptor(format!("failed to read {}: {}", path.display(), e))
        })?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        serde_json::from_str(json)
            .map_err(|e| LoadError::InvalidDescriptor(format!("invalid descriptor JSON: {}", e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, LoadError> {
        toml::from_str(content)
            .map_err(|e| LoadError::InvalidDescriptor(format!("invalid descriptor TOML: {}", e)))
    }

    /// Validate descriptor fields for correctness.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.name.trim().is_empty() {
            return Err(LoadError::InvalidDescriptor("name cannot be empty".into()));
        }
        if self.path.trim().is_empty() {
            return Err(LoadError::InvalidDescriptor("path cannot be empty".into()));
        }
        if self.format.trim().is_empty() {
            return Err(LoadError::InvalidDescriptor("format cannot be empty".into()));
        }
        if let Some(hash) = &self.sha256 {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(LoadError::InvalidDescriptor(
                    "sha256 must be 64 hex characters".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let d = ModelDescriptor::from_json(
            r#"{"name": "chat", "path": "models/chat.onnx", "format": "onnx"}"#,
        )
        .unwrap();
        assert_eq!(d.size, 0);
        assert_eq!(d.provider, ProviderPreference::Portable);
        assert!(d.quantization.is_none());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_toml_parse() {
        let d = ModelDescriptor::from_toml(
            r#"
name = "ranker"
path = "https://example.com/ranker.onnx"
format = "onnx"
size = 4096
quantization = "q8"
provider = "accelerated"
"#,
        )
        .unwrap();
        assert_eq!(d.size, 4096);
        assert_eq!(d.quantization.as_deref(), Some("q8"));
        assert_eq!(d.provider, ProviderPreference::Accelerated);
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let empty_name = ModelDescriptor::new("", "a.onnx", "onnx");
        assert!(matches!(empty_name.validate(), Err(LoadError::InvalidDescriptor(_))));

        let short_hash = ModelDescriptor::new("m", "a.onnx", "onnx").with_sha256("abc");
        assert!(matches!(short_hash.validate(), Err(LoadError::InvalidDescriptor(_))));

        let good_hash = ModelDescriptor::new("m", "a.onnx", "onnx").with_sha256("a".repeat(64));
        assert!(good_hash.validate().is_ok());
    }
}
