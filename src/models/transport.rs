// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Byte sources for model weights.
//!
//! A [`Transport`] opens a URI and yields a response with a status, an
//! optional advertised length and a chunk reader.

use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use memmap2::Mmap;

use super::fetch::FetchError;

/// Default chunk size for local reads.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// An opened byte stream.
#[async_trait::async_trait]
pub trait TransportResponse: Send {
    fn status(&self) -> u16;

    fn status_text(&self) -> &str;

    /// Advertised body length, if the source reports one.
    fn content_length(&self) -> Option<u64>;

    /// Next chunk, or `None` at end of stream.
    async fn chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError>;
}

/// Opens URIs into byte streams.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, uri: &str) -> Result<Box<dyn TransportResponse>, FetchError>;
}

/// Scheme of a URI, lowercased. Bare paths count as `file`.
pub fn scheme_of(uri: &str) -> String {
    match uri.split_once("://") {
        Some((scheme, _)) if !scheme.is_empty() => scheme.to_ascii_lowercase(),
        _ => "file".to_string(),
    }
}

/// Reads local files through a read-only memory map.
#[derive(Debug, Clone)]
pub struct FileTransport {
    chunk_size: usize,
}

impl FileTransport {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    fn resolve(uri: &str) -> PathBuf {
        PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
    }
}

impl Default for FileTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[async_trait::async_trait]
impl Transport for FileTransport {
    async fn open(&self, uri: &str) -> Result<Box<dyn TransportResponse>, FetchError> {
        let path = Self::resolve(uri);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FetchError::Status { status: 404, reason: "Not Found".into() })
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(FetchError::Status { status: 403, reason: "Forbidden".into() })
            }
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        // Zero-length files cannot be mapped on every platform.
        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: read-only mapping; model files are not modified while loading.
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Box::new(MappedResponse {
            mmap,
            len,
            offset: 0,
            chunk_size: self.chunk_size,
        }))
    }
}

struct MappedResponse {
    mmap: Option<Mmap>,
    len: u64,
    offset: usize,
    chunk_size: usize,
}

#[async_trait::async_trait]
impl TransportResponse for MappedResponse {
    fn status(&self) -> u16 {
        200
    }

    fn status_text(&self) -> &str {
        "OK"
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.len)
    }

    async fn chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        let Some(mmap) = &self.mmap else {
            return Ok(None);
        };
        if self.offset >= mmap.len() {
            return Ok(None);
        }
        let end = (self.offset + self.chunk_size).min(mmap.len());
        let chunk = mmap[self.offset..end].to_vec();
        self.offset = end;
        Ok(Some(chunk))
    }
}

/// HTTP(S) transport backed by reqwest.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("couponlm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(&self, uri: &str) -> Result<Box<dyn TransportResponse>, FetchError> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = response.status();
        Ok(Box::new(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            response,
        }))
    }
}

#[cfg(feature = "http")]
struct HttpResponse {
    status: u16,
    status_text: String,
    response: reqwest::Response,
}

#[cfg(feature = "http")]
#[async_trait::async_trait]
impl TransportResponse for HttpResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn status_text(&self) -> &str {
        &self.status_text
    }

    fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    async fn chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        self.response
            .chunk()
            .await
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

/// Dispatches on the URI scheme.
#[derive(Clone, Default)]
pub struct SchemeTransport {
    transports: HashMap<String, Arc<dyn Transport>>,
}

impl SchemeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport for a scheme (e.g., "file", "https").
    pub fn with(mut self, scheme: &str, transport: Arc<dyn Transport>) -> Self {
        self.transports.insert(scheme.to_ascii_lowercase(), transport);
        self
    }

    /// Local files plus HTTP(S) when the `http` feature is on.
    pub fn standard(chunk_size: usize) -> Result<Self, FetchError> {
        let transports = Self::new().with("file", Arc::new(FileTransport::new(chunk_size)));
        #[cfg(feature = "http")]
        let transports = {
            let http: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
            transports.with("http", Arc::clone(&http)).with("https", http)
        };
        Ok(transports)
    }

    pub fn supports(&self, uri: &str) -> bool {
        self.transports.contains_key(&scheme_of(uri))
    }
}

#[async_trait::async_trait]
impl Transport for SchemeTransport {
    async fn open(&self, uri: &str) -> Result<Box<dyn TransportResponse>, FetchError> {
        let scheme = scheme_of(uri);
        let transport = self
            .transports
            .get(&scheme)
            .ok_or_else(|| FetchError::Transport(format!("no transport for scheme '{}'", scheme)))?;
        transport.open(uri).await
    }
}
