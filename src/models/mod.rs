// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model management module for couponlm.
//!
//! Descriptors, byte transports, progressive fetching, the session cache and
//! the loader tying them together.

pub mod descriptor;
pub mod transport;

mod cache;
mod fetch;
mod loader;

pub use cache::ModelCache;
pub use descriptor::ModelDescriptor;
pub use fetch::{FetchError, LoadProgress, ProgressCallback, ProgressiveFetcher};
pub use loader::{LoadError, ModelLoader};
pub use transport::{FileTransport, SchemeTransport, Transport, TransportResponse};

#[cfg(feature = "http")]
pub use transport::HttpTransport;
