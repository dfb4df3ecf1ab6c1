// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for couponlm commands.
//!
//! Every command runs in-process against a freshly built [`Runtime`].
//!
//! ## Usage
//!
//! ```bash
//! couponlm-cli tokenize "save 20% today"
//! couponlm-cli load models/chat.json
//! couponlm-cli chat models/chat.json "which coupon is best?"
//! couponlm-cli rank models/ranker.toml coupons.json 100.0
//! ```

pub mod chat_cmd;
pub mod config_cmd;
pub mod demo_cmd;
pub mod models_cmd;
pub mod rank_cmd;

use std::path::Path;
use std::sync::Arc;

use crate::config;
use crate::models::{LoadProgress, ModelDescriptor, ProgressCallback};
use crate::{Runtime, RuntimeConfig};

/// Exit code for bad arguments or configuration.
pub const EXIT_USAGE: i32 = 2;

/// Build a runtime from the environment and start logging.
pub fn runtime_from_env() -> Result<Runtime, String> {
    let env = config::load();
    if let Some(e) = &env.file_error {
        eprintln!("WARNING: ignoring config file: {}", e);
    }
    // A second init in the same process is harmless for the CLI.
    let _ = crate::telemetry::init_logging(&env.log);
    Runtime::new(RuntimeConfig::from(&env)).map_err(|e| e.to_string())
}

/// Read a descriptor file, printing the error on failure.
pub fn read_descriptor(path: &str) -> Result<ModelDescriptor, String> {
    ModelDescriptor::from_file(Path::new(path)).map_err(|e| e.to_string())
}

/// Progress callback that redraws one stderr line per event.
pub fn progress_printer(name: &str) -> ProgressCallback {
    let name = name.to_string();
    Arc::new(move |p: LoadProgress| {
        eprint!("\rloading {}: {:>3}% ({}/{} bytes)", name, p.percentage, p.loaded, p.total);
        if p.loaded == p.total {
            eprintln!();
        }
    })
}
