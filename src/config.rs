// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration loading from environment variables.
//!
//! Values come from `COUPONLM_*` environment variables, layered over an
//! optional TOML file named by `COUPONLM_CONFIG`, layered over defaults.
//! Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `COUPONLM_CONFIG` | unset | TOML config file path |
//! | `COUPONLM_LOG_LEVEL` | info | Log filter directive |
//! | `COUPONLM_LOG_FORMAT` | json | `json` or `pretty` |
//! | `COUPONLM_CAPABILITY_TIMEOUT_MS` | 2000 | Accelerator capability check timeout |
//! | `COUPONLM_INTRA_OP_THREADS` | 0 | Engine threads (0 = auto) |
//! | `COUPONLM_FETCH_CHUNK_SIZE` | 262144 | Local read chunk size (bytes) |
//! | `COUPONLM_MAX_TOKENS` | 150 | Default generation length |
//! | `COUPONLM_TEMPERATURE` | 0.7 | Default sampling temperature |
//! | `COUPONLM_TOP_P` | 0.9 | Default nucleus mass |
//! | `COUPONLM_TOP_K` | 50 | Default top-k |
//! | `COUPONLM_REPETITION_PENALTY` | 1.1 | Default repetition penalty |
//! | `COUPONLM_SEED` | unset | Fixed sampler seed |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::GenerationConfig;
use crate::models::transport::DEFAULT_CHUNK_SIZE;
use crate::telemetry::{LogConfig, LogFormat};

pub const DEFAULT_CAPABILITY_TIMEOUT_MS: u64 = 2_000;
const MIN_CAPABILITY_TIMEOUT_MS: u64 = 10;
const MIN_CHUNK_SIZE: usize = 4096;

/// Effective runtime configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub config_file: Option<PathBuf>,
    pub log_level: String,
    pub log_format: LogFormat,
    pub capability_timeout_ms: u64,
    pub intra_op_threads: usize,
    pub fetch_chunk_size: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repetition_penalty: f32,
    pub seed: Option<u64>,
}

/// All runtime configuration after layering.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_file: Option<PathBuf>,
    /// Why the config file was ignored, if it was.
    pub file_error: Option<String>,
    pub log: LogConfig,
    pub capability_timeout: Duration,
    pub intra_op_threads: usize,
    pub fetch_chunk_size: usize,
    pub generation: GenerationConfig,
    pub seed: Option<u64>,
}

/// Shape of the optional TOML file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    log: Option<LogConfig>,
    runtime: RuntimeSection,
    generation: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RuntimeSection {
    capability_timeout_ms: Option<u64>,
    intra_op_threads: Option<usize>,
    fetch_chunk_size: Option<usize>,
    seed: Option<u64>,
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.trim().parse::<T>().ok())
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    parse_env(key).unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    parse_env(key).unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    parse_env(key).unwrap_or(default)
}

/// Parse a positive finite `f32`, returning `default` otherwise.
fn parse_positive_f32(key: &str, default: f32) -> f32 {
    match parse_env::<f32>(key) {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => default,
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))
}

/// Replace out-of-range generation values with defaults, field by field.
fn sanitize_generation(config: GenerationConfig) -> GenerationConfig {
    let defaults = GenerationConfig::default();
    GenerationConfig {
        max_tokens: if config.max_tokens > 0 { config.max_tokens } else { defaults.max_tokens },
        temperature: if config.temperature.is_finite() && config.temperature > 0.0 {
            config.temperature
        } else {
            defaults.temperature
        },
        top_p: if config.top_p > 0.0 && config.top_p <= 1.0 { config.top_p } else { defaults.top_p },
        top_k: if config.top_k > 0 { config.top_k } else { defaults.top_k },
        repetition_penalty: if config.repetition_penalty.is_finite() && config.repetition_penalty > 0.0 {
            config.repetition_penalty
        } else {
            defaults.repetition_penalty
        },
    }
}

/// Load generation defaults, environment over `base`.
fn load_generation_config(base: GenerationConfig) -> GenerationConfig {
    let base = sanitize_generation(base);
    let top_p = match parse_env::<f32>("COUPONLM_TOP_P") {
        Some(v) if v > 0.0 && v <= 1.0 => v,
        _ => base.top_p,
    };
    GenerationConfig {
        max_tokens: parse_u32("COUPONLM_MAX_TOKENS", base.max_tokens).max(1),
        temperature: parse_positive_f32("COUPONLM_TEMPERATURE", base.temperature),
        top_p,
        top_k: parse_u32("COUPONLM_TOP_K", base.top_k).max(1),
        repetition_penalty: parse_positive_f32("COUPONLM_REPETITION_PENALTY", base.repetition_penalty),
    }
}

/// Load logging configuration, environment over `base`.
fn load_log_config(base: LogConfig) -> LogConfig {
    let level = std::env::var("COUPONLM_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(base.level);
    let format = std::env::var("COUPONLM_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or(base.format);
    LogConfig { format, level, output_path: base.output_path }
}

/// Load all configuration.
///
/// Missing or invalid values fall back to safe defaults without panicking.
/// An unreadable config file is ignored and reported in `file_error`.
pub fn load() -> EnvConfig {
    let config_file = std::env::var("COUPONLM_CONFIG").ok().map(PathBuf::from);
    let (file, file_error) = match &config_file {
        Some(path) => match read_file_config(path) {
            Ok(file) => (file, None),
            Err(e) => (FileConfig::default(), Some(e)),
        },
        None => (FileConfig::default(), None),
    };

    let runtime = file.runtime;
    let check_ms = parse_u64(
        "COUPONLM_CAPABILITY_TIMEOUT_MS",
        runtime.capability_timeout_ms.unwrap_or(DEFAULT_CAPABILITY_TIMEOUT_MS),
    );
    let check_ms = check_ms.max(MIN_CAPABILITY_TIMEOUT_MS);

    let threads = parse_usize("COUPONLM_INTRA_OP_THREADS", runtime.intra_op_threads.unwrap_or(0));
    let threads = if threads == 0 { num_cpus::get() } else { threads };

    let chunk = parse_usize(
        "COUPONLM_FETCH_CHUNK_SIZE",
        runtime.fetch_chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
    );
    let chunk = chunk.max(MIN_CHUNK_SIZE);

    let seed = parse_env::<u64>("COUPONLM_SEED").or(runtime.seed);

    EnvConfig {
        config_file,
        file_error,
        log: load_log_config(file.log.unwrap_or_default()),
        capability_timeout: Duration::from_millis(check_ms),
        intra_op_threads: threads,
        fetch_chunk_size: chunk,
        generation: load_generation_config(file.generation.unwrap_or_default()),
        seed,
    }
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            config_file: self.config_file.clone(),
            log_level: self.log.level.clone(),
            log_format: self.log.format,
            capability_timeout_ms: self.capability_timeout.as_millis() as u64,
            intra_op_threads: self.intra_op_threads,
            fetch_chunk_size: self.fetch_chunk_size,
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
            top_p: self.generation.top_p,
            top_k: self.generation.top_k,
            repetition_penalty: self.generation.repetition_penalty,
            seed: self.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "COUPONLM_CONFIG",
        "COUPONLM_LOG_LEVEL",
        "COUPONLM_LOG_FORMAT",
        "COUPONLM_CAPABILITY_TIMEOUT_MS",
        "COUPONLM_INTRA_OP_THREADS",
        "COUPONLM_FETCH_CHUNK_SIZE",
        "COUPONLM_MAX_TOKENS",
        "COUPONLM_TEMPERATURE",
        "COUPONLM_TOP_P",
        "COUPONLM_TOP_K",
        "COUPONLM_REPETITION_PENALTY",
        "COUPONLM_SEED",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert!(cfg.config_file.is_none());
        assert_eq!(cfg.log.level, "info");
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.capability_timeout, Duration::from_millis(2_000));
        assert!(cfg.intra_op_threads >= 1);
        assert_eq!(cfg.fetch_chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.generation, GenerationConfig::default());
        assert!(cfg.seed.is_none());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("COUPONLM_MAX_TOKENS", "64");
        std::env::set_var("COUPONLM_TEMPERATURE", "0.2");
        std::env::set_var("COUPONLM_TOP_K", "5");
        std::env::set_var("COUPONLM_LOG_FORMAT", "pretty");
        std::env::set_var("COUPONLM_SEED", "42");
        let cfg = load();
        assert_eq!(cfg.generation.max_tokens, 64);
        assert!((cfg.generation.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(cfg.generation.top_k, 5);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.seed, Some(42));
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("COUPONLM_MAX_TOKENS", "lots");
        std::env::set_var("COUPONLM_TEMPERATURE", "-1");
        std::env::set_var("COUPONLM_TOP_P", "1.5");
        std::env::set_var("COUPONLM_REPETITION_PENALTY", "NaN");
        std::env::set_var("COUPONLM_LOG_FORMAT", "xml");
        let cfg = load();
        assert_eq!(cfg.generation, GenerationConfig::default());
        assert_eq!(cfg.log.format, LogFormat::Json);
        clear_env_vars();
    }

    #[test]
    fn test_floors_apply() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("COUPONLM_CAPABILITY_TIMEOUT_MS", "0");
        std::env::set_var("COUPONLM_FETCH_CHUNK_SIZE", "1");
        std::env::set_var("COUPONLM_MAX_TOKENS", "0");
        let cfg = load();
        assert!(cfg.capability_timeout >= Duration::from_millis(10));
        assert!(cfg.fetch_chunk_size >= 4096);
        assert_eq!(cfg.generation.max_tokens, 1);
        clear_env_vars();
    }

    #[test]
    fn test_toml_file_layer_under_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[log]
level = "debug"

[runtime]
capability_timeout_ms = 500
seed = 7

[generation]
max_tokens = 32
top_k = 0
"#
        )
        .unwrap();
        std::env::set_var("COUPONLM_CONFIG", file.path());
        std::env::set_var("COUPONLM_SEED", "9");

        let cfg = load();
        assert!(cfg.file_error.is_none());
        assert_eq!(cfg.log.level, "debug");
        assert_eq!(cfg.capability_timeout, Duration::from_millis(500));
        assert_eq!(cfg.generation.max_tokens, 32);
        // Out-of-range file value falls back to the default.
        assert_eq!(cfg.generation.top_k, 50);
        assert_eq!(cfg.seed, Some(9));
        clear_env_vars();
    }

    #[test]
    fn test_unreadable_file_is_reported_not_fatal() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("COUPONLM_CONFIG", "/no/such/couponlm.toml");
        let cfg = load();
        assert!(cfg.file_error.is_some());
        assert_eq!(cfg.generation, GenerationConfig::default());
        clear_env_vars();
    }

    #[test]
    fn test_effective_config_serializes() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().effective_config();
        let json = serde_json::to_string(&eff).unwrap();
        assert!(json.contains("\"max_tokens\":150"));
    }
}
