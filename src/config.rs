//! Translator configuration from a TOML file and `NMT_CORE_*` environment variables.
//!
//! Environment values are applied on top of the file (or the defaults).
//! Invalid environment values fall back to the current value without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `NMT_CORE_BEAM_SIZE` | 4 | Hypotheses per batch item (1..=64) |
//! | `NMT_CORE_MAX_TARGET_LENGTH` | 256 | Hard cap on decoding steps (1..=4096) |
//! | `NMT_CORE_LP_ALPHA` | 0.6 | Length penalty exponent (0..=10) |
//! | `NMT_CORE_USE_CACHE` | true | Incremental decoding |
//! | `NMT_CORE_SOURCE_SLACK` | 50 | Steps allowed beyond the longest source |
//! | `NMT_CORE_SHARDS` | 1 | Parallel decode shards (0 = one per CPU) |
//! | `NMT_CORE_ARCHITECTURE` | transformer | `transformer` or `recurrent` |
//! | `NMT_CORE_HIDDEN_UNITS` | 256 | Model width |
//! | `NMT_CORE_NUM_BLOCKS` | 2 | Transformer blocks |
//! | `NMT_CORE_SRC_VOCAB_SIZE` | 8192 | Source vocabulary size |
//! | `NMT_CORE_DST_VOCAB_SIZE` | 8192 | Target vocabulary size |
//! | `NMT_CORE_SEED` | 1234 | Weight initialization seed |
//! | `NMT_CORE_LOG_LEVEL` | info | Log filter directives |
//! | `NMT_CORE_LOG_FORMAT` | json | `json` or `pretty` |

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::DecodeConfig;
use crate::models::{Architecture, ModelConfig};
use crate::telemetry::{LogConfig, LogFormat};

/// Complete translator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub model: ModelConfig,
    pub decode: DecodeConfig,
    /// Parallel decode shards; 0 means one per logical CPU.
    pub shards: usize,
    pub log: LogConfig,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            decode: DecodeConfig::default(),
            shards: 1,
            log: LogConfig::default(),
        }
    }
}

impl TranslatorConfig {
    /// Check decode and model settings together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decode
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.model
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.decode.beam_size > self.model.dst_vocab_size {
            return Err(ConfigError::Invalid(format!(
                "beam_size {} exceeds target vocabulary size {}",
                self.decode.beam_size, self.model.dst_vocab_size
            )));
        }
        Ok(())
    }

    /// Shard count with 0 resolved to the number of logical CPUs.
    pub fn resolved_shards(&self) -> usize {
        if self.shards == 0 {
            num_cpus::get().max(1)
        } else {
            self.shards
        }
    }

    /// Flat summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            beam_size: self.decode.beam_size,
            max_target_length: self.decode.max_target_length,
            lp_alpha: self.decode.lp_alpha,
            use_cache: self.decode.use_cache,
            source_length_slack: self.decode.source_length_slack,
            shards: self.resolved_shards(),
            architecture: self.model.architecture.to_string(),
            hidden_units: self.model.hidden_units,
            num_blocks: self.model.num_blocks,
            num_heads: self.model.num_heads,
            src_vocab_size: self.model.src_vocab_size,
            dst_vocab_size: self.model.dst_vocab_size,
            seed: self.model.seed,
            log_level: self.log.level.clone(),
            log_format: self.log.format.to_string(),
        }
    }
}

/// Effective configuration summary.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub beam_size: usize,
    pub max_target_length: usize,
    pub lp_alpha: f32,
    pub use_cache: bool,
    pub source_length_slack: usize,
    pub shards: usize,
    pub architecture: String,
    pub hidden_units: usize,
    pub num_blocks: usize,
    pub num_heads: usize,
    pub src_vocab_size: usize,
    pub dst_vocab_size: usize,
    pub seed: u64,
    pub log_level: String,
    pub log_format: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a finite `f32` env var, returning `default` on missing or invalid.
fn parse_f32(key: &str, default: f32) -> f32 {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/0`, `true/false`, `yes/no`, `on/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn apply_decode_env(decode: &mut DecodeConfig) {
    decode.beam_size = parse_usize("NMT_CORE_BEAM_SIZE", decode.beam_size).clamp(1, 64);
    decode.max_target_length =
        parse_usize("NMT_CORE_MAX_TARGET_LENGTH", decode.max_target_length).clamp(1, 4096);
    decode.lp_alpha = parse_f32("NMT_CORE_LP_ALPHA", decode.lp_alpha).clamp(0.0, 10.0);
    decode.use_cache = parse_bool("NMT_CORE_USE_CACHE", decode.use_cache);
    decode.source_length_slack = parse_usize("NMT_CORE_SOURCE_SLACK", decode.source_length_slack).min(1024);
}

fn apply_model_env(model: &mut ModelConfig) {
    if let Ok(val) = std::env::var("NMT_CORE_ARCHITECTURE") {
        model.architecture = val.parse::<Architecture>().unwrap_or(model.architecture);
    }
    model.hidden_units = parse_usize("NMT_CORE_HIDDEN_UNITS", model.hidden_units).clamp(8, 4096);
    model.num_blocks = parse_usize("NMT_CORE_NUM_BLOCKS", model.num_blocks).clamp(1, 24);
    model.src_vocab_size = parse_usize("NMT_CORE_SRC_VOCAB_SIZE", model.src_vocab_size).clamp(5, 1_000_000);
    model.dst_vocab_size = parse_usize("NMT_CORE_DST_VOCAB_SIZE", model.dst_vocab_size).clamp(5, 1_000_000);
    model.seed = parse_u64("NMT_CORE_SEED", model.seed);
}

fn apply_log_env(log: &mut LogConfig) {
    if let Ok(level) = std::env::var("NMT_CORE_LOG_LEVEL") {
        if !level.trim().is_empty() {
            log.level = level.trim().to_string();
        }
    }
    if let Ok(format) = std::env::var("NMT_CORE_LOG_FORMAT") {
        log.format = format.parse::<LogFormat>().unwrap_or(log.format);
    }
}

/// Apply `NMT_CORE_*` overrides to an existing configuration.
pub fn apply_env(config: &mut TranslatorConfig) {
    apply_decode_env(&mut config.decode);
    apply_model_env(&mut config.model);
    apply_log_env(&mut config.log);
    config.shards = parse_usize("NMT_CORE_SHARDS", config.shards).min(256);
}

/// Load configuration from environment variables over the defaults.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> TranslatorConfig {
    let mut config = TranslatorConfig::default();
    apply_env(&mut config);
    config
}

/// Parse a TOML configuration file. Missing sections take their defaults.
pub fn load_file(path: impl AsRef<Path>) -> Result<TranslatorConfig, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// File (if any) then environment overrides.
pub fn load_layered(path: Option<&Path>) -> Result<TranslatorConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_file(path)?,
        None => TranslatorConfig::default(),
    };
    apply_env(&mut config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "NMT_CORE_BEAM_SIZE",
        "NMT_CORE_MAX_TARGET_LENGTH",
        "NMT_CORE_LP_ALPHA",
        "NMT_CORE_USE_CACHE",
        "NMT_CORE_SOURCE_SLACK",
        "NMT_CORE_SHARDS",
        "NMT_CORE_ARCHITECTURE",
        "NMT_CORE_HIDDEN_UNITS",
        "NMT_CORE_NUM_BLOCKS",
        "NMT_CORE_SRC_VOCAB_SIZE",
        "NMT_CORE_DST_VOCAB_SIZE",
        "NMT_CORE_SEED",
        "NMT_CORE_LOG_LEVEL",
        "NMT_CORE_LOG_FORMAT",
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
        assert_eq!(cfg.decode.beam_size, 4);
        assert_eq!(cfg.decode.max_target_length, 256);
        assert_eq!(cfg.decode.source_length_slack, 50);
        assert!(cfg.decode.use_cache);
        assert_eq!(cfg.shards, 1);
        assert_eq!(cfg.model.architecture, Architecture::Transformer);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("NMT_CORE_BEAM_SIZE", "8");
        std::env::set_var("NMT_CORE_LP_ALPHA", "1.0");
        std::env::set_var("NMT_CORE_USE_CACHE", "off");
        std::env::set_var("NMT_CORE_ARCHITECTURE", "recurrent");
        std::env::set_var("NMT_CORE_SHARDS", "3");
        std::env::set_var("NMT_CORE_LOG_FORMAT", "pretty");
        let cfg = load();
        assert_eq!(cfg.decode.beam_size, 8);
        assert_eq!(cfg.decode.lp_alpha, 1.0);
        assert!(!cfg.decode.use_cache);
        assert_eq!(cfg.model.architecture, Architecture::Recurrent);
        assert_eq!(cfg.shards, 3);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("NMT_CORE_BEAM_SIZE", "many");
        std::env::set_var("NMT_CORE_LP_ALPHA", "NaN");
        std::env::set_var("NMT_CORE_USE_CACHE", "maybe");
        std::env::set_var("NMT_CORE_ARCHITECTURE", "lstm");
        let cfg = load();
        assert_eq!(cfg.decode.beam_size, 4);
        assert_eq!(cfg.decode.lp_alpha, 0.6);
        assert!(cfg.decode.use_cache);
        assert_eq!(cfg.model.architecture, Architecture::Transformer);
        clear_env_vars();
    }

    #[test]
    fn test_values_are_clamped() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("NMT_CORE_BEAM_SIZE", "0");
        std::env::set_var("NMT_CORE_MAX_TARGET_LENGTH", "999999");
        let cfg = load();
        assert_eq!(cfg.decode.beam_size, 1);
        assert_eq!(cfg.decode.max_target_length, 4096);
        clear_env_vars();
    }

    #[test]
    fn test_load_file_with_env_override() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "shards = 2\n\n[decode]\nbeam_size = 6\n\n[model]\narchitecture = \"recurrent\"\nhidden_units = 64"
        )
        .unwrap();

        let cfg = load_file(file.path()).unwrap();
        assert_eq!(cfg.shards, 2);
        assert_eq!(cfg.decode.beam_size, 6);
        assert_eq!(cfg.decode.max_target_length, 256);
        assert_eq!(cfg.model.hidden_units, 64);

        std::env::set_var("NMT_CORE_BEAM_SIZE", "2");
        let cfg = load_layered(Some(file.path())).unwrap();
        assert_eq!(cfg.decode.beam_size, 2);
        assert_eq!(cfg.model.architecture, Architecture::Recurrent);
        clear_env_vars();
    }

    #[test]
    fn test_load_file_errors() {
        assert!(matches!(
            load_file("/nonexistent/nmt-core.toml"),
            Err(ConfigError::Io { .. })
        ));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[decode\nbeam_size = ").unwrap();
        assert!(matches!(load_file(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_beam_wider_than_vocab() {
        let mut cfg = TranslatorConfig::default();
        cfg.model.dst_vocab_size = 6;
        cfg.decode.beam_size = 8;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_effective_config_resolves_shards() {
        let cfg = TranslatorConfig {
            shards: 0,
            ..Default::default()
        };
        let eff = cfg.effective_config();
        assert!(eff.shards >= 1);
        assert_eq!(eff.architecture, "transformer");
        assert!(serde_json::to_string(&eff).unwrap().contains("\"beam_size\":4"));
    }
}
