//! Decode configuration.
//!
//! All fields have safe defaults. Configuration is validated before use.

use serde::{Deserialize, Serialize};

use super::error::DecodeError;
use super::tokens::SpecialTokens;

/// Per-call beam search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Hypotheses kept per batch item.
    pub beam_size: usize,
    /// Hard ceiling on decoding steps.
    pub max_target_length: usize,
    /// Length penalty exponent (0.0 disables normalization).
    pub lp_alpha: f32,
    /// Incremental decoding through the per-layer cache.
    pub use_cache: bool,
    /// Steps allowed beyond the longest source before stopping.
    pub source_length_slack: usize,
    /// Reserved token ids.
    pub special_tokens: SpecialTokens,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            beam_size: 4,
            max_target_length: 256,
            lp_alpha: 0.6,
            use_cache: true,
            source_length_slack: 50,
            special_tokens: SpecialTokens::default(),
        }
    }
}

impl DecodeConfig {
    /// Validate configuration values. Returns error on invalid values.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.beam_size < 1 {
            return Err(DecodeError::Configuration("beam_size must be >= 1".into()));
        }
        if self.max_target_length < 1 {
            return Err(DecodeError::Configuration(
                "max_target_length must be >= 1".into(),
            ));
        }
        if !self.lp_alpha.is_finite() {
            return Err(DecodeError::Configuration(format!(
                "lp_alpha must be finite, got {}",
                self.lp_alpha
            )));
        }
        if !self.special_tokens.is_distinct() {
            return Err(DecodeError::Configuration(
                "special token ids must be distinct".into(),
            ));
        }
        Ok(())
    }

    /// Greedy decoding: one hypothesis per item, no length normalization.
    pub fn greedy() -> Self {
        Self {
            beam_size: 1,
            lp_alpha: 0.0,
            ..Default::default()
        }
    }

    /// Step bound for a batch whose longest source has `source_length` tokens.
    pub fn step_bound(&self, source_length: usize) -> usize {
        source_length
            .saturating_add(self.source_length_slack)
            .min(self.max_target_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DecodeConfig::default().validate().is_ok());
        assert!(DecodeConfig::greedy().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_beam() {
        let config = DecodeConfig { beam_size: 0, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rejects_zero_max_target_length() {
        let config = DecodeConfig { max_target_length: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_finite_alpha() {
        for alpha in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let config = DecodeConfig { lp_alpha: alpha, ..Default::default() };
            assert!(config.validate().is_err(), "alpha {} accepted", alpha);
        }
    }

    #[test]
    fn test_step_bound() {
        let config = DecodeConfig { max_target_length: 100, ..Default::default() };
        assert_eq!(config.step_bound(10), 60);
        assert_eq!(config.step_bound(70), 100);
        assert_eq!(config.step_bound(usize::MAX), 100);
    }

    #[test]
    fn test_deserialize_partial_toml() {
        let config: DecodeConfig = toml::from_str("beam_size = 8\nuse_cache = false").unwrap();
        assert_eq!(config.beam_size, 8);
        assert!(!config.use_cache);
        assert_eq!(config.max_target_length, 256);
    }
}
