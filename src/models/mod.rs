// Copyright 2024-2026 NMT-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Scoring networks for beam search.
//!
//! Two sequence-to-sequence architectures behind one [`Seq2SeqModel`]
//! interface: a self-attention Transformer and a recurrent attention model.
//! Both support full-prefix and incremental (cached) decoding with
//! bit-identical results.

mod attention;
mod layers;
mod recurrent;
mod scorer;
mod transformer;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{DecodeError, TokenId, RESERVED_TOKENS};
use crate::memory::{CacheEntry, CacheError};

pub use recurrent::RecurrentModel;
pub use scorer::ModelScorer;
pub use transformer::TransformerModel;

/// Model architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    Transformer,
    Recurrent,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transformer => write!(f, "transformer"),
            Self::Recurrent => write!(f, "recurrent"),
        }
    }
}

impl FromStr for Architecture {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transformer" => Ok(Self::Transformer),
            "recurrent" | "rnn" | "rnnsearch" => Ok(Self::Recurrent),
            other => Err(ModelError::InvalidConfig(format!("unknown architecture '{}'", other))),
        }
    }
}

/// Hyperparameters shared by both architectures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub architecture: Architecture,
    pub src_vocab_size: usize,
    pub dst_vocab_size: usize,
    pub hidden_units: usize,
    /// Encoder/decoder blocks (Transformer only).
    pub num_blocks: usize,
    pub num_heads: usize,
    /// Feed-forward width as a multiple of `hidden_units`.
    pub ff_multiplier: usize,
    /// Multiply embeddings by `sqrt(hidden_units)`.
    pub scale_embedding: bool,
    /// Tile size of the attention kernel.
    pub attention_block_size: usize,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::Transformer,
            src_vocab_size: 8192,
            dst_vocab_size: 8192,
            hidden_units: 256,
            num_blocks: 2,
            num_heads: 4,
            ff_multiplier: 4,
            scale_embedding: true,
            attention_block_size: 64,
            seed: 1234,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        let min_vocab = RESERVED_TOKENS.len() + 1;
        if self.src_vocab_size < min_vocab || self.dst_vocab_size < min_vocab {
            return Err(ModelError::InvalidConfig(format!(
                "vocabulary sizes must be at least {}",
                min_vocab
            )));
        }
        if self.hidden_units == 0 || self.num_heads == 0 || self.hidden_units % self.num_heads != 0 {
            return Err(ModelError::InvalidConfig(format!(
                "hidden_units ({}) must be a positive multiple of num_heads ({})",
                self.hidden_units, self.num_heads
            )));
        }
        if self.architecture == Architecture::Transformer && self.num_blocks == 0 {
            return Err(ModelError::InvalidConfig("num_blocks must be at least 1".into()));
        }
        if self.ff_multiplier == 0 {
            return Err(ModelError::InvalidConfig("ff_multiplier must be at least 1".into()));
        }
        Ok(())
    }
}

/// Encoder output for one source sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderMemory {
    states: Vec<Vec<f32>>,
    valid: Vec<bool>,
}

impl EncoderMemory {
    pub(crate) fn new(states: Vec<Vec<f32>>, valid: Vec<bool>) -> Self {
        Self { states, valid }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[Vec<f32>] {
        &self.states
    }

    /// `false` at PAD positions.
    pub fn valid(&self) -> &[bool] {
        &self.valid
    }

    pub(crate) fn context(&self) -> Vec<&[f32]> {
        self.states.iter().map(Vec::as_slice).collect()
    }
}

/// Decoder input for one hypothesis.
#[derive(Debug, Clone, Copy)]
pub enum DecoderInput<'a> {
    /// Whole prefix, recomputed from scratch.
    Prefix(&'a [TokenId]),
    /// Newest token plus the cached states of all earlier positions.
    Incremental {
        token: TokenId,
        history: &'a CacheEntry,
    },
}

/// Result of one decoder step.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderStep {
    /// Log-probabilities over the full target vocabulary.
    pub log_probs: Vec<f32>,
    /// One state per cache layer for the newest position.
    pub layer_states: Vec<Vec<f32>>,
}

/// Encoder-decoder network usable as a beam search scorer.
pub trait Seq2SeqModel: Send + Sync {
    fn architecture(&self) -> Architecture;

    /// Layers of incremental state per position.
    fn num_layers(&self) -> usize;

    fn dst_vocab_size(&self) -> usize;

    fn encode(&self, source: &[TokenId]) -> Result<EncoderMemory, ModelError>;

    fn decode_step(&self, memory: &EncoderMemory, input: DecoderInput<'_>) -> Result<DecoderStep, ModelError>;
}

/// Incremental decoder core shared by the architectures.
///
/// `advance` consumes one token given the cached history and returns the
/// per-layer states to cache plus the top hidden vector. The full-prefix path
/// folds `advance` over a scratch history so both paths run identical
/// arithmetic.
pub(crate) trait IncrementalDecoder {
    fn cache_layers(&self) -> usize;

    fn advance(
        &self,
        memory: &EncoderMemory,
        token: TokenId,
        history: &CacheEntry,
    ) -> Result<(Vec<Vec<f32>>, Vec<f32>), ModelError>;

    fn project(&self, hidden: &[f32]) -> Vec<f32>;

    fn run(&self, memory: &EncoderMemory, input: DecoderInput<'_>) -> Result<DecoderStep, ModelError> {
        let (layer_states, hidden) = match input {
            DecoderInput::Incremental { token, history } => {
                if history.num_layers() != self.cache_layers() {
                    return Err(ModelError::Cache(CacheError::LayerCountMismatch {
                        expected: self.cache_layers(),
                        actual: history.num_layers(),
                    }));
                }
                self.advance(memory, token, history)?
            }
            DecoderInput::Prefix(prefix) => {
                let (&last, earlier) = prefix.split_last().ok_or(ModelError::EmptyPrefix)?;
                let mut scratch = CacheEntry::new(self.cache_layers());
                for &token in earlier {
                    let (states, _) = self.advance(memory, token, &scratch)?;
                    scratch.push_step(states)?;
                }
                self.advance(memory, last, &scratch)?
            }
        };
        Ok(DecoderStep {
            log_probs: crate::engine::log_softmax(&self.project(&hidden)),
            layer_states,
        })
    }
}

/// Build a model from its configuration.
pub fn build_model(config: &ModelConfig) -> Result<Arc<dyn Seq2SeqModel>, ModelError> {
    config.validate()?;
    tracing::info!(
        architecture = %config.architecture,
        hidden_units = config.hidden_units,
        num_blocks = config.num_blocks,
        seed = config.seed,
        "building model"
    );
    let model: Arc<dyn Seq2SeqModel> = match config.architecture {
        Architecture::Transformer => Arc::new(TransformerModel::new(config.clone())?),
        Architecture::Recurrent => Arc::new(RecurrentModel::new(config.clone())?),
    };
    Ok(model)
}

/// Errors from model construction and evaluation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Token {token} out of range for vocabulary of {vocab_size}")]
    TokenOutOfRange { token: TokenId, vocab_size: usize },

    #[error("Decoder prefix is empty")]
    EmptyPrefix,

    #[error("Source sequence is empty")]
    EmptySource,

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<ModelError> for DecodeError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Cache(e) => DecodeError::Cache(e),
            other => DecodeError::Model(other.to_string()),
        }
    }
}
