//! Beam search decoding engine.
//!
//! Hypothesis expansion, length-penalized pruning, finished-sequence
//! masking, and cache reindexing over a pluggable scoring function.

pub mod beam_state;
pub mod config;
pub mod error;
pub mod padding;
pub mod scoring;
pub mod search;
pub mod step;
pub mod tokens;

pub use beam_state::{BeamState, Hypothesis, NEG_SENTINEL};
pub use config::DecodeConfig;
pub use error::DecodeError;
pub use padding::{pad_batch, TokenMatrix};
pub use scoring::{log_softmax, top_k, FnScorer, ScoreInput, ScoreRequest, ScoringFunction, TopK};
pub use search::{beam_decode, BeamSearch, DecodeOutput, DecodeStats};
pub use step::{step, LengthPenalty, StepReport};
pub use tokens::{SpecialTokens, TokenId, BOS_ID, EOS_ID, PAD_ID, RESERVED_TOKENS, UNK_ID};
