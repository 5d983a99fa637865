//! NMT-CORE
//!
//! Beam search decoding for sequence-to-sequence translation models.
//!
//! - [`engine`]: beam state, step function, search controller, padding
//! - [`memory`]: per-layer incremental decoder cache
//! - [`models`]: Transformer and recurrent scoring networks
//! - [`vocab`]: word vocabularies
//! - [`Translator`]: sharded batch translation on the tokio blocking pool

pub mod cli;
pub mod config;
pub mod engine;
pub mod eval;
pub mod memory;
pub mod models;
pub mod telemetry;
pub mod vocab;

use std::sync::Arc;

use engine::{BeamSearch, DecodeConfig, DecodeError, DecodeOutput, DecodeStats, TokenId, TokenMatrix};
use eval::LossReport;
use models::{build_model, ModelScorer, Seq2SeqModel};

pub use config::TranslatorConfig;

/// Result of translating one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Best hypothesis per source with BOS removed. Decoded items share one
    /// width, the number of steps the whole batch needed.
    pub predictions: Vec<Vec<TokenId>>,
    pub scores: Vec<f32>,
    /// Predictions right-padded with EOS.
    pub padded: TokenMatrix,
    pub stats: DecodeStats,
}

/// A model plus decode settings, shared across shards.
pub struct Translator {
    model: Arc<dyn Seq2SeqModel>,
    decode: DecodeConfig,
    shards: usize,
}

impl Translator {
    /// Build the model described by `config`.
    pub fn new(config: TranslatorConfig) -> Result<Self, DecodeError> {
        config
            .validate()
            .map_err(|e| DecodeError::Configuration(e.to_string()))?;
        let shards = config.resolved_shards();
        let model = build_model(&config.model)?;
        Self::with_model(model, config.decode, shards)
    }

    /// Wrap an existing model. `shards = 0` means one per logical CPU.
    pub fn with_model(model: Arc<dyn Seq2SeqModel>, decode: DecodeConfig, shards: usize) -> Result<Self, DecodeError> {
        decode.validate()?;
        if decode.beam_size > model.dst_vocab_size() {
            return Err(DecodeError::Configuration(format!(
                "beam_size {} exceeds target vocabulary size {}",
                decode.beam_size,
                model.dst_vocab_size()
            )));
        }
        let shards = if shards == 0 { num_cpus::get().max(1) } else { shards };
        tracing::info!(
            architecture = %model.architecture(),
            beam_size = decode.beam_size,
            shards,
            "translator ready"
        );
        Ok(Self { model, decode, shards })
    }

    pub fn model(&self) -> &Arc<dyn Seq2SeqModel> {
        &self.model
    }

    pub fn decode_config(&self) -> &DecodeConfig {
        &self.decode
    }

    pub fn shards(&self) -> usize {
        self.shards
    }

    /// Decode the whole batch on the current thread.
    pub fn translate_blocking(&self, sources: &[Vec<TokenId>]) -> Result<Translation, DecodeError> {
        let padded_length = longest(sources);
        let output = decode_shard(self.model.as_ref(), sources, &self.decode, padded_length)?;
        Ok(self.finish(output))
    }

    /// Split the batch into contiguous shards and decode them in parallel.
    ///
    /// Each shard has its own beam state and cache; model weights are shared.
    /// Results are concatenated in input order.
    pub async fn translate(&self, sources: Vec<Vec<TokenId>>) -> Result<Translation, DecodeError> {
        if sources.is_empty() {
            return Ok(self.finish(DecodeOutput {
                predictions: Vec::new(),
                scores: Vec::new(),
                stats: DecodeStats::default(),
            }));
        }

        let padded_length = longest(&sources);
        let chunk_size = (sources.len() + self.shards - 1) / self.shards;
        let mut handles = Vec::with_capacity(self.shards);
        for (shard, chunk) in sources.chunks(chunk_size).enumerate() {
            let model = Arc::clone(&self.model);
            let config = self.decode.clone();
            let chunk = chunk.to_vec();
            telemetry::record_shard(shard, chunk.len());
            handles.push(tokio::task::spawn_blocking(move || {
                decode_shard(model.as_ref(), &chunk, &config, padded_length)
            }));
        }

        let mut merged = DecodeOutput {
            predictions: Vec::with_capacity(sources.len()),
            scores: Vec::with_capacity(sources.len()),
            stats: DecodeStats::default(),
        };
        for joined in futures::future::join_all(handles).await {
            let output = joined.map_err(|e| DecodeError::Runtime(e.to_string()))??;
            merged.predictions.extend(output.predictions);
            merged.scores.extend(output.scores);
            merged.stats.merge(&output.stats);
        }
        extend_finished(&mut merged.predictions, self.decode.special_tokens.eos);
        Ok(self.finish(merged))
    }

    /// Teacher-forced loss of `targets` given `sources`.
    pub fn evaluate(&self, sources: &[Vec<TokenId>], targets: &[Vec<TokenId>]) -> Result<LossReport, DecodeError> {
        Ok(eval::loss_sum(self.model.as_ref(), sources, targets)?)
    }

    fn finish(&self, output: DecodeOutput) -> Translation {
        let padded = output.padded(self.decode.special_tokens.eos);
        Translation {
            predictions: output.predictions,
            scores: output.scores,
            padded,
            stats: output.stats,
        }
    }
}

/// A shard stops once its own items finish; the rest of the batch would have
/// appended only EOS to them.
fn extend_finished(predictions: &mut [Vec<TokenId>], eos: TokenId) {
    let width = predictions.iter().map(Vec::len).max().unwrap_or(0);
    for prediction in predictions.iter_mut().filter(|p| !p.is_empty()) {
        prediction.resize(width, eos);
    }
}

fn longest(sources: &[Vec<TokenId>]) -> usize {
    sources.iter().map(Vec::len).max().unwrap_or(0)
}

fn decode_shard(
    model: &dyn Seq2SeqModel,
    sources: &[Vec<TokenId>],
    config: &DecodeConfig,
    padded_length: usize,
) -> Result<DecodeOutput, DecodeError> {
    let scorer = ModelScorer::new(model, sources)?;
    BeamSearch::new(config.clone())?
        .with_padded_source_length(padded_length)
        .decode(&scorer, sources)
}
