//! Beam search controller.
//!
//! Drives the step function until every hypothesis has emitted EOS or the
//! step bound `min(max_source_length + slack, max_target_length)` is reached,
//! then keeps the highest-scoring hypothesis of each batch item.

use std::time::Instant;

use crate::engine::beam_state::BeamState;
use crate::engine::padding::{pad_batch, TokenMatrix};
use crate::engine::scoring::ScoringFunction;
use crate::engine::step::{step, StepReport};
use crate::engine::{DecodeConfig, DecodeError, TokenId};
use crate::memory::CacheStore;
use crate::telemetry::{self, DecodeSpan, SpanExt};

/// Counters for one decode call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    /// Steps executed.
    pub steps: usize,
    /// Non-finite log-probabilities absorbed.
    pub numeric_anomalies: usize,
    /// Items with an empty source that bypassed decoding.
    pub skipped_items: usize,
    /// Decoded items whose best hypothesis emitted EOS.
    pub finished_items: usize,
}

impl DecodeStats {
    /// Combine counters of independently decoded shards.
    pub fn merge(&mut self, other: &DecodeStats) {
        self.steps = self.steps.max(other.steps);
        self.numeric_anomalies += other.numeric_anomalies;
        self.skipped_items += other.skipped_items;
        self.finished_items += other.finished_items;
    }
}

/// Best hypothesis per batch item.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutput {
    /// Tokens after BOS. Every decoded item has one token per executed step;
    /// finished hypotheses carry a trailing run of EOS.
    pub predictions: Vec<Vec<TokenId>>,
    /// Cumulative log-probability of each prediction (0 for skipped items).
    pub scores: Vec<f32>,
    pub stats: DecodeStats,
}

impl DecodeOutput {
    /// Rectangular form, right-padded with `eos`.
    pub fn padded(&self, eos: TokenId) -> TokenMatrix {
        pad_batch(&self.predictions, eos)
    }
}

/// Beam search over an arbitrary scoring function.
#[derive(Debug, Clone)]
pub struct BeamSearch {
    config: DecodeConfig,
    padded_source_length: usize,
}

impl BeamSearch {
    /// Create a controller. The configuration is validated here.
    pub fn new(config: DecodeConfig) -> Result<Self, DecodeError> {
        config.validate()?;
        Ok(Self {
            config,
            padded_source_length: 0,
        })
    }

    /// Treat sources as padded to at least `length` when computing the step
    /// bound, so a shard of a larger batch stops where the whole batch would.
    pub fn with_padded_source_length(mut self, length: usize) -> Self {
        self.padded_source_length = length;
        self
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Decode a batch of source sequences.
    pub fn decode<S>(&self, scorer: &S, sources: &[Vec<TokenId>]) -> Result<DecodeOutput, DecodeError>
    where
        S: ScoringFunction + ?Sized,
    {
        self.decode_observed(scorer, sources, |_, _| {})
    }

    /// Decode, calling `observer` with the beam state after every step.
    pub fn decode_observed<S, F>(
        &self,
        scorer: &S,
        sources: &[Vec<TokenId>],
        observer: F,
    ) -> Result<DecodeOutput, DecodeError>
    where
        S: ScoringFunction + ?Sized,
        F: FnMut(&BeamState, &StepReport),
    {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = DecodeSpan::new(&request_id, sources.len(), self.config.beam_size);
        let _guard = span.enter();
        let start = Instant::now();

        let result = self.run(scorer, sources, observer);

        span.record_result(&result);
        if let Ok(output) = &result {
            let latency = start.elapsed();
            span.record("latency_ms", latency.as_millis() as u64);
            span.record("steps", output.stats.steps as u64);
            telemetry::record_decode(sources.len(), output.stats.steps, latency);
            telemetry::record_numeric_anomalies(output.stats.numeric_anomalies);
            telemetry::record_skipped_items(output.stats.skipped_items);
            tracing::info!(
                items = sources.len(),
                steps = output.stats.steps,
                skipped = output.stats.skipped_items,
                "beam decode complete"
            );
        }
        result
    }

    fn run<S, F>(
        &self,
        scorer: &S,
        sources: &[Vec<TokenId>],
        mut observer: F,
    ) -> Result<DecodeOutput, DecodeError>
    where
        S: ScoringFunction + ?Sized,
        F: FnMut(&BeamState, &StepReport),
    {
        let config = &self.config;

        let items: Vec<usize> = sources
            .iter()
            .enumerate()
            .filter(|(_, source)| !source.is_empty())
            .map(|(i, _)| i)
            .collect();

        let mut stats = DecodeStats {
            skipped_items: sources.len() - items.len(),
            ..Default::default()
        };
        let mut predictions = vec![Vec::new(); sources.len()];
        let mut scores = vec![0.0; sources.len()];

        if items.is_empty() {
            return Ok(DecodeOutput { predictions, scores, stats });
        }

        let max_source_length = items
            .iter()
            .map(|&i| sources[i].len())
            .max()
            .unwrap_or(0)
            .max(self.padded_source_length);
        let bound = config.step_bound(max_source_length);

        let mut state = BeamState::new(items.len(), config.beam_size, config.special_tokens.bos);
        let mut cache = config
            .use_cache
            .then(|| CacheStore::new(state.num_rows(), scorer.cache_layers()));

        // `t` is the 1-based index of the step about to run.
        let mut t = 1;
        while state.any_unfinished() && t <= bound {
            let report = step(scorer, &mut state, cache.as_mut(), t, &items, config)?;
            stats.numeric_anomalies += report.numeric_anomalies;
            observer(&state, &report);
            t += 1;
        }
        stats.steps = t - 1;

        for (batch, &item) in items.iter().enumerate() {
            let best = state.hypothesis(state.best_row(batch));
            predictions[item] = strip_bos(best.tokens);
            scores[item] = best.score;
            if best.finished {
                stats.finished_items += 1;
            }
        }

        Ok(DecodeOutput { predictions, scores, stats })
    }
}

/// Decode a batch and pad the predictions into a rectangular matrix.
pub fn beam_decode<S>(
    scorer: &S,
    sources: &[Vec<TokenId>],
    config: DecodeConfig,
) -> Result<TokenMatrix, DecodeError>
where
    S: ScoringFunction + ?Sized,
{
    let eos = config.special_tokens.eos;
    let output = BeamSearch::new(config)?.decode(scorer, sources)?;
    Ok(output.padded(eos))
}

fn strip_bos(tokens: &[TokenId]) -> Vec<TokenId> {
    tokens.get(1..).unwrap_or(&[]).to_vec()
}
