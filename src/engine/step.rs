//! One beam search iteration.
//!
//! Scores every live hypothesis, expands each into `beam_size` candidates,
//! ranks the `beam_size * beam_size` candidates of each batch item by
//! length-penalized score, keeps the best `beam_size`, and gathers the beam
//! state and the cache with the same parent rows.

use crate::engine::beam_state::{BeamState, NEG_SENTINEL};
use crate::engine::scoring::{ranked_indices, ScoreInput, ScoreRequest, ScoringFunction, TopK};
use crate::engine::{DecodeConfig, DecodeError, TokenId};
use crate::memory::CacheStore;

/// GNMT length normalization: `((5 + len) / 6) ^ alpha`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthPenalty {
    pub alpha: f32,
}

impl LengthPenalty {
    pub const fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    /// Penalty factor for a hypothesis of `length` tokens.
    pub fn factor(&self, length: usize) -> f32 {
        ((5.0 + length as f32) / 6.0).powf(self.alpha)
    }

    /// Length-penalized ranking score.
    pub fn apply(&self, score: f32, length: usize) -> f32 {
        score / self.factor(length)
    }
}

/// Summary of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// 1-based step index.
    pub step: usize,
    /// Non-finite log-probabilities replaced by the sentinel.
    pub numeric_anomalies: usize,
    /// Finished hypotheses after the step.
    pub finished: usize,
}

/// Candidate expansions of one batch item, indexed `parent_beam * k + rank`.
struct Candidates {
    tokens: Vec<TokenId>,
    scores: Vec<f32>,
    lengths: Vec<usize>,
    ranking: Vec<f32>,
}

/// Run one decoding step over every batch item.
///
/// `items` holds the caller batch index of each decoded item. When `cache`
/// is present the scorer receives only the last token of each hypothesis
/// and must extend the cache by exactly one position.
pub fn step<S>(
    scorer: &S,
    state: &mut BeamState,
    cache: Option<&mut CacheStore>,
    step: usize,
    items: &[usize],
    config: &DecodeConfig,
) -> Result<StepReport, DecodeError>
where
    S: ScoringFunction + ?Sized,
{
    let k = state.beam_size();
    let rows = state.num_rows();
    let eos = config.special_tokens.eos;
    let penalty = LengthPenalty::new(config.lp_alpha);

    if items.len() != state.batch_size() {
        return Err(DecodeError::InvalidInput(format!(
            "{} batch items for a beam state of {}",
            items.len(),
            state.batch_size()
        )));
    }

    let mut cache = cache;
    let top = match cache.as_deref_mut() {
        Some(store) => {
            if store.rows() != rows {
                return Err(DecodeError::InvalidInput(format!(
                    "cache has {} rows, beam state has {}",
                    store.rows(),
                    rows
                )));
            }
            let last_tokens = state.last_tokens();
            let top = scorer.score(ScoreRequest {
                step,
                beam_size: k,
                items,
                input: ScoreInput::Incremental {
                    last_tokens: &last_tokens,
                    cache: &mut *store,
                },
            })?;
            if !store.is_consistent() || store.seq_len() != state.sequence_len() {
                return Err(DecodeError::ScoringFailure(format!(
                    "cache holds {} positions after step {}, expected {}",
                    store.seq_len(),
                    step,
                    state.sequence_len()
                )));
            }
            top
        }
        None => scorer.score(ScoreRequest {
            step,
            beam_size: k,
            items,
            input: ScoreInput::Full {
                prefixes: state.sequences(),
            },
        })?,
    };

    if top.k() != k || top.rows() != rows {
        return Err(DecodeError::ScoringFailure(format!(
            "scorer returned {} rows x {} candidates, expected {} x {}",
            top.rows(),
            top.k(),
            rows,
            k
        )));
    }

    let mut parents = Vec::with_capacity(rows);
    let mut next_tokens = Vec::with_capacity(rows);
    let mut next_scores = Vec::with_capacity(rows);
    let mut next_lengths = Vec::with_capacity(rows);
    let mut anomalies = 0;

    for batch in 0..state.batch_size() {
        let candidates = expand(state, &top, batch, eos, penalty, &mut anomalies);
        for c in ranked_indices(&candidates.ranking, k) {
            parents.push(batch * k + c / k);
            next_tokens.push(candidates.tokens[c]);
            next_scores.push(candidates.scores[c]);
            next_lengths.push(candidates.lengths[c]);
        }
    }

    state.gather(&parents, &next_tokens, next_scores, next_lengths, eos);
    if let Some(store) = cache {
        store.reindex(&parents)?;
    }

    if anomalies > 0 {
        tracing::warn!(step, anomalies, "non-finite log-probabilities replaced");
    }
    let finished = rows - state.unfinished_count();
    tracing::debug!(step, finished, rows, "beam step complete");

    Ok(StepReport {
        step,
        numeric_anomalies: anomalies,
        finished,
    })
}

/// Expand the beam of one batch item into `k * k` scored candidates.
///
/// A finished hypothesis contributes one score-neutral `eos` continuation
/// (rank 0) and `k - 1` sentinel-scored ones.
fn expand(
    state: &BeamState,
    top: &TopK,
    batch: usize,
    eos: TokenId,
    penalty: LengthPenalty,
    anomalies: &mut usize,
) -> Candidates {
    let k = state.beam_size();
    let mut out = Candidates {
        tokens: Vec::with_capacity(k * k),
        scores: Vec::with_capacity(k * k),
        lengths: Vec::with_capacity(k * k),
        ranking: Vec::with_capacity(k * k),
    };

    for (beam, parent) in state.beam(batch).enumerate() {
        let row = state.row(batch, beam);
        for rank in 0..k {
            let (token, log_prob) = if parent.finished {
                (eos, if rank == 0 { 0.0 } else { NEG_SENTINEL })
            } else {
                (top.token(row, rank), sanitize(top.log_prob(row, rank), anomalies))
            };
            let score = parent.score + log_prob;
            let length = parent.length + usize::from(token != eos);
            out.tokens.push(token);
            out.scores.push(score);
            out.lengths.push(length);
            out.ranking.push(penalty.apply(score, length));
        }
    }
    out
}

/// Replace non-finite log-probabilities with the sentinel.
///
/// NaN and +inf are counted as anomalies; -inf is an ordinary zero
/// probability and is clamped silently.
fn sanitize(log_prob: f32, anomalies: &mut usize) -> f32 {
    if log_prob.is_finite() {
        log_prob
    } else if log_prob == f32::NEG_INFINITY {
        NEG_SENTINEL
    } else {
        *anomalies += 1;
        NEG_SENTINEL
    }
}
