//! Scoring function seam between the beam search and the scoring network.
//!
//! A scoring function receives every live hypothesis of the flattened
//! `batch_size * beam_size` grid and returns its `beam_size` best next tokens
//! with their log-probabilities. With caching enabled it only sees the most
//! recent token of each hypothesis and must append exactly one position per
//! layer to the cache store.

use crate::engine::{DecodeError, TokenId};
use crate::memory::CacheStore;

/// Input for one scoring call.
#[derive(Debug)]
pub enum ScoreInput<'a> {
    /// Full prefix of every row (no cache, full recomputation).
    Full { prefixes: &'a [Vec<TokenId>] },
    /// Most recent token of every row plus the incremental cache.
    Incremental {
        last_tokens: &'a [TokenId],
        cache: &'a mut CacheStore,
    },
}

/// One scoring call over the flattened hypothesis grid.
#[derive(Debug)]
pub struct ScoreRequest<'a> {
    /// 1-based decoding step.
    pub step: usize,
    /// Hypotheses per batch item (also the number of candidates requested).
    pub beam_size: usize,
    /// Caller batch index of each decoded item, in row-block order.
    pub items: &'a [usize],
    pub input: ScoreInput<'a>,
}

impl ScoreRequest<'_> {
    /// Number of flattened rows.
    pub fn num_rows(&self) -> usize {
        self.items.len() * self.beam_size
    }

    /// Caller batch index owning a flattened row.
    pub fn batch_item(&self, row: usize) -> usize {
        self.items[row / self.beam_size]
    }

    pub fn is_incremental(&self) -> bool {
        matches!(self.input, ScoreInput::Incremental { .. })
    }
}

/// Top-k candidates for every row, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TopK {
    k: usize,
    tokens: Vec<TokenId>,
    log_probs: Vec<f32>,
}

impl TopK {
    /// Build from row-major buffers of `rows * k` entries.
    pub fn new(k: usize, tokens: Vec<TokenId>, log_probs: Vec<f32>) -> Result<Self, DecodeError> {
        if k == 0 || tokens.len() != log_probs.len() || tokens.len() % k != 0 {
            return Err(DecodeError::ScoringFailure(format!(
                "malformed top-k: k={}, {} tokens, {} log-probs",
                k,
                tokens.len(),
                log_probs.len()
            )));
        }
        Ok(Self { k, tokens, log_probs })
    }

    /// Collect per-row candidate lists.
    pub fn from_rows(k: usize, rows: Vec<Vec<(TokenId, f32)>>) -> Result<Self, DecodeError> {
        let mut tokens = Vec::with_capacity(rows.len() * k);
        let mut log_probs = Vec::with_capacity(rows.len() * k);
        for (row, candidates) in rows.into_iter().enumerate() {
            if candidates.len() != k {
                return Err(DecodeError::ScoringFailure(format!(
                    "row {} has {} candidates, expected {}",
                    row,
                    candidates.len(),
                    k
                )));
            }
            for (token, log_prob) in candidates {
                tokens.push(token);
                log_probs.push(log_prob);
            }
        }
        Self::new(k, tokens, log_probs)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn rows(&self) -> usize {
        self.tokens.len() / self.k
    }

    pub fn token(&self, row: usize, rank: usize) -> TokenId {
        self.tokens[row * self.k + rank]
    }

    pub fn log_prob(&self, row: usize, rank: usize) -> f32 {
        self.log_probs[row * self.k + rank]
    }
}

/// Next-token scorer consumed by the beam search.
pub trait ScoringFunction {
    fn score(&self, request: ScoreRequest<'_>) -> Result<TopK, DecodeError>;

    /// Layers of incremental state the scorer keeps in the cache store.
    fn cache_layers(&self) -> usize {
        1
    }
}

impl<S: ScoringFunction + ?Sized> ScoringFunction for &S {
    fn score(&self, request: ScoreRequest<'_>) -> Result<TopK, DecodeError> {
        (**self).score(request)
    }

    fn cache_layers(&self) -> usize {
        (**self).cache_layers()
    }
}

impl<S: ScoringFunction + ?Sized> ScoringFunction for Box<S> {
    fn score(&self, request: ScoreRequest<'_>) -> Result<TopK, DecodeError> {
        (**self).score(request)
    }

    fn cache_layers(&self) -> usize {
        (**self).cache_layers()
    }
}

/// Adapts a closure into a [`ScoringFunction`].
pub struct FnScorer<F>(pub F);

impl<F> ScoringFunction for FnScorer<F>
where
    F: Fn(ScoreRequest<'_>) -> Result<TopK, DecodeError>,
{
    fn score(&self, request: ScoreRequest<'_>) -> Result<TopK, DecodeError> {
        (self.0)(request)
    }
}

/// The `k` largest entries of a distribution as `(token, log_prob)`.
///
/// Ordered by non-increasing log-probability; equal values keep the lower
/// token id first. NaN sorts below every number.
pub fn top_k(log_probs: &[f32], k: usize) -> Vec<(TokenId, f32)> {
    ranked_indices(log_probs, k)
        .into_iter()
        .map(|i| (i as TokenId, log_probs[i]))
        .collect()
}

/// Indices of the `k` largest values, best first, lowest index on ties.
pub(crate) fn ranked_indices(values: &[f32], k: usize) -> Vec<usize> {
    let rank = |v: f32| if v.is_nan() { f32::NEG_INFINITY } else { v };
    let by_score = |a: &usize, b: &usize| {
        rank(values[*b])
            .total_cmp(&rank(values[*a]))
            .then(a.cmp(b))
    };
    let mut order: Vec<usize> = (0..values.len()).collect();
    let k = k.min(order.len());
    if k == 0 {
        return Vec::new();
    }
    if k < order.len() {
        order.select_nth_unstable_by(k - 1, by_score);
        order.truncate(k);
    }
    order.sort_by(by_score);
    order
}

/// Numerically stable log-softmax.
pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return logits.iter().map(|_| f32::NAN).collect();
    }
    let sum: f32 = logits.iter().map(|&x| (x - max).exp()).sum();
    let log_sum = sum.ln() + max;
    logits.iter().map(|&x| x - log_sum).collect()
}
