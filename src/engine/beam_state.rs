//! Beam state carried across decoding steps.
//!
//! Hypotheses are stored flattened over a `batch_size x beam_size` grid,
//! batch-major and beam-minor: row `b * beam_size + k` is hypothesis `k`
//! of batch item `b`. Every gather preserves this order.

use crate::engine::TokenId;

/// Large negative finite score standing in for minus infinity.
pub const NEG_SENTINEL: f32 = -1e10;

/// Read-only view of one hypothesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hypothesis<'a> {
    pub tokens: &'a [TokenId],
    pub score: f32,
    pub length: usize,
    pub finished: bool,
}

/// Mutable per-hypothesis decoding state for one decode call.
#[derive(Debug, Clone)]
pub struct BeamState {
    batch_size: usize,
    beam_size: usize,
    sequences: Vec<Vec<TokenId>>,
    scores: Vec<f32>,
    lengths: Vec<usize>,
    finished: Vec<bool>,
}

impl BeamState {
    /// Every hypothesis starts as `[bos]`; only beam 0 of each item is alive.
    pub fn new(batch_size: usize, beam_size: usize, bos: TokenId) -> Self {
        let rows = batch_size * beam_size;
        let scores = (0..rows)
            .map(|row| if row % beam_size == 0 { 0.0 } else { NEG_SENTINEL })
            .collect();
        Self {
            batch_size,
            beam_size,
            sequences: vec![vec![bos]; rows],
            scores,
            lengths: vec![0; rows],
            finished: vec![false; rows],
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn beam_size(&self) -> usize {
        self.beam_size
    }

    pub fn num_rows(&self) -> usize {
        self.sequences.len()
    }

    /// Flattened row of hypothesis `beam` of item `batch`.
    pub fn row(&self, batch: usize, beam: usize) -> usize {
        batch * self.beam_size + beam
    }

    pub fn hypothesis(&self, row: usize) -> Hypothesis<'_> {
        Hypothesis {
            tokens: &self.sequences[row],
            score: self.scores[row],
            length: self.lengths[row],
            finished: self.finished[row],
        }
    }

    /// All hypotheses of one batch item.
    pub fn beam(&self, batch: usize) -> impl Iterator<Item = Hypothesis<'_>> + '_ {
        let start = batch * self.beam_size;
        (start..start + self.beam_size).map(move |row| self.hypothesis(row))
    }

    pub fn sequences(&self) -> &[Vec<TokenId>] {
        &self.sequences
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn finished(&self) -> &[bool] {
        &self.finished
    }

    /// Most recently generated token of every row.
    pub fn last_tokens(&self) -> Vec<TokenId> {
        self.sequences
            .iter()
            .map(|s| *s.last().unwrap_or(&0))
            .collect()
    }

    /// Number of tokens in every sequence (including BOS).
    pub fn sequence_len(&self) -> usize {
        self.sequences.first().map_or(0, Vec::len)
    }

    pub fn any_unfinished(&self) -> bool {
        self.finished.iter().any(|f| !f)
    }

    pub fn unfinished_count(&self) -> usize {
        self.finished.iter().filter(|f| !**f).count()
    }

    /// Replace all rows: row `i` becomes `parents[i]` extended with `tokens[i]`.
    ///
    /// A hypothesis is finished iff its appended token is `eos`.
    pub(crate) fn gather(
        &mut self,
        parents: &[usize],
        tokens: &[TokenId],
        scores: Vec<f32>,
        lengths: Vec<usize>,
        eos: TokenId,
    ) {
        debug_assert_eq!(parents.len(), self.num_rows());
        self.sequences = parents
            .iter()
            .zip(tokens)
            .map(|(&parent, &token)| {
                let mut seq = Vec::with_capacity(self.sequences[parent].len() + 1);
                seq.extend_from_slice(&self.sequences[parent]);
                seq.push(token);
                seq
            })
            .collect();
        self.finished = tokens.iter().map(|&t| t == eos).collect();
        self.scores = scores;
        self.lengths = lengths;
    }

    /// Row of the highest cumulative score in a batch item (lowest beam on ties).
    pub fn best_row(&self, batch: usize) -> usize {
        let start = batch * self.beam_size;
        let mut best = start;
        for row in start + 1..start + self.beam_size {
            if self.scores[row] > self.scores[best] {
                best = row;
            }
        }
        best
    }
}
