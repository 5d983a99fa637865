//! Adapter from a [`Seq2SeqModel`] to the beam search scoring seam.

use super::{DecoderInput, EncoderMemory, Seq2SeqModel};
use crate::engine::{top_k, DecodeError, ScoreInput, ScoreRequest, ScoringFunction, TokenId, TopK};

/// Scores hypotheses with a model over a pre-encoded source batch.
pub struct ModelScorer<'m> {
    model: &'m dyn Seq2SeqModel,
    memories: Vec<Option<EncoderMemory>>,
}

impl<'m> ModelScorer<'m> {
    /// Encode every non-empty source; empty sources are never scored.
    pub fn new(model: &'m dyn Seq2SeqModel, sources: &[Vec<TokenId>]) -> Result<Self, DecodeError> {
        let memories = sources
            .iter()
            .map(|source| {
                if source.is_empty() {
                    Ok(None)
                } else {
                    model.encode(source).map(Some)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { model, memories })
    }

    pub fn model(&self) -> &dyn Seq2SeqModel {
        self.model
    }

    fn memory(&self, item: usize) -> Result<&EncoderMemory, DecodeError> {
        self.memories
            .get(item)
            .and_then(Option::as_ref)
            .ok_or_else(|| DecodeError::ScoringFailure(format!("no encoded source for batch item {}", item)))
    }
}

impl ScoringFunction for ModelScorer<'_> {
    fn score(&self, request: ScoreRequest<'_>) -> Result<TopK, DecodeError> {
        let ScoreRequest {
            beam_size: k,
            items,
            input,
            ..
        } = request;
        let rows = items.len() * k;
        let item_of = |row: usize| items[row / k];
        let mut candidates = Vec::with_capacity(rows);

        match input {
            ScoreInput::Full { prefixes } => {
                for (row, prefix) in prefixes.iter().enumerate().take(rows) {
                    let memory = self.memory(item_of(row))?;
                    let step = self.model.decode_step(memory, DecoderInput::Prefix(prefix))?;
                    candidates.push(top_k(&step.log_probs, k));
                }
            }
            ScoreInput::Incremental { last_tokens, cache } => {
                let mut appended: Vec<Vec<Vec<f32>>> = vec![Vec::with_capacity(rows); self.model.num_layers()];
                for (row, &token) in last_tokens.iter().enumerate().take(rows) {
                    let memory = self.memory(item_of(row))?;
                    let history = cache
                        .entry(row)
                        .ok_or_else(|| DecodeError::ScoringFailure(format!("cache has no row {}", row)))?;
                    let step = self
                        .model
                        .decode_step(memory, DecoderInput::Incremental { token, history })?;
                    for (states, state) in appended.iter_mut().zip(step.layer_states) {
                        states.push(state);
                    }
                    candidates.push(top_k(&step.log_probs, k));
                }
                for (layer, states) in appended.into_iter().enumerate() {
                    cache.append(layer, states)?;
                }
            }
        }

        TopK::from_rows(k, candidates)
    }

    fn cache_layers(&self) -> usize {
        self.model.num_layers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BeamSearch, DecodeConfig};
    use crate::models::{ModelConfig, TransformerModel};

    fn model() -> TransformerModel {
        TransformerModel::new(ModelConfig {
            src_vocab_size: 16,
            dst_vocab_size: 16,
            hidden_units: 8,
            num_blocks: 1,
            num_heads: 2,
            seed: 21,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_empty_sources_are_not_encoded() {
        let model = model();
        let scorer = ModelScorer::new(&model, &[vec![], vec![5, 6]]).unwrap();
        assert!(scorer.memory(0).is_err());
        assert!(scorer.memory(1).is_ok());
        assert_eq!(scorer.cache_layers(), 1);
    }

    #[test]
    fn test_cached_decode_matches_uncached() {
        let model = model();
        let sources = vec![vec![4, 5, 6], vec![], vec![7, 8]];
        let scorer = ModelScorer::new(&model, &sources).unwrap();

        let run = |use_cache| {
            let config = DecodeConfig {
                beam_size: 3,
                max_target_length: 6,
                use_cache,
                ..Default::default()
            };
            BeamSearch::new(config).unwrap().decode(&scorer, &sources).unwrap()
        };
        let cached = run(true);
        let uncached = run(false);
        assert_eq!(cached.predictions, uncached.predictions);
        assert_eq!(cached.scores, uncached.scores);
        assert!(cached.predictions[1].is_empty());
    }
}
