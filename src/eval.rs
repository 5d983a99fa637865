//! Held-out loss of a model under teacher forcing.

use crate::engine::{TokenId, BOS_ID, PAD_ID};
use crate::memory::CacheEntry;
use crate::models::{DecoderInput, ModelError, Seq2SeqModel};

/// Summed negative log-likelihood over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LossReport {
    pub loss_sum: f64,
    /// Non-PAD target tokens scored.
    pub tokens: usize,
}

impl LossReport {
    pub fn perplexity(&self) -> f64 {
        perplexity(self.loss_sum, self.tokens)
    }
}

/// Sum of `-log p(y_t | BOS y_<t, x)` over non-PAD target positions.
///
/// The decoder input is the target shifted right behind BOS. Items with an
/// empty source contribute nothing.
pub fn loss_sum(
    model: &dyn Seq2SeqModel,
    sources: &[Vec<TokenId>],
    targets: &[Vec<TokenId>],
) -> Result<LossReport, ModelError> {
    if sources.len() != targets.len() {
        return Err(ModelError::InvalidConfig(format!(
            "{} sources but {} targets",
            sources.len(),
            targets.len()
        )));
    }

    let mut report = LossReport::default();
    for (source, target) in sources.iter().zip(targets) {
        if source.is_empty() {
            continue;
        }
        let memory = model.encode(source)?;
        let mut history = CacheEntry::new(model.num_layers());
        let mut input = BOS_ID;
        for &expected in target {
            let step = model.decode_step(&memory, DecoderInput::Incremental { token: input, history: &history })?;
            history.push_step(step.layer_states)?;
            if expected != PAD_ID {
                let log_prob = step.log_probs.get(expected as usize).copied().ok_or(
                    ModelError::TokenOutOfRange {
                        token: expected,
                        vocab_size: step.log_probs.len(),
                    },
                )?;
                report.loss_sum -= f64::from(log_prob);
                report.tokens += 1;
            }
            input = expected;
        }
    }
    tracing::debug!(loss_sum = report.loss_sum, tokens = report.tokens, "evaluated batch");
    Ok(report)
}

/// `exp(loss_sum / tokens)`; 1 when nothing was scored.
pub fn perplexity(loss_sum: f64, tokens: usize) -> f64 {
    if tokens == 0 {
        1.0
    } else {
        (loss_sum / tokens as f64).exp()
    }
}
