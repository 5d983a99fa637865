//! End-to-end decoding through the built-in models.
//!
//! Both architectures must give bit-identical results with and without the
//! incremental cache, and must be reproducible from their seed.

use nmt_core::engine::{BeamSearch, DecodeConfig, TokenId, EOS_ID, PAD_ID};
use nmt_core::eval::loss_sum;
use nmt_core::models::{build_model, Architecture, ModelConfig, ModelScorer, Seq2SeqModel};

fn small_config(architecture: Architecture) -> ModelConfig {
    ModelConfig {
        architecture,
        src_vocab_size: 24,
        dst_vocab_size: 20,
        hidden_units: 16,
        num_blocks: 2,
        num_heads: 2,
        ff_multiplier: 2,
        attention_block_size: 3,
        seed: 7,
        ..Default::default()
    }
}

fn sources() -> Vec<Vec<TokenId>> {
    vec![
        vec![5, 9, 12, EOS_ID],
        vec![],
        vec![7, EOS_ID],
        vec![20, 21, 6, 6, 8, 11, EOS_ID],
    ]
}

fn decode(model: &dyn Seq2SeqModel, use_cache: bool, beam_size: usize) -> nmt_core::engine::DecodeOutput {
    let sources = sources();
    let scorer = ModelScorer::new(model, &sources).unwrap();
    let config = DecodeConfig {
        beam_size,
        max_target_length: 12,
        lp_alpha: 0.6,
        use_cache,
        ..Default::default()
    };
    BeamSearch::new(config).unwrap().decode(&scorer, &sources).unwrap()
}

fn score_bits(scores: &[f32]) -> Vec<u32> {
    scores.iter().map(|s| s.to_bits()).collect()
}

#[test]
fn test_transformer_cache_equivalence() {
    let model = build_model(&small_config(Architecture::Transformer)).unwrap();
    for beam_size in [1, 3] {
        let cached = decode(model.as_ref(), true, beam_size);
        let plain = decode(model.as_ref(), false, beam_size);
        assert_eq!(cached.predictions, plain.predictions);
        assert_eq!(score_bits(&cached.scores), score_bits(&plain.scores));
    }
}

#[test]
fn test_recurrent_cache_equivalence() {
    let model = build_model(&small_config(Architecture::Recurrent)).unwrap();
    for beam_size in [1, 4] {
        let cached = decode(model.as_ref(), true, beam_size);
        let plain = decode(model.as_ref(), false, beam_size);
        assert_eq!(cached.predictions, plain.predictions);
        assert_eq!(score_bits(&cached.scores), score_bits(&plain.scores));
    }
}

#[test]
fn test_models_are_reproducible_from_seed() {
    for architecture in [Architecture::Transformer, Architecture::Recurrent] {
        let a = build_model(&small_config(architecture)).unwrap();
        let b = build_model(&small_config(architecture)).unwrap();
        assert_eq!(decode(a.as_ref(), true, 2), decode(b.as_ref(), true, 2));
    }
}

#[test]
fn test_model_output_shape() {
    for architecture in [Architecture::Transformer, Architecture::Recurrent] {
        let model = build_model(&small_config(architecture)).unwrap();
        let output = decode(model.as_ref(), true, 3);

        assert_eq!(output.predictions.len(), 4);
        assert!(output.predictions[1].is_empty());
        assert_eq!(output.scores[1], 0.0);
        assert_eq!(output.stats.skipped_items, 1);
        for (item, prediction) in output.predictions.iter().enumerate() {
            if item != 1 {
                assert_eq!(prediction.len(), output.stats.steps, "item {}", item);
            }
            assert!(prediction.len() <= 12, "item {}", item);
            assert!(prediction.iter().all(|&t| (t as usize) < 20));
            if let Some(pos) = prediction.iter().position(|&t| t == EOS_ID) {
                assert!(prediction[pos..].iter().all(|&t| t == EOS_ID), "item {}", item);
            }
        }
        assert!(output.scores.iter().all(|s| s.is_finite() && *s <= 0.0));
    }
}

#[test]
fn test_source_token_out_of_range_is_model_error() {
    let model = build_model(&small_config(Architecture::Transformer)).unwrap();
    let sources = vec![vec![5, 99]];
    assert!(ModelScorer::new(model.as_ref(), &sources).is_err());
}

#[test]
fn test_loss_sum_skips_padding() {
    for architecture in [Architecture::Transformer, Architecture::Recurrent] {
        let model = build_model(&small_config(architecture)).unwrap();
        let sources = vec![vec![5, 9, EOS_ID], vec![7, EOS_ID]];
        let targets = vec![vec![6, 8, EOS_ID], vec![10, EOS_ID, PAD_ID]];

        let report = loss_sum(model.as_ref(), &sources, &targets).unwrap();
        assert_eq!(report.tokens, 5);
        assert!(report.loss_sum > 0.0);
        assert!(report.perplexity() > 1.0);

        // Trailing PAD in the target changes nothing.
        let unpadded = vec![vec![6, 8, EOS_ID], vec![10, EOS_ID]];
        let again = loss_sum(model.as_ref(), &sources, &unpadded).unwrap();
        assert_eq!(again.tokens, report.tokens);
        assert!((again.loss_sum - report.loss_sum).abs() < 1e-9);
    }
}
