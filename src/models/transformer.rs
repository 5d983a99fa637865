//! Self-attention encoder-decoder.
//!
//! The decoder cache holds, for every block, the block's input at each
//! earlier position; keys and values for causal self-attention are
//! projected from those inputs.

use super::attention::MultiHeadAttention;
use super::layers::{add, timing_signal, Embedding, FeedForward, Initializer, LayerNorm};
use super::{
    Architecture, DecoderInput, DecoderStep, EncoderMemory, IncrementalDecoder, ModelConfig, ModelError,
    Seq2SeqModel,
};
use crate::engine::{TokenId, PAD_ID};
use crate::memory::CacheEntry;

struct EncoderBlock {
    self_attention: MultiHeadAttention,
    attention_norm: LayerNorm,
    feed_forward: FeedForward,
    ff_norm: LayerNorm,
}

struct DecoderBlock {
    self_attention: MultiHeadAttention,
    self_norm: LayerNorm,
    encoder_attention: MultiHeadAttention,
    encoder_norm: LayerNorm,
    feed_forward: FeedForward,
    ff_norm: LayerNorm,
}

/// Transformer with tied target embedding and output projection.
pub struct TransformerModel {
    config: ModelConfig,
    src_embedding: Embedding,
    dst_embedding: Embedding,
    encoder: Vec<EncoderBlock>,
    decoder: Vec<DecoderBlock>,
}

impl TransformerModel {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        config.validate()?;
        let mut init = Initializer::new(config.seed);
        let dim = config.hidden_units;
        let heads = config.num_heads;
        let block = config.attention_block_size;
        let ff_dim = dim * config.ff_multiplier;

        let src_embedding = Embedding::new(&mut init, config.src_vocab_size, dim);
        let dst_embedding = Embedding::new(&mut init, config.dst_vocab_size, dim);

        let encoder = (0..config.num_blocks)
            .map(|_| EncoderBlock {
                self_attention: MultiHeadAttention::new(&mut init, dim, heads, block),
                attention_norm: LayerNorm::new(dim),
                feed_forward: FeedForward::new(&mut init, dim, ff_dim),
                ff_norm: LayerNorm::new(dim),
            })
            .collect();
        let decoder = (0..config.num_blocks)
            .map(|_| DecoderBlock {
                self_attention: MultiHeadAttention::new(&mut init, dim, heads, block),
                self_norm: LayerNorm::new(dim),
                encoder_attention: MultiHeadAttention::new(&mut init, dim, heads, block),
                encoder_norm: LayerNorm::new(dim),
                feed_forward: FeedForward::new(&mut init, dim, ff_dim),
                ff_norm: LayerNorm::new(dim),
            })
            .collect();

        Ok(Self {
            config,
            src_embedding,
            dst_embedding,
            encoder,
            decoder,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn embed(&self, table: &Embedding, token: TokenId, position: usize) -> Result<Vec<f32>, ModelError> {
        let dim = self.config.hidden_units;
        let scale = if self.config.scale_embedding {
            (dim as f32).sqrt()
        } else {
            1.0
        };
        let embedded: Vec<f32> = table.lookup(token)?.iter().map(|x| x * scale).collect();
        Ok(add(&embedded, &timing_signal(position, dim)))
    }
}

impl IncrementalDecoder for TransformerModel {
    fn cache_layers(&self) -> usize {
        self.decoder.len()
    }

    fn advance(
        &self,
        memory: &EncoderMemory,
        token: TokenId,
        history: &CacheEntry,
    ) -> Result<(Vec<Vec<f32>>, Vec<f32>), ModelError> {
        let mut x = self.embed(&self.dst_embedding, token, history.seq_len())?;
        let encoder_context = memory.context();
        let mut states = Vec::with_capacity(self.decoder.len());

        for (layer, block) in self.decoder.iter().enumerate() {
            let mut context: Vec<&[f32]> = history.layer(layer).iter().map(Vec::as_slice).collect();
            context.push(&x);
            let attended = block.self_attention.forward(&x, &context, None);
            states.push(x.clone());
            x = block.self_norm.forward(&add(&x, &attended));

            let attended = block
                .encoder_attention
                .forward(&x, &encoder_context, Some(memory.valid()));
            x = block.encoder_norm.forward(&add(&x, &attended));

            let transformed = block.feed_forward.forward(&x);
            x = block.ff_norm.forward(&add(&x, &transformed));
        }
        Ok((states, x))
    }

    fn project(&self, hidden: &[f32]) -> Vec<f32> {
        self.dst_embedding.project(hidden)
    }
}

impl Seq2SeqModel for TransformerModel {
    fn architecture(&self) -> Architecture {
        Architecture::Transformer
    }

    fn num_layers(&self) -> usize {
        self.decoder.len()
    }

    fn dst_vocab_size(&self) -> usize {
        self.config.dst_vocab_size
    }

    fn encode(&self, source: &[TokenId]) -> Result<EncoderMemory, ModelError> {
        if source.is_empty() {
            return Err(ModelError::EmptySource);
        }
        let valid: Vec<bool> = source.iter().map(|&t| t != PAD_ID).collect();
        let mut states = source
            .iter()
            .enumerate()
            .map(|(pos, &token)| self.embed(&self.src_embedding, token, pos))
            .collect::<Result<Vec<_>, _>>()?;

        for block in &self.encoder {
            let attended: Vec<Vec<f32>> = {
                let context: Vec<&[f32]> = states.iter().map(Vec::as_slice).collect();
                states
                    .iter()
                    .map(|x| block.self_attention.forward(x, &context, Some(&valid)))
                    .collect()
            };
            states = states
                .iter()
                .zip(&attended)
                .map(|(x, a)| {
                    let x = block.attention_norm.forward(&add(x, a));
                    let transformed = block.feed_forward.forward(&x);
                    block.ff_norm.forward(&add(&x, &transformed))
                })
                .collect();
        }
        Ok(EncoderMemory::new(states, valid))
    }

    fn decode_step(&self, memory: &EncoderMemory, input: DecoderInput<'_>) -> Result<DecoderStep, ModelError> {
        self.run(memory, input)
    }
}
