//! Recurrent encoder-decoder with attention.
//!
//! Bidirectional GRU encoder; the decoder is a single GRU that attends over
//! the encoder states with its previous hidden state. The cache holds one
//! hidden state per decoded position.

use super::attention::MultiHeadAttention;
use super::layers::{concat, Embedding, GruCell, Initializer, Linear};
use super::{
    Architecture, DecoderInput, DecoderStep, EncoderMemory, IncrementalDecoder, ModelConfig, ModelError,
    Seq2SeqModel,
};
use crate::engine::{TokenId, PAD_ID};
use crate::memory::CacheEntry;

/// GRU encoder-decoder (RNNSearch style).
pub struct RecurrentModel {
    config: ModelConfig,
    src_embedding: Embedding,
    dst_embedding: Embedding,
    forward_cell: GruCell,
    backward_cell: GruCell,
    bridge: Linear,
    attention: MultiHeadAttention,
    decoder_cell: GruCell,
    readout: Linear,
}

impl RecurrentModel {
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        config.validate()?;
        let mut init = Initializer::new(config.seed);
        let dim = config.hidden_units;

        Ok(Self {
            src_embedding: Embedding::new(&mut init, config.src_vocab_size, dim),
            dst_embedding: Embedding::new(&mut init, config.dst_vocab_size, dim),
            forward_cell: GruCell::new(&mut init, dim, dim),
            backward_cell: GruCell::new(&mut init, dim, dim),
            bridge: Linear::new(&mut init, 2 * dim, dim),
            attention: MultiHeadAttention::new(&mut init, dim, config.num_heads, config.attention_block_size),
            decoder_cell: GruCell::new(&mut init, 2 * dim, dim),
            readout: Linear::new(&mut init, 2 * dim, dim),
            config,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Run a GRU over `inputs`, carrying the state unchanged across PAD positions.
    fn scan<'a>(
        cell: &GruCell,
        inputs: impl Iterator<Item = (&'a [f32], bool)>,
    ) -> Vec<Vec<f32>> {
        let mut state = vec![0.0; cell.hidden_dim()];
        inputs
            .map(|(input, valid)| {
                if valid {
                    state = cell.step(input, &state);
                }
                state.clone()
            })
            .collect()
    }
}

impl IncrementalDecoder for RecurrentModel {
    fn cache_layers(&self) -> usize {
        1
    }

    fn advance(
        &self,
        memory: &EncoderMemory,
        token: TokenId,
        history: &CacheEntry,
    ) -> Result<(Vec<Vec<f32>>, Vec<f32>), ModelError> {
        let dim = self.config.hidden_units;
        let zero = vec![0.0; dim];
        let previous = history.last(0).unwrap_or(zero.as_slice());

        let embedded = self.dst_embedding.lookup(token)?;
        let context = self
            .attention
            .forward(previous, &memory.context(), Some(memory.valid()));
        let hidden = self.decoder_cell.step(&concat(embedded, &context), previous);

        let output: Vec<f32> = self
            .readout
            .forward(&concat(&hidden, &context))
            .into_iter()
            .map(f32::tanh)
            .collect();
        Ok((vec![hidden], output))
    }

    fn project(&self, hidden: &[f32]) -> Vec<f32> {
        self.dst_embedding.project(hidden)
    }
}

impl Seq2SeqModel for RecurrentModel {
    fn architecture(&self) -> Architecture {
        Architecture::Recurrent
    }

    fn num_layers(&self) -> usize {
        1
    }

    fn dst_vocab_size(&self) -> usize {
        self.config.dst_vocab_size
    }

    fn encode(&self, source: &[TokenId]) -> Result<EncoderMemory, ModelError> {
        if source.is_empty() {
            return Err(ModelError::EmptySource);
        }
        let valid: Vec<bool> = source.iter().map(|&t| t != PAD_ID).collect();
        let embedded = source
            .iter()
            .map(|&t| self.src_embedding.lookup(t))
            .collect::<Result<Vec<_>, _>>()?;

        let forward = Self::scan(&self.forward_cell, embedded.iter().copied().zip(valid.iter().copied()));
        let mut backward = Self::scan(
            &self.backward_cell,
            embedded.iter().copied().zip(valid.iter().copied()).rev(),
        );
        backward.reverse();

        let states = forward
            .iter()
            .zip(&backward)
            .map(|(f, b)| self.bridge.forward(&concat(f, b)))
            .collect();
        Ok(EncoderMemory::new(states, valid))
    }

    fn decode_step(&self, memory: &EncoderMemory, input: DecoderInput<'_>) -> Result<DecoderStep, ModelError> {
        self.run(memory, input)
    }
}
