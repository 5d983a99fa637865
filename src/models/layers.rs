// Copyright 2024-2026 NMT-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Dense building blocks shared by the model architectures.
//!
//! All vectors are plain `Vec<f32>`; matrices are row-major `[out x in]`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ModelError;
use crate::engine::TokenId;

/// Seeded weight initializer (uniform, fan-average scaling).
pub(crate) struct Initializer {
    rng: StdRng,
}

impl Initializer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `len` values drawn from `U(-limit, limit)`, `limit = sqrt(3 / ((fan_in + fan_out) / 2))`.
    pub fn uniform(&mut self, fan_in: usize, fan_out: usize, len: usize) -> Vec<f32> {
        let fan_avg = ((fan_in + fan_out) as f32 / 2.0).max(1.0);
        let limit = (3.0 / fan_avg).sqrt();
        (0..len).map(|_| self.rng.gen_range(-limit..limit)).collect()
    }
}

/// Affine map `y = W x + b`.
#[derive(Debug, Clone)]
pub(crate) struct Linear {
    weight: Vec<f32>,
    bias: Vec<f32>,
    input_dim: usize,
    output_dim: usize,
}

impl Linear {
    pub fn new(init: &mut Initializer, input_dim: usize, output_dim: usize) -> Self {
        Self {
            weight: init.uniform(input_dim, output_dim, input_dim * output_dim),
            bias: vec![0.0; output_dim],
            input_dim,
            output_dim,
        }
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.input_dim);
        self.weight
            .chunks_exact(self.input_dim)
            .zip(&self.bias)
            .map(|(row, b)| dot(row, input) + b)
            .collect()
    }
}

/// Layer normalization with learned gain and bias.
#[derive(Debug, Clone)]
pub(crate) struct LayerNorm {
    gain: Vec<f32>,
    bias: Vec<f32>,
    epsilon: f32,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            gain: vec![1.0; dim],
            bias: vec![0.0; dim],
            epsilon: 1e-6,
        }
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let n = input.len() as f32;
        let mean = input.iter().sum::<f32>() / n;
        let variance = input.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n;
        let inv_std = 1.0 / (variance + self.epsilon).sqrt();
        input
            .iter()
            .zip(self.gain.iter().zip(&self.bias))
            .map(|(x, (g, b))| (x - mean) * inv_std * g + b)
            .collect()
    }
}

/// Token embedding table `[vocab x dim]`.
#[derive(Debug, Clone)]
pub(crate) struct Embedding {
    table: Vec<f32>,
    dim: usize,
}

impl Embedding {
    pub fn new(init: &mut Initializer, vocab_size: usize, dim: usize) -> Self {
        Self {
            table: init.uniform(vocab_size, dim, vocab_size * dim),
            dim,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.table.len() / self.dim
    }

    pub fn lookup(&self, token: TokenId) -> Result<&[f32], ModelError> {
        let index = token as usize;
        if index >= self.vocab_size() {
            return Err(ModelError::TokenOutOfRange {
                token,
                vocab_size: self.vocab_size(),
            });
        }
        Ok(&self.table[index * self.dim..(index + 1) * self.dim])
    }

    /// Logits over the vocabulary for a hidden vector (tied projection).
    pub fn project(&self, hidden: &[f32]) -> Vec<f32> {
        self.table
            .chunks_exact(self.dim)
            .map(|row| dot(row, hidden))
            .collect()
    }
}

/// Position-wise feed-forward network with ReLU.
#[derive(Debug, Clone)]
pub(crate) struct FeedForward {
    inner: Linear,
    outer: Linear,
}

impl FeedForward {
    pub fn new(init: &mut Initializer, dim: usize, inner_dim: usize) -> Self {
        Self {
            inner: Linear::new(init, dim, inner_dim),
            outer: Linear::new(init, inner_dim, dim),
        }
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut hidden = self.inner.forward(input);
        hidden.iter_mut().for_each(|x| *x = x.max(0.0));
        self.outer.forward(&hidden)
    }
}

/// Gated recurrent unit.
#[derive(Debug, Clone)]
pub(crate) struct GruCell {
    update: Linear,
    reset: Linear,
    candidate: Linear,
    hidden_dim: usize,
}

impl GruCell {
    pub fn new(init: &mut Initializer, input_dim: usize, hidden_dim: usize) -> Self {
        Self {
            update: Linear::new(init, input_dim + hidden_dim, hidden_dim),
            reset: Linear::new(init, input_dim + hidden_dim, hidden_dim),
            candidate: Linear::new(init, input_dim + hidden_dim, hidden_dim),
            hidden_dim,
        }
    }

    pub fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    pub fn step(&self, input: &[f32], state: &[f32]) -> Vec<f32> {
        let joined = concat(input, state);
        let z: Vec<f32> = self.update.forward(&joined).into_iter().map(sigmoid).collect();
        let r: Vec<f32> = self.reset.forward(&joined).into_iter().map(sigmoid).collect();

        let gated: Vec<f32> = state.iter().zip(&r).map(|(h, r)| h * r).collect();
        let candidate: Vec<f32> = self
            .candidate
            .forward(&concat(input, &gated))
            .into_iter()
            .map(f32::tanh)
            .collect();

        state
            .iter()
            .zip(z.iter().zip(&candidate))
            .map(|(h, (z, c))| z * h + (1.0 - z) * c)
            .collect()
    }
}

/// Sinusoidal timing signal for one position.
pub(crate) fn timing_signal(position: usize, dim: usize) -> Vec<f32> {
    let half = dim / 2;
    let log_increment = if half > 1 {
        (10_000f32).ln() / (half as f32 - 1.0)
    } else {
        0.0
    };
    let mut signal = vec![0.0; dim];
    for i in 0..half {
        let inv_timescale = (-(i as f32) * log_increment).exp();
        let angle = position as f32 * inv_timescale;
        signal[i] = angle.sin();
        signal[half + i] = angle.cos();
    }
    signal
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

pub(crate) fn add(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

pub(crate) fn concat(a: &[f32], b: &[f32]) -> Vec<f32> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
