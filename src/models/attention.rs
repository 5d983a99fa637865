// Copyright 2024-2026 NMT-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Tiled dot-product attention.
//!
//! Scores are processed in blocks with an online softmax, so peak memory is
//! one block of scores regardless of context length. Masked positions are
//! skipped entirely.

use super::layers::{dot, Initializer, Linear};

/// Tiled single-query attention kernel.
#[derive(Debug, Clone)]
pub(crate) struct AttentionKernel {
    block_size: usize,
    head_dim: usize,
}

impl AttentionKernel {
    pub fn new(head_dim: usize, block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            head_dim,
        }
    }

    /// Attend `query [head_dim]` over `seq_len` keys/values flattened as
    /// `[seq_len * head_dim]`. Positions with `valid[i] == false` are ignored.
    /// Leaves `output` zeroed when no position is valid.
    pub fn forward(
        &self,
        query: &[f32],
        keys: &[f32],
        values: &[f32],
        valid: Option<&[bool]>,
        output: &mut [f32],
    ) {
        let head_dim = self.head_dim;
        let seq_len = keys.len() / head_dim;
        output.iter_mut().for_each(|o| *o = 0.0);

        let mut running_max = f32::NEG_INFINITY;
        let mut running_sum = 0.0f32;
        let mut acc = vec![0.0f32; head_dim];
        let mut scores = Vec::with_capacity(self.block_size);

        for start in (0..seq_len).step_by(self.block_size) {
            let end = (start + self.block_size).min(seq_len);

            scores.clear();
            let mut block_max = f32::NEG_INFINITY;
            for pos in start..end {
                let score = if valid.map_or(true, |v| v[pos]) {
                    dot(query, &keys[pos * head_dim..(pos + 1) * head_dim])
                } else {
                    f32::NEG_INFINITY
                };
                block_max = block_max.max(score);
                scores.push(score);
            }
            if block_max == f32::NEG_INFINITY {
                continue;
            }

            let new_max = running_max.max(block_max);
            if running_max > f32::NEG_INFINITY && running_max < new_max {
                let correction = (running_max - new_max).exp();
                acc.iter_mut().for_each(|a| *a *= correction);
                running_sum *= correction;
            }

            for (offset, &score) in scores.iter().enumerate() {
                if score == f32::NEG_INFINITY {
                    continue;
                }
                let weight = (score - new_max).exp();
                running_sum += weight;
                let value = &values[(start + offset) * head_dim..(start + offset + 1) * head_dim];
                for (a, v) in acc.iter_mut().zip(value) {
                    *a += weight * v;
                }
            }
            running_max = new_max;
        }

        if running_sum > 0.0 {
            for (o, a) in output.iter_mut().zip(&acc) {
                *o = a / running_sum;
            }
        }
    }
}

/// Multi-head attention with query/key/value/output projections.
#[derive(Debug, Clone)]
pub(crate) struct MultiHeadAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    num_heads: usize,
    kernel: AttentionKernel,
}

impl MultiHeadAttention {
    pub fn new(init: &mut Initializer, dim: usize, num_heads: usize, block_size: usize) -> Self {
        Self {
            query: Linear::new(init, dim, dim),
            key: Linear::new(init, dim, dim),
            value: Linear::new(init, dim, dim),
            output: Linear::new(init, dim, dim),
            num_heads,
            kernel: AttentionKernel::new(dim / num_heads, block_size),
        }
    }

    /// Attend from one input vector over `context` (one vector per position).
    pub fn forward(&self, input: &[f32], context: &[&[f32]], valid: Option<&[bool]>) -> Vec<f32> {
        let dim = self.query.output_dim();
        let head_dim = dim / self.num_heads;
        let scale = (head_dim as f32).powf(-0.5);

        let query: Vec<f32> = self.query.forward(input).into_iter().map(|q| q * scale).collect();
        let keys: Vec<Vec<f32>> = context.iter().map(|c| self.key.forward(c)).collect();
        let values: Vec<Vec<f32>> = context.iter().map(|c| self.value.forward(c)).collect();

        let mut attended = vec![0.0; dim];
        let mut head_keys = Vec::with_capacity(context.len() * head_dim);
        let mut head_values = Vec::with_capacity(context.len() * head_dim);
        for head in 0..self.num_heads {
            let range = head * head_dim..(head + 1) * head_dim;
            head_keys.clear();
            head_values.clear();
            for (k, v) in keys.iter().zip(&values) {
                head_keys.extend_from_slice(&k[range.clone()]);
                head_values.extend_from_slice(&v[range.clone()]);
            }
            self.kernel.forward(
                &query[range.clone()],
                &head_keys,
                &head_values,
                valid,
                &mut attended[range],
            );
        }
        self.output.forward(&attended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(query: &[f32], keys: &[f32], values: &[f32], dim: usize) -> Vec<f32> {
        let scores: Vec<f32> = keys.chunks(dim).map(|k| dot(query, k)).collect();
        let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let weights: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f32 = weights.iter().sum();
        let mut out = vec![0.0; dim];
        for (w, v) in weights.iter().zip(values.chunks(dim)) {
            for (o, x) in out.iter_mut().zip(v) {
                *o += w * x / sum;
            }
        }
        out
    }

    #[test]
    fn test_tiled_matches_naive() {
        let dim = 4;
        let query = [0.3, -0.2, 0.5, 0.1];
        let keys: Vec<f32> = (0..40).map(|i| ((i * 7 % 11) as f32 - 5.0) / 5.0).collect();
        let values: Vec<f32> = (0..40).map(|i| ((i * 3 % 13) as f32 - 6.0) / 6.0).collect();

        let mut out = vec![0.0; dim];
        AttentionKernel::new(dim, 3).forward(&query, &keys, &values, None, &mut out);
        let expected = naive(&query, &keys, &values, dim);
        for (a, b) in out.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_masked_positions_ignored() {
        let kernel = AttentionKernel::new(2, 2);
        let keys = [1.0, 0.0, 0.0, 1.0, 5.0, 5.0];
        let values = [1.0, 1.0, 2.0, 2.0, 100.0, 100.0];
        let mut out = [0.0; 2];
        kernel.forward(&[0.0, 0.0], &keys, &values, Some(&[true, true, false]), &mut out);
        assert!((out[0] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_fully_masked_yields_zero() {
        let kernel = AttentionKernel::new(2, 4);
        let mut out = [9.0; 2];
        kernel.forward(&[1.0, 1.0], &[1.0, 1.0], &[3.0, 3.0], Some(&[false]), &mut out);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn test_multi_head_output_dimension() {
        let attn = MultiHeadAttention::new(&mut Initializer::new(5), 8, 2, 4);
        let a = [0.1; 8];
        let b = [0.2; 8];
        let out = attn.forward(&a, &[&a, &b], None);
        assert_eq!(out.len(), 8);
    }
}
