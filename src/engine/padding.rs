//! Batch padding of variable-length predictions.

use serde::Serialize;

use crate::engine::TokenId;

/// Rectangular `rows x cols` token matrix stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMatrix {
    rows: usize,
    cols: usize,
    data: Vec<TokenId>,
}

impl TokenMatrix {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn row(&self, index: usize) -> &[TokenId] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    pub fn to_rows(&self) -> Vec<Vec<TokenId>> {
        (0..self.rows).map(|r| self.row(r).to_vec()).collect()
    }
}

/// Right-pad every prediction with `eos` to the longest prediction length.
pub fn pad_batch(predictions: &[Vec<TokenId>], eos: TokenId) -> TokenMatrix {
    let cols = predictions.iter().map(Vec::len).max().unwrap_or(0);
    let mut data = Vec::with_capacity(predictions.len() * cols);
    for prediction in predictions {
        data.extend_from_slice(prediction);
        data.extend(std::iter::repeat(eos).take(cols - prediction.len()));
    }
    TokenMatrix {
        rows: predictions.len(),
        cols,
        data,
    }
}
