//! Reserved vocabulary ids shared by the decoder and the vocabulary module.

use serde::{Deserialize, Serialize};

/// Token identifier.
pub type TokenId = u32;

/// Padding token.
pub const PAD_ID: TokenId = 0;
/// Unknown-word token.
pub const UNK_ID: TokenId = 1;
/// Start-of-sequence token.
pub const BOS_ID: TokenId = 2;
/// End-of-sequence token.
pub const EOS_ID: TokenId = 3;

/// Surface strings of the reserved tokens, in id order.
pub const RESERVED_TOKENS: [&str; 4] = ["<PAD>", "<UNK>", "<S>", "</S>"];

/// Reserved ids used by one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    pub pad: TokenId,
    pub unk: TokenId,
    pub bos: TokenId,
    pub eos: TokenId,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            pad: PAD_ID,
            unk: UNK_ID,
            bos: BOS_ID,
            eos: EOS_ID,
        }
    }
}

impl SpecialTokens {
    /// True if the four ids are pairwise distinct.
    pub fn is_distinct(&self) -> bool {
        let ids = [self.pad, self.unk, self.bos, self.eos];
        ids.iter()
            .enumerate()
            .all(|(i, a)| ids[i + 1..].iter().all(|b| a != b))
    }
}
