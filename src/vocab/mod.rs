//! Word-level vocabularies.
//!
//! On disk a vocabulary is one `token\tcount` line per entry, with the four
//! reserved tokens first in id order.

mod builder;

use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::engine::{TokenId, EOS_ID, RESERVED_TOKENS, UNK_ID};

pub use builder::VocabBuilder;

/// Count written for reserved tokens.
pub const RESERVED_COUNT: u64 = 1_000_000_000;

/// Bidirectional token/id mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    counts: Vec<u64>,
    index: HashMap<String, TokenId>,
}

impl Vocabulary {
    /// Build from `(token, count)` pairs that follow the reserved tokens.
    pub fn from_entries<I>(entries: I) -> Result<Self, VocabError>
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let reserved = RESERVED_TOKENS.iter().map(|t| (t.to_string(), RESERVED_COUNT));
        let mut vocab = Self {
            tokens: Vec::new(),
            counts: Vec::new(),
            index: HashMap::new(),
        };
        for (line, (token, count)) in reserved.chain(entries).enumerate() {
            vocab.insert(token, count, line + 1)?;
        }
        Ok(vocab)
    }

    /// Load a vocabulary file. The count column is optional.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::parse(&contents)
    }

    /// Parse the on-disk format.
    pub fn parse(contents: &str) -> Result<Self, VocabError> {
        let mut vocab = Self {
            tokens: Vec::new(),
            counts: Vec::new(),
            index: HashMap::new(),
        };
        for (i, line) in contents.lines().enumerate() {
            let line_no = i + 1;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let token = fields.next().unwrap_or_default().to_string();
            let count = match fields.next() {
                Some(raw) => raw.trim().parse::<u64>().map_err(|e| VocabError::Parse {
                    line: line_no,
                    reason: format!("invalid count '{}': {}", raw, e),
                })?,
                None => 0,
            };
            vocab.insert(token, count, line_no)?;
        }

        for (id, expected) in RESERVED_TOKENS.iter().enumerate() {
            match vocab.tokens.get(id) {
                Some(found) if found == expected => {}
                found => {
                    return Err(VocabError::MissingReserved {
                        expected: expected.to_string(),
                        id: id as TokenId,
                        found: found.cloned(),
                    })
                }
            }
        }
        Ok(vocab)
    }

    fn insert(&mut self, token: String, count: u64, line: usize) -> Result<(), VocabError> {
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            return Err(VocabError::Parse {
                line,
                reason: format!("invalid token '{}'", token),
            });
        }
        if self.index.contains_key(&token) {
            return Err(VocabError::Parse {
                line,
                reason: format!("duplicate token '{}'", token),
            });
        }
        let id = self.tokens.len() as TokenId;
        self.index.insert(token.clone(), id);
        self.tokens.push(token);
        self.counts.push(count);
        Ok(())
    }

    /// Write the vocabulary in the on-disk format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), VocabError> {
        let file = fs::File::create(path.as_ref())?;
        let mut out = BufWriter::new(file);
        for (id, (token, count)) in self.tokens.iter().zip(&self.counts).enumerate() {
            let count = if id < RESERVED_TOKENS.len() { RESERVED_COUNT } else { *count };
            writeln!(out, "{}\t{}", token, count)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Keep only the first `size` entries (never fewer than the reserved tokens).
    pub fn truncated(mut self, size: usize) -> Self {
        let size = size.max(RESERVED_TOKENS.len());
        for token in self.tokens.drain(size.min(self.tokens.len())..) {
            self.index.remove(&token);
        }
        self.counts.truncate(size);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn id(&self, token: &str) -> Option<TokenId> {
        self.index.get(token).copied()
    }

    pub fn token(&self, id: TokenId) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn count(&self, id: TokenId) -> Option<u64> {
        self.counts.get(id as usize).copied()
    }

    /// Map whitespace-separated words to ids, unknown words to UNK.
    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        text.split_whitespace()
            .map(|word| self.id(word).unwrap_or(UNK_ID))
            .collect()
    }

    /// [`encode`](Self::encode) followed by EOS, the layout of a source sentence.
    pub fn encode_sentence(&self, text: &str) -> Vec<TokenId> {
        let mut ids = self.encode(text);
        ids.push(EOS_ID);
        ids
    }

    /// Words for `ids` up to the first EOS, skipping PAD and BOS.
    pub fn decode(&self, ids: &[TokenId]) -> String {
        ids.iter()
            .take_while(|&&id| id != EOS_ID)
            .filter(|&&id| id != crate::engine::PAD_ID && id != crate::engine::BOS_ID)
            .map(|&id| self.token(id).unwrap_or(RESERVED_TOKENS[UNK_ID as usize]))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Errors for vocabulary loading and saving.
#[derive(Debug, Error)]
pub enum VocabError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Reserved token '{expected}' must have id {id}, found {found:?}")]
    MissingReserved {
        expected: String,
        id: TokenId,
        found: Option<String>,
    },
}
