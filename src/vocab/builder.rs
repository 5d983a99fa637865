//! Frequency-ordered vocabulary construction from raw text.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::{VocabError, Vocabulary};

/// Anything that is not whitespace, a Latin letter, or an apostrophe.
const STRIP_PATTERN: &str = r"[^\s\p{Latin}']";

/// Counts words; ties keep first-seen order.
pub struct VocabBuilder {
    strip: Regex,
    counts: HashMap<String, (u64, usize)>,
}

impl VocabBuilder {
    pub fn new() -> Self {
        Self {
            strip: Regex::new(STRIP_PATTERN).expect("strip pattern is valid"),
            counts: HashMap::new(),
        }
    }

    /// Count the words of one text.
    pub fn from_text(text: &str) -> Self {
        let mut builder = Self::new();
        builder.add_text(text);
        builder
    }

    /// Count every line of a UTF-8 corpus file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut builder = Self::new();
        for line in reader.lines() {
            builder.add_text(&line?);
        }
        Ok(builder)
    }

    /// NFC-normalize, strip disallowed characters, and count whitespace-separated words.
    pub fn add_text(&mut self, text: &str) {
        let normalized: String = text.nfc().collect();
        let cleaned = self.strip.replace_all(&normalized, "");
        for word in cleaned.split_whitespace() {
            let order = self.counts.len();
            self.counts.entry(word.to_string()).or_insert((0, order)).0 += 1;
        }
    }

    pub fn distinct_words(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, word: &str) -> u64 {
        self.counts.get(word).map_or(0, |(count, _)| *count)
    }

    /// Words by descending count, first-seen order on ties.
    pub fn ranked(&self) -> Vec<(String, u64)> {
        let mut words: Vec<(&String, &(u64, usize))> = self.counts.iter().collect();
        words.sort_by(|(_, (ca, oa)), (_, (cb, ob))| cb.cmp(ca).then(oa.cmp(ob)));
        words
            .into_iter()
            .map(|(word, (count, _))| (word.clone(), *count))
            .collect()
    }

    /// Reserved tokens followed by the ranked words. Words that collide with a
    /// reserved token are dropped.
    pub fn build(&self) -> Result<Vocabulary, VocabError> {
        let reserved = crate::engine::RESERVED_TOKENS;
        Vocabulary::from_entries(
            self.ranked()
                .into_iter()
                .filter(|(word, _)| !reserved.contains(&word.as_str())),
        )
    }
}

impl Default for VocabBuilder {
    fn default() -> Self {
        Self::new()
    }
}
