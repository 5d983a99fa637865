// Copyright 2024-2026 NMT-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! `translate`: one source sentence per stdin line, one translation per stdout line.

use std::io::{BufRead, Write};

use super::{CliError, Flags};
use crate::config;
use crate::engine::TokenId;
use crate::vocab::Vocabulary;
use crate::Translator;

/// Source vocabulary, target vocabulary, and the translator between them.
pub struct TranslatePipeline {
    pub src_vocab: Vocabulary,
    pub dst_vocab: Vocabulary,
    pub translator: Translator,
}

impl TranslatePipeline {
    /// Load vocabularies and build the translator from `--config`,
    /// `--src-vocab` and `--dst-vocab` flags.
    pub fn from_flags(flags: &Flags) -> Result<Self, CliError> {
        let config = config::load_layered(flags.path("config").as_deref())?;
        let src_vocab = Vocabulary::from_file(flags.require_path("src-vocab")?)?.truncated(config.model.src_vocab_size);
        let dst_vocab = Vocabulary::from_file(flags.require_path("dst-vocab")?)?.truncated(config.model.dst_vocab_size);
        let translator = Translator::new(config)?;
        Ok(Self {
            src_vocab,
            dst_vocab,
            translator,
        })
    }

    /// Encode a source line; blank lines become empty sources.
    pub fn encode(&self, line: &str) -> Vec<TokenId> {
        if line.trim().is_empty() {
            Vec::new()
        } else {
            self.src_vocab.encode_sentence(line)
        }
    }

    pub async fn translate_lines(&self, lines: &[String]) -> Result<Vec<String>, CliError> {
        let sources = lines.iter().map(|line| self.encode(line)).collect();
        let translation = self.translator.translate(sources).await?;
        Ok(translation
            .predictions
            .iter()
            .map(|prediction| self.dst_vocab.decode(prediction))
            .collect())
    }
}

async fn translate(args: &[String]) -> Result<usize, CliError> {
    let flags = Flags::parse(args, &["config", "src-vocab", "dst-vocab"])?;
    let pipeline = TranslatePipeline::from_flags(&flags)?;

    let lines = std::io::stdin()
        .lock()
        .lines()
        .collect::<Result<Vec<_>, _>>()?;
    let outputs = pipeline.translate_lines(&lines).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for output in &outputs {
        writeln!(out, "{}", output)?;
    }
    out.flush()?;
    Ok(outputs.len())
}

pub async fn run(args: &[String]) -> i32 {
    match translate(args).await {
        Ok(count) => {
            tracing::info!(lines = count, "translation complete");
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::VocabBuilder;
    use tempfile::TempDir;

    fn pipeline_flags(dir: &TempDir) -> Flags {
        let config = dir.path().join("nmt-core.toml");
        std::fs::write(
            &config,
            "[model]\nsrc_vocab_size = 16\ndst_vocab_size = 16\nhidden_units = 16\nnum_heads = 2\nnum_blocks = 1\n\n\
             [decode]\nbeam_size = 2\nmax_target_length = 6\n",
        )
        .unwrap();
        let src = dir.path().join("src.vocab");
        let dst = dir.path().join("dst.vocab");
        VocabBuilder::from_text("le chat dort le chien").build().unwrap().save(&src).unwrap();
        VocabBuilder::from_text("the cat sleeps the dog").build().unwrap().save(&dst).unwrap();

        let args: Vec<String> = [
            "--config",
            config.to_str().unwrap(),
            "--src-vocab",
            src.to_str().unwrap(),
            "--dst-vocab",
            dst.to_str().unwrap(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        Flags::parse(&args, &["config", "src-vocab", "dst-vocab"]).unwrap()
    }

    #[test]
    fn test_encode_blank_line_is_empty() {
        let dir = TempDir::new().unwrap();
        let pipeline = TranslatePipeline::from_flags(&pipeline_flags(&dir)).unwrap();
        assert!(pipeline.encode("   ").is_empty());
        assert_eq!(pipeline.encode("le chat"), vec![4, 5, crate::engine::EOS_ID]);
    }

    #[tokio::test]
    async fn test_translate_lines_keeps_order_and_blanks() {
        let dir = TempDir::new().unwrap();
        let pipeline = TranslatePipeline::from_flags(&pipeline_flags(&dir)).unwrap();
        let lines = vec!["le chat".to_string(), String::new(), "le chien dort".to_string()];
        let outputs = pipeline.translate_lines(&lines).await.unwrap();
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[1], "");
    }

    #[test]
    fn test_missing_vocab_flag() {
        let flags = Flags::parse(&[], &["config"]).unwrap();
        assert!(matches!(TranslatePipeline::from_flags(&flags), Err(CliError::Usage(_))));
    }
}
