// Copyright 2024-2026 NMT-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! CLI subcommands for the translator binary.
//!
//! ## Usage
//!
//! ```bash
//! nmt-core-cli translate --src-vocab src.vocab --dst-vocab dst.vocab < input.txt
//! nmt-core-cli eval --src-vocab src.vocab --dst-vocab dst.vocab --source test.src --target test.dst
//! nmt-core-cli vocab build corpus.txt out.vocab
//! nmt-core-cli config show
//! ```

pub mod config_cmd;
pub mod eval_cmd;
pub mod translate_cmd;
pub mod vocab_cmd;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::DecodeError;
use crate::models::ModelError;
use crate::vocab::VocabError;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vocabulary error: {0}")]
    Vocab(#[from] VocabError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flags of the form `--name VALUE` after the subcommand.
#[derive(Debug, Default)]
pub struct Flags {
    pairs: Vec<(String, String)>,
}

impl Flags {
    /// Parse `--name VALUE` pairs, accepting only names in `allowed`.
    pub fn parse(args: &[String], allowed: &[&str]) -> Result<Self, CliError> {
        let mut pairs = Vec::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let name = arg
                .strip_prefix("--")
                .filter(|name| allowed.contains(name))
                .ok_or_else(|| CliError::Usage(format!("Unknown argument: {}", arg)))?;
            let value = iter
                .next()
                .ok_or_else(|| CliError::Usage(format!("Missing value for --{}", name)))?;
            pairs.push((name.to_string(), value.clone()));
        }
        Ok(Self { pairs })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.get(name).map(PathBuf::from)
    }

    pub fn require_path(&self, name: &str) -> Result<PathBuf, CliError> {
        self.path(name)
            .ok_or_else(|| CliError::Usage(format!("Missing required argument --{}", name)))
    }
}
