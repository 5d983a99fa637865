// Copyright 2024-2026 NMT-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! `vocab build CORPUS OUTPUT`: frequency-ordered vocabulary from a corpus.

use std::path::Path;

use super::CliError;
use crate::vocab::VocabBuilder;

/// Build a vocabulary file. Returns the number of entries written.
pub fn build(corpus: &Path, output: &Path) -> Result<usize, CliError> {
    let vocab = VocabBuilder::from_file(corpus)?.build()?;
    vocab.save(output)?;
    tracing::info!(entries = vocab.len(), output = %output.display(), "vocabulary written");
    Ok(vocab.len())
}

pub fn run_build(args: &[String]) -> i32 {
    let (corpus, output) = match args {
        [corpus, output] => (Path::new(corpus), Path::new(output)),
        _ => {
            eprintln!("Usage: nmt-core-cli vocab build <CORPUS> <OUTPUT>");
            return 1;
        }
    };
    match build(corpus, output) {
        Ok(entries) => {
            println!("Wrote {} entries to {}", entries, output.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
