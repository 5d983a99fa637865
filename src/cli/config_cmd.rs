// Copyright 2024-2026 NMT-CORE Contributors
// Licensed under the Apache License, Version 2.0

//! Config CLI subcommands: show, defaults, validate.

use super::{CliError, Flags};
use crate::config::{self, EffectiveConfig, TranslatorConfig};

fn load(args: &[String]) -> Result<TranslatorConfig, CliError> {
    let flags = Flags::parse(args, &["config"])?;
    Ok(config::load_layered(flags.path("config").as_deref())?)
}

/// Print the effective config (file plus environment) as key-value pairs.
pub fn run_show(args: &[String]) -> i32 {
    match load(args) {
        Ok(cfg) => {
            print_config(&cfg.effective_config());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Print built-in defaults, ignoring the environment.
pub fn run_defaults() {
    print_config(&TranslatorConfig::default().effective_config());
}

/// Validate the effective config. Returns 0 if valid, 1 otherwise.
pub fn run_validate(args: &[String]) -> i32 {
    let result = load(args).and_then(|cfg| cfg.validate().map_err(CliError::from));
    match result {
        Ok(()) => {
            println!("Configuration is valid.");
            0
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            1
        }
    }
}

fn print_config(cfg: &EffectiveConfig) {
    println!("NMT_CORE_BEAM_SIZE={}", cfg.beam_size);
    println!("NMT_CORE_MAX_TARGET_LENGTH={}", cfg.max_target_length);
    println!("NMT_CORE_LP_ALPHA={}", cfg.lp_alpha);
    println!("NMT_CORE_USE_CACHE={}", cfg.use_cache);
    println!("NMT_CORE_SOURCE_SLACK={}", cfg.source_length_slack);
    println!("NMT_CORE_SHARDS={}", cfg.shards);
    println!("NMT_CORE_ARCHITECTURE={}", cfg.architecture);
    println!("NMT_CORE_HIDDEN_UNITS={}", cfg.hidden_units);
    println!("NMT_CORE_NUM_BLOCKS={}", cfg.num_blocks);
    println!("NMT_CORE_NUM_HEADS={}", cfg.num_heads);
    println!("NMT_CORE_SRC_VOCAB_SIZE={}", cfg.src_vocab_size);
    println!("NMT_CORE_DST_VOCAB_SIZE={}", cfg.dst_vocab_size);
    println!("NMT_CORE_SEED={}", cfg.seed);
    println!("NMT_CORE_LOG_LEVEL={}", cfg.log_level);
    println!("NMT_CORE_LOG_FORMAT={}", cfg.log_format);
}
