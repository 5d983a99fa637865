//! `eval`: teacher-forced loss over a parallel test set.

use std::fs;

use super::translate_cmd::TranslatePipeline;
use super::{CliError, Flags};
use crate::eval::LossReport;

fn evaluate(args: &[String]) -> Result<LossReport, CliError> {
    let flags = Flags::parse(args, &["config", "src-vocab", "dst-vocab", "source", "target"])?;
    let source_text = fs::read_to_string(flags.require_path("source")?)?;
    let target_text = fs::read_to_string(flags.require_path("target")?)?;
    let pipeline = TranslatePipeline::from_flags(&flags)?;

    let sources: Vec<_> = source_text.lines().map(|line| pipeline.encode(line)).collect();
    let targets: Vec<_> = target_text
        .lines()
        .map(|line| pipeline.dst_vocab.encode_sentence(line))
        .collect();
    if sources.len() != targets.len() {
        return Err(CliError::Usage(format!(
            "source has {} lines but target has {}",
            sources.len(),
            targets.len()
        )));
    }
    Ok(pipeline.translator.evaluate(&sources, &targets)?)
}

pub fn run(args: &[String]) -> i32 {
    match evaluate(args) {
        Ok(report) => {
            let summary = serde_json::json!({
                "loss_sum": report.loss_sum,
                "tokens": report.tokens,
                "perplexity": report.perplexity(),
            });
            println!("{}", summary);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
