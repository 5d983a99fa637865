//! NMT-CORE command line entry point.
//!
//! ## CLI Subcommands
//!
//! - `nmt-core-cli translate` - Translate stdin to stdout
//! - `nmt-core-cli eval` - Teacher-forced loss over a test set
//! - `nmt-core-cli vocab build` - Build a vocabulary from a corpus
//! - `nmt-core-cli config show|defaults|validate` - Inspect configuration

use std::process::ExitCode;

use nmt_core::cli::{config_cmd, eval_cmd, translate_cmd, vocab_cmd};
use nmt_core::config as nmt_config;
use nmt_core::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let rest = args.get(2..).unwrap_or(&[]);

    if matches!(command, "translate" | "eval") {
        init_logging();
    }

    match command {
        "translate" => exit_code(translate_cmd::run(rest).await),
        "eval" => exit_code(eval_cmd::run(rest)),
        "vocab" => {
            let subcommand = rest.first().map(|s| s.as_str()).unwrap_or("");
            match subcommand {
                "build" => exit_code(vocab_cmd::run_build(&rest[1..])),
                _ => {
                    eprintln!("Unknown vocab subcommand: {}", subcommand);
                    print_command_help("vocab");
                    ExitCode::FAILURE
                }
            }
        }
        "config" => {
            let subcommand = rest.first().map(|s| s.as_str()).unwrap_or("show");
            let flags = rest.get(1..).unwrap_or(&[]);
            match subcommand {
                "show" => exit_code(config_cmd::run_show(flags)),
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => exit_code(config_cmd::run_validate(flags)),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            match rest.first() {
                Some(subcommand) => print_command_help(subcommand),
                None => print_usage(),
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("nmt-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Logging for long-running commands; failures are reported but not fatal.
fn init_logging() {
    let log = nmt_config::load().log;
    if let Err(e) = telemetry::init_logging(&log) {
        eprintln!("Logging disabled: {}", e);
    }
    telemetry::describe_metrics();
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "nmt-core - beam search translation v{}

USAGE:
    nmt-core-cli <COMMAND> [OPTIONS]

COMMANDS:
    translate    Translate sentences from stdin, one per line
    eval         Compute loss and perplexity over a parallel test set
    vocab        Build vocabularies (build)
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message, or help for a command

EXAMPLES:
    nmt-core-cli vocab build train.src src.vocab
    nmt-core-cli translate --src-vocab src.vocab --dst-vocab dst.vocab < test.src
    nmt-core-cli config show --config nmt-core.toml

ENVIRONMENT:
    NMT_CORE_*           Configuration overrides (see `config defaults`)
    NMT_CORE_LOG_LEVEL   Log filter directives (default: info)
    NMT_CORE_LOG_FORMAT  json or pretty (default: json)

EXIT CODES:
    0  Success
    1  Failure
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "translate" => eprintln!(
            "nmt-core-cli translate - Translate stdin to stdout

USAGE:
    nmt-core-cli translate --src-vocab FILE --dst-vocab FILE [--config FILE]

DESCRIPTION:
    Reads one source sentence per line, decodes the batch with beam search
    and prints one translation per line in input order. Blank lines produce
    blank translations."
        ),
        "eval" => eprintln!(
            "nmt-core-cli eval - Teacher-forced loss

USAGE:
    nmt-core-cli eval --src-vocab FILE --dst-vocab FILE --source FILE --target FILE [--config FILE]

DESCRIPTION:
    Prints {{\"loss_sum\", \"tokens\", \"perplexity\"}} as JSON."
        ),
        "vocab" => eprintln!(
            "nmt-core-cli vocab - Vocabulary tools

USAGE:
    nmt-core-cli vocab build <CORPUS> <OUTPUT>

DESCRIPTION:
    Keeps Latin letters, apostrophes and whitespace, counts words, and writes
    `token<TAB>count` lines with the reserved tokens first."
        ),
        "config" => eprintln!(
            "nmt-core-cli config - Configuration

USAGE:
    nmt-core-cli config show [--config FILE]
    nmt-core-cli config defaults
    nmt-core-cli config validate [--config FILE]"
        ),
        other => {
            eprintln!("No help available for '{}'", other);
            print_usage();
        }
    }
}
