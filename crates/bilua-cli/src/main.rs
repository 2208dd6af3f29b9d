//! `bilua [--trace] <file>` — load, parse, evaluate, and report.
//!
//! Exit codes: 0 success, 1 usage, 2 load failure, 3 parse failure,
//! 4 evaluation failure. The final value's literal form and any suggested
//! source change go to stderr; program output goes to stdout.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bilua_eval::Interpreter;

const EXIT_USAGE: u8 = 1;
const EXIT_LOAD: u8 = 2;
const EXIT_PARSE: u8 = 3;
const EXIT_EVAL: u8 = 4;

#[derive(Parser)]
#[command(name = "bilua", version, about = "Run a Lua program with origin tracking")]
struct Cli {
    /// Log evaluator internals to stderr (respects RUST_LOG).
    #[arg(long)]
    trace: bool,

    /// The Lua source file to run.
    file: PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let source = match fs::read_to_string(&cli.file)
        .with_context(|| format!("cannot load '{}'", cli.file.display()))
    {
        Ok(source) => source,
        Err(error) => {
            eprintln!("bilua: {error:#}");
            return ExitCode::from(EXIT_LOAD);
        }
    };

    let mut interpreter = Interpreter::new();
    let parsed = interpreter.parse(source);
    if !parsed.is_ok() {
        for error in &parsed.errors {
            eprintln!("{}: {error}", cli.file.display());
        }
        return ExitCode::from(EXIT_PARSE);
    }

    match interpreter.evaluate() {
        Ok(result) => {
            let rendered = result
                .value
                .to_literal(interpreter.arena())
                .unwrap_or_else(|_| result.value.display_string(interpreter.arena()));
            eprintln!("{rendered}");
            if let Some(change) = result.source_change {
                eprintln!("suggested source change: {change}");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{error}");
            ExitCode::from(EXIT_EVAL)
        }
    }
}
