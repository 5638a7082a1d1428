// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tern - command-line runner for the tern scripting language
//!
//! ## Features
//!
//! - Interactive REPL with syntax highlighting and history
//! - Async file execution with tokio
//! - Bytecode disassembly of files and snippets

mod repl;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize;
use tern_engine::{AsyncEngine, Engine, EngineConfig, Error};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tern",
    about = "Compile and run tern scripts",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Script file to execute
    file: Option<PathBuf>,

    /// Evaluate code from the command line
    #[arg(short = 'e', long = "eval", value_name = "CODE", conflicts_with = "file")]
    eval: Option<String>,

    /// Maximum number of instructions a program may execute
    #[arg(long, env = "TERN_FUEL", value_name = "N")]
    fuel: Option<u64>,

    /// Maximum operand stack depth, in slots
    #[arg(long, env = "TERN_MAX_STACK", value_name = "N")]
    max_stack: Option<usize>,

    /// Longest list an element store may grow
    #[arg(long, env = "TERN_MAX_LIST_LEN", value_name = "N")]
    max_list_len: Option<usize>,

    /// Print the compiled bytecode instead of running it
    #[arg(long)]
    disassemble: bool,

    /// Log filter directive, e.g. `debug` or `tern_engine=trace`
    #[arg(long, env = "TERN_LOG", value_name = "LEVEL")]
    log_level: Option<String>,

    /// Start the REPL after running FILE or CODE
    #[arg(short = 'i', long = "interactive", alias = "repl")]
    interactive: bool,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(fuel) = self.fuel {
            config = config.with_fuel(fuel);
        }
        if let Some(max_stack) = self.max_stack {
            config = config.with_max_stack(max_stack);
        }
        if let Some(max_list_len) = self.max_list_len {
            config = config.with_max_list_len(max_list_len);
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = cli.engine_config();

    if cli.disassemble {
        return disassemble(&cli, config).await;
    }

    let status = match (&cli.eval, &cli.file) {
        (Some(code), _) => run_eval(code, config.clone()).await,
        (None, Some(path)) => run_file(path, config.clone()).await,
        (None, None) => return run_repl(config),
    };

    if cli.interactive {
        return run_repl(config);
    }
    status
}

/// Installs the fmt subscriber.
///
/// `--log-level` wins over `RUST_LOG`; without either only warnings show.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_repl(config: EngineConfig) -> ExitCode {
    match repl::Repl::new(config) {
        Ok(mut repl) => {
            if let Err(e) = repl.run() {
                eprintln!("{}: {:?}", "REPL Error".red().bold(), e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(
                "{}: Failed to initialize REPL: {:?}",
                "Error".red().bold(),
                e
            );
            ExitCode::FAILURE
        }
    }
}

async fn run_file(path: &Path, config: EngineConfig) -> ExitCode {
    if !path.exists() {
        eprintln!(
            "{}: file not found '{}'",
            "Error".red().bold(),
            path.display().cyan()
        );
        return ExitCode::FAILURE;
    }

    let engine = AsyncEngine::with_config(config);
    match engine.eval_file(path).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

async fn run_eval(code: &str, config: EngineConfig) -> ExitCode {
    let engine = AsyncEngine::with_config(config);
    match engine.eval(code).await {
        Ok(value) => {
            if !value.is_null() {
                println!("{}", value);
            }
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

async fn disassemble(cli: &Cli, config: EngineConfig) -> ExitCode {
    let source = match (&cli.eval, &cli.file) {
        (Some(code), _) => code.clone(),
        (None, Some(path)) => match tokio::fs::read_to_string(path).await {
            Ok(source) => source,
            Err(e) => {
                return report(&Error::Io(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        },
        (None, None) => {
            eprintln!(
                "{}: {} needs a FILE or {}",
                "Error".red().bold(),
                "--disassemble".cyan(),
                "--eval".cyan()
            );
            return ExitCode::FAILURE;
        }
    };

    match Engine::with_config(config).compile(&source) {
        Ok(program) => {
            print!("{}", program);
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

fn report(error: &Error) -> ExitCode {
    repl::print_error(error);
    ExitCode::FAILURE
}
