//! dartc - CLI

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use dartc::artifact::FileArtifactStore;
use dartc::cli::{layered_builder, partition_args, Cli, Command, CompileArgs, IGNORE_UNRECOGNIZED_FLAGS};
use dartc::frontend::config::MetricsMode;
use dartc::util::diagnostic::{ConsoleListener, ErrorCode, TextRenderer};
use dartc::util::logger::{self, LogLevel};
use dartc::{CompileStatus, Compiler, NAME, VERSION};
use owo_colors::OwoColorize;
use tracing::warn;

/// Failed compile
const EXIT_FAILED: u8 = 1;
/// Bad flags or configuration
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().collect();
    let (args, dropped) = if raw.iter().any(|arg| arg == IGNORE_UNRECOGNIZED_FLAGS) {
        let parts = partition_args(&raw, &Cli::command());
        (parts.recognized, parts.unrecognized)
    } else {
        (raw, Vec::new())
    };

    // help and version exit 0, usage errors exit 2
    let cli = Cli::try_parse_from(args).unwrap_or_else(|err| err.exit());

    if cli.verbose {
        logger::init_with_level(LogLevel::Info);
    } else {
        logger::init_cli();
    }
    for flag in &dropped {
        warn!(%flag, "ignoring unrecognized flag");
    }

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}: {:#}", "error".red().bold(), err);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Compile(args) => compile(&args),
        Command::Clean { work_dir } => clean(work_dir.as_deref()),
        Command::Explain { code } => Ok(explain(&code)),
        Command::Version => {
            println!("{} {}", NAME, VERSION);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn compile(args: &CompileArgs) -> Result<ExitCode> {
    let config = match args.configuration() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}: {}", paint_error("error", !args.no_color), err);
            return Ok(ExitCode::from(EXIT_USAGE));
        }
    };
    let renderer = if args.no_color {
        TextRenderer::plain()
    } else {
        TextRenderer::new()
    };
    let metrics = config.metrics();
    let outcome = Compiler::new(config)
        .with_listener(Arc::new(ConsoleListener::new(renderer)))
        .compile(&args.file)
        .with_context(|| format!("Failed to compile: {}", args.file.display()))?;

    if metrics == MetricsMode::Detailed {
        for line in outcome.metrics.phase_lines() {
            eprintln!("{}", line);
        }
    }
    if metrics != MetricsMode::Off {
        eprintln!("{}", outcome.metrics.summary_line());
    }

    let summary = &outcome.summary;
    let status = format!(
        "{}: {} ({} errors, {} warnings)",
        args.file.display(),
        outcome.status,
        summary.errors,
        summary.warnings
    );
    if outcome.status == CompileStatus::Succeeded {
        eprintln!("{}", status);
        if let Some(path) = &outcome.output_path {
            eprintln!("wrote {}", path.display());
        }
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{}", paint_error(&status, !args.no_color));
        Ok(ExitCode::from(EXIT_FAILED))
    }
}

fn explain(code: &str) -> ExitCode {
    let Some(code) = ErrorCode::find(code) else {
        eprintln!("unknown diagnostic code '{}'", code);
        return ExitCode::from(EXIT_USAGE);
    };
    println!("{} ({}, {})", code.code, code.subsystem, code.severity);
    println!("  {}", code.message_template);
    ExitCode::SUCCESS
}

fn clean(work_dir: Option<&Path>) -> Result<ExitCode> {
    let cwd = std::env::current_dir().context("Cannot read the current directory")?;
    let mut builder = layered_builder(None, &cwd)?;
    if let Some(dir) = work_dir {
        builder = builder.work_dir(dir);
    }
    let config = builder.build()?;
    let store = FileArtifactStore::new(config.work_dir());
    let removed = store
        .clean()
        .with_context(|| format!("Failed to clean {}", store.root().display()))?;
    eprintln!("removed {} artifacts from {}", removed, store.root().display());
    Ok(ExitCode::SUCCESS)
}

fn paint_error(
    text: &str,
    color: bool,
) -> String {
    if color {
        text.red().bold().to_string()
    } else {
        text.to_string()
    }
}
