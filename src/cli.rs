//! 命令行接口
//!
//! Subcommands `compile`, `clean`, `explain` and `version`, plus the
//! argument pre-pass behind `--ignore-unrecognized-flags`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::frontend::config::{CompilerConfiguration, CompilerConfigurationBuilder, MetricsMode};
use crate::util::config::{find_project_config, load_project_config, ConfigError};
use crate::{NAME, VERSION};

/// Flag that turns on the pre-pass
pub const IGNORE_UNRECOGNIZED_FLAGS: &str = "--ignore-unrecognized-flags";

/// Incremental compiler driver
#[derive(Parser, Debug)]
#[command(name = NAME)]
#[command(version = VERSION)]
#[command(about = "Compile a library and everything it imports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a root library
    Compile(CompileArgs),

    /// Remove every cached artifact
    Clean {
        /// Artifact directory
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,
    },

    /// Describe a diagnostic code
    Explain {
        /// Code such as E0503
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CompileArgs {
    /// Root library
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Artifact directory
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Copy the packaged application here
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Recompile every unit
    #[arg(long)]
    pub no_incremental: bool,

    /// Treat warnings as fatal
    #[arg(long)]
    pub fatal_warnings: bool,

    /// Treat static type errors as fatal
    #[arg(long)]
    pub fatal_type_errors: bool,

    /// Do not report unknown type names
    #[arg(long)]
    pub no_warn_no_such_type: bool,

    /// Keep going into resolution after parse errors
    #[arg(long)]
    pub resolve_despite_parse_errors: bool,

    /// off, summary or detailed
    #[arg(long, value_name = "MODE")]
    pub metrics: Option<MetricsMode>,

    /// Worker threads (0 = one per core)
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Project file (default: nearest dartc.toml above FILE)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Drop flags this version does not know instead of failing
    #[arg(long)]
    pub ignore_unrecognized_flags: bool,

    /// Plain diagnostics
    #[arg(long)]
    pub no_color: bool,
}

impl CompileArgs {
    /// Defaults, then the project file, then these flags
    pub fn configuration(&self) -> Result<CompilerConfiguration, ConfigError> {
        let search_from = self
            .file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut builder = layered_builder(self.config.as_deref(), search_from)?;

        if let Some(dir) = &self.work_dir {
            builder = builder.work_dir(dir.clone());
        }
        if let Some(dir) = &self.out {
            builder = builder.out_dir(Some(dir.clone()));
        }
        if self.no_incremental {
            builder = builder.incremental(false);
        }
        if self.fatal_warnings {
            builder = builder.warnings_are_fatal(true);
        }
        if self.fatal_type_errors {
            builder = builder.type_errors_are_fatal(true);
        }
        if self.no_warn_no_such_type {
            builder = builder.should_warn_on_no_such_type(false);
        }
        if self.resolve_despite_parse_errors {
            builder = builder.resolve_despite_parse_errors(true);
        }
        if let Some(mode) = self.metrics {
            builder = builder.metrics(mode);
        }
        if let Some(jobs) = self.jobs {
            builder = builder.jobs(jobs);
        }
        if self.ignore_unrecognized_flags {
            builder = builder.ignore_unrecognized_flags(true);
        }
        Ok(builder.build()?)
    }
}

/// Builder seeded from an explicit project file, or the nearest one above
/// `search_from`
pub fn layered_builder(
    explicit: Option<&Path>,
    search_from: &Path,
) -> Result<CompilerConfigurationBuilder, ConfigError> {
    let builder = CompilerConfiguration::builder();
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_project_config(search_from),
    };
    let Some(path) = path else {
        return Ok(builder);
    };
    let project = load_project_config(&path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(project.apply(builder, base_dir))
}

/// Arguments split by [`partition_args`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionedArgs {
    /// Program name, known flags with their values, positionals
    pub recognized: Vec<String>,
    /// Flags `command` does not declare
    pub unrecognized: Vec<String>,
}

/// Split `args` (program name first) into tokens `command` understands and
/// flags it does not.
///
/// A known flag that takes a value keeps the following token with it; an
/// unknown `--flag=value` is dropped as a whole. Everything after `--` is
/// positional.
pub fn partition_args(
    args: &[String],
    command: &clap::Command,
) -> PartitionedArgs {
    let mut command = command.clone();
    command.build();
    let flags = known_flags(&command);

    let mut out = PartitionedArgs::default();
    let mut tokens = args.iter();
    if let Some(program) = tokens.next() {
        out.recognized.push(program.clone());
    }
    while let Some(token) = tokens.next() {
        if token == "--" {
            out.recognized.push(token.clone());
            out.recognized.extend(tokens.by_ref().cloned());
            break;
        }
        if !token.starts_with('-') || token == "-" {
            out.recognized.push(token.clone());
            continue;
        }
        let (name, inline_value) = match token.split_once('=') {
            Some((name, _)) => (name, true),
            None => (token.as_str(), false),
        };
        match flags.get(name) {
            Some(takes_value) => {
                out.recognized.push(token.clone());
                if *takes_value && !inline_value {
                    if let Some(value) = tokens.next() {
                        out.recognized.push(value.clone());
                    }
                }
            }
            None => out.unrecognized.push(token.clone()),
        }
    }
    out
}

/// `--long` and `-s` spellings of every argument, mapped to whether the
/// argument takes a value
fn known_flags(command: &clap::Command) -> HashMap<String, bool> {
    let mut flags = HashMap::new();
    let mut pending = vec![command];
    while let Some(cmd) = pending.pop() {
        for arg in cmd.get_arguments().filter(|arg| !arg.is_positional()) {
            let takes_value = arg.get_action().takes_values();
            if let Some(long) = arg.get_long() {
                flags.insert(format!("--{}", long), takes_value);
            }
            if let Some(short) = arg.get_short() {
                flags.insert(format!("-{}", short), takes_value);
            }
        }
        pending.extend(cmd.get_subcommands());
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_parse_compile_flags() {
        let cli = Cli::try_parse_from([
            "dartc",
            "compile",
            "web/app.dart",
            "--fatal-warnings",
            "--metrics",
            "detailed",
            "--jobs",
            "2",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Compile(compile) = cli.command else {
            panic!("expected compile");
        };
        assert_eq!(compile.file, PathBuf::from("web/app.dart"));
        assert!(compile.fatal_warnings);
        assert_eq!(compile.metrics, Some(MetricsMode::Detailed));
        assert_eq!(compile.jobs, Some(2));
    }

    #[test]
    fn test_parse_explain() {
        let cli = Cli::try_parse_from(["dartc", "explain", "E0503"]).unwrap();
        assert!(matches!(cli.command, Command::Explain { ref code } if code == "E0503"));
    }

    #[test]
    fn test_unknown_flag_is_usage_error() {
        let err = Cli::try_parse_from(["dartc", "compile", "a.dart", "--frobnicate"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_partition_keeps_flag_values() {
        let parts = partition_args(
            &args(&[
                "dartc",
                "compile",
                "--work-dir",
                "tmp",
                "--frobnicate",
                "app.dart",
                "--color=always",
                "--metrics=summary",
                IGNORE_UNRECOGNIZED_FLAGS,
            ]),
            &Cli::command(),
        );
        assert_eq!(
            parts.recognized,
            args(&[
                "dartc",
                "compile",
                "--work-dir",
                "tmp",
                "app.dart",
                "--metrics=summary",
                IGNORE_UNRECOGNIZED_FLAGS,
            ])
        );
        assert_eq!(parts.unrecognized, args(&["--frobnicate", "--color=always"]));

        let cli = Cli::try_parse_from(parts.recognized).unwrap();
        assert!(matches!(cli.command, Command::Compile(ref c) if c.ignore_unrecognized_flags));
    }

    #[test]
    fn test_partition_stops_at_separator() {
        let parts = partition_args(
            &args(&["dartc", "compile", "--", "--odd-name.dart"]),
            &Cli::command(),
        );
        assert!(parts.unrecognized.is_empty());
        assert_eq!(parts.recognized.last().map(String::as_str), Some("--odd-name.dart"));
    }

    #[test]
    fn test_flags_override_project_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("dartc.toml"),
            "[build]\njobs = 3\nincremental = false\n\n[diagnostics]\nwarnings_are_fatal = true\n",
        )
        .unwrap();
        let compile = CompileArgs {
            file: dir.path().join("app.dart"),
            jobs: Some(5),
            ..CompileArgs::default()
        };
        let config = compile.configuration().unwrap();
        assert_eq!(config.jobs(), 5);
        assert!(!config.incremental());
        assert!(config.warnings_are_fatal());
    }

    #[test]
    fn test_invalid_jobs_rejected() {
        let dir = TempDir::new().unwrap();
        let compile = CompileArgs {
            file: dir.path().join("app.dart"),
            jobs: Some(10_000),
            ..CompileArgs::default()
        };
        assert!(matches!(compile.configuration(), Err(ConfigError::Invalid(_))));
    }
}
