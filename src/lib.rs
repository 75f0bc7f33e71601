//! dartc
//!
//! Incremental compiler driver for a class-based, optionally-typed language.
//! A root library and everything it reaches is resolved into a graph, run
//! through ordered phases and handed to a backend that writes per-unit
//! artifacts and one packaged application.
//!
//! # Example
//!
//! ```no_run
//! use dartc::compiler::Compiler;
//! use dartc::frontend::config::CompilerConfiguration;
//!
//! fn main() -> dartc::Result<()> {
//!     let outcome = Compiler::new(CompilerConfiguration::default()).compile("web/app.dart")?;
//!     println!("{}", outcome.status);
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/dartc")]
#![warn(rust_2018_idioms)]

pub mod artifact;
pub mod backends;
pub mod cli;
pub mod compiler;
pub mod context;
pub mod error;
pub mod frontend;
pub mod metrics;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use compiler::{CompileOutcome, CompileStatus, Compiler};
pub use error::CompileError;

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compiler name
pub const NAME: &str = "dartc";
