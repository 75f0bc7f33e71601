//! Driver errors
//!
//! Source problems are diagnostics, not errors. A [`CompileError`] means the
//! compile itself could not continue: the environment failed, an internal
//! contract was broken, or the compile was cancelled.

use std::io;

use crate::artifact::ArtifactError;
use crate::backends::BackendError;
use crate::util::config::ConfigError;

/// Top-level driver error
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Internal invariant breach; never reported as a diagnostic
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("compile cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl CompileError {
    pub fn contract(message: impl Into<String>) -> Self {
        CompileError::ContractViolation(message.into())
    }

    /// Whether the error signals a bug rather than an environment problem
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, CompileError::ContractViolation(_))
    }
}
