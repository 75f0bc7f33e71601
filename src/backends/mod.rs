//! Backend abstraction layer
//!
//! A backend turns the processed graph into output in two steps:
//!
//! ```text
//! LibraryGraph (after the pipeline)
//!         |
//!         v
//!   compile_unit   one primary artifact per stale unit, then its
//!         |        auxiliary artifacts (source map)
//!         v
//!   package_app    per-unit artifacts of every library, concatenated in
//!                  dependency order under the root library's key
//! ```
//!
//! Every byte goes through the [`CompilerContext`] artifact API, so a
//! failed write never leaves a partial artifact behind.

pub mod js;

pub use js::JsBackend;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::artifact::{ArtifactError, ArtifactKey};
use crate::context::CompilerContext;
use crate::frontend::config::BackendKind;
use crate::frontend::module::LibraryUnit;
use crate::frontend::source::LibrarySource;
use crate::frontend::syntax::CompilationUnit;
use crate::frontend::types::TypeProvider;
use crate::util::diagnostic::{DiagnosticEvent, ErrorCode, SourceLocation};

/// Backend errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("cannot encode source map {key}: {source}")]
    SourceMap {
        key: ArtifactKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot publish {}: {source}", path.display())]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BackendError {
    /// Diagnostic for an error hit while producing `fallback`
    pub fn to_event(
        &self,
        fallback: &ArtifactKey,
    ) -> DiagnosticEvent {
        let key = match self {
            BackendError::Artifact(err) => err.key().unwrap_or(fallback),
            BackendError::SourceMap { key, .. } => key,
            BackendError::Publish { .. } => fallback,
        };
        let code = match self {
            BackendError::Artifact(ArtifactError::Missing(_) | ArtifactError::Read { .. }) => {
                ErrorCode::ARTIFACT_READ_FAILED
            }
            _ => ErrorCode::ARTIFACT_WRITE_FAILED,
        };
        let reason = match self {
            BackendError::Artifact(ArtifactError::Read { source, .. })
            | BackendError::Artifact(ArtifactError::Write { source, .. })
            | BackendError::Publish { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        code.builder()
            .param("key", key)
            .param("reason", reason)
            .at(SourceLocation::whole(key.source_id.as_str()))
            .build()
    }
}

/// Result of packaging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedApp {
    pub key: ArtifactKey,
    /// Copy under the output directory, when one is configured
    pub output_path: Option<PathBuf>,
    pub bytes: usize,
}

/// Code generator contract
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extension of the primary per-unit artifact
    fn unit_extension(&self) -> &'static str;

    fn source_map_extension(&self) -> &'static str;

    /// Extension of the packaged application
    fn app_extension(&self) -> &'static str;

    /// Names of the files `package_app` copies into the output directory
    fn published_files(
        &self,
        app: &LibrarySource,
    ) -> Vec<String>;

    /// Whether `unit` must be compiled again
    fn is_out_of_date(
        &self,
        unit: &CompilationUnit,
        library: &LibraryUnit,
        ctx: &dyn CompilerContext,
    ) -> bool;

    /// Write the primary artifact, then the auxiliary ones
    fn compile_unit(
        &self,
        unit: &CompilationUnit,
        library: &LibraryUnit,
        ctx: &dyn CompilerContext,
        types: &TypeProvider,
    ) -> Result<(), BackendError>;

    /// Concatenate every unit artifact of `libraries` (dependency order)
    /// under the key of `app`
    fn package_app(
        &self,
        app: &LibraryUnit,
        libraries: &[Arc<LibraryUnit>],
        ctx: &dyn CompilerContext,
        types: &TypeProvider,
    ) -> Result<PackagedApp, BackendError>;
}

/// The backend selected by `kind`
pub fn backend_for(kind: BackendKind) -> Box<dyn Backend> {
    match kind {
        BackendKind::Js => Box::new(JsBackend::new()),
    }
}
