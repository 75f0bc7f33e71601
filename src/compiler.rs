//! 编译器驱动
//!
//! One [`Compiler::compile`] call is one compile:
//!
//! ```text
//! root ─► DependencyResolver ─► Pipeline (parse, resolve, type check, optimize)
//!                                  │ barrier after each phase
//!                                  ▼
//!              register libraries ─► compile stale units ─► package app
//! ```
//!
//! Source problems end up in [`CompileOutcome::diagnostics`]; `Err` is kept
//! for failures of the compiler itself.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::artifact::{ArtifactKey, ArtifactStore, FileArtifactStore};
use crate::backends::{backend_for, Backend, PackagedApp};
use crate::context::{artifact_key, CompilerContext, DriverContext};
use crate::error::CompileError;
use crate::frontend::config::{CompilerConfiguration, PhaseKind};
use crate::frontend::module::{DependencyResolver, LibraryUnit};
use crate::frontend::pipeline::{CancellationToken, Pipeline, PipelineOutcome};
use crate::frontend::source::{FileSystemProvider, LibrarySource, SourceProvider};
use crate::frontend::syntax::CompilationUnit;
use crate::frontend::types::TypeProvider;
use crate::metrics::CompilerMetrics;
use crate::util::diagnostic::{DiagnosticEvent, DiagnosticListener, DiagnosticSummary};

/// How a compile ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    /// Packaged without fatal diagnostics
    Succeeded,
    /// Fatal diagnostics during code generation or packaging
    Failed,
    /// The pipeline stopped at a barrier
    Aborted { after: PhaseKind },
    Cancelled,
}

impl fmt::Display for CompileStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            CompileStatus::Succeeded => write!(f, "succeeded"),
            CompileStatus::Failed => write!(f, "failed"),
            CompileStatus::Aborted { after } => write!(f, "aborted after {}", after),
            CompileStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Everything a caller learns from one compile
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub status: CompileStatus,
    /// Every diagnostic, sorted by source then position
    pub diagnostics: Vec<DiagnosticEvent>,
    pub summary: DiagnosticSummary,
    pub metrics: CompilerMetrics,
    /// Key of the packaged application
    pub packaged: Option<ArtifactKey>,
    /// Copy of the packaged application under the output directory
    pub output_path: Option<PathBuf>,
    /// Library ids in traversal order
    pub order: Vec<String>,
    /// Import cycles, as library ids
    pub cycles: Vec<Vec<String>>,
}

impl CompileOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == CompileStatus::Succeeded
    }

    /// Diagnostics carrying `code`
    pub fn with_code(
        &self,
        code: &str,
    ) -> Vec<&DiagnosticEvent> {
        self.diagnostics
            .iter()
            .filter(|e| e.code.code == code)
            .collect()
    }
}

/// State carried through one compile
struct Run {
    ctx: DriverContext,
    metrics: CompilerMetrics,
    started: Instant,
    order: Vec<String>,
    cycles: Vec<Vec<String>>,
}

/// Compiler driver
pub struct Compiler {
    config: CompilerConfiguration,
    listeners: Vec<Arc<dyn DiagnosticListener>>,
    provider: Arc<dyn SourceProvider>,
    store: Option<Arc<dyn ArtifactStore>>,
    cancellation: CancellationToken,
}

impl fmt::Debug for Compiler {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

impl Compiler {
    /// Reads sources from the file system and keeps artifacts under the
    /// configured work directory
    pub fn new(config: CompilerConfiguration) -> Self {
        Self {
            config,
            listeners: Vec::new(),
            provider: Arc::new(FileSystemProvider::new()),
            store: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_listener(
        mut self,
        listener: Arc<dyn DiagnosticListener>,
    ) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_provider(
        mut self,
        provider: Arc<dyn SourceProvider>,
    ) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_store(
        mut self,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cancellation(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &CompilerConfiguration {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Compile the library rooted at `path`
    pub fn compile(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<CompileOutcome, CompileError> {
        let root = LibrarySource::from_path(path.as_ref(), Arc::clone(&self.provider));
        self.compile_library(root)
    }

    pub fn compile_library(
        &self,
        root: LibrarySource,
    ) -> Result<CompileOutcome, CompileError> {
        let store: Arc<dyn ArtifactStore> = match &self.store {
            Some(store) => Arc::clone(store),
            None => Arc::new(FileArtifactStore::new(self.config.work_dir())),
        };
        let ctx = self
            .listeners
            .iter()
            .fold(DriverContext::new(self.config.clone(), store), |ctx, listener| {
                ctx.with_listener(Arc::clone(listener))
            });
        let mut run = Run {
            ctx,
            metrics: CompilerMetrics::new(),
            started: Instant::now(),
            order: Vec::new(),
            cycles: Vec::new(),
        };
        info!(root = %root, "compile started");

        if self.cancellation.is_cancelled() {
            return Ok(self.finish(run, CompileStatus::Cancelled, None));
        }

        let mut graph = DependencyResolver::new(&run.ctx).resolve(root.clone());
        run.metrics.libraries = graph.len();
        run.metrics.units = graph.unit_count();
        run.order = graph
            .ordered()
            .map(|library| library.source().unique_id().to_string())
            .collect();
        run.cycles = graph
            .cycles()
            .iter()
            .map(|cycle| {
                cycle
                    .libraries
                    .iter()
                    .map(|id| graph.library(*id).source().unique_id().to_string())
                    .collect()
            })
            .collect();

        let backend = backend_for(self.config.backend());
        let pipeline = Pipeline::new(&self.config)?;
        match pipeline.run(&mut graph, &run.ctx, &self.cancellation, &mut run.metrics)? {
            PipelineOutcome::Completed => {}
            PipelineOutcome::Aborted { after } => {
                self.discard_app(&run.ctx, backend.as_ref(), &root);
                return Ok(self.finish(run, CompileStatus::Aborted { after }, None));
            }
            PipelineOutcome::Cancelled { .. } => {
                return Ok(self.finish(run, CompileStatus::Cancelled, None));
            }
        }

        let types = TypeProvider::from_graph(&graph, run.ctx.interner());
        let libraries: Vec<Arc<LibraryUnit>> =
            graph.into_ordered().into_iter().map(Arc::new).collect();
        for library in &libraries {
            run.ctx.register_library(Arc::clone(library));
        }
        let app = run.ctx.library_unit(&root)?;

        let ctx = &run.ctx;
        let stale: Vec<(&CompilationUnit, &LibraryUnit)> = libraries
            .iter()
            .flat_map(|library| library.units().map(move |unit| (unit, library.as_ref())))
            .filter(|(unit, library)| backend.is_out_of_date(unit, library, ctx))
            .collect();
        let failed = pipeline.install(|| {
            stale
                .par_iter()
                .filter(|(unit, library)| {
                    match backend.compile_unit(unit, library, ctx, &types) {
                        Ok(()) => false,
                        Err(err) => {
                            let key = artifact_key(&unit.source, "", backend.unit_extension());
                            ctx.report(err.to_event(&key));
                            true
                        }
                    }
                })
                .count()
        });
        run.metrics.units_compiled = stale.len() - failed;
        run.metrics.units_reused = run.metrics.units - stale.len();

        if run.ctx.flush().has_fatal() {
            self.discard_app(&run.ctx, backend.as_ref(), &root);
            return Ok(self.finish(run, CompileStatus::Failed, None));
        }
        if self.cancellation.is_cancelled() {
            return Ok(self.finish(run, CompileStatus::Cancelled, None));
        }

        match backend.package_app(&app, &libraries, &run.ctx, &types) {
            Ok(packaged) => {
                run.metrics.packaged_bytes = packaged.bytes;
                Ok(self.finish(run, CompileStatus::Succeeded, Some(packaged)))
            }
            Err(err) => {
                let key = artifact_key(root.source(), "", backend.app_extension());
                run.ctx.report(err.to_event(&key));
                self.discard_app(&run.ctx, backend.as_ref(), &root);
                Ok(self.finish(run, CompileStatus::Failed, None))
            }
        }
    }

    /// A failed compile must not leave a packaged application behind
    fn discard_app(
        &self,
        ctx: &dyn CompilerContext,
        backend: &dyn Backend,
        root: &LibrarySource,
    ) {
        let extension = backend.app_extension();
        for ext in [extension.to_string(), format!("{}.map", extension)] {
            match ctx.remove_artifact(root.source(), "", &ext) {
                Ok(true) => info!(root = %root, artifact = %ext, "stale packaged output removed"),
                Ok(false) => {}
                Err(err) => warn!(root = %root, error = %err, "cannot remove packaged output"),
            }
        }
        let Some(dir) = self.config.out_dir() else {
            return;
        };
        for file in backend.published_files(root) {
            let path = dir.join(file);
            match fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "stale published output removed"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path.display(), error = %err, "cannot remove published output"),
            }
        }
    }

    fn finish(
        &self,
        mut run: Run,
        status: CompileStatus,
        packaged: Option<PackagedApp>,
    ) -> CompileOutcome {
        let summary = run.ctx.flush();
        run.metrics.record_diagnostics(&summary);
        run.metrics.total = run.started.elapsed();
        run.metrics.log(self.config.metrics());

        let mut diagnostics = run.ctx.diagnostics();
        diagnostics.sort_by(|a, b| a.report_order(b));
        info!(
            %status,
            errors = summary.errors,
            warnings = summary.warnings,
            "compile finished"
        );

        let (packaged, output_path) = match packaged {
            Some(app) => (Some(app.key), app.output_path),
            None => (None, None),
        };
        CompileOutcome {
            status,
            diagnostics,
            summary,
            metrics: run.metrics,
            packaged,
            output_path,
            order: run.order,
            cycles: run.cycles,
        }
    }
}
