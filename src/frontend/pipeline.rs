//! 编译流水线
//!
//! Runs the configured phases over the whole graph, one at a time, with a
//! hard barrier between them. At each barrier the buffered diagnostics are
//! delivered and the running summary decides whether to go on:
//!
//! ```text
//! for phase in phases:
//!     cancelled?            -> Cancelled
//!     run phase (worker pool)
//!     flush diagnostics
//!     fatal? (see below)    -> Aborted { after: phase }
//! ```
//!
//! With `resolve_despite_parse_errors` the check after parse is skipped;
//! the parse errors still count at the next barrier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info_span};

use super::config::{CompilerConfiguration, PhaseKind};
use super::module::LibraryGraph;
use super::phases::{phase_for, Phase};
use crate::context::CompilerContext;
use crate::error::CompileError;
use crate::metrics::CompilerMetrics;

/// Cooperative cancellation, honoured at phase barriers only
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// How a pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every phase ran
    Completed,
    /// Fatal diagnostics were present at the barrier after `after`
    Aborted { after: PhaseKind },
    /// Cancelled before `before` started
    Cancelled { before: PhaseKind },
}

/// Ordered phases plus the worker pool they run on
pub struct Pipeline {
    phases: Vec<Box<dyn Phase>>,
    pool: ThreadPool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let kinds: Vec<PhaseKind> = self.phases.iter().map(|p| p.kind()).collect();
        f.debug_struct("Pipeline")
            .field("phases", &kinds)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl Pipeline {
    /// The configured phases on a pool of `jobs` workers
    pub fn new(config: &CompilerConfiguration) -> Result<Self, CompileError> {
        let phases = config.phases().iter().map(|kind| phase_for(*kind)).collect();
        Self::with_phases(phases, config.jobs())
    }

    /// Custom phases; `jobs == 0` lets rayon pick
    pub fn with_phases(
        phases: Vec<Box<dyn Phase>>,
        jobs: usize,
    ) -> Result<Self, CompileError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("dartc-worker-{}", i))
            .build()?;
        Ok(Self { phases, pool })
    }

    pub fn phases(&self) -> impl Iterator<Item = PhaseKind> + '_ {
        self.phases.iter().map(|p| p.kind())
    }

    /// Run `f` on the worker pool
    pub fn install<R: Send>(
        &self,
        f: impl FnOnce() -> R + Send,
    ) -> R {
        self.pool.install(f)
    }

    pub fn run(
        &self,
        graph: &mut LibraryGraph,
        ctx: &dyn CompilerContext,
        cancel: &CancellationToken,
        metrics: &mut CompilerMetrics,
    ) -> Result<PipelineOutcome, CompileError> {
        for phase in &self.phases {
            let kind = phase.kind();
            if cancel.is_cancelled() {
                debug!(before = %kind, "pipeline cancelled");
                return Ok(PipelineOutcome::Cancelled { before: kind });
            }

            let span = info_span!("phase", name = %kind);
            let _enter = span.enter();
            let started = Instant::now();
            self.pool.install(|| phase.run(graph, ctx))?;
            let summary = ctx.flush();
            metrics.record_phase(kind, started.elapsed());
            debug!(
                errors = summary.errors,
                warnings = summary.warnings,
                fatal = summary.fatal,
                "phase finished"
            );

            let barrier_lifted =
                kind == PhaseKind::Parse && ctx.config().resolve_despite_parse_errors();
            if summary.has_fatal() && !barrier_lifted {
                debug!(after = %kind, "pipeline aborted");
                return Ok(PipelineOutcome::Aborted { after: kind });
            }
        }
        Ok(PipelineOutcome::Completed)
    }
}
