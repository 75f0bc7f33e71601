//! 编译阶段
//!
//! A phase walks the whole [`LibraryGraph`] and mutates its units in place.
//! Phases report through the context and never stop on a source problem;
//! deciding whether to go on is the pipeline's job at the barrier.
//!
//! # Module structure
//!
//! - [`parse`] - full parse of every unit
//! - [`resolve`] - library scopes and reference binding
//! - [`typecheck`] - declared and literal types
//! - [`optimize`] - dead private declaration elimination

pub mod optimize;
pub mod parse;
pub mod resolve;
pub mod typecheck;

pub use optimize::OptimizePhase;
pub use parse::ParsePhase;
pub use resolve::ResolvePhase;
pub use typecheck::TypeCheckPhase;

use crate::context::CompilerContext;
use crate::error::CompileError;
use crate::frontend::config::PhaseKind;
use crate::frontend::module::LibraryGraph;
use crate::frontend::source::Source;
use crate::util::diagnostic::SourceLocation;
use crate::util::span::Span;

/// One pass over the graph
pub trait Phase: Send + Sync {
    fn kind(&self) -> PhaseKind;

    fn run(
        &self,
        graph: &mut LibraryGraph,
        ctx: &dyn CompilerContext,
    ) -> Result<(), CompileError>;
}

/// The stock implementation of `kind`
pub fn phase_for(kind: PhaseKind) -> Box<dyn Phase> {
    match kind {
        PhaseKind::Parse => Box::new(ParsePhase),
        PhaseKind::Resolve => Box::new(ResolvePhase),
        PhaseKind::TypeCheck => Box::new(TypeCheckPhase),
        PhaseKind::Optimize => Box::new(OptimizePhase),
    }
}

pub(crate) fn span_location(
    source: &Source,
    span: Span,
) -> SourceLocation {
    SourceLocation::new(
        source.unique_id(),
        span.start.line,
        span.start.column,
        span.len(),
    )
}
