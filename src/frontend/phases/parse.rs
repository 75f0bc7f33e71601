//! Parse phase

use rayon::prelude::*;
use tracing::trace;

use super::Phase;
use crate::context::CompilerContext;
use crate::error::CompileError;
use crate::frontend::config::PhaseKind;
use crate::frontend::module::LibraryGraph;
use crate::frontend::syntax::{parse_unit, CompilationUnit};

/// Parses every unit; syntax errors are reported, the partial tree is kept
#[derive(Debug, Default, Clone, Copy)]
pub struct ParsePhase;

impl Phase for ParsePhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Parse
    }

    fn run(
        &self,
        graph: &mut LibraryGraph,
        ctx: &dyn CompilerContext,
    ) -> Result<(), CompileError> {
        graph
            .units_mut()
            .into_par_iter()
            .for_each(|unit| parse_one(unit, ctx));
        Ok(())
    }
}

fn parse_one(
    unit: &mut CompilationUnit,
    ctx: &dyn CompilerContext,
) {
    if unit.parsed {
        return;
    }
    let parsed = parse_unit(&unit.text, ctx.interner());
    for error in &parsed.errors {
        ctx.report(error.to_event(unit.source.unique_id()));
    }
    trace!(
        unit = %unit.source,
        declarations = parsed.declarations.len(),
        errors = parsed.errors.len(),
        "unit parsed"
    );
    unit.directives = parsed.directives;
    unit.declarations = parsed.declarations;
    unit.parsed = true;
}
