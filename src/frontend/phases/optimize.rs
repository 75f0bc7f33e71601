//! Optimize phase: dead private declaration elimination
//!
//! A private (`_name`) declaration is dead when no live declaration of its
//! library uses it: calls, constructions, declared types and superclasses
//! all count as uses, self references do not. Eliminating one declaration
//! can make others dead, so each library is iterated to a fixpoint.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::debug;

use super::Phase;
use crate::context::CompilerContext;
use crate::error::CompileError;
use crate::frontend::config::PhaseKind;
use crate::frontend::module::{LibraryGraph, LibraryUnit};
use crate::util::intern::Symbol;

#[derive(Debug, Default, Clone, Copy)]
pub struct OptimizePhase;

impl Phase for OptimizePhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Optimize
    }

    fn run(
        &self,
        graph: &mut LibraryGraph,
        _ctx: &dyn CompilerContext,
    ) -> Result<(), CompileError> {
        let eliminated: usize = graph
            .libraries_mut()
            .par_iter_mut()
            .map(eliminate_dead_privates)
            .sum();
        debug!(eliminated, "dead private declarations removed");
        Ok(())
    }
}

/// Returns the number of declarations eliminated
fn eliminate_dead_privates(library: &mut LibraryUnit) -> usize {
    let mut total = 0;
    loop {
        let used = used_names(library);
        let mut eliminated = 0;
        for unit in library.units_mut() {
            for declaration in &mut unit.declarations {
                if declaration.private
                    && declaration.is_live()
                    && !used.contains(&declaration.name)
                {
                    declaration.eliminated = true;
                    eliminated += 1;
                }
            }
        }
        if eliminated == 0 {
            return total;
        }
        total += eliminated;
    }
}

fn used_names(library: &LibraryUnit) -> HashSet<Symbol> {
    let mut used = HashSet::new();
    for declaration in library.units().flat_map(|unit| unit.live_declarations()) {
        let types = declaration
            .type_annotation
            .iter()
            .chain(declaration.superclass.iter())
            .map(|t| t.value);
        let calls = declaration
            .references
            .iter()
            .map(|r| r.name)
            .filter(|name| *name != declaration.name);
        used.extend(types.chain(calls));
    }
    used
}
