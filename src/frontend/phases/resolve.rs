//! Resolve phase
//!
//! Scopes are built once, at the barrier, for every library:
//!
//! 1. its own top-level names, across all parts
//! 2. names exported by each import, in import order, following `export`
//!    edges transitively (cycles are cut by a visited set)
//! 3. the implicit core names
//!
//! The first binding of a name wins. References are then bound per library
//! in parallel.

use std::collections::HashMap;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::debug;

use super::{span_location, Phase};
use crate::context::CompilerContext;
use crate::error::CompileError;
use crate::frontend::config::PhaseKind;
use crate::frontend::module::{LibraryGraph, LibraryId, LibraryUnit};
use crate::frontend::syntax::Binding;
use crate::frontend::types::CORE_TYPES;
use crate::util::diagnostic::{ErrorCode, SourceLocation};
use crate::util::intern::Symbol;

/// Names every library sees without importing anything
pub const CORE_NAMES: &[&str] = &[
    "print",
    "identical",
    "identityHashCode",
    "Set",
    "Iterable",
    "Future",
    "Stream",
    "Duration",
    "DateTime",
    "Exception",
    "Error",
    "StringBuffer",
    "RegExp",
    "Uri",
    "Function",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct ResolvePhase;

/// Names visible in one library
#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<Symbol, Binding>,
}

impl Scope {
    fn bind(
        &mut self,
        name: Symbol,
        binding: Binding,
    ) {
        self.bindings.entry(name).or_insert(binding);
    }

    fn lookup(
        &self,
        name: Symbol,
    ) -> Option<Binding> {
        self.bindings.get(&name).copied()
    }
}

/// A library's own top-level names; the value is the privacy flag
type OwnNames = IndexMap<Symbol, bool>;

impl Phase for ResolvePhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Resolve
    }

    fn run(
        &self,
        graph: &mut LibraryGraph,
        ctx: &dyn CompilerContext,
    ) -> Result<(), CompileError> {
        let scopes = build_scopes(graph, ctx);
        let unresolved: usize = graph
            .libraries_mut()
            .par_iter_mut()
            .zip(scopes.par_iter())
            .map(|(library, scope)| bind_library(library, scope, ctx))
            .sum();
        debug!(libraries = scopes.len(), unresolved, "references bound");
        Ok(())
    }
}

fn build_scopes(
    graph: &LibraryGraph,
    ctx: &dyn CompilerContext,
) -> Vec<Scope> {
    let own: Vec<OwnNames> = graph
        .libraries()
        .iter()
        .map(|library| own_names(library, ctx))
        .collect();
    let core: Vec<Symbol> = CORE_TYPES
        .iter()
        .chain(CORE_NAMES)
        .map(|name| ctx.interner().intern(name))
        .collect();

    graph
        .libraries()
        .iter()
        .map(|library| {
            let mut scope = Scope::default();
            for name in own[library.id().index()].keys() {
                scope.bind(*name, Binding::Local);
            }
            for import in library.imports() {
                for (name, origin) in exported_names(graph, &own, *import) {
                    scope.bind(name, Binding::Imported(origin));
                }
            }
            for name in &core {
                scope.bind(*name, Binding::Core);
            }
            scope
        })
        .collect()
}

/// Top-level names of `library`; a repeated name is reported at its
/// second declaration
fn own_names(
    library: &LibraryUnit,
    ctx: &dyn CompilerContext,
) -> OwnNames {
    let mut names = OwnNames::new();
    for unit in library.units() {
        for declaration in &unit.declarations {
            if names.insert(declaration.name, declaration.private).is_some() {
                ctx.report(
                    ErrorCode::DUPLICATE_DEFINITION
                        .builder()
                        .param("name", ctx.interner().display(declaration.name))
                        .at(span_location(&unit.source, declaration.span))
                        .build(),
                );
            }
        }
    }
    names
}

/// Public names reachable from `root` through `export` edges, paired with
/// the library that declares them
fn exported_names(
    graph: &LibraryGraph,
    own: &[OwnNames],
    root: LibraryId,
) -> Vec<(Symbol, LibraryId)> {
    let mut visited = vec![false; graph.len()];
    let mut stack = vec![root];
    let mut names = Vec::new();
    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut visited[id.index()], true) {
            continue;
        }
        names.extend(
            own[id.index()]
                .iter()
                .filter(|(_, private)| !**private)
                .map(|(name, _)| (*name, id)),
        );
        // reversed so exports are visited in directive order
        stack.extend(graph.library(id).exports().iter().rev().copied());
    }
    names
}

/// Bind every reference of `library`; returns how many stayed unresolved
fn bind_library(
    library: &mut LibraryUnit,
    scope: &Scope,
    ctx: &dyn CompilerContext,
) -> usize {
    let library_name = library.name().to_string();
    let library_source = library.source().clone();
    let mut unresolved = 0;

    for (index, unit) in library.units_mut().enumerate() {
        if index > 0 {
            if let Some(declared) = unit.directives.part_of.as_deref() {
                let names_library = declared == library_name
                    || library_source.resolve_part(declared).uri() == library_source.uri();
                if !names_library {
                    ctx.report(
                        ErrorCode::PART_OF_MISMATCH
                            .builder()
                            .param("actual", declared)
                            .param("expected", &library_name)
                            .at(SourceLocation::whole(unit.source.unique_id()))
                            .build(),
                    );
                }
            }
        }

        let source = unit.source.clone();
        for declaration in &mut unit.declarations {
            for reference in &mut declaration.references {
                reference.binding = scope.lookup(reference.name);
                if reference.binding.is_none() {
                    unresolved += 1;
                    ctx.report(
                        ErrorCode::CANNOT_RESOLVE
                            .builder()
                            .param("name", ctx.interner().display(reference.name))
                            .at(span_location(&source, reference.span))
                            .build(),
                    );
                }
            }
        }
    }
    unresolved
}
