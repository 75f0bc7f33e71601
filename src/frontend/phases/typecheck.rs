//! Type check phase
//!
//! Checks declared types and superclasses against the [`TypeProvider`],
//! checks literal initializers against declared types, and records a
//! static type on every declaration:
//!
//! | Declaration | Static type |
//! |-------------|-------------|
//! | class | the class itself |
//! | function | declared return type, else `dynamic` |
//! | variable | declared type, else the literal's type, else `dynamic` |
//!
//! Unknown declared types are treated as `dynamic`.

use rayon::prelude::*;

use super::{span_location, Phase};
use crate::context::CompilerContext;
use crate::error::CompileError;
use crate::frontend::config::PhaseKind;
use crate::frontend::module::{LibraryGraph, LibraryUnit};
use crate::frontend::source::Source;
use crate::frontend::syntax::{Declaration, DeclarationKind};
use crate::frontend::types::TypeProvider;
use crate::util::diagnostic::ErrorCode;
use crate::util::intern::Symbol;
use crate::util::Spanned;

#[derive(Debug, Default, Clone, Copy)]
pub struct TypeCheckPhase;

impl Phase for TypeCheckPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::TypeCheck
    }

    fn run(
        &self,
        graph: &mut LibraryGraph,
        ctx: &dyn CompilerContext,
    ) -> Result<(), CompileError> {
        let types = TypeProvider::from_graph(graph, ctx.interner());
        graph
            .libraries_mut()
            .par_iter_mut()
            .for_each(|library| check_library(library, &types, ctx));
        Ok(())
    }
}

fn check_library(
    library: &mut LibraryUnit,
    types: &TypeProvider,
    ctx: &dyn CompilerContext,
) {
    for unit in library.units_mut() {
        let source = unit.source.clone();
        for declaration in &mut unit.declarations {
            check_declaration(&source, declaration, types, ctx);
        }
    }
}

fn check_declaration(
    source: &Source,
    declaration: &mut Declaration,
    types: &TypeProvider,
    ctx: &dyn CompilerContext,
) {
    let interner = ctx.interner();
    let declared = declaration
        .type_annotation
        .filter(|annotation| require_known(source, annotation, types, ctx));
    if let Some(superclass) = &declaration.superclass {
        require_known(source, superclass, types, ctx);
    }

    if let (Some(expected), Some(initializer)) = (declared, &declaration.initializer) {
        if !types.accepts(expected.value, initializer.value, interner) {
            let actual = initializer.value.type_name().unwrap_or("dynamic");
            ctx.report(
                ErrorCode::TYPE_MISMATCH
                    .builder()
                    .param("actual", actual)
                    .param("expected", interner.display(expected.value))
                    .at(span_location(source, initializer.span))
                    .build(),
            );
        }
    }

    let static_type: Symbol = match declaration.kind {
        DeclarationKind::Class => declaration.name,
        DeclarationKind::Function => declared.map_or(types.dynamic(), |t| t.value),
        DeclarationKind::Variable => declared
            .map(|t| t.value)
            .or_else(|| {
                declaration
                    .initializer
                    .and_then(|init| init.value.type_name())
                    .map(|name| interner.intern(name))
            })
            .unwrap_or(types.dynamic()),
    };
    declaration.static_type = Some(static_type);
}

/// Whether `name` is a known type; reports it otherwise
fn require_known(
    source: &Source,
    name: &Spanned<Symbol>,
    types: &TypeProvider,
    ctx: &dyn CompilerContext,
) -> bool {
    if types.is_known(name.value) {
        return true;
    }
    if ctx.config().should_warn_on_no_such_type() {
        ctx.report(
            ErrorCode::NO_SUCH_TYPE
                .builder()
                .param("name", ctx.interner().display(name.value))
                .at(span_location(source, name.span))
                .build(),
        );
    }
    false
}
