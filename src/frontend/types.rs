//! Type provider
//!
//! Knows the core types and every class declared in the graph. Shared
//! read-only by the type check phase and the backend.

use std::collections::HashMap;

use crate::frontend::module::{LibraryGraph, LibraryId};
use crate::frontend::syntax::{DeclarationKind, LiteralKind};
use crate::util::intern::{Interner, Symbol};

/// Implicitly available type names
pub const CORE_TYPES: &[&str] = &[
    "int", "double", "num", "String", "bool", "dynamic", "void", "Object", "List", "Map", "Null",
];

/// Where a type comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOrigin {
    Core,
    Declared(LibraryId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub origin: TypeOrigin,
    pub superclass: Option<Symbol>,
}

/// Type lookup for one compile
#[derive(Debug, Clone)]
pub struct TypeProvider {
    known: HashMap<Symbol, TypeInfo>,
    dynamic: Symbol,
    object: Symbol,
    num: Symbol,
    int: Symbol,
    double: Symbol,
}

impl TypeProvider {
    /// Core types only
    pub fn core(interner: &Interner) -> Self {
        let known = CORE_TYPES
            .iter()
            .map(|name| {
                let info = TypeInfo {
                    origin: TypeOrigin::Core,
                    superclass: None,
                };
                (interner.intern(name), info)
            })
            .collect();
        Self {
            known,
            dynamic: interner.intern("dynamic"),
            object: interner.intern("Object"),
            num: interner.intern("num"),
            int: interner.intern("int"),
            double: interner.intern("double"),
        }
    }

    /// Core types plus every class in `graph`. The first declaration of a
    /// class name wins.
    pub fn from_graph(
        graph: &LibraryGraph,
        interner: &Interner,
    ) -> Self {
        let mut provider = Self::core(interner);
        for library in graph.libraries() {
            for unit in library.units() {
                for declaration in &unit.declarations {
                    if declaration.kind != DeclarationKind::Class {
                        continue;
                    }
                    provider.known.entry(declaration.name).or_insert(TypeInfo {
                        origin: TypeOrigin::Declared(library.id()),
                        superclass: declaration.superclass.map(|s| s.value),
                    });
                }
            }
        }
        provider
    }

    pub fn lookup(
        &self,
        name: Symbol,
    ) -> Option<&TypeInfo> {
        self.known.get(&name)
    }

    pub fn is_known(
        &self,
        name: Symbol,
    ) -> bool {
        self.known.contains_key(&name)
    }

    #[inline]
    pub fn dynamic(&self) -> Symbol {
        self.dynamic
    }

    /// Number of known types, core included
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Whether a literal of kind `literal` may initialize a variable
    /// declared as `expected`. Unknown types and non-literal initializers
    /// are accepted.
    pub fn accepts(
        &self,
        expected: Symbol,
        literal: LiteralKind,
        interner: &Interner,
    ) -> bool {
        let Some(actual) = literal.type_name().and_then(|name| interner.get(name)) else {
            return true;
        };
        if expected == self.dynamic || expected == self.object || !self.is_known(expected) {
            return true;
        }
        if actual == expected {
            return true;
        }
        if expected == self.num {
            return actual == self.int || actual == self.double;
        }
        expected == self.double && actual == self.int
    }

    /// `ty` or one of its superclasses is `ancestor`
    pub fn is_subclass(
        &self,
        ty: Symbol,
        ancestor: Symbol,
    ) -> bool {
        let mut current = Some(ty);
        let mut steps = 0;
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            // inheritance cycles are not rejected anywhere, so bound the walk
            steps += 1;
            if steps > self.known.len() {
                return false;
            }
            current = self.known.get(&name).and_then(|info| info.superclass);
        }
        false
    }
}
