//! Library graph
//!
//! Libraries live in an arena indexed by [`LibraryId`]; edges are ids, so
//! import cycles are plain back edges and every distinct library exists
//! exactly once. [`resolver::DependencyResolver`] builds the graph and its
//! traversal order.

pub mod resolver;

pub use resolver::DependencyResolver;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::frontend::source::{LibrarySource, Source, SourceUri};
use crate::frontend::syntax::CompilationUnit;

/// Arena index of a library
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryId(u32);

impl LibraryId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        LibraryId(index as u32)
    }
}

impl fmt::Display for LibraryId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "lib#{}", self.0)
    }
}

/// One library: its units (defining unit first, then parts in directive
/// order) and its resolved edges
#[derive(Debug, Clone)]
pub struct LibraryUnit {
    id: LibraryId,
    source: LibrarySource,
    name: String,
    units: IndexMap<String, CompilationUnit>,
    imports: Vec<LibraryId>,
    exports: Vec<LibraryId>,
    placeholder: bool,
}

impl LibraryUnit {
    pub(crate) fn new(
        source: LibrarySource,
        name: String,
    ) -> Self {
        Self {
            id: LibraryId(0),
            source,
            name,
            units: IndexMap::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            placeholder: false,
        }
    }

    /// Empty stand-in for a library that could not be found
    pub(crate) fn placeholder(source: LibrarySource) -> Self {
        let name = source.name().to_string();
        Self {
            placeholder: true,
            ..Self::new(source, name)
        }
    }

    #[inline]
    pub fn id(&self) -> LibraryId {
        self.id
    }

    #[inline]
    pub fn source(&self) -> &LibrarySource {
        &self.source
    }

    /// `library` directive name, or the file stem
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Relative path → unit, in insertion order
    pub fn source_set(&self) -> &IndexMap<String, CompilationUnit> {
        &self.units
    }

    pub fn units(&self) -> impl Iterator<Item = &CompilationUnit> {
        self.units.values()
    }

    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut CompilationUnit> {
        self.units.values_mut()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// The unit holding the library's directives
    pub fn defining_unit(&self) -> Option<&CompilationUnit> {
        self.units.get_index(0).map(|(_, unit)| unit)
    }

    #[inline]
    pub fn imports(&self) -> &[LibraryId] {
        &self.imports
    }

    #[inline]
    pub fn exports(&self) -> &[LibraryId] {
        &self.exports
    }

    /// Imports followed by exports, without repeats
    pub fn dependencies(&self) -> Vec<LibraryId> {
        let mut deps = self.imports.clone();
        for id in &self.exports {
            if !deps.contains(id) {
                deps.push(*id);
            }
        }
        deps
    }

    /// Most recently modified source of the library
    pub fn newest_source(&self) -> &Source {
        self.units
            .values()
            .map(|unit| &unit.source)
            .max_by_key(|source| source.last_modified())
            .unwrap_or(self.source.source())
    }

    pub(crate) fn insert_unit(
        &mut self,
        path: String,
        unit: CompilationUnit,
    ) -> bool {
        if self.units.contains_key(&path) {
            return false;
        }
        self.units.insert(path, unit);
        true
    }

    pub(crate) fn add_import(
        &mut self,
        id: LibraryId,
    ) {
        if !self.imports.contains(&id) {
            self.imports.push(id);
        }
    }

    pub(crate) fn add_export(
        &mut self,
        id: LibraryId,
    ) {
        if !self.exports.contains(&id) {
            self.exports.push(id);
        }
    }
}

/// A cycle found while ordering, starting at the library that was treated
/// as already visited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCycle {
    pub libraries: Vec<LibraryId>,
}

/// All libraries reachable from a root, with a deterministic order
#[derive(Debug, Default)]
pub struct LibraryGraph {
    libraries: Vec<LibraryUnit>,
    by_uri: HashMap<SourceUri, LibraryId>,
    order: Vec<LibraryId>,
    cycles: Vec<ImportCycle>,
}

impl LibraryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a library; its id is assigned here
    pub(crate) fn insert(
        &mut self,
        mut library: LibraryUnit,
    ) -> LibraryId {
        let id = LibraryId(self.libraries.len() as u32);
        library.id = id;
        self.by_uri.insert(library.source.uri().clone(), id);
        self.libraries.push(library);
        id
    }

    pub(crate) fn set_order(
        &mut self,
        order: Vec<LibraryId>,
        cycles: Vec<ImportCycle>,
    ) {
        self.order = order;
        self.cycles = cycles;
    }

    /// The library everything was expanded from
    pub fn root(&self) -> Option<&LibraryUnit> {
        self.libraries.first()
    }

    pub fn library(
        &self,
        id: LibraryId,
    ) -> &LibraryUnit {
        &self.libraries[id.index()]
    }

    pub fn library_mut(
        &mut self,
        id: LibraryId,
    ) -> &mut LibraryUnit {
        &mut self.libraries[id.index()]
    }

    /// Look a library up by normalized URI
    pub fn lookup(
        &self,
        uri: &SourceUri,
    ) -> Option<LibraryId> {
        self.by_uri.get(uri).copied()
    }

    /// Libraries in discovery order
    pub fn libraries(&self) -> &[LibraryUnit] {
        &self.libraries
    }

    pub fn libraries_mut(&mut self) -> &mut [LibraryUnit] {
        &mut self.libraries
    }

    /// Every unit of every library, for per-unit parallel work
    pub fn units_mut(&mut self) -> Vec<&mut CompilationUnit> {
        self.libraries
            .iter_mut()
            .flat_map(|library| library.units.values_mut())
            .collect()
    }

    /// Dependencies before dependents; cycles broken in discovery order
    pub fn order(&self) -> &[LibraryId] {
        &self.order
    }

    pub fn ordered(&self) -> impl Iterator<Item = &LibraryUnit> {
        self.order.iter().map(|id| self.library(*id))
    }

    pub fn cycles(&self) -> &[ImportCycle] {
        &self.cycles
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn unit_count(&self) -> usize {
        self.libraries.iter().map(LibraryUnit::unit_count).sum()
    }

    /// Consume the graph, yielding libraries in traversal order
    pub fn into_ordered(self) -> Vec<LibraryUnit> {
        let mut slots: Vec<Option<LibraryUnit>> = self.libraries.into_iter().map(Some).collect();
        self.order
            .iter()
            .filter_map(|id| slots.get_mut(id.index()).and_then(Option::take))
            .collect()
    }
}
