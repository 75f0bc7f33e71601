//! Dependency resolver
//!
//! Expands a root library into a [`LibraryGraph`]:
//!
//! 1. Worklist expansion in discovery order. Each library is loaded once,
//!    keyed by its normalized URI; its parts are attached and its
//!    import/export directives become edges.
//! 2. An iterative depth-first walk from the root produces the traversal
//!    order (dependencies first). A dependency that is still on the walk
//!    stack closes a cycle: it is treated as already visited, so the library
//!    discovered first in the cycle is placed last, and the cycle is
//!    recorded.
//!
//! Missing libraries become placeholders so later phases never see a
//! dangling edge.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{ImportCycle, LibraryGraph, LibraryId, LibraryUnit};
use crate::context::CompilerContext;
use crate::frontend::source::{LibrarySource, Source, SourceError, SourceUri};
use crate::frontend::syntax::{scan_directives, CompilationUnit, Directive, Directives};
use crate::util::diagnostic::{ErrorCode, SourceLocation};

/// Builds the library graph for one compile
pub struct DependencyResolver<'a> {
    ctx: &'a dyn CompilerContext,
}

/// Where an edge came from, for diagnostics
struct Site {
    location: SourceLocation,
}

impl Site {
    fn of(
        unit: &Source,
        directive: &Directive,
    ) -> Self {
        Self {
            location: SourceLocation::new(
                unit.unique_id(),
                directive.span.start.line,
                directive.span.start.column,
                directive.span.len(),
            ),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(ctx: &'a dyn CompilerContext) -> Self {
        Self { ctx }
    }

    /// Expand `root` and order the result
    pub fn resolve(
        &self,
        root: LibrarySource,
    ) -> LibraryGraph {
        let mut graph = LibraryGraph::new();
        let root_site = SourceLocation::whole(root.unique_id());
        let root_id = self.load(&mut graph, root, Some(root_site));

        let mut queue = VecDeque::from([root_id]);
        while let Some(id) = queue.pop_front() {
            let library = graph.library(id);
            let Some(unit) = library.defining_unit() else {
                continue;
            };
            let from = library.source().clone();
            let unit_source = unit.source.clone();
            let directives = unit.directives.clone();

            for (directive, is_export) in directives
                .imports
                .iter()
                .map(|d| (d, false))
                .chain(directives.exports.iter().map(|d| (d, true)))
            {
                let site = Site::of(&unit_source, directive);
                let Some(target) = self.resolve_spec(&from, directive, &site) else {
                    continue;
                };
                let target_id = match graph.lookup(target.uri()) {
                    Some(existing) => {
                        if graph.library(existing).is_placeholder() {
                            self.report_unresolved(&target, &site);
                        }
                        existing
                    }
                    None => {
                        let new_id = self.load(&mut graph, target, Some(site.location.clone()));
                        queue.push_back(new_id);
                        new_id
                    }
                };
                let library = graph.library_mut(id);
                if is_export {
                    library.add_export(target_id);
                } else {
                    library.add_import(target_id);
                }
            }
        }

        let (order, cycles) = traversal_order(&graph, root_id);
        for cycle in &cycles {
            self.report_cycle(&graph, cycle);
        }
        debug!(
            libraries = graph.len(),
            units = graph.unit_count(),
            cycles = cycles.len(),
            "library graph resolved"
        );
        graph.set_order(order, cycles);
        graph
    }

    fn resolve_spec(
        &self,
        from: &LibrarySource,
        directive: &Directive,
        site: &Site,
    ) -> Option<LibrarySource> {
        match from.resolve_import(&directive.value, self.ctx.config()) {
            Ok(target) => Some(target),
            Err(SourceError::UnmappedSystemLibrary(spec)) => {
                // unknown system libraries still get a placeholder
                let uri = SourceUri::parse(&spec);
                Some(LibrarySource::new(from.sibling(uri)))
            }
            Err(_) => {
                self.ctx.report(
                    ErrorCode::INVALID_IMPORT
                        .builder()
                        .param("spec", &directive.value)
                        .at(site.location.clone())
                        .build(),
                );
                None
            }
        }
    }

    fn report_unresolved(
        &self,
        target: &LibrarySource,
        site: &Site,
    ) {
        self.ctx.report(
            ErrorCode::UNRESOLVED_IMPORT
                .builder()
                .param("uri", target.uri())
                .at(site.location.clone())
                .build(),
        );
    }

    /// Load one library with its parts and add it to the graph
    fn load(
        &self,
        graph: &mut LibraryGraph,
        source: LibrarySource,
        site: Option<SourceLocation>,
    ) -> LibraryId {
        if !source.exists() {
            if let Some(location) = site {
                self.report_unresolved(&source, &Site { location });
            }
            debug!(library = %source, "placeholder for missing library");
            return graph.insert(LibraryUnit::placeholder(source));
        }

        let text = self.read(source.source());
        let directives = scan_directives(&text);
        let name = directives
            .library_name
            .clone()
            .unwrap_or_else(|| source.name().to_string());
        trace!(library = %source, %name, "loading library");

        let mut library = LibraryUnit::new(source.clone(), name);
        let parts = directives.parts.clone();
        library.insert_unit(
            source.display_name().to_string(),
            CompilationUnit::new(source.source().clone(), text, directives),
        );

        for directive in &parts {
            let part = source.resolve_part(&directive.value);
            if !part.exists() {
                self.ctx.report(
                    ErrorCode::MISSING_PART
                        .builder()
                        .param("uri", part.uri())
                        .at(Site::of(source.source(), directive).location)
                        .build(),
                );
                continue;
            }
            let text = self.read(&part);
            let part_directives: Directives = scan_directives(&text);
            library.insert_unit(
                directive.value.clone(),
                CompilationUnit::new(part, text, part_directives),
            );
        }
        graph.insert(library)
    }

    fn read(
        &self,
        source: &Source,
    ) -> Arc<str> {
        match source.read_to_string() {
            Ok(text) => Arc::from(text),
            Err(err) => {
                self.ctx.report(
                    ErrorCode::SOURCE_READ_FAILED
                        .builder()
                        .param("uri", source.uri())
                        .param("reason", &err)
                        .at(SourceLocation::whole(source.unique_id()))
                        .build(),
                );
                Arc::from("")
            }
        }
    }

    fn report_cycle(
        &self,
        graph: &LibraryGraph,
        cycle: &ImportCycle,
    ) {
        let Some(first) = cycle.libraries.first() else {
            return;
        };
        let mut path: Vec<&str> = cycle
            .libraries
            .iter()
            .map(|id| graph.library(*id).source().display_name())
            .collect();
        path.push(graph.library(*first).source().display_name());
        self.ctx.report(
            ErrorCode::IMPORT_CYCLE
                .builder()
                .param("path", path.join(" -> "))
                .at(SourceLocation::whole(graph.library(*first).source().unique_id()))
                .build(),
        );
    }
}

/// Post-order of an iterative depth-first walk from `root`.
///
/// Edges into a library still on the stack are back edges: they are skipped
/// and the stack segment they close is returned as a cycle.
pub(crate) fn traversal_order(
    graph: &LibraryGraph,
    root: LibraryId,
) -> (Vec<LibraryId>, Vec<ImportCycle>) {
    let deps: Vec<Vec<LibraryId>> = graph.libraries().iter().map(|l| l.dependencies()).collect();
    let mut marks = vec![Mark::Unvisited; deps.len()];
    let mut order = Vec::with_capacity(deps.len());
    let mut cycles = Vec::new();

    let mut stack: Vec<(LibraryId, usize)> = vec![(root, 0)];
    marks[root.index()] = Mark::OnStack;

    while let Some((id, next_edge)) = stack.last_mut() {
        let id = *id;
        match deps[id.index()].get(*next_edge) {
            Some(&dep) => {
                *next_edge += 1;
                match marks[dep.index()] {
                    Mark::Unvisited => {
                        marks[dep.index()] = Mark::OnStack;
                        stack.push((dep, 0));
                    }
                    Mark::OnStack => {
                        let start = stack.iter().position(|(s, _)| *s == dep).unwrap_or(0);
                        cycles.push(ImportCycle {
                            libraries: stack[start..].iter().map(|(s, _)| *s).collect(),
                        });
                    }
                    Mark::Done => {}
                }
            }
            None => {
                marks[id.index()] = Mark::Done;
                order.push(id);
                stack.pop();
            }
        }
    }
    (order, cycles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::StubContext;
    use crate::frontend::config::CompilerConfiguration;
    use crate::frontend::source::{MemoryProvider, SourceProvider};
    use crate::util::diagnostic::ErrorCode;
    use std::path::Path;

    fn resolve(
        provider: MemoryProvider,
        root: &str,
        ctx: &StubContext,
    ) -> LibraryGraph {
        let provider: Arc<dyn SourceProvider> = Arc::new(provider);
        let root = LibrarySource::from_path(Path::new(root), provider);
        DependencyResolver::new(ctx).resolve(root)
    }

    fn names(
        graph: &LibraryGraph,
        ids: &[LibraryId],
    ) -> Vec<String> {
        ids.iter()
            .map(|id| graph.library(*id).source().display_name().to_string())
            .collect()
    }

    #[test]
    fn test_imports_come_first() {
        let provider = MemoryProvider::new();
        provider.add("/p/app.dart", "import 'a.dart';\nimport 'b.dart';\nmain() {}");
        provider.add("/p/a.dart", "import 'c.dart';");
        provider.add("/p/b.dart", "import 'c.dart';");
        provider.add("/p/c.dart", "");
        let ctx = StubContext::new().with_reports();
        let graph = resolve(provider, "/p/app.dart", &ctx);

        assert_eq!(graph.len(), 4);
        assert_eq!(
            names(&graph, graph.order()),
            vec!["c.dart", "a.dart", "b.dart", "app.dart"]
        );
        assert!(graph.cycles().is_empty());
        assert!(ctx.reported().is_empty());
    }

    #[test]
    fn test_identity_uses_normalized_uri() {
        let provider = MemoryProvider::new();
        provider.add("/p/app.dart", "import 'lib/../a.dart';\nimport './a.dart';");
        provider.add("/p/a.dart", "");
        let ctx = StubContext::new().with_reports();
        let graph = resolve(provider, "/p/app.dart", &ctx);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.library(graph.order()[1]).imports().len(), 1);
    }

    #[test]
    fn test_mutual_import_cycle() {
        let provider = MemoryProvider::new();
        provider.add("/p/a.dart", "import 'b.dart';");
        provider.add("/p/b.dart", "import 'a.dart';");
        let ctx = StubContext::new().with_reports();
        let graph = resolve(provider, "/p/a.dart", &ctx);

        assert_eq!(graph.len(), 2);
        // a was discovered first, so it is treated as visited and goes last
        assert_eq!(names(&graph, graph.order()), vec!["b.dart", "a.dart"]);
        assert_eq!(graph.cycles().len(), 1);
        assert_eq!(names(&graph, &graph.cycles()[0].libraries), vec!["a.dart", "b.dart"]);

        let reported = ctx.reported();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].code, ErrorCode::IMPORT_CYCLE);
        assert_eq!(reported[0].message, "Import cycle: a.dart -> b.dart -> a.dart");
    }

    #[test]
    fn test_missing_import_becomes_placeholder() {
        let provider = MemoryProvider::new();
        provider.add("/p/app.dart", "import 'gone.dart';\nimport 'dart:html';");
        let ctx = StubContext::new().with_reports();
        let graph = resolve(provider, "/p/app.dart", &ctx);

        assert_eq!(graph.len(), 3);
        assert!(graph.libraries()[1].is_placeholder());
        assert!(graph.libraries()[2].is_placeholder());
        let codes: Vec<ErrorCode> = ctx.reported().iter().map(|e| e.code).collect();
        assert_eq!(codes, vec![ErrorCode::UNRESOLVED_IMPORT, ErrorCode::UNRESOLVED_IMPORT]);
        let location = ctx.reported()[0].location.clone().unwrap();
        assert_eq!(location.source, "file:///p/app.dart");
        assert_eq!(location.line, 1);
    }

    #[test]
    fn test_system_library_mapping() {
        let provider = MemoryProvider::new();
        provider.add("/p/app.dart", "import 'dart:core';");
        provider.add("/sdk/core.dart", "library dart.core;");
        let config = CompilerConfiguration::builder()
            .system_library("dart:core", "/sdk/core.dart")
            .build()
            .unwrap();
        let ctx = StubContext::new().with_config(config).with_reports();
        let graph = resolve(provider, "/p/app.dart", &ctx);

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.libraries()[1].name(), "dart.core");
        assert!(!graph.libraries()[1].is_placeholder());
    }

    #[test]
    fn test_parts_are_attached_in_order() {
        let provider = MemoryProvider::new();
        provider.add("/p/app.dart", "library app;\npart 'one.dart';\npart 'two.dart';\npart 'nope.dart';");
        provider.add("/p/one.dart", "part of app;");
        provider.add("/p/two.dart", "part of app;");
        let ctx = StubContext::new().with_reports();
        let graph = resolve(provider, "/p/app.dart", &ctx);

        let app = graph.root().unwrap();
        let keys: Vec<&str> = app.source_set().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["app.dart", "one.dart", "two.dart"]);
        assert_eq!(ctx.reported()[0].code, ErrorCode::MISSING_PART);
    }

    #[test]
    fn test_missing_root() {
        let ctx = StubContext::new().with_reports();
        let graph = resolve(MemoryProvider::new(), "/p/app.dart", &ctx);
        assert_eq!(graph.len(), 1);
        assert!(graph.root().unwrap().is_placeholder());
        assert_eq!(graph.order().len(), 1);
        assert_eq!(ctx.reported()[0].code, ErrorCode::UNRESOLVED_IMPORT);
    }
}
