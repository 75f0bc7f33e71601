//! Traversal order, cycle breaking and packaging determinism

use std::sync::Arc;

use dartc::artifact::{ArtifactKey, ArtifactStore, MemoryArtifactStore};
use dartc::frontend::config::CompilerConfiguration;
use dartc::frontend::source::MemoryProvider;
use dartc::Compiler;
use proptest::prelude::*;

fn compile(provider: &MemoryProvider) -> (dartc::CompileOutcome, String) {
    let store = MemoryArtifactStore::new();
    let outcome = Compiler::new(CompilerConfiguration::builder().jobs(2).build().unwrap())
        .with_provider(Arc::new(provider.clone()))
        .with_store(Arc::new(store.clone()))
        .compile("/p/l0.dart")
        .unwrap();
    let app = store
        .read(&ArtifactKey::new("file:///p/l0.dart", "", "app.js"))
        .unwrap()
        .map(|bytes| String::from_utf8(bytes).unwrap())
        .unwrap_or_default();
    (outcome, app)
}

#[test]
fn test_mutual_import_is_compiled_once_each() {
    let provider = MemoryProvider::new();
    provider.add("/p/l0.dart", "import 'l1.dart';\nping() { pong(); }\n");
    provider.add("/p/l1.dart", "import 'l0.dart';\npong() { ping(); }\n");

    let (first, first_app) = compile(&provider);
    assert!(first.succeeded(), "{:?}", first.diagnostics);
    assert_eq!(first.metrics.libraries, 2);
    assert_eq!(first.order, vec!["file:///p/l1.dart", "file:///p/l0.dart"]);
    assert_eq!(first.cycles, vec![vec!["file:///p/l0.dart", "file:///p/l1.dart"]]);

    let cycle = first.with_code("E0506");
    assert_eq!(cycle.len(), 1);
    assert_eq!(cycle[0].message, "Import cycle: l0.dart -> l1.dart -> l0.dart");

    for _ in 0..3 {
        let (again, app) = compile(&provider);
        assert_eq!(again.order, first.order);
        assert_eq!(app, first_app);
    }
}

#[test]
fn test_export_edges_order_like_imports() {
    let provider = MemoryProvider::new();
    provider.add("/p/l0.dart", "import 'l1.dart';\nmain() { shared(); }\n");
    provider.add("/p/l1.dart", "export 'l2.dart';\n");
    provider.add("/p/l2.dart", "shared() {}\n");

    let (outcome, app) = compile(&provider);
    assert!(outcome.succeeded(), "{:?}", outcome.diagnostics);
    assert_eq!(
        outcome.order,
        vec!["file:///p/l2.dart", "file:///p/l1.dart", "file:///p/l0.dart"]
    );
    assert!(app.find("// l2.dart").unwrap() < app.find("// l0.dart").unwrap());
}

/// `l{i}` imports `l{j}` for `j > i` where the edge bit is set
fn acyclic_sources(
    n: usize,
    edges: &[bool],
) -> (MemoryProvider, Vec<Vec<usize>>) {
    let provider = MemoryProvider::new();
    let mut imports = vec![Vec::new(); n];
    for i in 0..n {
        let mut text = String::new();
        for j in (i + 1)..n {
            if edges[i * n + j] {
                imports[i].push(j);
                text.push_str(&format!("import 'l{}.dart';\n", j));
            }
        }
        text.push_str(&format!("f{}() {{}}\n", i));
        provider.add(format!("/p/l{}.dart", i), &text);
    }
    (provider, imports)
}

fn uri(i: usize) -> String {
    format!("file:///p/l{}.dart", i)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_dependencies_come_first(
        (n, edges) in (2usize..7).prop_flat_map(|n| (Just(n), proptest::collection::vec(any::<bool>(), n * n)))
    ) {
        let (provider, imports) = acyclic_sources(n, &edges);
        let (outcome, app) = compile(&provider);
        prop_assert!(outcome.succeeded());
        prop_assert!(outcome.cycles.is_empty());
        prop_assert_eq!(outcome.order.last().cloned(), Some(uri(0)));

        let position = |id: &str| outcome.order.iter().position(|o| o == id);
        for (i, targets) in imports.iter().enumerate() {
            let Some(at) = position(&uri(i)) else { continue };
            for j in targets {
                let dep = position(&uri(*j));
                prop_assert!(dep.is_some());
                prop_assert!(dep.unwrap() < at);
            }
        }

        // packaged text follows the traversal order
        let headers: Vec<usize> = outcome
            .order
            .iter()
            .map(|id| {
                let name = id.rsplit('/').next().unwrap_or_default();
                app.find(&format!("// {} ", name)).unwrap()
            })
            .collect();
        prop_assert!(headers.windows(2).all(|w| w[0] < w[1]));
    }
}
