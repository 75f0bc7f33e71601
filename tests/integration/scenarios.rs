//! End-to-end compiles over in-memory sources

use std::sync::Arc;

use dartc::artifact::{ArtifactKey, ArtifactStore, MemoryArtifactStore};
use dartc::frontend::config::{CompilerConfiguration, PhaseKind};
use dartc::frontend::source::MemoryProvider;
use dartc::util::diagnostic::{CollectingListener, Severity};
use dartc::{CompileStatus, Compiler};

fn app_js(store: &MemoryArtifactStore) -> Option<String> {
    store
        .read(&ArtifactKey::new("file:///p/app.dart", "", "app.js"))
        .unwrap()
        .map(|bytes| String::from_utf8(bytes).unwrap())
}

fn compiler(
    provider: &MemoryProvider,
    store: &MemoryArtifactStore,
    config: CompilerConfiguration,
) -> Compiler {
    Compiler::new(config)
        .with_provider(Arc::new(provider.clone()))
        .with_store(Arc::new(store.clone()))
}

#[test]
fn test_unresolved_call_is_a_warning() {
    let provider = MemoryProvider::new();
    provider.add("/p/app.dart", "import 'lib.dart';\nmain() {\n  helper();\n  missing();\n}\n");
    provider.add("/p/lib.dart", "helper() {}\n");
    let store = MemoryArtifactStore::new();
    let listener = CollectingListener::new();

    let outcome = compiler(&provider, &store, CompilerConfiguration::default())
        .with_listener(Arc::new(listener.clone()))
        .compile("/p/app.dart")
        .unwrap();

    assert_eq!(outcome.status, CompileStatus::Succeeded);
    assert_eq!(outcome.diagnostics.len(), 1);
    let event = &outcome.diagnostics[0];
    assert_eq!(event.code.code, "E0503");
    assert_eq!(event.severity, Severity::Warning);
    assert_eq!(event.source(), Some("file:///p/app.dart"));
    assert_eq!(event.location.as_ref().map(|l| l.line), Some(4));
    assert_eq!(listener.len(), 1);
    assert!(!outcome.summary.has_fatal());

    let app = app_js(&store).unwrap();
    let lib_at = app.find("// lib.dart (library lib)").unwrap();
    let app_at = app.find("// app.dart (library app)").unwrap();
    assert!(lib_at < app_at);
    assert_eq!(outcome.packaged, Some(ArtifactKey::new("file:///p/app.dart", "", "app.js")));
    assert_eq!(outcome.order, vec!["file:///p/lib.dart", "file:///p/app.dart"]);
}

#[test]
fn test_fatal_warnings_abort_after_resolve() {
    let provider = MemoryProvider::new();
    provider.add("/p/app.dart", "main() { missing(); }");
    let store = MemoryArtifactStore::new();
    let config = CompilerConfiguration::builder()
        .warnings_are_fatal(true)
        .build()
        .unwrap();

    let outcome = compiler(&provider, &store, config).compile("/p/app.dart").unwrap();
    assert_eq!(outcome.status, CompileStatus::Aborted { after: PhaseKind::Resolve });
    assert!(outcome.summary.has_fatal());
    assert!(app_js(&store).is_none());
}

#[test]
fn test_parse_error_aborts_before_codegen() {
    let provider = MemoryProvider::new();
    provider.add("/p/app.dart", "main() {\n");
    let store = MemoryArtifactStore::new();

    let outcome = compiler(&provider, &store, CompilerConfiguration::default())
        .compile("/p/app.dart")
        .unwrap();
    assert_eq!(outcome.status, CompileStatus::Aborted { after: PhaseKind::Parse });
    assert!(outcome.summary.errors >= 1);
    assert!(outcome.with_code("E0503").is_empty());
    assert!(store.is_empty());
}

#[test]
fn test_type_mismatch_follows_policy() {
    let text = "int count = 'three';\nmain() {}\n";
    for (fatal, expected) in [
        (false, CompileStatus::Succeeded),
        (true, CompileStatus::Aborted { after: PhaseKind::TypeCheck }),
    ] {
        let provider = MemoryProvider::new();
        provider.add("/p/app.dart", text);
        let store = MemoryArtifactStore::new();
        let config = CompilerConfiguration::builder()
            .type_errors_are_fatal(fatal)
            .build()
            .unwrap();
        let outcome = compiler(&provider, &store, config).compile("/p/app.dart").unwrap();
        assert_eq!(outcome.status, expected);
        assert_eq!(outcome.with_code("E1002").len(), 1);
    }
}

#[test]
fn test_dead_private_code_is_not_emitted() {
    let provider = MemoryProvider::new();
    provider.add(
        "/p/app.dart",
        "class _Unused {}\n_helper() {}\nmain() { _helper(); }\n",
    );
    let store = MemoryArtifactStore::new();
    let outcome = compiler(&provider, &store, CompilerConfiguration::default())
        .compile("/p/app.dart")
        .unwrap();

    assert!(outcome.succeeded());
    let app = app_js(&store).unwrap();
    assert!(app.contains("function _helper()"));
    assert!(!app.contains("_Unused"));
}

#[test]
fn test_parts_are_packaged_with_their_library() {
    let provider = MemoryProvider::new();
    provider.add("/p/app.dart", "library app;\npart 'view.dart';\nmain() { render(); }\n");
    provider.add("/p/view.dart", "part of app;\nrender() {}\n");
    let store = MemoryArtifactStore::new();
    let outcome = compiler(&provider, &store, CompilerConfiguration::default())
        .compile("/p/app.dart")
        .unwrap();

    assert!(outcome.succeeded(), "{:?}", outcome.diagnostics);
    assert_eq!(outcome.metrics.units, 2);
    let app = app_js(&store).unwrap();
    assert!(app.find("// app.dart").unwrap() < app.find("// view.dart").unwrap());
}

#[test]
fn test_output_directory_copy() {
    let dir = tempfile::TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add("/p/app.dart", "main() {}\n");
    let store = MemoryArtifactStore::new();
    let config = CompilerConfiguration::builder()
        .out_dir(Some(dir.path().to_path_buf()))
        .build()
        .unwrap();

    let outcome = compiler(&provider, &store, config).compile("/p/app.dart").unwrap();
    let path = outcome.output_path.clone().unwrap();
    assert_eq!(path, dir.path().join("app.js"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), app_js(&store).unwrap());
    assert!(dir.path().join("app.js.map").is_file());
}

#[test]
fn test_aborted_compile_removes_output_directory_copy() {
    let dir = tempfile::TempDir::new().unwrap();
    let provider = MemoryProvider::new();
    provider.add("/p/app.dart", "import 'lib.dart';\nmain() { helper(); }\n");
    provider.add("/p/lib.dart", "helper() {}\n");
    let store = MemoryArtifactStore::new();
    let config = CompilerConfiguration::builder()
        .out_dir(Some(dir.path().to_path_buf()))
        .build()
        .unwrap();

    let outcome = compiler(&provider, &store, config.clone()).compile("/p/app.dart").unwrap();
    assert!(outcome.succeeded());
    assert!(dir.path().join("app.js").is_file());

    provider.add("/p/lib.dart", "helper() {\n");
    let outcome = compiler(&provider, &store, config).compile("/p/app.dart").unwrap();
    assert_eq!(outcome.status, CompileStatus::Aborted { after: PhaseKind::Parse });
    assert!(app_js(&store).is_none());
    assert!(!dir.path().join("app.js").exists());
    assert!(!dir.path().join("app.js.map").exists());
}
