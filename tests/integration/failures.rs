//! Artifact I/O failures and cancellation

use std::sync::Arc;

use dartc::artifact::{ArtifactKey, ArtifactStore, FileArtifactStore, MemoryArtifactStore};
use dartc::frontend::config::CompilerConfiguration;
use dartc::frontend::pipeline::CancellationToken;
use dartc::frontend::source::MemoryProvider;
use dartc::util::diagnostic::SubSystem;
use dartc::{CompileStatus, Compiler};

fn app_key() -> ArtifactKey {
    ArtifactKey::new("file:///p/app.dart", "", "app.js")
}

fn setup() -> (MemoryProvider, MemoryArtifactStore) {
    let provider = MemoryProvider::new();
    provider.add("/p/app.dart", "import 'lib.dart';\nmain() { helper(); }\n");
    provider.add("/p/lib.dart", "helper() {}\n");
    (provider, MemoryArtifactStore::new())
}

fn compiler(
    provider: &MemoryProvider,
    store: &MemoryArtifactStore,
) -> Compiler {
    Compiler::new(CompilerConfiguration::default())
        .with_provider(Arc::new(provider.clone()))
        .with_store(Arc::new(store.clone()))
}

#[test]
fn test_failed_packaging_leaves_no_app() {
    let (provider, store) = setup();
    assert!(compiler(&provider, &store).compile("/p/app.dart").unwrap().succeeded());
    assert!(store.read(&app_key()).unwrap().is_some());

    store.fail_writes("app.js.map");
    provider.touch("/p/app.dart");
    let outcome = compiler(&provider, &store).compile("/p/app.dart").unwrap();

    assert_eq!(outcome.status, CompileStatus::Failed);
    let io = outcome.with_code("E7002");
    assert_eq!(io.len(), 1);
    assert_eq!(io[0].subsystem, SubSystem::Io);
    assert!(outcome.packaged.is_none());
    assert!(store.read(&app_key()).unwrap().is_none());
}

#[test]
fn test_failed_unit_write_keeps_primary_artifact() {
    let (provider, store) = setup();
    store.fail_writes("opt.js.map");
    let outcome = compiler(&provider, &store).compile("/p/app.dart").unwrap();

    assert_eq!(outcome.status, CompileStatus::Failed);
    assert_eq!(outcome.with_code("E7002").len(), 2);
    // code was committed before its map
    let code = ArtifactKey::new("file:///p/lib.dart", "", "opt.js");
    assert!(store.read(&code).unwrap().is_some());
    assert!(store.read(&app_key()).unwrap().is_none());

    // the unit stays stale until its map exists
    store.heal();
    let outcome = compiler(&provider, &store).compile("/p/app.dart").unwrap();
    assert!(outcome.succeeded());
    assert_eq!(outcome.metrics.units_compiled, 2);
}

#[test]
fn test_cancelled_compile_packages_nothing() {
    let (provider, store) = setup();
    let token = CancellationToken::new();
    token.cancel();
    let outcome = compiler(&provider, &store)
        .with_cancellation(token)
        .compile("/p/app.dart")
        .unwrap();
    assert_eq!(outcome.status, CompileStatus::Cancelled);
    assert!(outcome.diagnostics.is_empty());
    assert_eq!(store.commit_count(), 0);
}

#[test]
fn test_file_store_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let source_dir = dir.path().join("src");
    std::fs::create_dir_all(&source_dir).unwrap();
    std::fs::write(source_dir.join("lib.dart"), "helper() {}\n").unwrap();
    std::fs::write(
        source_dir.join("app.dart"),
        "import 'lib.dart';\nmain() { helper(); }\n",
    )
    .unwrap();
    let work = dir.path().join("work");
    let config = CompilerConfiguration::builder()
        .work_dir(work.clone())
        .build()
        .unwrap();

    let outcome = Compiler::new(config.clone())
        .compile(source_dir.join("app.dart"))
        .unwrap();
    assert!(outcome.succeeded(), "{:?}", outcome.diagnostics);
    let store = FileArtifactStore::new(&work);
    assert_eq!(store.keys().unwrap().len(), 6);

    let again = Compiler::new(config).compile(source_dir.join("app.dart")).unwrap();
    assert_eq!(again.metrics.units_compiled, 0);
    assert_eq!(store.clean().unwrap(), 6);
}
