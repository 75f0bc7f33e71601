//! Incremental rebuild decisions across compiles sharing one store

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dartc::artifact::{ArtifactKey, ArtifactStore, MemoryArtifactStore};
use dartc::backends::{Backend, JsBackend};
use dartc::context::{CompilerContext, DriverContext};
use dartc::frontend::config::CompilerConfiguration;
use dartc::frontend::module::DependencyResolver;
use dartc::frontend::source::{LibrarySource, MemoryProvider, SourceProvider, SourceUri};
use dartc::Compiler;

fn sources() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider.add("/p/app.dart", "import 'lib.dart';\nmain() { helper(); }\n");
    provider.add("/p/lib.dart", "helper() {}\n");
    provider
}

fn compile(
    provider: &MemoryProvider,
    store: &MemoryArtifactStore,
    config: CompilerConfiguration,
) -> dartc::CompileOutcome {
    Compiler::new(config)
        .with_provider(Arc::new(provider.clone()))
        .with_store(Arc::new(store.clone()))
        .compile("/p/app.dart")
        .unwrap()
}

#[test]
fn test_second_compile_reuses_every_unit() {
    let provider = sources();
    let store = MemoryArtifactStore::new();

    let first = compile(&provider, &store, CompilerConfiguration::default());
    assert!(first.succeeded());
    assert_eq!(first.metrics.units_compiled, 2);
    // two units with maps, then app.js and its map
    assert_eq!(store.commit_count(), 6);

    let second = compile(&provider, &store, CompilerConfiguration::default());
    assert!(second.succeeded());
    assert_eq!(second.metrics.units_compiled, 0);
    assert_eq!(second.metrics.units_reused, 2);
    // only the packaged output is rewritten
    assert_eq!(store.commit_count(), 8);

    let ctx = DriverContext::new(CompilerConfiguration::default(), Arc::new(store.clone()));
    let provider: Arc<dyn SourceProvider> = Arc::new(provider);
    let root = LibrarySource::from_path(std::path::Path::new("/p/app.dart"), provider);
    let graph = DependencyResolver::new(&ctx).resolve(root);
    for library in graph.libraries() {
        for unit in library.units() {
            assert!(!JsBackend.is_out_of_date(unit, library, &ctx));
        }
    }
}

#[test]
fn test_touched_source_recompiles_only_its_library() {
    let provider = sources();
    let store = MemoryArtifactStore::new();
    compile(&provider, &store, CompilerConfiguration::default());

    assert!(provider.touch("/p/lib.dart"));
    let outcome = compile(&provider, &store, CompilerConfiguration::default());
    assert!(outcome.succeeded());
    assert_eq!(outcome.metrics.units_compiled, 1);
    assert_eq!(outcome.metrics.units_reused, 1);
}

#[test]
fn test_non_incremental_recompiles_everything() {
    let provider = sources();
    let store = MemoryArtifactStore::new();
    compile(&provider, &store, CompilerConfiguration::default());

    let config = CompilerConfiguration::builder()
        .incremental(false)
        .build()
        .unwrap();
    let outcome = compile(&provider, &store, config);
    assert_eq!(outcome.metrics.units_compiled, 2);
}

#[test]
fn test_missing_source_map_forces_recompile() {
    let provider = sources();
    let store = MemoryArtifactStore::new();
    compile(&provider, &store, CompilerConfiguration::default());

    let map = ArtifactKey::new("file:///p/lib.dart", "", "opt.js.map");
    assert!(store.remove(&map).unwrap());
    let outcome = compile(&provider, &store, CompilerConfiguration::default());
    assert_eq!(outcome.metrics.units_compiled, 1);
    assert!(store.read(&map).unwrap().is_some());
}

#[test]
fn test_staleness_is_monotonic() {
    let provider = sources();
    let store = MemoryArtifactStore::new();
    let ctx = DriverContext::new(CompilerConfiguration::default(), Arc::new(store.clone()));
    let shared: Arc<dyn SourceProvider> = Arc::new(provider.clone());
    let lib = LibrarySource::from_path(std::path::Path::new("/p/lib.dart"), Arc::clone(&shared));

    assert!(ctx.is_out_of_date(lib.source(), lib.source(), "opt.js"));
    ctx.write_artifact(lib.source(), "", "opt.js", lib.source(), b"x").unwrap();
    assert!(!ctx.is_out_of_date(lib.source(), lib.source(), "opt.js"));

    // a source newer than the artifact makes it stale
    let later = SystemTime::now() + Duration::from_secs(60);
    provider.add_at("/p/lib.dart", "helper() {}\n", later);
    let newer = LibrarySource::from_path(std::path::Path::new("/p/lib.dart"), shared);
    assert!(ctx.is_out_of_date(newer.source(), newer.source(), "opt.js"));
}

/// Saves new content for `path` right after its first read, as an editor
/// would while a compile is running
struct SavesAfterFirstRead {
    inner: MemoryProvider,
    path: &'static str,
    content: &'static str,
    saved: AtomicBool,
}

impl SourceProvider for SavesAfterFirstRead {
    fn modified(
        &self,
        uri: &SourceUri,
    ) -> Option<SystemTime> {
        self.inner.modified(uri)
    }

    fn read(
        &self,
        uri: &SourceUri,
    ) -> io::Result<Vec<u8>> {
        let bytes = self.inner.read(uri)?;
        let target = SourceUri::from_path(std::path::Path::new(self.path));
        if *uri == target && !self.saved.swap(true, Ordering::SeqCst) {
            let later = SystemTime::now() + Duration::from_secs(5);
            self.inner.add_at(self.path, self.content, later);
        }
        Ok(bytes)
    }
}

#[test]
fn test_edit_saved_during_compile_is_rebuilt() {
    let provider = sources();
    let store = MemoryArtifactStore::new();
    let editing = SavesAfterFirstRead {
        inner: provider.clone(),
        path: "/p/lib.dart",
        content: "helper() {}\nextra() {}\n",
        saved: AtomicBool::new(false),
    };

    let first = Compiler::new(CompilerConfiguration::default())
        .with_provider(Arc::new(editing))
        .with_store(Arc::new(store.clone()))
        .compile("/p/app.dart")
        .unwrap();
    assert!(first.succeeded());
    let app = ArtifactKey::new("file:///p/app.dart", "", "app.js");
    let packaged = String::from_utf8(store.read(&app).unwrap().unwrap()).unwrap();
    assert!(!packaged.contains("extra"));

    // the artifact is stamped with the snapshot it was built from, not the
    // commit time, so the save above still counts as newer
    let second = compile(&provider, &store, CompilerConfiguration::default());
    assert!(second.succeeded());
    assert_eq!(second.metrics.units_compiled, 1);
    let packaged = String::from_utf8(store.read(&app).unwrap().unwrap()).unwrap();
    assert!(packaged.contains("function extra()"));
}
