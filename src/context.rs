//! Compiler context
//!
//! The only object phases and backends talk to. It owns the intern table,
//! buffers diagnostics until the next phase barrier, mediates every artifact
//! read and write, and holds the compiled-library registry.

use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::artifact::{ArtifactError, ArtifactKey, ArtifactStore};
use crate::error::CompileError;
use crate::frontend::config::CompilerConfiguration;
use crate::frontend::module::LibraryUnit;
use crate::frontend::source::{LibrarySource, Source, SourceUri};
use crate::util::diagnostic::{
    DiagnosticEvent, DiagnosticListener, DiagnosticSummary, SeverityPolicy,
};
use crate::util::intern::Interner;

/// Artifact key for `(source, part, extension)`
pub fn artifact_key(
    source: &Source,
    part: &str,
    extension: &str,
) -> ArtifactKey {
    ArtifactKey::new(source.unique_id(), part, extension)
}

/// Services shared by every phase and backend
pub trait CompilerContext: Send + Sync {
    fn config(&self) -> &CompilerConfiguration;

    /// Intern table scoped to this compile
    fn interner(&self) -> &Interner;

    /// Record a diagnostic; safe from any worker
    fn report(
        &self,
        event: DiagnosticEvent,
    );

    /// Phase barrier: deliver buffered diagnostics to the listeners in
    /// report order and return the running totals
    fn flush(&self) -> DiagnosticSummary;

    /// Read an artifact through `f`; missing artifacts are an error
    fn with_reader(
        &self,
        source: &Source,
        part: &str,
        extension: &str,
        f: &mut dyn FnMut(&mut dyn Read) -> io::Result<()>,
    ) -> Result<(), ArtifactError>;

    /// Replace an artifact with what `f` writes; published only if `f`
    /// returns `Ok`.
    ///
    /// `base` is the snapshot the content was derived from. Its
    /// modification time is recorded with the artifact and is what
    /// [`is_out_of_date`](Self::is_out_of_date) later compares against.
    fn with_writer(
        &self,
        source: &Source,
        part: &str,
        extension: &str,
        base: &Source,
        f: &mut dyn FnMut(&mut dyn Write) -> io::Result<()>,
    ) -> Result<(), ArtifactError>;

    fn remove_artifact(
        &self,
        source: &Source,
        part: &str,
        extension: &str,
    ) -> Result<bool, ArtifactError>;

    /// True if the artifact is missing, was derived from a snapshot older
    /// than `base`, or incremental builds are off
    fn is_out_of_date(
        &self,
        source: &Source,
        base: &Source,
        extension: &str,
    ) -> bool;

    /// A library compiled earlier in this run.
    ///
    /// Asking for one that was never registered is a
    /// [`CompileError::ContractViolation`].
    fn library_unit(
        &self,
        library: &LibrarySource,
    ) -> Result<Arc<LibraryUnit>, CompileError>;

    fn register_library(
        &self,
        library: Arc<LibraryUnit>,
    );

    fn read_artifact(
        &self,
        source: &Source,
        part: &str,
        extension: &str,
    ) -> Result<Vec<u8>, ArtifactError> {
        let mut bytes = Vec::new();
        self.with_reader(source, part, extension, &mut |reader| {
            reader.read_to_end(&mut bytes).map(|_| ())
        })?;
        Ok(bytes)
    }

    fn write_artifact(
        &self,
        source: &Source,
        part: &str,
        extension: &str,
        base: &Source,
        content: &[u8],
    ) -> Result<(), ArtifactError> {
        self.with_writer(source, part, extension, base, &mut |writer| {
            writer.write_all(content)
        })
    }
}

/// Production context
pub struct DriverContext {
    config: CompilerConfiguration,
    policy: SeverityPolicy,
    interner: Interner,
    store: Arc<dyn ArtifactStore>,
    listeners: Vec<Arc<dyn DiagnosticListener>>,
    pending: Mutex<Vec<DiagnosticEvent>>,
    delivered: Mutex<Vec<DiagnosticEvent>>,
    summary: Mutex<DiagnosticSummary>,
    libraries: RwLock<IndexMap<SourceUri, Arc<LibraryUnit>>>,
}

impl DriverContext {
    pub fn new(
        config: CompilerConfiguration,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            policy: config.severity_policy(),
            config,
            interner: Interner::new(),
            store,
            listeners: Vec::new(),
            pending: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
            summary: Mutex::new(DiagnosticSummary::default()),
            libraries: RwLock::new(IndexMap::new()),
        }
    }

    pub fn with_listener(
        mut self,
        listener: Arc<dyn DiagnosticListener>,
    ) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Everything delivered so far, in delivery order
    pub fn diagnostics(&self) -> Vec<DiagnosticEvent> {
        self.delivered.lock().clone()
    }

    pub fn summary(&self) -> DiagnosticSummary {
        *self.summary.lock()
    }

    /// Registered libraries in registration order
    pub fn libraries(&self) -> Vec<Arc<LibraryUnit>> {
        self.libraries.read().values().cloned().collect()
    }
}

impl CompilerContext for DriverContext {
    fn config(&self) -> &CompilerConfiguration {
        &self.config
    }

    fn interner(&self) -> &Interner {
        &self.interner
    }

    fn report(
        &self,
        event: DiagnosticEvent,
    ) {
        trace!(code = event.code.code, "diagnostic buffered");
        self.pending.lock().push(event);
    }

    fn flush(&self) -> DiagnosticSummary {
        let mut batch = std::mem::take(&mut *self.pending.lock());
        batch.sort_by(|a, b| a.report_order(b));

        let mut summary = self.summary.lock();
        for event in &batch {
            summary.record(event, &self.policy);
            for listener in &self.listeners {
                listener.on_diagnostic(event);
            }
        }
        self.delivered.lock().extend(batch);
        *summary
    }

    fn with_reader(
        &self,
        source: &Source,
        part: &str,
        extension: &str,
        f: &mut dyn FnMut(&mut dyn Read) -> io::Result<()>,
    ) -> Result<(), ArtifactError> {
        let key = artifact_key(source, part, extension);
        let bytes = self
            .store
            .read(&key)?
            .ok_or_else(|| ArtifactError::Missing(key.clone()))?;
        f(&mut Cursor::new(bytes)).map_err(|source| ArtifactError::Read { key, source })
    }

    fn with_writer(
        &self,
        source: &Source,
        part: &str,
        extension: &str,
        base: &Source,
        f: &mut dyn FnMut(&mut dyn Write) -> io::Result<()>,
    ) -> Result<(), ArtifactError> {
        let key = artifact_key(source, part, extension);
        let mut writer = self.store.writer(&key, base.last_modified())?;
        match f(&mut writer) {
            Ok(()) => writer.commit(),
            // dropping the writer discards the partial artifact
            Err(source) => Err(ArtifactError::Write { key, source }),
        }
    }

    fn remove_artifact(
        &self,
        source: &Source,
        part: &str,
        extension: &str,
    ) -> Result<bool, ArtifactError> {
        self.store.remove(&artifact_key(source, part, extension))
    }

    fn is_out_of_date(
        &self,
        source: &Source,
        base: &Source,
        extension: &str,
    ) -> bool {
        if !self.config.incremental() {
            return true;
        }
        let key = artifact_key(source, "", extension);
        match self.store.modified(&key) {
            Ok(Some(stamp)) => stamp < base.last_modified(),
            Ok(None) => true,
            Err(err) => {
                debug!(artifact = %key, error = %err, "cannot stat artifact, treating as stale");
                true
            }
        }
    }

    fn library_unit(
        &self,
        library: &LibrarySource,
    ) -> Result<Arc<LibraryUnit>, CompileError> {
        self.libraries
            .read()
            .get(library.uri())
            .cloned()
            .ok_or_else(|| {
                CompileError::contract(format!("library {} has not been compiled", library))
            })
    }

    fn register_library(
        &self,
        library: Arc<LibraryUnit>,
    ) {
        let uri = library.source().uri().clone();
        self.libraries.write().insert(uri, library);
    }
}
