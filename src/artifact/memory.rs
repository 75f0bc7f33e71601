//! In-process artifact store
//!
//! Clones share storage. Commit swaps the finished buffer in under the
//! write lock together with the stamp the write was opened with.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

use super::{ArtifactError, ArtifactKey, ArtifactSink, ArtifactStore};

#[derive(Debug, Clone)]
struct Entry {
    content: Arc<[u8]>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<ArtifactKey, Entry>,
    commits: usize,
    failing_extensions: HashSet<String>,
}

/// Artifact store kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    state: Arc<RwLock<State>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits so far
    pub fn commit_count(&self) -> usize {
        self.state.read().commits
    }

    /// Make every later commit of `extension` fail with an I/O error
    pub fn fail_writes(
        &self,
        extension: &str,
    ) {
        self.state
            .write()
            .failing_extensions
            .insert(extension.to_string());
    }

    /// Undo [`fail_writes`](Self::fail_writes)
    pub fn heal(&self) {
        self.state.write().failing_extensions.clear();
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn read(
        &self,
        key: &ArtifactKey,
    ) -> Result<Option<Vec<u8>>, ArtifactError> {
        Ok(self
            .state
            .read()
            .entries
            .get(key)
            .map(|entry| entry.content.to_vec()))
    }

    fn modified(
        &self,
        key: &ArtifactKey,
    ) -> Result<Option<SystemTime>, ArtifactError> {
        Ok(self.state.read().entries.get(key).map(|entry| entry.modified))
    }

    fn begin_write(
        &self,
        key: &ArtifactKey,
        stamp: SystemTime,
    ) -> Result<Box<dyn ArtifactSink>, ArtifactError> {
        Ok(Box::new(MemorySink {
            key: key.clone(),
            stamp,
            buffer: Vec::new(),
            state: Arc::clone(&self.state),
        }))
    }

    fn remove(
        &self,
        key: &ArtifactKey,
    ) -> Result<bool, ArtifactError> {
        Ok(self.state.write().entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<ArtifactKey>, ArtifactError> {
        Ok(self.state.read().entries.keys().cloned().collect())
    }
}

struct MemorySink {
    key: ArtifactKey,
    stamp: SystemTime,
    buffer: Vec<u8>,
    state: Arc<RwLock<State>>,
}

impl Write for MemorySink {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ArtifactSink for MemorySink {
    fn commit(self: Box<Self>) -> io::Result<()> {
        let mut state = self.state.write();
        if state.failing_extensions.contains(&self.key.extension) {
            return Err(io::Error::other(format!("injected failure for {}", self.key)));
        }
        state.entries.insert(
            self.key.clone(),
            Entry {
                content: Arc::from(self.buffer.as_slice()),
                modified: self.stamp,
            },
        );
        state.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::conformance;
    use super::*;

    #[test]
    fn test_conformance() {
        conformance::replaces_completely(&MemoryArtifactStore::new());
        conformance::uncommitted_is_invisible(&MemoryArtifactStore::new());
        conformance::kinds_are_independent(&MemoryArtifactStore::new());
        conformance::records_write_stamp(&MemoryArtifactStore::new());
        conformance::lists_keys(&MemoryArtifactStore::new());
    }

    #[test]
    fn test_injected_failure_keeps_previous_content() {
        let store = MemoryArtifactStore::new();
        let key = ArtifactKey::new("file:///a.dart", "", "opt.js");
        let mut writer = store.writer(&key, SystemTime::now()).unwrap();
        writer.write_all(b"v1").unwrap();
        writer.commit().unwrap();

        store.fail_writes("opt.js");
        let mut writer = store.writer(&key, SystemTime::now()).unwrap();
        writer.write_all(b"v2").unwrap();
        let err = writer.commit().unwrap_err();
        assert!(matches!(err, ArtifactError::Write { .. }));
        assert_eq!(store.read(&key).unwrap().unwrap(), b"v1");
        assert_eq!(store.commit_count(), 1);

        store.heal();
        let mut writer = store.writer(&key, SystemTime::now()).unwrap();
        writer.write_all(b"v3").unwrap();
        writer.commit().unwrap();
        assert_eq!(store.read(&key).unwrap().unwrap(), b"v3");
    }
}
