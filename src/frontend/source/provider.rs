//! Source providers
//!
//! A [`SourceProvider`] answers existence, modification-time and content
//! queries for URIs. [`FileSystemProvider`] serves `file:` URIs from disk;
//! [`MemoryProvider`] keeps everything in memory with explicit timestamps,
//! which is what the tests use to simulate edits.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use super::SourceUri;

/// Answers queries about source texts
pub trait SourceProvider: Send + Sync {
    /// Modification time, or `None` if the source does not exist
    fn modified(
        &self,
        uri: &SourceUri,
    ) -> Option<SystemTime>;

    /// Read the whole content
    fn read(
        &self,
        uri: &SourceUri,
    ) -> io::Result<Vec<u8>>;

    /// Open a stream over the content
    fn open(
        &self,
        uri: &SourceUri,
    ) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.read(uri)?)))
    }
}

/// Serves `file:` URIs from the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemProvider;

impl FileSystemProvider {
    pub fn new() -> Self {
        Self
    }
}

impl SourceProvider for FileSystemProvider {
    fn modified(
        &self,
        uri: &SourceUri,
    ) -> Option<SystemTime> {
        let path = uri.to_file_path()?;
        let meta = std::fs::metadata(path).ok()?;
        if !meta.is_file() {
            return None;
        }
        meta.modified().ok()
    }

    fn read(
        &self,
        uri: &SourceUri,
    ) -> io::Result<Vec<u8>> {
        match uri.to_file_path() {
            Some(path) => std::fs::read(path),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a file URI: {}", uri),
            )),
        }
    }

    fn open(
        &self,
        uri: &SourceUri,
    ) -> io::Result<Box<dyn Read + Send>> {
        match uri.to_file_path() {
            Some(path) => Ok(Box::new(std::fs::File::open(path)?)),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not a file URI: {}", uri),
            )),
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Arc<[u8]>,
    modified: SystemTime,
}

/// In-memory sources; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    files: Arc<RwLock<BTreeMap<SourceUri, MemoryFile>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file at an absolute path, stamped now
    pub fn add(
        &self,
        path: impl AsRef<Path>,
        content: &str,
    ) -> SourceUri {
        self.add_at(path, content, SystemTime::now())
    }

    /// Add or replace a file with an explicit modification time
    pub fn add_at(
        &self,
        path: impl AsRef<Path>,
        content: &str,
        modified: SystemTime,
    ) -> SourceUri {
        let uri = SourceUri::from_path(path.as_ref());
        self.files.write().insert(
            uri.clone(),
            MemoryFile {
                content: Arc::from(content.as_bytes()),
                modified,
            },
        );
        uri
    }

    /// Advance a file's modification time without changing its content.
    ///
    /// The new time is strictly later than both the old time and now.
    pub fn touch(
        &self,
        path: impl AsRef<Path>,
    ) -> bool {
        let uri = SourceUri::from_path(path.as_ref());
        let mut files = self.files.write();
        match files.get_mut(&uri) {
            Some(file) => {
                let later = file.modified.max(SystemTime::now()) + Duration::from_secs(1);
                file.modified = later;
                true
            }
            None => false,
        }
    }

    /// Remove a file
    pub fn remove(
        &self,
        path: impl AsRef<Path>,
    ) -> bool {
        let uri = SourceUri::from_path(path.as_ref());
        self.files.write().remove(&uri).is_some()
    }
}

impl SourceProvider for MemoryProvider {
    fn modified(
        &self,
        uri: &SourceUri,
    ) -> Option<SystemTime> {
        self.files.read().get(uri).map(|f| f.modified)
    }

    fn read(
        &self,
        uri: &SourceUri,
    ) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .get(uri)
            .map(|f| f.content.to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, uri.to_string()))
    }
}
