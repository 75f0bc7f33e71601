//! Artifact store
//!
//! Byproducts of compiling a source are addressed by [`ArtifactKey`]
//! `(source id, part, extension)`. A key maps to at most one artifact, and a
//! write replaces it completely or not at all:
//!
//! - [`ArtifactStore::begin_write`] hands out an [`ArtifactWriter`]
//! - nothing is visible until [`ArtifactWriter::commit`]
//! - dropping the writer without committing discards everything written
//!
//! Every write carries a stamp: the modification time of the source snapshot
//! the content was derived from. [`ArtifactStore::modified`] returns that
//! stamp, so an edit saved while the artifact was being produced still makes
//! it stale.
//!
//! # Module structure
//!
//! - [`file`] - on-disk store under the work directory
//! - [`memory`] - in-process store

pub mod file;
pub mod memory;

pub use file::FileArtifactStore;
pub use memory::MemoryArtifactStore;

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use tracing::trace;

/// Address of one artifact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey {
    pub source_id: String,
    pub part: String,
    pub extension: String,
}

impl ArtifactKey {
    pub fn new(
        source_id: impl Into<String>,
        part: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            part: part.into(),
            extension: extension.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.part.is_empty() {
            write!(f, "{}#{}", self.source_id, self.extension)
        } else {
            write!(f, "{}#{}.{}", self.source_id, self.part, self.extension)
        }
    }
}

/// Artifact store errors
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact {0} does not exist")]
    Missing(ArtifactKey),

    #[error("cannot read artifact {key}: {source}")]
    Read {
        key: ArtifactKey,
        #[source]
        source: io::Error,
    },

    #[error("cannot write artifact {key}: {source}")]
    Write {
        key: ArtifactKey,
        #[source]
        source: io::Error,
    },

    #[error("artifact store at {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

impl ArtifactError {
    /// Key the error is about, if any
    pub fn key(&self) -> Option<&ArtifactKey> {
        match self {
            ArtifactError::Missing(key)
            | ArtifactError::Read { key, .. }
            | ArtifactError::Write { key, .. } => Some(key),
            ArtifactError::Store { .. } | ArtifactError::Walk(_) => None,
        }
    }
}

/// Destination of one in-progress write
pub trait ArtifactSink: Write + Send {
    /// Publish everything written so far, replacing any previous artifact
    fn commit(self: Box<Self>) -> io::Result<()>;
}

/// Persistent artifact storage
pub trait ArtifactStore: Send + Sync {
    /// Full content, or `None` if the artifact does not exist
    fn read(
        &self,
        key: &ArtifactKey,
    ) -> Result<Option<Vec<u8>>, ArtifactError>;

    /// Stamp recorded by the last commit
    fn modified(
        &self,
        key: &ArtifactKey,
    ) -> Result<Option<SystemTime>, ArtifactError>;

    /// Start replacing the artifact; `stamp` is recorded on commit
    fn begin_write(
        &self,
        key: &ArtifactKey,
        stamp: SystemTime,
    ) -> Result<Box<dyn ArtifactSink>, ArtifactError>;

    /// Delete the artifact; `false` if there was none
    fn remove(
        &self,
        key: &ArtifactKey,
    ) -> Result<bool, ArtifactError>;

    /// Every stored key, sorted
    fn keys(&self) -> Result<Vec<ArtifactKey>, ArtifactError>;

    /// Scoped writer over [`begin_write`](Self::begin_write)
    fn writer(
        &self,
        key: &ArtifactKey,
        stamp: SystemTime,
    ) -> Result<ArtifactWriter, ArtifactError> {
        Ok(ArtifactWriter::new(key.clone(), self.begin_write(key, stamp)?))
    }
}

/// Scoped write acquisition.
///
/// Commits only through [`commit`](Self::commit); a writer dropped on an
/// error path leaves the previous artifact (or none) in place.
pub struct ArtifactWriter {
    key: ArtifactKey,
    sink: Option<Box<dyn ArtifactSink>>,
    written: usize,
}

impl ArtifactWriter {
    pub fn new(
        key: ArtifactKey,
        sink: Box<dyn ArtifactSink>,
    ) -> Self {
        Self {
            key,
            sink: Some(sink),
            written: 0,
        }
    }

    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    /// Bytes written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and publish
    pub fn commit(mut self) -> Result<(), ArtifactError> {
        let key = self.key.clone();
        match self.sink.take() {
            Some(mut sink) => {
                if let Err(source) = sink.flush() {
                    return Err(ArtifactError::Write { key, source });
                }
                sink.commit()
                    .map_err(|source| ArtifactError::Write { key, source })?;
                trace!(artifact = %self.key, bytes = self.written, "artifact committed");
                Ok(())
            }
            None => Err(ArtifactError::Write {
                key,
                source: io::Error::other("writer already finished"),
            }),
        }
    }
}

impl Write for ArtifactWriter {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| io::Error::other("writer already finished"))?;
        let n = sink.write(buf)?;
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for ArtifactWriter {
    fn drop(&mut self) {
        if self.sink.take().is_some() {
            trace!(artifact = %self.key, "uncommitted artifact write discarded");
        }
    }
}

impl fmt::Debug for ArtifactWriter {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ArtifactWriter")
            .field("key", &self.key)
            .field("written", &self.written)
            .field("open", &self.sink.is_some())
            .finish()
    }
}
