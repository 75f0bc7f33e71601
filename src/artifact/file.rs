//! On-disk artifact store
//!
//! Layout under the root: one directory per source (escaped source id), one
//! file per `(part, extension)`. Writes go to a temporary file in the
//! destination directory and are renamed over the target on commit. The
//! write stamp is kept as the file's modification time.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use super::{ArtifactError, ArtifactKey, ArtifactSink, ArtifactStore};

/// Separates part and extension in file names
const PART_SEPARATOR: char = '@';

/// Artifact store rooted at a work directory
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding `key`
    pub fn path_for(
        &self,
        key: &ArtifactKey,
    ) -> PathBuf {
        let file = if key.part.is_empty() {
            escape(&key.extension)
        } else {
            format!("{}{}{}", escape(&key.part), PART_SEPARATOR, escape(&key.extension))
        };
        self.root.join(escape(&key.source_id)).join(file)
    }

    /// Remove every artifact; returns how many were removed
    pub fn clean(&self) -> Result<usize, ArtifactError> {
        let count = self.keys()?.len();
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|source| ArtifactError::Store {
                path: self.root.clone(),
                source,
            })?;
        }
        debug!(root = %self.root.display(), count, "artifact store cleaned");
        Ok(count)
    }

    fn key_for(
        &self,
        path: &Path,
    ) -> Option<ArtifactKey> {
        let file = path.file_name()?.to_str()?;
        let dir = path.parent()?.file_name()?.to_str()?;
        let source_id = unescape(dir)?;
        let (part, extension) = match file.split_once(PART_SEPARATOR) {
            Some((part, ext)) => (unescape(part)?, unescape(ext)?),
            None => (String::new(), unescape(file)?),
        };
        Some(ArtifactKey::new(source_id, part, extension))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn read(
        &self,
        key: &ArtifactKey,
    ) -> Result<Option<Vec<u8>>, ArtifactError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ArtifactError::Read {
                key: key.clone(),
                source,
            }),
        }
    }

    fn modified(
        &self,
        key: &ArtifactKey,
    ) -> Result<Option<SystemTime>, ArtifactError> {
        match fs::metadata(self.path_for(key)).and_then(|meta| meta.modified()) {
            Ok(time) => Ok(Some(time)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ArtifactError::Read {
                key: key.clone(),
                source,
            }),
        }
    }

    fn begin_write(
        &self,
        key: &ArtifactKey,
        stamp: SystemTime,
    ) -> Result<Box<dyn ArtifactSink>, ArtifactError> {
        let target = self.path_for(key);
        let to_error = |source| ArtifactError::Write {
            key: key.clone(),
            source,
        };
        let dir = target
            .parent()
            .ok_or_else(|| to_error(io::Error::other("artifact path has no parent")))?;
        fs::create_dir_all(dir).map_err(to_error)?;
        let file = NamedTempFile::new_in(dir).map_err(to_error)?;
        Ok(Box::new(FileSink {
            file,
            target,
            stamp,
        }))
    }

    fn remove(
        &self,
        key: &ArtifactKey,
    ) -> Result<bool, ArtifactError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ArtifactError::Write {
                key: key.clone(),
                source,
            }),
        }
    }

    fn keys(&self) -> Result<Vec<ArtifactKey>, ArtifactError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry?;
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !entry.file_type().is_file() || hidden {
                continue;
            }
            if let Some(key) = self.key_for(entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

struct FileSink {
    file: NamedTempFile,
    target: PathBuf,
    stamp: SystemTime,
}

impl Write for FileSink {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl ArtifactSink for FileSink {
    fn commit(self: Box<Self>) -> io::Result<()> {
        let FileSink {
            file,
            target,
            stamp,
        } = *self;
        file.as_file().set_modified(stamp)?;
        file.as_file().sync_all()?;
        file.persist(&target).map_err(|err| err.error)?;
        Ok(())
    }
}

/// Percent-escape everything outside `[A-Za-z0-9_.-]`, plus a leading `.`
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, byte) in text.bytes().enumerate() {
        let plain = byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.');
        if plain && !(i == 0 && byte == b'.') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn unescape(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = text.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::super::conformance;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_escape_round_trip() {
        for text in ["file:///p/a.dart", ".hidden", "opt.js.map", "a@b%c", "größe"] {
            let escaped = escape(text);
            assert!(!escaped.starts_with('.'));
            assert!(!escaped.contains('/'));
            assert!(!escaped.contains(PART_SEPARATOR));
            assert_eq!(unescape(&escaped).as_deref(), Some(text));
        }
    }

    #[test]
    fn test_conformance() {
        let dir = TempDir::new().unwrap();
        conformance::replaces_completely(&FileArtifactStore::new(dir.path().join("a")));
        conformance::uncommitted_is_invisible(&FileArtifactStore::new(dir.path().join("b")));
        conformance::kinds_are_independent(&FileArtifactStore::new(dir.path().join("c")));
        conformance::lists_keys(&FileArtifactStore::new(dir.path().join("d")));
        conformance::records_write_stamp(&FileArtifactStore::new(dir.path().join("e")));
    }

    #[test]
    fn test_discarded_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path());
        let key = ArtifactKey::new("file:///p/a.dart", "", "opt.js");
        {
            let mut writer = store.writer(&key, SystemTime::now()).unwrap();
            writer.write_all(b"partial").unwrap();
        }
        let parent = store.path_for(&key).parent().unwrap().to_path_buf();
        assert_eq!(fs::read_dir(parent).unwrap().count(), 0);
    }

    #[test]
    fn test_clean() {
        let dir = TempDir::new().unwrap();
        let store = FileArtifactStore::new(dir.path().join("work"));
        let key = ArtifactKey::new("file:///p/a.dart", "", "opt.js");
        let mut writer = store.writer(&key, SystemTime::now()).unwrap();
        writer.write_all(b"x").unwrap();
        writer.commit().unwrap();

        assert_eq!(store.clean().unwrap(), 1);
        assert!(store.keys().unwrap().is_empty());
        assert!(store.read(&key).unwrap().is_none());
    }
}
