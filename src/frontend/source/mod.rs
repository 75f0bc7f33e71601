//! Source model
//!
//! - [`SourceUri`] - normalized identity of a text
//! - [`Source`] - immutable snapshot of one text (exists, modification time)
//!   with a lazily opened content stream
//! - [`LibrarySource`] - a source that defines a library and can resolve
//!   imports and parts relative to itself
//!
//! Two sources are the same source iff their normalized URIs are equal.

pub mod provider;

pub use provider::{FileSystemProvider, MemoryProvider, SourceProvider};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::frontend::config::CompilerConfiguration;

/// Source model errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read {uri}: {source}")]
    Io {
        uri: SourceUri,
        #[source]
        source: io::Error,
    },

    #[error("{uri} is not valid UTF-8")]
    Encoding { uri: SourceUri },

    #[error("no system library is configured for '{0}'")]
    UnmappedSystemLibrary(String),

    #[error("invalid import specification '{0}'")]
    InvalidSpec(String),
}

/// Normalized source URI: a lower-case scheme plus a path with `.`/`..`
/// resolved and separators collapsed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceUri {
    scheme: String,
    path: String,
}

impl SourceUri {
    /// Build from parts, normalizing both
    pub fn new(
        scheme: &str,
        path: &str,
    ) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            path: normalize_path(path),
        }
    }

    /// `file:` URI for a path; relative paths are made absolute against the
    /// current directory.
    pub fn from_path(path: &Path) -> Self {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
        };
        Self::new("file", &absolute.to_string_lossy())
    }

    /// Parse `scheme:path`, `scheme://path` or a bare path
    pub fn parse(text: &str) -> Self {
        if let Some((scheme, rest)) = text.split_once("://") {
            if is_scheme(scheme) {
                return Self::new(scheme, rest);
            }
        }
        if let Some((scheme, rest)) = text.split_once(':') {
            // single letters are drive names, not schemes
            if scheme.len() > 1 && is_scheme(scheme) {
                return Self::new(scheme, rest);
            }
        }
        Self::from_path(Path::new(text))
    }

    #[inline]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this is a `file:` URI
    pub fn is_file(&self) -> bool {
        self.scheme == "file"
    }

    /// Local path for `file:` URIs
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.is_file().then(|| PathBuf::from(&self.path))
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Resolve `reference` against this URI.
    ///
    /// Absolute references (with a scheme or a leading `/`) replace the path;
    /// anything else is joined to this URI's directory.
    pub fn resolve(
        &self,
        reference: &str,
    ) -> SourceUri {
        if has_scheme(reference) {
            return SourceUri::parse(reference);
        }
        if reference.starts_with('/') {
            return SourceUri::new(&self.scheme, reference);
        }
        let dir = match self.path.rfind('/') {
            Some(idx) => &self.path[..=idx],
            None => "",
        };
        SourceUri::new(&self.scheme, &format!("{}{}", dir, reference))
    }
}

impl fmt::Display for SourceUri {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.path.starts_with('/') {
            write!(f, "{}://{}", self.scheme, self.path)
        } else {
            write!(f, "{}:{}", self.scheme, self.path)
        }
    }
}

fn is_scheme(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn has_scheme(reference: &str) -> bool {
    reference
        .split_once(':')
        .is_some_and(|(scheme, _)| scheme.len() > 1 && is_scheme(scheme))
}

/// Resolve `.` and `..`, collapse repeated separators, use `/` only.
fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Immutable snapshot of one source text
#[derive(Clone)]
pub struct Source {
    uri: SourceUri,
    unique_id: Arc<str>,
    exists: bool,
    last_modified: SystemTime,
    provider: Arc<dyn SourceProvider>,
}

impl Source {
    /// Snapshot `uri` through `provider`
    pub fn new(
        uri: SourceUri,
        provider: Arc<dyn SourceProvider>,
    ) -> Self {
        let modified = provider.modified(&uri);
        Self {
            unique_id: Arc::from(uri.to_string()),
            exists: modified.is_some(),
            last_modified: modified.unwrap_or(SystemTime::UNIX_EPOCH),
            uri,
            provider,
        }
    }

    #[inline]
    pub fn uri(&self) -> &SourceUri {
        &self.uri
    }

    /// Identity used for artifact keys and diagnostics
    #[inline]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Short human-readable name
    pub fn display_name(&self) -> &str {
        self.uri.file_name()
    }

    #[inline]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Modification time at snapshot; the epoch for missing sources
    #[inline]
    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// Provider this source reads through
    pub fn provider(&self) -> &Arc<dyn SourceProvider> {
        &self.provider
    }

    /// Open the content stream
    pub fn open(&self) -> Result<Box<dyn Read + Send>, SourceError> {
        self.provider.open(&self.uri).map_err(|source| SourceError::Io {
            uri: self.uri.clone(),
            source,
        })
    }

    /// Read the whole content as UTF-8
    pub fn read_to_string(&self) -> Result<String, SourceError> {
        let mut bytes = Vec::new();
        self.open()?
            .read_to_end(&mut bytes)
            .map_err(|source| SourceError::Io {
                uri: self.uri.clone(),
                source,
            })?;
        String::from_utf8(bytes).map_err(|_| SourceError::Encoding {
            uri: self.uri.clone(),
        })
    }

    /// Another source through the same provider
    pub fn sibling(
        &self,
        uri: SourceUri,
    ) -> Source {
        Source::new(uri, Arc::clone(&self.provider))
    }
}

impl fmt::Debug for Source {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Source")
            .field("uri", &self.unique_id)
            .field("exists", &self.exists)
            .field("last_modified", &self.last_modified)
            .finish()
    }
}

impl fmt::Display for Source {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.unique_id)
    }
}

impl PartialEq for Source {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.uri == other.uri
    }
}

impl Eq for Source {}

impl Hash for Source {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.uri.hash(state);
    }
}

/// A source that defines a library
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibrarySource {
    source: Source,
}

impl LibrarySource {
    pub fn new(source: Source) -> Self {
        Self { source }
    }

    /// Library source for a path through `provider`
    pub fn from_path(
        path: &Path,
        provider: Arc<dyn SourceProvider>,
    ) -> Self {
        Self::new(Source::new(SourceUri::from_path(path), provider))
    }

    #[inline]
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Default library name: the file name without its extension
    pub fn name(&self) -> &str {
        let file = self.source.display_name();
        file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file)
    }

    /// Resolve an import/export specification.
    ///
    /// Relative specifications resolve against this library; scheme-qualified
    /// ones (other than `file:`) go through the configuration's system
    /// library table.
    pub fn resolve_import(
        &self,
        spec: &str,
        config: &CompilerConfiguration,
    ) -> Result<LibrarySource, SourceError> {
        if spec.trim().is_empty() {
            return Err(SourceError::InvalidSpec(spec.to_string()));
        }
        if has_scheme(spec) {
            let uri = SourceUri::parse(spec);
            if uri.is_file() {
                return Ok(LibrarySource::new(self.source.sibling(uri)));
            }
            let path = config
                .system_library_for(spec)
                .ok_or_else(|| SourceError::UnmappedSystemLibrary(spec.to_string()))?;
            return Ok(LibrarySource::new(
                self.source.sibling(SourceUri::from_path(path)),
            ));
        }
        Ok(LibrarySource::new(
            self.source.sibling(self.source.uri().resolve(spec)),
        ))
    }

    /// Resolve a `part` path to a child source
    pub fn resolve_part(
        &self,
        relative: &str,
    ) -> Source {
        self.source.sibling(self.source.uri().resolve(relative))
    }
}

impl std::ops::Deref for LibrarySource {
    type Target = Source;

    fn deref(&self) -> &Source {
        &self.source
    }
}

impl fmt::Display for LibrarySource {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        self.source.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_makes_identity() {
        let a = SourceUri::new("FILE", "/work/lib/../app.dart");
        let b = SourceUri::new("file", "/work/./app.dart");
        let c = SourceUri::new("file", "//work//app.dart");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.to_string(), "file:///work/app.dart");
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(SourceUri::parse("dart:core").to_string(), "dart:core");
        assert_eq!(
            SourceUri::parse("file:///a/b.dart"),
            SourceUri::new("file", "/a/b.dart")
        );
        assert_eq!(SourceUri::parse("/a/b.dart"), SourceUri::new("file", "/a/b.dart"));
    }

    #[test]
    fn test_resolve_relative() {
        let base = SourceUri::new("file", "/work/src/app.dart");
        assert_eq!(base.resolve("lib.dart").path(), "/work/src/lib.dart");
        assert_eq!(base.resolve("../util/u.dart").path(), "/work/util/u.dart");
        assert_eq!(base.resolve("/abs.dart").path(), "/abs.dart");
        assert_eq!(base.resolve("dart:core").scheme(), "dart");
    }

    #[test]
    fn test_identity_keeps_path_case() {
        assert_eq!(
            SourceUri::parse("FILE:///p/a.dart"),
            SourceUri::parse("file:///p/a.dart")
        );
        assert_ne!(
            SourceUri::parse("file:///P/A.dart"),
            SourceUri::parse("file:///p/a.dart")
        );
        let base = SourceUri::new("file", "/work/App.dart");
        assert_eq!(base.resolve("./Lib.dart").path(), "/work/Lib.dart");
    }

    #[test]
    fn test_dotdot_above_root_is_dropped() {
        assert_eq!(normalize_path("/../a"), "/a");
        assert_eq!(normalize_path("../a"), "../a");
    }

    #[test]
    fn test_source_snapshot() {
        let provider = MemoryProvider::new();
        let uri = provider.add("/work/a.dart", "library a;");
        let provider: Arc<dyn SourceProvider> = Arc::new(provider);
        let source = Source::new(uri.clone(), Arc::clone(&provider));
        assert!(source.exists());
        assert_eq!(source.display_name(), "a.dart");
        assert_eq!(source.unique_id(), "file:///work/a.dart");
        assert_eq!(source.read_to_string().unwrap(), "library a;");

        let missing = source.sibling(uri.resolve("b.dart"));
        assert!(!missing.exists());
        assert_eq!(missing.last_modified(), SystemTime::UNIX_EPOCH);
        assert!(missing.read_to_string().is_err());
    }

    #[test]
    fn test_library_source_resolution() {
        let provider = MemoryProvider::new();
        provider.add("/work/app.dart", "");
        provider.add("/sdk/core.dart", "");
        let provider: Arc<dyn SourceProvider> = Arc::new(provider);
        let app = LibrarySource::from_path(Path::new("/work/app.dart"), provider);
        let config = CompilerConfiguration::builder()
            .system_library("dart:core", "/sdk/core.dart")
            .build()
            .unwrap();

        assert_eq!(app.name(), "app");
        let lib = app.resolve_import("src/../lib.dart", &config).unwrap();
        assert_eq!(lib.unique_id(), "file:///work/lib.dart");
        let core = app.resolve_import("dart:core", &config).unwrap();
        assert!(core.exists());
        assert!(matches!(
            app.resolve_import("dart:html", &config),
            Err(SourceError::UnmappedSystemLibrary(_))
        ));
        assert!(app.resolve_import("", &config).is_err());
        assert_eq!(app.resolve_part("part.dart").unique_id(), "file:///work/part.dart");
    }
}
