//! dartc project configuration
//!
//! Supports a project-level `dartc.toml` layered under command-line flags.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. Project-level (dartc.toml)
//! 3. Default values
//! ```
//!
//! # Example file
//!
//! ```toml
//! [build]
//! work_dir = "out/.dartc"
//! out_dir = "out"
//! incremental = true
//! jobs = 4
//!
//! [diagnostics]
//! warnings_are_fatal = false
//! type_errors_are_fatal = true
//!
//! [system_libraries]
//! "dart:core" = "sdk/core.dart"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::frontend::config::{CompilerConfigurationBuilder, MetricsMode, PhaseKind};

/// Default project file name
pub const PROJECT_FILE: &str = "dartc.toml";

/// Project-level configuration (every field optional)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProjectConfig {
    /// Build settings
    #[serde(default)]
    pub build: BuildSection,
    /// Diagnostic policy
    #[serde(default)]
    pub diagnostics: DiagnosticsSection,
    /// `dart:xxx` → file mapping, relative paths are relative to the file
    #[serde(default)]
    pub system_libraries: IndexMap<String, PathBuf>,
}

/// `[build]`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BuildSection {
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    #[serde(default)]
    pub incremental: Option<bool>,
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub metrics: Option<MetricsMode>,
    #[serde(default)]
    pub phases: Option<Vec<PhaseKind>>,
}

/// `[diagnostics]`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DiagnosticsSection {
    #[serde(default)]
    pub warnings_are_fatal: Option<bool>,
    #[serde(default)]
    pub type_errors_are_fatal: Option<bool>,
    #[serde(default)]
    pub warn_on_no_such_type: Option<bool>,
    #[serde(default)]
    pub resolve_despite_parse_errors: Option<bool>,
}

impl ProjectConfig {
    /// Layer this file's settings over `builder`.
    ///
    /// `base_dir` anchors relative paths found in the file.
    pub fn apply(
        &self,
        mut builder: CompilerConfigurationBuilder,
        base_dir: &Path,
    ) -> CompilerConfigurationBuilder {
        let build = &self.build;
        if let Some(dir) = &build.work_dir {
            builder = builder.work_dir(base_dir.join(dir));
        }
        if let Some(dir) = &build.out_dir {
            builder = builder.out_dir(Some(base_dir.join(dir)));
        }
        if let Some(on) = build.incremental {
            builder = builder.incremental(on);
        }
        if let Some(jobs) = build.jobs {
            builder = builder.jobs(jobs);
        }
        if let Some(mode) = build.metrics {
            builder = builder.metrics(mode);
        }
        if let Some(phases) = &build.phases {
            builder = builder.phases(phases.iter().copied());
        }

        let diag = &self.diagnostics;
        if let Some(on) = diag.warnings_are_fatal {
            builder = builder.warnings_are_fatal(on);
        }
        if let Some(on) = diag.type_errors_are_fatal {
            builder = builder.type_errors_are_fatal(on);
        }
        if let Some(on) = diag.warn_on_no_such_type {
            builder = builder.should_warn_on_no_such_type(on);
        }
        if let Some(on) = diag.resolve_despite_parse_errors {
            builder = builder.resolve_despite_parse_errors(on);
        }

        for (spec, path) in &self.system_libraries {
            builder = builder.system_library(spec.clone(), base_dir.join(path));
        }
        builder
    }
}

/// Load a project file
pub fn load_project_config(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Look for `dartc.toml` in `dir` and its ancestors
pub fn find_project_config(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .map(|d| d.join(PROJECT_FILE))
        .find(|candidate| candidate.is_file())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] crate::frontend::config::ConfigurationError),
}
