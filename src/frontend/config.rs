//! 编译配置
//!
//! [`CompilerConfiguration`] is the policy snapshot for one compile: which
//! phases run, how severities map to aborts, whether artifacts are reused,
//! where output goes. It is immutable once built; every phase and the
//! backend only read it.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::util::diagnostic::SeverityPolicy;

/// Pipeline phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseKind {
    Parse,
    Resolve,
    TypeCheck,
    Optimize,
}

impl PhaseKind {
    /// Every phase, in order
    pub const ALL: [PhaseKind; 4] = [
        PhaseKind::Parse,
        PhaseKind::Resolve,
        PhaseKind::TypeCheck,
        PhaseKind::Optimize,
    ];
}

impl std::fmt::Display for PhaseKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            PhaseKind::Parse => write!(f, "parse"),
            PhaseKind::Resolve => write!(f, "resolve"),
            PhaseKind::TypeCheck => write!(f, "type check"),
            PhaseKind::Optimize => write!(f, "optimize"),
        }
    }
}

/// Metrics display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MetricsMode {
    /// No metrics
    #[default]
    Off,
    /// One summary line
    Summary,
    /// One line per phase plus the summary
    Detailed,
}

impl std::str::FromStr for MetricsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" | "none" => Ok(MetricsMode::Off),
            "summary" => Ok(MetricsMode::Summary),
            "detailed" | "all" => Ok(MetricsMode::Detailed),
            other => Err(format!("unknown metrics mode '{}'", other)),
        }
    }
}

/// Available backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// JavaScript output with source maps
    #[default]
    Js,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("phase list must start with 'parse'")]
    MissingParsePhase,

    #[error("phase '{0}' is listed out of order or twice")]
    PhaseOrder(PhaseKind),

    #[error("jobs must be at most {max}, got {got}")]
    TooManyJobs { got: usize, max: usize },
}

/// Upper bound on the worker pool
pub const MAX_JOBS: usize = 256;

/// Immutable compile policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfiguration {
    phases: Vec<PhaseKind>,
    incremental: bool,
    warnings_are_fatal: bool,
    type_errors_are_fatal: bool,
    should_warn_on_no_such_type: bool,
    resolve_despite_parse_errors: bool,
    work_dir: PathBuf,
    out_dir: Option<PathBuf>,
    metrics: MetricsMode,
    jobs: usize,
    system_libraries: IndexMap<String, PathBuf>,
    ignore_unrecognized_flags: bool,
    backend: BackendKind,
}

impl Default for CompilerConfiguration {
    fn default() -> Self {
        Self {
            phases: PhaseKind::ALL.to_vec(),
            incremental: true,
            warnings_are_fatal: false,
            type_errors_are_fatal: false,
            should_warn_on_no_such_type: true,
            resolve_despite_parse_errors: false,
            work_dir: PathBuf::from("out/.dartc"),
            out_dir: None,
            metrics: MetricsMode::Off,
            jobs: 0,
            system_libraries: IndexMap::new(),
            ignore_unrecognized_flags: false,
            backend: BackendKind::Js,
        }
    }
}

impl CompilerConfiguration {
    /// Start from the defaults
    pub fn builder() -> CompilerConfigurationBuilder {
        CompilerConfigurationBuilder::default()
    }

    /// Continue from this configuration
    pub fn to_builder(&self) -> CompilerConfigurationBuilder {
        CompilerConfigurationBuilder {
            config: self.clone(),
        }
    }

    #[inline]
    pub fn phases(&self) -> &[PhaseKind] {
        &self.phases
    }

    /// Whether `phase` is part of the pipeline
    pub fn runs(
        &self,
        phase: PhaseKind,
    ) -> bool {
        self.phases.contains(&phase)
    }

    #[inline]
    pub fn incremental(&self) -> bool {
        self.incremental
    }

    #[inline]
    pub fn warnings_are_fatal(&self) -> bool {
        self.warnings_are_fatal
    }

    #[inline]
    pub fn type_errors_are_fatal(&self) -> bool {
        self.type_errors_are_fatal
    }

    #[inline]
    pub fn should_warn_on_no_such_type(&self) -> bool {
        self.should_warn_on_no_such_type
    }

    #[inline]
    pub fn resolve_despite_parse_errors(&self) -> bool {
        self.resolve_despite_parse_errors
    }

    /// Artifact store root
    #[inline]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    #[inline]
    pub fn out_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }

    #[inline]
    pub fn metrics(&self) -> MetricsMode {
        self.metrics
    }

    /// Worker pool bound; 0 lets rayon decide
    #[inline]
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    #[inline]
    pub fn ignore_unrecognized_flags(&self) -> bool {
        self.ignore_unrecognized_flags
    }

    #[inline]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Configured system libraries (`"dart:core"` → file)
    pub fn system_libraries(&self) -> &IndexMap<String, PathBuf> {
        &self.system_libraries
    }

    /// Map a non-relative import specification to a file
    pub fn system_library_for(
        &self,
        import_spec: &str,
    ) -> Option<&Path> {
        self.system_libraries.get(import_spec).map(PathBuf::as_path)
    }

    /// Severity → abort policy derived from this configuration
    pub fn severity_policy(&self) -> SeverityPolicy {
        SeverityPolicy {
            warnings_are_fatal: self.warnings_are_fatal,
            type_errors_are_fatal: self.type_errors_are_fatal,
        }
    }
}

/// Fluent builder; `build` validates
#[derive(Debug, Clone, Default)]
pub struct CompilerConfigurationBuilder {
    config: CompilerConfiguration,
}

impl CompilerConfigurationBuilder {
    pub fn phases(
        mut self,
        phases: impl IntoIterator<Item = PhaseKind>,
    ) -> Self {
        self.config.phases = phases.into_iter().collect();
        self
    }

    pub fn incremental(
        mut self,
        on: bool,
    ) -> Self {
        self.config.incremental = on;
        self
    }

    pub fn warnings_are_fatal(
        mut self,
        on: bool,
    ) -> Self {
        self.config.warnings_are_fatal = on;
        self
    }

    pub fn type_errors_are_fatal(
        mut self,
        on: bool,
    ) -> Self {
        self.config.type_errors_are_fatal = on;
        self
    }

    pub fn should_warn_on_no_such_type(
        mut self,
        on: bool,
    ) -> Self {
        self.config.should_warn_on_no_such_type = on;
        self
    }

    pub fn resolve_despite_parse_errors(
        mut self,
        on: bool,
    ) -> Self {
        self.config.resolve_despite_parse_errors = on;
        self
    }

    pub fn work_dir(
        mut self,
        dir: impl Into<PathBuf>,
    ) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn out_dir(
        mut self,
        dir: Option<PathBuf>,
    ) -> Self {
        self.config.out_dir = dir;
        self
    }

    pub fn metrics(
        mut self,
        mode: MetricsMode,
    ) -> Self {
        self.config.metrics = mode;
        self
    }

    pub fn jobs(
        mut self,
        jobs: usize,
    ) -> Self {
        self.config.jobs = jobs;
        self
    }

    pub fn system_library(
        mut self,
        spec: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.config.system_libraries.insert(spec.into(), path.into());
        self
    }

    pub fn ignore_unrecognized_flags(
        mut self,
        on: bool,
    ) -> Self {
        self.config.ignore_unrecognized_flags = on;
        self
    }

    pub fn backend(
        mut self,
        backend: BackendKind,
    ) -> Self {
        self.config.backend = backend;
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<CompilerConfiguration, ConfigurationError> {
        let phases = &self.config.phases;
        if phases.first() != Some(&PhaseKind::Parse) {
            return Err(ConfigurationError::MissingParsePhase);
        }
        for pair in phases.windows(2) {
            if pair[1] <= pair[0] {
                return Err(ConfigurationError::PhaseOrder(pair[1]));
            }
        }
        if self.config.jobs > MAX_JOBS {
            return Err(ConfigurationError::TooManyJobs {
                got: self.config.jobs,
                max: MAX_JOBS,
            });
        }
        Ok(self.config)
    }
}
