//! Diagnostic model
//!
//! A [`DiagnosticEvent`] carries a code, the subsystem that produced it and
//! the code's intrinsic [`Severity`]. Whether an event stops the compile is
//! not a property of the event: [`SeverityPolicy`] decides that from the
//! configuration.
//!
//! # Module structure
//!
//! - [`codes`] - error code registry and builder
//! - [`listener`] - listener trait and the stock listeners
//! - [`render`] - console text rendering

pub mod codes;
pub mod listener;
pub mod render;

pub use codes::{DiagnosticBuilder, ErrorCode, ALL_CODES};
pub use listener::{
    CollectingListener, ConsoleListener, DiagnosticListener, NullListener, PanickingListener,
};
pub use render::TextRenderer;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Diagnostic severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Subsystem that raised a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubSystem {
    Parser,
    Resolver,
    StaticType,
    Io,
}

impl fmt::Display for SubSystem {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            SubSystem::Parser => write!(f, "parser"),
            SubSystem::Resolver => write!(f, "resolver"),
            SubSystem::StaticType => write!(f, "static type"),
            SubSystem::Io => write!(f, "io"),
        }
    }
}

/// Where a diagnostic points
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Unique id of the source
    pub source: String,
    /// Line (1-indexed)
    pub line: usize,
    /// Column (1-indexed)
    pub column: usize,
    /// Length in bytes
    pub length: usize,
}

impl SourceLocation {
    pub fn new(
        source: impl Into<String>,
        line: usize,
        column: usize,
        length: usize,
    ) -> Self {
        Self {
            source: source.into(),
            line,
            column,
            length,
        }
    }

    /// Location naming a whole source
    pub fn whole(source: impl Into<String>) -> Self {
        Self::new(source, 1, 1, 0)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}

/// One diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub code: ErrorCode,
    pub subsystem: SubSystem,
    pub severity: Severity,
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl DiagnosticEvent {
    /// Unique id of the source the event points at, if any
    pub fn source(&self) -> Option<&str> {
        self.location.as_ref().map(|l| l.source.as_str())
    }

    /// Total order used for reporting: source, then position, then code.
    ///
    /// Events without a location sort first.
    pub fn report_order(
        &self,
        other: &Self,
    ) -> Ordering {
        let key = |e: &Self| {
            e.location
                .as_ref()
                .map(|l| (l.source.clone(), l.line, l.column))
        };
        key(self)
            .cmp(&key(other))
            .then_with(|| self.code.code.cmp(other.code.code))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code.code, self.message)
    }
}

/// Turns severities into abort decisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityPolicy {
    pub warnings_are_fatal: bool,
    pub type_errors_are_fatal: bool,
}

impl SeverityPolicy {
    /// Whether `event` must stop the compile
    pub fn is_fatal(
        &self,
        event: &DiagnosticEvent,
    ) -> bool {
        match (event.subsystem, event.severity) {
            (SubSystem::Io, _) => true,
            (_, Severity::Info) => false,
            (SubSystem::StaticType, _) => self.type_errors_are_fatal,
            (_, Severity::Error) => true,
            (_, Severity::Warning) => self.warnings_are_fatal,
        }
    }
}

/// Running totals over reported events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticSummary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub fatal: usize,
}

impl DiagnosticSummary {
    /// Account for one event
    pub fn record(
        &mut self,
        event: &DiagnosticEvent,
        policy: &SeverityPolicy,
    ) {
        match event.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => self.infos += 1,
        }
        if policy.is_fatal(event) {
            self.fatal += 1;
        }
    }

    /// Whether anything fatal was seen
    pub fn has_fatal(&self) -> bool {
        self.fatal > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(code: ErrorCode) -> DiagnosticEvent {
        code.builder()
            .param("name", "x")
            .at(SourceLocation::new("file:///a.dart", 1, 1, 1))
            .build()
    }

    #[test]
    fn test_default_policy() {
        let policy = SeverityPolicy::default();
        assert!(policy.is_fatal(&event(ErrorCode::UNRESOLVED_IMPORT)));
        assert!(!policy.is_fatal(&event(ErrorCode::CANNOT_RESOLVE)));
        assert!(!policy.is_fatal(&event(ErrorCode::TYPE_MISMATCH)));
        assert!(!policy.is_fatal(&event(ErrorCode::IMPORT_CYCLE)));
        assert!(policy.is_fatal(&event(ErrorCode::ARTIFACT_WRITE_FAILED)));
    }

    #[test]
    fn test_escalating_policy() {
        let policy = SeverityPolicy {
            warnings_are_fatal: true,
            type_errors_are_fatal: false,
        };
        assert!(policy.is_fatal(&event(ErrorCode::CANNOT_RESOLVE)));
        // static type problems follow their own switch
        assert!(!policy.is_fatal(&event(ErrorCode::TYPE_MISMATCH)));

        let policy = SeverityPolicy {
            warnings_are_fatal: false,
            type_errors_are_fatal: true,
        };
        assert!(policy.is_fatal(&event(ErrorCode::TYPE_MISMATCH)));
        assert!(policy.is_fatal(&event(ErrorCode::NO_SUCH_TYPE)));
        assert!(!policy.is_fatal(&event(ErrorCode::CANNOT_RESOLVE)));
    }

    #[test]
    fn test_report_order() {
        let mut events = vec![
            ErrorCode::CANNOT_RESOLVE
                .builder()
                .at(SourceLocation::new("file:///b.dart", 1, 1, 1))
                .build(),
            ErrorCode::CANNOT_RESOLVE
                .builder()
                .at(SourceLocation::new("file:///a.dart", 9, 1, 1))
                .build(),
            ErrorCode::CANNOT_RESOLVE
                .builder()
                .at(SourceLocation::new("file:///a.dart", 2, 7, 1))
                .build(),
            ErrorCode::ARTIFACT_WRITE_FAILED.builder().build(),
        ];
        events.sort_by(|a, b| a.report_order(b));
        assert!(events[0].location.is_none());
        assert_eq!(events[1].location.as_ref().unwrap().line, 2);
        assert_eq!(events[2].location.as_ref().unwrap().line, 9);
        assert_eq!(events[3].source(), Some("file:///b.dart"));
    }

    #[test]
    fn test_summary_counts() {
        let policy = SeverityPolicy::default();
        let mut summary = DiagnosticSummary::default();
        summary.record(&event(ErrorCode::CANNOT_RESOLVE), &policy);
        summary.record(&event(ErrorCode::DUPLICATE_DEFINITION), &policy);
        summary.record(&event(ErrorCode::IMPORT_CYCLE), &policy);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.infos, 1);
        assert_eq!(summary.fatal, 1);
        assert!(summary.has_fatal());
    }
}
