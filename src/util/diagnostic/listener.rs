//! Diagnostic listeners
//!
//! The compiler context fans every event out to its listeners. Listeners
//! are independent: none of them shares state with another.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{DiagnosticEvent, Severity, TextRenderer};

/// Receives one callback per diagnostic.
pub trait DiagnosticListener: Send + Sync {
    fn on_diagnostic(
        &self,
        event: &DiagnosticEvent,
    );
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullListener;

impl DiagnosticListener for NullListener {
    fn on_diagnostic(
        &self,
        _event: &DiagnosticEvent,
    ) {
    }
}

/// Keeps every event; clones share the same buffer
#[derive(Debug, Default, Clone)]
pub struct CollectingListener {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected events
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().clone()
    }

    /// Number of collected events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collected events carrying `code`
    pub fn with_code(
        &self,
        code: &str,
    ) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.code.code == code)
            .cloned()
            .collect()
    }
}

impl DiagnosticListener for CollectingListener {
    fn on_diagnostic(
        &self,
        event: &DiagnosticEvent,
    ) {
        self.events.lock().push(event.clone());
    }
}

/// Prints rendered diagnostics to stderr
#[derive(Debug, Clone)]
pub struct ConsoleListener {
    renderer: TextRenderer,
    min_severity: Severity,
}

impl ConsoleListener {
    pub fn new(renderer: TextRenderer) -> Self {
        Self {
            renderer,
            min_severity: Severity::Info,
        }
    }

    /// Only print events at or above `severity`
    pub fn with_min_severity(
        mut self,
        severity: Severity,
    ) -> Self {
        self.min_severity = severity;
        self
    }
}

impl Default for ConsoleListener {
    fn default() -> Self {
        Self::new(TextRenderer::new())
    }
}

impl DiagnosticListener for ConsoleListener {
    fn on_diagnostic(
        &self,
        event: &DiagnosticEvent,
    ) {
        if event.severity < self.min_severity {
            return;
        }
        let text = self.renderer.render(event);
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        // a closed stderr must not take the compile down with it
        let _ = handle.write_all(text.as_bytes());
    }
}

/// Fails the current test on any diagnostic at or above a threshold
#[derive(Debug, Clone, Copy)]
pub struct PanickingListener {
    threshold: Severity,
}

impl PanickingListener {
    /// Panic on every diagnostic
    pub fn new() -> Self {
        Self {
            threshold: Severity::Info,
        }
    }

    /// Panic only on diagnostics at or above `threshold`
    pub fn at_least(threshold: Severity) -> Self {
        Self { threshold }
    }
}

impl Default for PanickingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticListener for PanickingListener {
    fn on_diagnostic(
        &self,
        event: &DiagnosticEvent,
    ) {
        if event.severity >= self.threshold {
            panic!("unexpected diagnostic: {}", TextRenderer::plain().render(event));
        }
    }
}
