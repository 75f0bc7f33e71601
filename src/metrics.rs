//! Compile metrics

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::frontend::config::{MetricsMode, PhaseKind};
use crate::util::diagnostic::DiagnosticSummary;

/// Wall time of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseTiming {
    pub phase: PhaseKind,
    pub duration: Duration,
}

/// Counters collected over one compile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompilerMetrics {
    pub phases: Vec<PhaseTiming>,
    pub libraries: usize,
    pub units: usize,
    pub units_compiled: usize,
    pub units_reused: usize,
    pub packaged_bytes: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub total: Duration,
}

impl CompilerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_phase(
        &mut self,
        phase: PhaseKind,
        duration: Duration,
    ) {
        self.phases.push(PhaseTiming { phase, duration });
    }

    pub fn record_diagnostics(
        &mut self,
        summary: &DiagnosticSummary,
    ) {
        self.errors = summary.errors;
        self.warnings = summary.warnings;
        self.infos = summary.infos;
    }

    /// Time spent in `phase`, if it ran
    pub fn phase_time(
        &self,
        phase: PhaseKind,
    ) -> Option<Duration> {
        self.phases
            .iter()
            .find(|t| t.phase == phase)
            .map(|t| t.duration)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} libraries, {} units ({} compiled, {} reused), {} bytes packaged, \
             {} errors, {} warnings in {:.2?}",
            self.libraries,
            self.units,
            self.units_compiled,
            self.units_reused,
            self.packaged_bytes,
            self.errors,
            self.warnings,
            self.total
        )
    }

    pub fn phase_lines(&self) -> Vec<String> {
        self.phases
            .iter()
            .map(|t| format!("{:<12} {:.2?}", t.phase.to_string(), t.duration))
            .collect()
    }

    /// Log according to `mode`
    pub fn log(
        &self,
        mode: MetricsMode,
    ) {
        match mode {
            MetricsMode::Off => {}
            MetricsMode::Summary => info!("{}", self.summary_line()),
            MetricsMode::Detailed => {
                for line in self.phase_lines() {
                    info!("{}", line);
                }
                info!("{}", self.summary_line());
            }
        }
    }
}
