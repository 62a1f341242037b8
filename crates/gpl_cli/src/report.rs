//! Run summaries and diagnostic output.

use gpl_diagnostics::{Diagnostic, DiagnosticRenderer, DiagnosticSink, TerminalRenderer};
use gpl_place::{NesterovOutcome, NesterovStatus};
use serde::Serialize;

/// The machine-readable result of `gpl place`.
#[derive(Debug, Serialize)]
pub struct PlaceReport {
    /// Design name.
    pub design: String,
    /// Where the placed design was written.
    pub output: String,
    /// `converged`, `max_iterations` or `diverged`.
    pub status: &'static str,
    /// Optimizer iterations reached.
    pub iterations: usize,
    /// Final overflow.
    pub overflow: f64,
    /// Final half-perimeter wirelength.
    pub hpwl: f64,
    /// Half-perimeter wirelength before optimization.
    pub start_hpwl: f64,
    /// Everything the run reported.
    pub diagnostics: Vec<Diagnostic>,
}

impl PlaceReport {
    /// Builds a report from an optimizer outcome.
    pub fn new(design: &str, output: &str, outcome: &NesterovOutcome, sink: &DiagnosticSink) -> Self {
        Self {
            design: design.to_string(),
            output: output.to_string(),
            status: status_name(outcome.status),
            iterations: outcome.iterations,
            overflow: outcome.overflow,
            hpwl: outcome.hpwl,
            start_hpwl: outcome.start_hpwl,
            diagnostics: sink.diagnostics(),
        }
    }
}

/// Stable lowercase name of a status.
pub fn status_name(status: NesterovStatus) -> &'static str {
    match status {
        NesterovStatus::Converged => "converged",
        NesterovStatus::MaxIterations => "max_iterations",
        NesterovStatus::Diverged => "diverged",
    }
}

/// Renders diagnostics to stderr. In quiet mode only warnings and errors
/// are shown.
///
/// Returns the number of diagnostics rendered.
pub fn render_diagnostics(sink: &DiagnosticSink, color: bool, quiet: bool) -> usize {
    let renderer = TerminalRenderer::new(color);
    let mut shown = 0;
    for diag in sink.diagnostics() {
        if quiet && !diag.severity.shown_when_quiet() {
            continue;
        }
        eprintln!("{}", renderer.render(&diag));
        shown += 1;
    }
    shown
}
