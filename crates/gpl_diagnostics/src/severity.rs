//! How serious a placement diagnostic is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic, ordered `Note < Warning < Error`.
///
/// Progress reports from the initial placer, the optimizer and the feedback
/// loops are notes. Warnings mark a run that finished with a degraded result
/// (no convergence, divergence, recovered degenerate input). Errors mark a
/// run that was aborted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Progress or informational report.
    Note,
    /// The run finished but its result is degraded.
    Warning,
    /// The run was aborted.
    Error,
}

impl Severity {
    /// Returns `true` for [`Severity::Error`].
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }

    /// Whether the diagnostic is still shown when progress output is
    /// suppressed.
    pub fn shown_when_quiet(self) -> bool {
        self >= Severity::Warning
    }

    /// SGR color used by the terminal renderer.
    pub fn ansi_color(self) -> &'static str {
        match self {
            Severity::Note => "36",
            Severity::Warning => "33",
            Severity::Error => "31",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}
