//! Diagnostic rendering backends.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// Produces output like:
/// ```text
/// warning[W103]: nesterov placement stopped at iteration 5000 above target overflow 0.1
///   --> iteration 5000
///    = note: final overflow 0.1312
///    = help: raise nesterov.max_iter or lower the target density
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn severity_label(&self, diag: &Diagnostic) -> String {
        if !self.color {
            return diag.severity.to_string();
        }
        let color = diag.severity.ansi_color();
        format!("\x1b[1;{color}m{}\x1b[0m", diag.severity)
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{}[{}]: {}\n",
            self.severity_label(diag),
            diag.code,
            diag.message
        ));

        if let Some(iteration) = diag.iteration {
            out.push_str(&format!("  --> iteration {iteration}\n"));
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }

        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};

    #[test]
    fn render_warning_with_notes() {
        let code = DiagnosticCode::new(Category::Warning, 103);
        let diag = Diagnostic::warning(code, "not converged")
            .at_iteration(5000)
            .with_note("final overflow 0.1312")
            .with_help("raise nesterov.max_iter");

        let renderer = TerminalRenderer::new(false);
        let output = renderer.render(&diag);

        assert!(output.contains("warning[W103]: not converged"));
        assert!(output.contains("--> iteration 5000"));
        assert!(output.contains("= note: final overflow 0.1312"));
        assert!(output.contains("= help: raise nesterov.max_iter"));
    }

    #[test]
    fn render_without_iteration() {
        let code = DiagnosticCode::new(Category::Error, 401);
        let diag = Diagnostic::error(code, "timing engine failed");

        let renderer = TerminalRenderer::new(false);
        let output = renderer.render(&diag);

        assert!(output.contains("error[E401]: timing engine failed"));
        assert!(!output.contains("-->"));
    }

    #[test]
    fn render_with_color() {
        let code = DiagnosticCode::new(Category::Progress, 2);
        let diag = Diagnostic::note(code, "overflow 0.5");
        let output = TerminalRenderer::new(true).render(&diag);
        assert!(output.contains("\x1b[1;36mnote\x1b[0m"));
        assert!(output.contains("[P002]: overflow 0.5"));
    }
}
