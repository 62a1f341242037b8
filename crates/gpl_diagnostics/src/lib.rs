//! Structured diagnostics for the placement engine.
//!
//! This crate provides [`Diagnostic`] messages with severity levels and
//! category-prefixed codes. The thread-safe [`DiagnosticSink`] accumulates
//! diagnostics while a placement run progresses, and [`TerminalRenderer`]
//! formats them for human consumption.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
