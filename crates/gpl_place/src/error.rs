//! Error types for the placement engine.

use gpl_config::ConfigError;
use std::fmt;

/// The stage of a run in which an external collaborator was consulted.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    /// Congestion estimation during routability feedback.
    Routability,
    /// Slack analysis during timing feedback.
    Timing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Routability => write!(f, "routability"),
            Phase::Timing => write!(f, "timing"),
        }
    }
}

/// Failure reported by an external router or timing engine.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    /// Description supplied by the collaborator.
    pub message: String,
}

impl EngineError {
    /// Creates an engine error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that abort a placement run.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    /// A configuration value was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An external router or timing engine failed.
    #[error("{phase} engine failed: {message}")]
    ExternalEngine {
        /// The feedback phase that invoked the engine.
        phase: Phase,
        /// The engine's error message.
        message: String,
    },

    /// A feedback mode is enabled but no collaborator was provided for it.
    #[error("{phase}-driven mode is enabled but no {phase} engine was provided")]
    MissingEngine {
        /// The feedback phase lacking an engine.
        phase: Phase,
    },

    /// The database content cannot be placed.
    #[error("invalid design: {0}")]
    InvalidDesign(String),
}

impl PlaceError {
    pub(crate) fn engine(phase: Phase, err: EngineError) -> Self {
        PlaceError::ExternalEngine {
            phase,
            message: err.message,
        }
    }
}

/// Result alias used throughout the engine.
pub type PlaceResult<T> = Result<T, PlaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_external_engine() {
        let err = PlaceError::engine(Phase::Routability, EngineError::new("grid mismatch"));
        assert_eq!(format!("{err}"), "routability engine failed: grid mismatch");
    }

    #[test]
    fn display_missing_engine() {
        let err = PlaceError::MissingEngine {
            phase: Phase::Timing,
        };
        assert_eq!(
            format!("{err}"),
            "timing-driven mode is enabled but no timing engine was provided"
        );
    }

    #[test]
    fn config_error_converts() {
        let err: PlaceError = ConfigError::out_of_range("nesterov.target_density", 0, "(0, 1]").into();
        assert!(matches!(err, PlaceError::Config(ConfigError::OutOfRange { .. })));
    }
}
