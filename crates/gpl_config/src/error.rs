//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating a placer configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A field holds a value outside its accepted range.
    #[error("configuration field `{field}` has invalid value {value} (expected {expected})")]
    OutOfRange {
        /// Dotted path of the offending field, e.g. `nesterov.target_density`.
        field: String,
        /// The rejected value, rendered as text.
        value: String,
        /// Human-readable description of the accepted range.
        expected: String,
    },
}

impl ConfigError {
    /// Builds an [`OutOfRange`](ConfigError::OutOfRange) error.
    pub fn out_of_range(
        field: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        ConfigError::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Returns the offending field name for range errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::OutOfRange { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_out_of_range() {
        let err = ConfigError::out_of_range("nesterov.target_density", 1.5, "a value in (0, 1]");
        assert_eq!(
            format!("{err}"),
            "configuration field `nesterov.target_density` has invalid value 1.5 (expected a value in (0, 1])"
        );
        assert_eq!(err.field(), Some("nesterov.target_density"));
    }

    #[test]
    fn display_parse_error() {
        let err = ConfigError::ParseError("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
        assert!(err.field().is_none());
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        let display = format!("{err}");
        assert!(display.starts_with("failed to read configuration:"));
    }
}
