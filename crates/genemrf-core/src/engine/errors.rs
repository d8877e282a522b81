//! Error types for genemrf inference and table handling.

use thiserror::Error;

/// Errors that can occur while loading inputs, validating configuration, or
/// running inference.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// All public APIs return `Result<T, GeneMrfError>` rather than panicking in
/// library code. Inference is deterministic, so none of these are retried.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GeneMrfError {
    /// Underlying file or stream failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input table or document (e.g., non-numeric observed state).
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration or input value (e.g., negative `mu`, state outside {-1, 0, 1}).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Numerical stability error (NaN/Inf in messages or beliefs).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// A run was stopped by its cancellation flag or deadline.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Internal error (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<csv::Error> for GeneMrfError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(io) => GeneMrfError::Io(io),
                other => GeneMrfError::Parse(format!("{:?}", other)),
            }
        } else {
            GeneMrfError::Parse(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GeneMrfError {
    fn from(err: serde_json::Error) -> Self {
        GeneMrfError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_category_prefix() {
        let err = GeneMrfError::ValidationError("mu must be finite".into());
        assert_eq!(err.to_string(), "validation error: mu must be finite");

        let err = GeneMrfError::Cancelled("deadline exceeded".into());
        assert!(err.to_string().starts_with("cancelled:"));
    }

    #[test]
    fn json_errors_map_to_parse() {
        let err: GeneMrfError = serde_json::from_str::<Vec<String>>("{")
            .expect_err("invalid json")
            .into();
        assert!(matches!(err, GeneMrfError::Parse(_)));
    }
}
