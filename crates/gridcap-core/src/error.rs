//! Error type shared by the gridcap crates.
//!
//! Library boundaries return [`GridCapResult`]; the I/O crate and the CLI use
//! `anyhow` internally and convert at the edges.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridCapError {
    /// I/O errors (missing case file, unreadable config, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Case or config parsing errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Hard solver failures (non-convergence is not reported this way)
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network structure errors (unknown bus, duplicate element, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// The base case did not converge; carries the violation flags
    #[error("The base case has {0}")]
    BaseCase(String),

    #[error("{0}")]
    Other(String),
}

pub type GridCapResult<T> = Result<T, GridCapError>;

impl From<anyhow::Error> for GridCapError {
    fn from(err: anyhow::Error) -> Self {
        // keep NotFound and friends observable through the chain
        match err.downcast::<std::io::Error>() {
            Ok(io) => GridCapError::Io(io),
            Err(err) => GridCapError::Other(format!("{err:#}")),
        }
    }
}

impl From<String> for GridCapError {
    fn from(s: String) -> Self {
        GridCapError::Other(s)
    }
}

impl From<&str> for GridCapError {
    fn from(s: &str) -> Self {
        GridCapError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for GridCapError {
    fn from(err: serde_json::Error) -> Self {
        GridCapError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GridCapError::Solver("singular B' matrix".into());
        assert!(err.to_string().contains("Solver error"));
        assert!(err.to_string().contains("singular"));
    }

    #[test]
    fn test_base_case_error_names_flags() {
        let err = GridCapError::BaseCase("NOT_CONVERGED".into());
        assert_eq!(err.to_string(), "The base case has NOT_CONVERGED");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "case not found");
        let err: GridCapError = io_err.into();
        assert!(matches!(err, GridCapError::Io(_)));
    }

    #[test]
    fn test_anyhow_io_error_keeps_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "case not found");
        let err: GridCapError = anyhow::Error::new(io_err).into();
        match err {
            GridCapError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_anyhow_other_error_keeps_context() {
        let err: GridCapError = anyhow::anyhow!("bad row")
            .context("parsing case")
            .into();
        let msg = err.to_string();
        assert!(msg.contains("parsing case"));
        assert!(msg.contains("bad row"));
    }
}
