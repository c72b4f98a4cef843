//! Error types for the administration library.

use thiserror::Error;

/// Main error type for administration and tracking operations.
#[derive(Error, Debug)]
pub enum AdminError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected input: bad identifier, disallowed data type, non-positive
    /// row limit, unknown tracked column, malformed column display text.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A row selected for tracking no longer exists on the server.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any failure reported by SQL Server (permission, constraint, protocol).
    #[error("Server error: {0}")]
    Backend(#[from] tiberius::error::Error),

    /// Opening a scoped connection failed before the server answered.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdminError {
    /// Create a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        AdminError::Validation(message.into())
    }

    /// Create a Connection error with context about where it occurred.
    pub fn connection(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        AdminError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// True for errors produced by the server or the network path to it.
    pub fn is_backend(&self) -> bool {
        matches!(self, AdminError::Backend(_) | AdminError::Connection { .. })
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            AdminError::Config(_) | AdminError::Yaml(_) => 1,
            AdminError::Validation(_) => 2,
            AdminError::NotFound(_) => 3,
            AdminError::Backend(_) | AdminError::Connection { .. } => 4,
            AdminError::Json(_) => 5,
            AdminError::Io(_) => 7,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for administration operations.
pub type Result<T> = std::result::Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AdminError::Config("x".into()).exit_code(), 1);
        assert_eq!(AdminError::validation("x").exit_code(), 2);
        assert_eq!(AdminError::NotFound("x".into()).exit_code(), 3);
        assert_eq!(AdminError::connection("refused", "opening scope").exit_code(), 4);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(AdminError::from(io).exit_code(), 7);
    }

    #[test]
    fn test_connection_error_is_backend() {
        assert!(AdminError::connection("refused", "opening scope").is_backend());
        assert!(!AdminError::validation("bad").is_backend());
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml missing");
        let err = AdminError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
        assert!(detailed.contains("config.yaml missing"));
    }
}
