//! Error types and result aliases shared across Ensemble crates.
//!
//! These errors describe failures of the coordination store and of ambient
//! plumbing such as configuration. Topology-level failures live in
//! `ensemble-topology`.

/// The result type used throughout `ensemble-core`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in core Ensemble operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A storage operation failed (connectivity, permission, backend fault).
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if the error came from the storage layer itself.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = Error::storage_with_source("read /topology", io);

        assert!(err.is_storage());
        assert_eq!(err.to_string(), "storage error: read /topology");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("reset by peer"));
    }

    #[test]
    fn invalid_input_is_not_storage() {
        let err = Error::InvalidInput("bad".into());
        assert!(!err.is_storage());
        assert_eq!(err.to_string(), "invalid input: bad");
    }
}
