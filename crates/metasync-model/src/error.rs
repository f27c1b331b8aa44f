//! Error types reported by metadata system clients

/// Result type for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors a metadata system client can report
///
/// Not-found is its own variant so callers can treat a vanished entity as a
/// delete or recreate signal rather than a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The addressed entity does not exist
    #[error("entity not found: {key}")]
    NotFound { key: String },

    /// The caller is not allowed to perform the operation
    #[error("not authorized to {operation}")]
    Unauthorized { operation: String },

    /// Timeout, connection loss or a server-side failure
    #[error("communication failure: {message}")]
    Transient { message: String },

    /// The request was understood but refused (validation, conflict)
    #[error("request rejected: {message}")]
    Rejected { message: String },
}

impl ClientError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn unauthorized(operation: impl Into<String>) -> Self {
        Self::Unauthorized {
            operation: operation.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Whether this error means the entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether retrying on a later sweep may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct_from_other_failures() {
        assert!(ClientError::not_found("db1").is_not_found());
        assert!(!ClientError::transient("timeout").is_not_found());
        assert!(!ClientError::unauthorized("delete db1").is_not_found());
    }

    #[test]
    fn display_includes_detail() {
        let err = ClientError::unauthorized("update table t1");
        assert_eq!(err.to_string(), "not authorized to update table t1");
    }
}
