//! Error types for metasync-core

use std::path::PathBuf;

use metasync_model::{ClientError, Side};
use serde::{Deserialize, Serialize};

/// Result type for metasync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconciling
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Entity vanished between enumeration and fetch, or a correlation
    /// target was deleted
    #[error("{side} entity not found: {key}")]
    NotFound { side: Side, key: String },

    /// The caller lacks permission on one of the systems
    #[error("not authorized on {side}: {operation}")]
    Unauthorized { side: Side, operation: String },

    /// Timeout or server-side failure; retried on the next sweep
    #[error("communication failure with {side}: {message}")]
    Transient { side: Side, message: String },

    /// The system refused the request
    #[error("{side} rejected the request: {message}")]
    Rejected { side: Side, message: String },

    /// A correlation record was expected and not found
    #[error("correlation record missing for {key}")]
    MissingCorrelation { key: String },

    /// A second record would correlate an already correlated key
    #[error("{destination_key} is already correlated with {existing_source_key}, cannot link {source_key}")]
    DuplicateCorrelation {
        source_key: String,
        destination_key: String,
        existing_source_key: String,
    },

    /// Configuration is invalid or names something that does not exist
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Another sweep already holds this engine
    #[error("a sweep of {scope} is already in progress")]
    SweepInProgress { scope: String },

    /// Correlation store failure
    #[error("Correlation store error: {message}")]
    Store { message: String },

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}

/// Coarse classification used in sweep reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Transient,
    Rejected,
    MissingCorrelation,
    Configuration,
    Internal,
}

impl Error {
    /// Attach the side a client error came from
    pub fn from_client(side: Side, err: ClientError) -> Self {
        match err {
            ClientError::NotFound { key } => Error::NotFound { side, key },
            ClientError::Unauthorized { operation } => Error::Unauthorized { side, operation },
            ClientError::Transient { message } => Error::Transient { side, message },
            ClientError::Rejected { message } => Error::Rejected { side, message },
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Error::Store {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::Transient { .. } => ErrorKind::Transient,
            Error::Rejected { .. } => ErrorKind::Rejected,
            Error::MissingCorrelation { .. } => ErrorKind::MissingCorrelation,
            Error::Configuration { .. } | Error::ConfigNotFound { .. } => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::Internal,
        }
    }

    /// System the error came from, for client errors
    pub fn side(&self) -> Option<Side> {
        match self {
            Error::NotFound { side, .. }
            | Error::Unauthorized { side, .. }
            | Error::Transient { side, .. }
            | Error::Rejected { side, .. } => Some(*side),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether the error aborts a whole sweep rather than one entity
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// Extension to tag client results with the side they came from
pub(crate) trait ClientResultExt<T> {
    fn on(self, side: Side) -> Result<T>;
}

impl<T> ClientResultExt<T> for std::result::Result<T, ClientError> {
    fn on(self, side: Side) -> Result<T> {
        self.map_err(|e| Error::from_client(side, e))
    }
}
