//! Error types for query compilation and result mapping.

use thiserror::Error;

/// Search error type.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Invalid builder or mapper configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend or network failure reported by a transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A record could not be built from a hit's fields.
    #[error("Hydration error: {0}")]
    Hydration(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client error from opensearch crate.
    #[error("Client error: {0}")]
    Client(#[from] opensearch::Error),
}

impl SearchError {
    /// Shorthand for [`SearchError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        SearchError::Config(message.into())
    }

    /// Shorthand for [`SearchError::Hydration`].
    pub fn hydration(message: impl Into<String>) -> Self {
        SearchError::Hydration(message.into())
    }

    /// Whether the error came from the transport layer.
    pub fn is_transport(&self) -> bool {
        matches!(self, SearchError::Transport(_) | SearchError::Client(_))
    }
}

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
