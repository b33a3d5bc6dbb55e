//! Unified error handling for the knowledge extractor
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use knowledge_extractor::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying: {err}");
//!     } else {
//!         eprintln!("Fatal error ({:?}): {err}", err.category());
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::utils::error::{ExtractError, FetchError, ModelError, StoreError};

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout)
    Network,
    /// XML parsing and data extraction errors
    Parsing,
    /// Storage and I/O errors
    Storage,
    /// Topic model preparation and training errors
    Model,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Parsing => "parsing error",
            Self::Storage => "storage error",
            Self::Model => "model error",
            Self::Config => "configuration error",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the knowledge extractor
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Paragraph extraction errors
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Document store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Topic model errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Extract(_) => false,
            Self::Store(_) => true,
            Self::Model(_) => false,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Extract(_) | Self::Json(_) => ErrorCategory::Parsing,
            Self::Store(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Model(ModelError::Store(_) | ModelError::Io { .. }) => ErrorCategory::Storage,
            Self::Model(ModelError::InvalidConfig(_)) | Self::Config(_) => ErrorCategory::Config,
            Self::Model(_) => ErrorCategory::Model,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let fetch_err = Error::Fetch(FetchError::Timeout);
        assert_eq!(fetch_err.category(), ErrorCategory::Network);

        let extract_err = Error::Extract(ExtractError::Malformed {
            position: 3,
            message: "unexpected end".into(),
        });
        assert_eq!(extract_err.category(), ErrorCategory::Parsing);

        let model_err = Error::Model(ModelError::EmptyCorpus("s1".into()));
        assert_eq!(model_err.category(), ErrorCategory::Model);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::Fetch(FetchError::Timeout).is_recoverable());
        assert!(Error::Fetch(FetchError::ServerError(503)).is_recoverable());
        assert!(Error::Fetch(FetchError::ServerError(429)).is_recoverable());
        assert!(Error::Fetch(FetchError::ServerError(501)).is_recoverable());
        assert!(Error::Fetch(FetchError::ServerError(507)).is_recoverable());
        assert!(!Error::Fetch(FetchError::ServerError(404)).is_recoverable());
        assert!(!Error::Fetch(FetchError::ServerError(600)).is_recoverable());
        assert!(!Error::Model(ModelError::EmptyCorpus("s1".into())).is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let unified: Error = ModelError::EmptyCorpus("s1".into()).into();
        assert!(matches!(unified, Error::Model(_)));
        assert_eq!(unified.to_string(), "Model error: No documents with text for search s1");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("num_topics must be at least 2");
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_recoverable());
        assert_eq!(err.category().label(), "configuration error");
    }

    #[test]
    fn test_other_error() {
        let err = Error::other("Something went wrong");
        assert_eq!(err.category(), ErrorCategory::Other);
    }
}
