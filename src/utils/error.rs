//! Error types for the knowledge extractor
//!
//! This module defines the domain-specific error types used throughout the application.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while fetching raw documents
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether another attempt could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout | Self::Http(_) => true,
            Self::ServerError(status) => *status == 429 || (500..600).contains(status),
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Errors raised by the paragraph extractor
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The document is not well-formed XML
    #[error("Malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },
}

/// Errors raised by the on-disk document store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not create the store directory
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read a stored document
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write a stored document
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while preparing or training a topic model
#[derive(Error, Debug)]
pub enum ModelError {
    /// None of the requested documents had any text
    #[error("No documents with text for search {0}")]
    EmptyCorpus(String),

    /// Invalid model parameters
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    /// A line of the Vowpal Wabbit file could not be parsed
    #[error("Malformed Vowpal Wabbit line {line}: {reason}")]
    Vowpal { line: usize, reason: String },

    /// Store access failed during training
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Work directory I/O failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
