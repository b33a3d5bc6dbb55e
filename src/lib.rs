//! knowledge-extractor - document topic modelling service
//!
//! Fetches raw legal documents, extracts their paragraph text, trains an
//! additive regularized topic model per search and maps the documents onto
//! the plane for visualization.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`loader`] - Raw document fetching, paragraph extraction and storage
//! - [`text`] - Token normalization for modelling
//! - [`model`] - Topic model training, topic profiles and MDS
//! - [`service`] - HTTP API and the model registry
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use knowledge_extractor::config::Config;
//! use knowledge_extractor::loader::{DocumentFetcher, DocumentLoader, DocumentStore};
//! use knowledge_extractor::model::TopicModel;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = DocumentStore::new(&config.storage.documents_dir);
//!     let fetcher = DocumentFetcher::with_config(&config.loader)?;
//!     let loader = DocumentLoader::new(Arc::new(fetcher), store.clone(), 4);
//!
//!     let guids = vec!["I0f07d129334911d98b61a35269fc5f88".to_string()];
//!     loader.load(&guids).await;
//!
//!     let model = TopicModel::new("search-1", guids, config.model.clone());
//!     let trained = model.train(&store, &config.storage.work_dir)?;
//!     println!("{:?}", trained.top_words(5));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod service;
pub mod text;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::loader::{DocumentFetcher, DocumentLoader, DocumentSource, DocumentStore};
    pub use crate::model::{ArtmConfig, DocumentPoint, ModelState, TopicModel, TrainedModel};
    pub use crate::service::{ModelRegistry, TopicServer};
}

pub use model::{DocumentPoint, ModelState};
