//! HTTP API for topic modelling
//!
//! Clients submit a search GUID with its document GUIDs, poll for the model
//! state and fetch the trained topics and document coordinates.
//!
//! # Example
//!
//! ```no_run
//! use knowledge_extractor::config::Config;
//! use knowledge_extractor::service::TopicServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = TopicServer::new(Config::default())?;
//!     server.start_with_shutdown(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod registry;
pub mod server;

pub use api::create_router;
pub use registry::{ModelRecord, ModelRegistry, Registration, RegistryStats};
pub use server::{AppState, ServerError, TopicServer};
