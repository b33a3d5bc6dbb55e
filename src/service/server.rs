//! Topic modelling server
//!
//! Owns the shared state, builds the router with its CORS and tracing
//! layers, and runs background training jobs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderValue;
use axum::Router;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::loader::{DocumentFetcher, DocumentLoader, DocumentSource, DocumentStore};
use crate::model::{ArtmConfig, TopicModel};

use super::api::create_router;
use super::registry::ModelRegistry;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Topic models by search GUID
    pub registry: ModelRegistry,

    /// Document loader used by training jobs
    pub loader: Arc<DocumentLoader>,

    /// Directory for Vowpal Wabbit collections
    pub work_dir: PathBuf,

    /// Hyper-parameters for new models
    pub model_config: ArtmConfig,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Build state around an arbitrary document source
    pub fn new(config: &Config, source: Arc<dyn DocumentSource>) -> Self {
        let loader = DocumentLoader::new(
            source,
            DocumentStore::new(&config.storage.documents_dir),
            config.loader.max_concurrent_requests,
        );

        Self {
            registry: ModelRegistry::new(),
            loader: Arc::new(loader),
            work_dir: config.storage.work_dir.clone(),
            model_config: config.model.clone(),
            start_time: Instant::now(),
        }
    }

    /// Load and train `model` in the background
    pub fn spawn_training(&self, model: Arc<TopicModel>) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move { state.run_training(model).await })
    }

    async fn run_training(&self, model: Arc<TopicModel>) {
        let search_guid = model.search_guid().to_string();
        let started = Instant::now();

        let report = self.loader.load(model.doc_guids()).await;
        tracing::info!(
            search_guid = %search_guid,
            available = report.available(),
            failed = report.failed.len(),
            "Documents ready for training"
        );

        let store = self.loader.store().clone();
        let work_dir = self.work_dir.clone();
        let job = model.clone();
        let result = tokio::task::spawn_blocking(move || job.train(&store, &work_dir)).await;

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(Ok(trained)) => {
                crate::metrics::record_training(true, elapsed);
                self.registry.complete(&search_guid, trained).await;
                tracing::info!(search_guid = %search_guid, "Topic model ready");
            }
            Ok(Err(e)) => {
                crate::metrics::record_training(false, elapsed);
                tracing::error!(search_guid = %search_guid, error = %e, "Topic model training failed");
                self.registry.fail(&search_guid, e.to_string()).await;
            }
            Err(e) => {
                crate::metrics::record_training(false, elapsed);
                tracing::error!(search_guid = %search_guid, error = %e, "Training task aborted");
                self.registry.fail(&search_guid, format!("training task aborted: {e}")).await;
            }
        }
    }
}

// ============================================================================
// Topic Server
// ============================================================================

/// Main API server
pub struct TopicServer {
    config: Config,
    state: AppState,
}

impl TopicServer {
    /// Create a server that fetches documents over HTTP
    pub fn new(config: Config) -> Result<Self, ServerError> {
        config.validate().map_err(|e| ServerError::Config(e.to_string()))?;

        let fetcher = DocumentFetcher::with_config(&config.loader)
            .map_err(|e| ServerError::Init(e.to_string()))?;

        Ok(Self::with_source(config, Arc::new(fetcher)))
    }

    /// Create a server reading documents from `source`
    pub fn with_source(config: Config, source: Arc<dyn DocumentSource>) -> Self {
        let state = AppState::new(&config, source);
        Self { config, state }
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone()).layer(self.cors_layer());

        // Add tracing layer if enabled
        if self.config.server.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .config
            .server
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = &self.config.server.bind_address;

        tracing::info!("Starting topic modelling API on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Topic modelling API shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone, Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),

    /// Failed to bind to address
    #[error("Failed to bind: {0}")]
    Bind(String),

    /// Server error
    #[error("Server error: {0}")]
    Serve(String),
}

// ============================================================================
// Tests
// ============================================================================
