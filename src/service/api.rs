//! REST API handlers for the topic modelling service
//!
//! This module defines the API routes and handlers.

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::model::{DocumentPoint, ModelState, TopicModel};

use super::registry::{Registration, RegistryStats};
use super::server::AppState;

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Document reference in a topic model request
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRef {
    #[serde(rename = "docGuid")]
    pub doc_guid: String,
}

/// Body of `POST /topic_model`
#[derive(Debug, Deserialize)]
pub struct TopicModelRequest {
    pub search_guid: Option<String>,
    #[serde(default)]
    pub documents: Option<Vec<DocumentRef>>,
}

/// Body of `POST /topic_model_status`
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub search_guid: Option<String>,
}

/// Topic model state, with results once trained
#[derive(Debug, Serialize)]
pub struct TopicModelResponse {
    pub search_guid: String,
    pub state: ModelState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_doc_guids: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<DocumentPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<BTreeMap<String, Vec<String>>>,
}

impl TopicModelResponse {
    fn state(search_guid: String, state: ModelState) -> Self {
        Self {
            search_guid,
            state,
            num_doc_guids: None,
            documents: None,
            topics: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub models: RegistryStats,
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Topic model endpoints
        .route("/topic_model", post(topic_model))
        .route("/topic_model_status", post(topic_model_status))
        // Operational endpoints
        .route("/api/health", get(health_check))
        .route("/metrics", get(metrics))
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
}

async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |p| p.as_str().to_string());
    let started = Instant::now();

    let response = next.run(request).await;

    crate::metrics::record_api_request(
        &endpoint,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

// ============================================================================
// Topic Model Handlers
// ============================================================================

/// Submit a search for topic modelling, or fetch its results
async fn topic_model(
    State(state): State<AppState>,
    Json(request): Json<TopicModelRequest>,
) -> Response {
    let Some(search_guid) = request.search_guid.filter(|s| !s.trim().is_empty()) else {
        return bad_request("search_guid is required");
    };

    match state.registry.state(&search_guid).await {
        ModelState::NotTrained => {}
        ModelState::Trained => return trained_response(&state, search_guid).await,
        other => return Json(TopicModelResponse::state(search_guid, other)).into_response(),
    }

    let Some(documents) = request.documents else {
        return bad_request("documents are required");
    };

    let num_doc_guids = documents.len();
    let model = TopicModel::new(
        search_guid.clone(),
        documents.into_iter().map(|d| d.doc_guid),
        state.model_config.clone(),
    );

    match state.registry.register(model).await {
        Registration::Created(model) => {
            tracing::info!(
                search_guid = %search_guid,
                documents = num_doc_guids,
                "Topic model registered"
            );
            state.spawn_training(model);

            Json(TopicModelResponse {
                num_doc_guids: Some(num_doc_guids),
                ..TopicModelResponse::state(search_guid, ModelState::Training)
            })
            .into_response()
        }
        Registration::Existing(record) => match record.state {
            ModelState::Trained => trained_response(&state, search_guid).await,
            other => Json(TopicModelResponse::state(search_guid, other)).into_response(),
        },
    }
}

async fn trained_response(state: &AppState, search_guid: String) -> Response {
    match state.registry.trained(&search_guid).await {
        Some(trained) => Json(TopicModelResponse {
            documents: Some(trained.topic_profile().to_vec()),
            topics: Some(trained.top_words(state.model_config.top_tokens)),
            ..TopicModelResponse::state(search_guid, ModelState::Trained)
        })
        .into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("trained model is missing its results")),
        )
            .into_response(),
    }
}

/// Report the state of a search's model
async fn topic_model_status(
    State(state): State<AppState>,
    Json(request): Json<StatusRequest>,
) -> Response {
    let Some(search_guid) = request.search_guid.filter(|s| !s.trim().is_empty()) else {
        return bad_request("search_guid is required");
    };

    let model_state = state.registry.state(&search_guid).await;
    Json(TopicModelResponse::state(search_guid, model_state)).into_response()
}

// ============================================================================
// Operational Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        models: state.registry.stats().await,
    })
}

/// Prometheus text exposition
async fn metrics() -> Response {
    match crate::metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
    }
}

// ============================================================================
// Tests
// ============================================================================
