//! Integration tests for the topic modelling API
//!
//! The router is driven with `tower::ServiceExt::oneshot` against an
//! in-memory document source.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use knowledge_extractor::service::TopicServer;

use common::{opinion_xml, service_config, MemorySource};

fn corpus_source() -> MemorySource {
    MemorySource::new(&[
        (
            "d1",
            opinion_xml(
                "The court reviewed the appeal and the judgment below.",
                "The appellate court affirmed the judgment on appeal.",
            ),
        ),
        (
            "d2",
            opinion_xml(
                "The contract was breached and damages were awarded.",
                "Breach of contract damages include lost profits.",
            ),
        ),
        (
            "d3",
            opinion_xml(
                "The appeal challenged the court's judgment.",
                "Contract damages were not at issue on appeal.",
            ),
        ),
    ])
}

fn router(dir: &TempDir, source: MemorySource) -> Router {
    TopicServer::with_source(service_config(dir.path()), Arc::new(source)).build_router()
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn wait_for_state(router: &Router, search_guid: &str, wanted: &str) -> Value {
    for _ in 0..200 {
        let (_, body) = post(router, "/topic_model_status", json!({ "search_guid": search_guid })).await;
        if body["state"] == wanted {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("search {search_guid} never reached {wanted}");
}

#[tokio::test]
async fn test_unknown_search_is_not_trained() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, corpus_source());

    let (status, body) = post(&router, "/topic_model_status", json!({ "search_guid": "s0" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "search_guid": "s0", "state": "MODEL_NOT_TRAINED" }));
}

#[tokio::test]
async fn test_missing_search_guid_is_rejected() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, corpus_source());

    let (status, _) = post(&router, "/topic_model", json!({ "documents": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&router, "/topic_model_status", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_documents_on_first_submission() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, corpus_source());

    let (status, _) = post(&router, "/topic_model", json!({ "search_guid": "s1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = post(&router, "/topic_model_status", json!({ "search_guid": "s1" })).await;
    assert_eq!(body["state"], "MODEL_NOT_TRAINED");
}

#[tokio::test]
async fn test_submit_train_and_fetch_results() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, corpus_source());

    let request = json!({
        "search_guid": "s2",
        "documents": [
            { "docGuid": "d1", "title": "Appeal" },
            { "docGuid": "d2" },
            { "docGuid": "d3" },
            { "docGuid": "d2" }
        ]
    });

    let (status, body) = post(&router, "/topic_model", request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["search_guid"], "s2");
    assert_eq!(body["state"], "MODEL_TRAINING");
    assert_eq!(body["num_doc_guids"], 4);

    wait_for_state(&router, "s2", "MODEL_TRAINED").await;

    let (status, body) = post(&router, "/topic_model", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "MODEL_TRAINED");

    let documents = body["documents"].as_array().unwrap();
    let guids: Vec<&str> = documents
        .iter()
        .map(|d| d["doc_guid"].as_str().unwrap())
        .collect();
    assert_eq!(guids, vec!["d1", "d2", "d3"]);
    assert_eq!(
        documents[0]["description"],
        "I.  The court reviewed the appeal and the judgment below."
    );
    assert!(documents.iter().all(|d| d["x"].is_number() && d["y"].is_number()));

    let topics = body["topics"].as_object().unwrap();
    assert_eq!(topics.len(), 3);
    assert!(topics.contains_key("bcg"));
    assert!(topics.contains_key("sbj0"));

    assert!(dir.path().join("bigARTM").join("ALL_TEXT_s2.txt").is_file());
}

#[tokio::test]
async fn test_training_without_documents_fails() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, corpus_source());

    let request = json!({ "search_guid": "s3", "documents": [{ "docGuid": "nope" }] });
    let (_, body) = post(&router, "/topic_model", request.clone()).await;
    assert_eq!(body["state"], "MODEL_TRAINING");

    wait_for_state(&router, "s3", "MODEL_FAILED").await;

    let (status, body) = post(&router, "/topic_model", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "search_guid": "s3", "state": "MODEL_FAILED" }));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, corpus_source());

    let response = router
        .clone()
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["models"]["total_models"], 0);

    let response = router
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_allow_list() {
    let dir = TempDir::new().unwrap();
    let router = router(&dir, corpus_source());

    let allowed = Request::builder()
        .method("POST")
        .uri("/topic_model_status")
        .header(header::ORIGIN, "https://1.next.qed.westlaw.com")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"search_guid":"s"}"#))
        .unwrap();
    let response = router.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://1.next.qed.westlaw.com"
    );

    let denied = Request::builder()
        .method("POST")
        .uri("/topic_model_status")
        .header(header::ORIGIN, "https://evil.example.com")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"search_guid":"s"}"#))
        .unwrap();
    let response = router.oneshot(denied).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
