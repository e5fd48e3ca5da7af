//! REST API endpoint tests (tower test utilities, no server needed).

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use fedqp::backend::BackendPools;
use fedqp::execution::engine::EngineConfig;
use fedqp::protocol::rest::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn test_state(config_file: std::path::PathBuf) -> Arc<AppState> {
    Arc::new(AppState::new(
        config_file,
        Arc::new(BackendPools::new()),
        Arc::new(EngineConfig {
            queue_depth: 64,
            bind_join_raised_limit: 10_000,
        }),
        None,
    ))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn sample_federation() -> Value {
    json!({
        "fedId": "f1",
        "name": "test-federation",
        "desc": "",
        "sources": {
            "src1": {
                "id": "src1",
                "url": "http://example.org/sparql",
                "kind": "sparql_endpoint",
                "params": {},
                "mapping_ids": [],
            }
        },
        "rdfmts": [
            {
                "mt_id": "http://example.org/Person",
                "label": "Person",
                "cardinality": 0,
                "subclass_of": [],
                "predicates": {
                    "http://example.org/name": {
                        "pred_id": "http://example.org/name",
                        "label": "name",
                        "cardinality": 0,
                        "ranges": ["http://www.w3.org/2001/XMLSchema#string"]
                    }
                },
                "datasources": ["src1"],
                "predicate_sources": {
                    "src1": ["http://example.org/name"]
                },
                "predicate_rml_sources": {},
                "instance_prefixes": [],
                "mapping_ids": {}
            }
        ],
    })
}

#[tokio::test]
async fn inspect_reports_null_federation_before_any_configure() {
    let dir = TempDir::new().unwrap();
    let state = test_state(dir.path().join("federation.json"));
    let app = router(state);

    let response = app
        .oneshot(Request::builder().uri("/inspect").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["federation"].is_null());
}

#[tokio::test]
async fn configure_then_inspect_round_trips_the_federation() {
    let dir = TempDir::new().unwrap();
    let state = test_state(dir.path().join("federation.json"));
    let app = router(state);

    let payload = json!({ "federation": sample_federation() });
    let configure_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/configure")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(configure_response.status(), StatusCode::OK);
    let configure_body = body_json(configure_response).await;
    assert_eq!(configure_body["status"], true);

    let inspect_response = app
        .oneshot(Request::builder().uri("/inspect").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let inspect_body = body_json(inspect_response).await;
    assert_eq!(inspect_body["federation"]["fedId"], "f1");
    assert_eq!(inspect_body["federation"]["sources"]["src1"]["kind"], "sparql_endpoint");
}

#[tokio::test]
async fn configure_with_malformed_payload_reports_error_without_crashing() {
    let dir = TempDir::new().unwrap();
    let state = test_state(dir.path().join("federation.json"));
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/configure")
                .header("content-type", "application/json")
                .body(Body::from("not json at all"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn sparql_without_active_federation_reports_error() {
    let dir = TempDir::new().unwrap();
    let state = test_state(dir.path().join("federation.json"));
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/sparql?query=SELECT%20*%20WHERE%20%7B%7D")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn sparql_select_star_with_empty_bgp_yields_one_empty_binding() {
    let dir = TempDir::new().unwrap();
    let state = test_state(dir.path().join("federation.json"));

    let payload = json!({ "federation": sample_federation() });
    let configure = router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/configure")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(configure.status(), StatusCode::OK);

    // `state` is an `Arc`; a second `Router` built over the same clone
    // observes the federation just installed by `/configure`.
    let response = router(state)
        .oneshot(
            Request::builder()
                .uri("/sparql?query=SELECT%20*%20WHERE%20%7B%7D")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "All results retrieved");
    assert_eq!(body["results"]["bindings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn sparql_unknown_type_yields_zero_bindings() {
    let dir = TempDir::new().unwrap();
    let state = test_state(dir.path().join("federation.json"));
    let app = router(state.clone());

    let payload = json!({ "federation": sample_federation() });
    let configure = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/configure")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(configure.status(), StatusCode::OK);

    let app2 = router(state);
    let query = "SELECT ?s WHERE { ?s a <http://example.org/NoSuchClass> }";
    let response = app2
        .oneshot(
            Request::builder()
                .uri(format!("/sparql?query={}", urlencoding_minimal(query)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["results"]["bindings"].as_array().unwrap().len(), 0);
}

/// Minimal percent-encoding for the handful of characters SPARQL queries
/// contain in these tests; avoids pulling in a query-string-builder crate
/// just for test fixtures.
fn urlencoding_minimal(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '{' => "%7B".to_string(),
            '}' => "%7D".to_string(),
            '<' => "%3C".to_string(),
            '>' => "%3E".to_string(),
            ';' => "%3B".to_string(),
            c => c.to_string(),
        })
        .collect()
}
