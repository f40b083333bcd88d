//! HTTP API tests against the in-memory claim store

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use domain_claims::ports::mock::MockClaimStore;
use domain_claims::ClaimStore;
use interface_api::auth::{create_token, permissions};
use interface_api::config::ApiConfig;
use interface_api::create_router;
use test_utils::{ClaimFixtures, COMMA_DELIMITED_CSV, ONE_BAD_ROW_CSV, SINGLE_CLAIM_CSV};

const BOUNDARY: &str = "claims-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<MockClaimStore>,
    config: ApiConfig,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_store(MockClaimStore::new()).await
    }

    async fn with_store(store: MockClaimStore) -> Self {
        let config = ApiConfig {
            jwt_secret: "api-test-secret".to_string(),
            ..ApiConfig::default()
        };
        let store = Arc::new(store);
        let router = create_router(store.clone() as Arc<dyn ClaimStore>, config.clone());
        Self { router, store, config }
    }

    fn token(&self, roles: &[&str]) -> String {
        let roles = roles.iter().map(|r| r.to_string()).collect();
        create_token("alice", roles, &self.config.jwt_secret, 60).unwrap()
    }

    fn admin(&self) -> String {
        self.token(&[permissions::DATA_ADMIN])
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn import(&self, file: &str, filename: &str, mode: &str) -> (StatusCode, Value) {
        let body = MultipartBody::new()
            .file("file", filename, file.as_bytes())
            .text("mode", mode)
            .finish();
        self.json(upload(&self.admin(), body)).await
    }
}

/// Hand-built multipart/form-data body
struct MultipartBody(Vec<u8>);

impl MultipartBody {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
        self.0.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.0.extend_from_slice(content);
        self.0.extend_from_slice(b"\r\n");
        self
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.0.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
        self
    }

    fn finish(mut self) -> Vec<u8> {
        self.0.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.0
    }
}

fn upload(token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/data/import")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: Method, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let request = Request::builder().uri("/health/ready").body(Body::empty()).unwrap();
    let (status, body) = app.json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;
    let request = Request::builder().uri("/api/v1/claims").body(Body::empty()).unwrap();
    let (status, body) = app.json(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_data_routes_require_admin() {
    let app = TestApp::new().await;
    let viewer = app.token(&["viewer"]);
    let (status, _) = app.json(get("/api/v1/data/stats", &viewer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.json(get("/api/v1/claims", &viewer)).await;
    assert_eq!(status, StatusCode::OK);

    let root = app.token(&[permissions::ADMIN]);
    let (status, _) = app.json(get("/api/v1/data/stats", &root)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = TestApp::new().await;
    let (_, headers, _) = app.send(get("/api/v1/claims", &app.admin())).await;
    assert!(headers.contains_key("x-request-id"));
}

// ============================================================================
// Import
// ============================================================================

#[tokio::test]
async fn test_import_add_then_duplicate() {
    let app = TestApp::new().await;

    let (status, report) = app.import(SINGLE_CLAIM_CSV, "claims.csv", "add").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["claims_inserted"], 1);
    assert_eq!(report["rejected"], 0);

    let (status, report) = app.import(SINGLE_CLAIM_CSV, "claims.csv", "add").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["claims_inserted"], 0);
    assert_eq!(report["rejected"], 1);
    assert_eq!(report["errors"][0]["claim_id"], 99001);

    let (_, stats) = app.json(get("/api/v1/data/stats", &app.admin())).await;
    assert_eq!(stats["claims"], 1);
}

#[tokio::test]
async fn test_import_reports_malformed_row() {
    let app = TestApp::new().await;
    let (status, report) = app.import(ONE_BAD_ROW_CSV, "claims.csv", "add").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["claims_inserted"], 2);
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);
    assert_eq!(report["errors"][0]["row"], 2);
}

#[tokio::test]
async fn test_wrong_delimiter_is_format_error() {
    let app = TestApp::new().await;
    let (status, body) = app.import(COMMA_DELIMITED_CSV, "claims.csv", "add").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "format_error");
    assert_eq!(app.store.data_counts().await.unwrap().claims, 0);
}

#[tokio::test]
async fn test_invalid_json_is_format_error() {
    let app = TestApp::new().await;
    let (status, body) = app.import("{\"claims\": [", "claims.json", "add").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "format_error");
}

#[tokio::test]
async fn test_unknown_mode_is_bad_request() {
    let app = TestApp::new().await;
    let (status, _) = app.import(SINGLE_CLAIM_CSV, "claims.csv", "merge").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_file_is_bad_request() {
    let app = TestApp::new().await;
    let body = MultipartBody::new().text("mode", "add").finish();
    let (status, body) = app.json(upload(&app.admin(), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn test_storage_failure_rolls_back() {
    let app = TestApp::new().await;
    app.store.fail_on_commit();
    let (status, body) = app.import(SINGLE_CLAIM_CSV, "claims.csv", "add").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "storage_error");
    assert_eq!(app.store.data_counts().await.unwrap().claims, 0);
}

// ============================================================================
// Export
// ============================================================================

#[tokio::test]
async fn test_export_headers_and_reimport() {
    let app = TestApp::with_store(MockClaimStore::with_records(ClaimFixtures::sample_records()).await).await;

    let (status, headers, body) = app
        .send(get("/api/v1/data/export?format=json&status=Denied", &app.admin()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-record-count"], "1");
    assert!(headers.contains_key("x-export-timestamp"));
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment; filename=\"claims_export_"));

    let target = TestApp::new().await;
    let text = String::from_utf8(body).unwrap();
    let (status, report) = target.import(&text, "export.json", "add").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["claims_inserted"], 1);
    assert_eq!(report["details_inserted"], 1);
}

#[tokio::test]
async fn test_export_rejects_inverted_range() {
    let app = TestApp::new().await;
    let (status, _) = app
        .json(get("/api/v1/data/export?from=2025-02-01&to=2025-01-01", &app.admin()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Claims
// ============================================================================

#[tokio::test]
async fn test_claim_view_flags_and_notes() {
    let app = TestApp::with_store(MockClaimStore::with_records(ClaimFixtures::sample_records()).await).await;
    let token = app.token(&["viewer"]);

    let (status, body) = app
        .json(send_json(Method::POST, "/api/v1/claims/99001/flags", &token, json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["flag"]["reason"], "Flagged for review");

    let (status, body) = app
        .json(send_json(Method::POST, "/api/v1/claims/99001/flags", &token, json!({"reason": "again"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);

    let (status, _) = app
        .json(send_json(Method::POST, "/api/v1/claims/99001/notes", &token, json!({"note": "   "})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .json(send_json(Method::POST, "/api/v1/claims/99001/notes", &token, json!({"note": "Appeal filed"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, view) = app.json(get("/api/v1/claims/99001", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["flagged_by_viewer"], true);
    assert_eq!(view["notes"][0]["text"], "Appeal filed");
}

#[tokio::test]
async fn test_status_update_and_listing_filter() {
    let app = TestApp::with_store(MockClaimStore::with_records(ClaimFixtures::sample_records()).await).await;
    let token = app.token(&["viewer"]);

    let (status, claim) = app
        .json(send_json(
            Method::PUT,
            "/api/v1/claims/99001/status",
            &token,
            json!({"status": "Under Review"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claim["status"], "Under Review");

    let (status, page) = app
        .json(get("/api/v1/claims?status=Under%20Review", &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_count"], 1);
    assert_eq!(page["items"][0]["id"], 99001);

    let (status, _) = app
        .json(send_json(Method::PUT, "/api/v1/claims/99001/status", &token, json!({"status": "Closed"})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_claim_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app.json(get("/api/v1/claims/4242", &app.admin())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_dashboard_and_purge() {
    let app = TestApp::with_store(MockClaimStore::with_records(ClaimFixtures::sample_records()).await).await;
    let admin = app.admin();

    let (status, stats) = app.json(get("/api/v1/dashboard", &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_claims"], 2);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/v1/data/claims")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.json(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"]["claims"], 2);
    assert_eq!(body["deleted"]["details"], 1);
    assert_eq!(app.store.data_counts().await.unwrap().claims, 0);
}
