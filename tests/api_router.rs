//! Router-level tests: CORS behavior, routing misses, and the validation
//! paths that must answer 400 before any downstream call is attempted. The
//! test state points at placeholder hosts, so a handler that tried to reach
//! the network would come back as a 500 envelope instead of a 400.
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;
use webcomic_api::api::routes::{router, AppState};
use webcomic_api::config::Config;

const ADMIN_ORIGIN: &str = "http://admin.example";

fn test_config() -> Config {
    Config {
        sanity_project_id: "testproj".to_string(),
        sanity_dataset: "production".to_string(),
        sanity_api_version: "2024-01-01".to_string(),
        sanity_write_token: String::new(),
        admin_origin: ADMIN_ORIGIN.to_string(),
        github_token: String::new(),
        github_owner: "owner".to_string(),
        github_repo: "repo".to_string(),
        preview_host: "preview.example".to_string(),
        api_host: "127.0.0.1".to_string(),
        api_port: "0".to_string(),
    }
}

fn app() -> Router {
    router(Arc::new(AppState::from_config(&test_config())))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_str<'a>(response: &'a axum::response::Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .map(|value| value.to_str().unwrap())
        .unwrap_or_else(|| panic!("missing header {}", name))
}

const BOUNDARY: &str = "XTESTBOUNDARYX";

fn multipart_body(json_field: &str, image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"json\"\r\n\r\n{}\r\n",
            BOUNDARY, json_field
        )
        .as_bytes(),
    );
    if let Some((filename, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

#[tokio::test]
async fn options_short_circuits_with_204_and_cors_headers() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/comics")
        .header(header::ORIGIN, ADMIN_ORIGIN)
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        header_str(&response, "access-control-allow-origin"),
        ADMIN_ORIGIN
    );
    assert_eq!(
        header_str(&response, "access-control-allow-methods"),
        "GET, POST, PATCH, DELETE, OPTIONS"
    );
    assert_eq!(
        header_str(&response, "access-control-allow-headers"),
        "Content-Type"
    );
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn options_works_on_unrouted_paths_too() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/no/such/path")
        .header(header::ORIGIN, ADMIN_ORIGIN)
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn non_admin_origin_gets_empty_allow_origin() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "access-control-allow-origin"), "");
}

#[tokio::test]
async fn health_returns_success_envelope() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn unmatched_route_yields_404_envelope() {
    let request = Request::builder()
        .uri("/api/nope")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn create_comic_rejects_non_multipart() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/comics")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Expected multipart/form-data");
}

#[tokio::test]
async fn create_comic_requires_json_field() {
    let payload = {
        // Only an image part, no json field.
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\nPNG\r\n--{}--\r\n",
                BOUNDARY, BOUNDARY
            )
            .as_bytes(),
        );
        body
    };
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/comics")
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(payload))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Missing json field in form data");
}

#[tokio::test]
async fn create_comic_requires_image_field() {
    let payload = multipart_body(r#"{"title":"T","slug":"t"}"#, None);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/comics")
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(payload))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Missing image file in form data");
}

#[tokio::test]
async fn create_comic_rejects_disallowed_image_type_before_upload() {
    let payload = multipart_body(
        r#"{"title":"T","slug":"t"}"#,
        Some(("a.pdf", "application/pdf", b"%PDF")),
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/comics")
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(payload))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    // A 400 here proves no upload was attempted: a network attempt against
    // the placeholder host would have surfaced as a 500 envelope.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("application/pdf"));
}

#[tokio::test]
async fn create_comic_requires_title_and_slug_before_upload() {
    let payload = multipart_body(
        r#"{"title":"","slug":"t"}"#,
        Some(("a.png", "image/png", b"PNG")),
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/comics")
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(payload))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "title and slug are required");
}

#[tokio::test]
async fn patch_comic_rejects_unsupported_content_type() {
    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/api/comics/doc-1")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("title=x"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        "Expected multipart/form-data or application/json"
    );
}

#[tokio::test]
async fn ai_mod_request_rejects_blank_description() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/ai-mod/request")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"description":"   "}"#))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Description is required");
}

#[tokio::test]
async fn ai_mod_status_requires_issue_param() {
    let request = Request::builder()
        .uri("/api/ai-mod/status")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Issue number is required");
}

#[tokio::test]
async fn ai_mod_approve_requires_pr_number() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/ai-mod/approve")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "PR number is required");
}

#[tokio::test]
async fn ai_mod_revise_rejects_blank_feedback_without_platform_calls() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/ai-mod/revise")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"issueNumber":1,"prNumber":2,"originalDescription":"x","feedback":"  "}"#,
        ))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Feedback is required");
}

#[tokio::test]
async fn ai_mod_revise_requires_both_numbers() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/ai-mod/revise")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"prNumber":2,"feedback":"better"}"#))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Issue number and PR number are required");
}
