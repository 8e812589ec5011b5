//! Single-origin CORS policy.
//!
//! The allow-origin header echoes the request Origin only on an exact match
//! with the configured admin origin; any other origin gets an empty value.
//! Allowed methods/headers are fixed strings, never reflected from the
//! request. `OPTIONS` on any path short-circuits with a 204 before routing.
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::routes::AppState;

pub const ALLOWED_METHODS: &str = "GET, POST, PATCH, DELETE, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type";

pub async fn apply<B>(
    State(state): State<Arc<AppState>>,
    req: Request<B>,
    next: Next<B>,
) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    let allow = allow_origin(&origin, &state.admin_origin);

    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_str(&allow).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}

pub fn allow_origin(origin: &str, admin_origin: &str) -> String {
    if !admin_origin.is_empty() && origin == admin_origin {
        admin_origin.to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_exact_admin_origin_is_allowed() {
        let admin = "https://admin.example.com";
        assert_eq!(allow_origin(admin, admin), admin);
        assert_eq!(allow_origin("https://evil.example.com", admin), "");
        assert_eq!(allow_origin("https://admin.example.com:444", admin), "");
        assert_eq!(allow_origin("", admin), "");
    }

    #[test]
    fn empty_admin_origin_allows_nothing() {
        assert_eq!(allow_origin("", ""), "");
        assert_eq!(allow_origin("https://admin.example.com", ""), "");
    }
}
