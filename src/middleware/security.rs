// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response hardening for the JSON API.
//!
//! Almost every response is JSON carrying tokens or credential metadata, so
//! nothing may be cached and nothing may be rendered. The one HTML page (the
//! sign-in callback) gets a policy that allows its inline styling and
//! nothing else. Websocket upgrades pass through untouched.

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};

const API_CSP: &str = "default-src 'none'; frame-ancestors 'none'";
const HTML_CSP: &str = "default-src 'none'; style-src 'unsafe-inline'; frame-ancestors 'none'; form-action 'none'";
const HSTS: &str = "max-age=31536000; includeSubDomains";

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"))
}

/// Add security headers to every HTTP response.
pub async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    if response.status() == StatusCode::SWITCHING_PROTOCOLS {
        return response;
    }

    let headers = response.headers_mut();
    let csp = if is_html(headers) { HTML_CSP } else { API_CSP };

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(csp));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    // Handlers that opt into caching keep their own directive.
    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::response::{Html, IntoResponse};
    use axum::Json;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/json",
                get(|| async { Json(serde_json::json!({"id_token": "t"})) }),
            )
            .route("/page", get(|| async { Html("<p style='color:red'>done</p>") }))
            .route(
                "/cached",
                get(|| async {
                    ([(header::CACHE_CONTROL, "max-age=60")], "ok").into_response()
                }),
            )
            .route("/upgrade", get(|| async { StatusCode::SWITCHING_PROTOCOLS }))
            .layer(axum::middleware::from_fn(add_security_headers))
    }

    async fn get_headers(uri: &str) -> (StatusCode, HeaderMap) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        (response.status(), response.headers().clone())
    }

    #[tokio::test]
    async fn test_json_responses_are_locked_down() {
        let (_, headers) = get_headers("/json").await;

        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(headers.get("Strict-Transport-Security").unwrap(), HSTS);
        assert_eq!(headers.get("Content-Security-Policy").unwrap(), API_CSP);
        assert_eq!(headers.get("Referrer-Policy").unwrap(), "no-referrer");
        assert_eq!(headers.get("Cache-Control").unwrap(), "no-store");
    }

    #[tokio::test]
    async fn test_html_page_allows_inline_style_only() {
        let (_, headers) = get_headers("/page").await;

        let csp = headers.get("Content-Security-Policy").unwrap().to_str().unwrap();
        assert_eq!(csp, HTML_CSP);
        assert!(!csp.contains("script-src"));
        assert_eq!(headers.get("Cache-Control").unwrap(), "no-store");
    }

    #[tokio::test]
    async fn test_explicit_cache_control_is_kept() {
        let (_, headers) = get_headers("/cached").await;
        assert_eq!(headers.get("Cache-Control").unwrap(), "max-age=60");
    }

    #[tokio::test]
    async fn test_upgrade_responses_pass_through() {
        let (status, headers) = get_headers("/upgrade").await;
        assert_eq!(status, StatusCode::SWITCHING_PROTOCOLS);
        assert!(headers.get("Content-Security-Policy").is_none());
        assert!(headers.get("Cache-Control").is_none());
    }
}
