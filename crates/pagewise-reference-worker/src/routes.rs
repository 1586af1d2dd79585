use axum::Json;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::extract::extract_article;

const DOCUMENT_URL_HEADER: &str = "x-document-url";

pub fn router() -> axum::Router {
    // Serialized web novels run large.
    let body_limit = DefaultBodyLimit::max(32 * 1024 * 1024);

    axum::Router::new()
        .route("/", post(extract))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
}

/// `POST /`: HTML body in, article JSON (or `null`) out.
async fn extract(headers: HeaderMap, body: Bytes) -> Response {
    let document_url = headers
        .get(DOCUMENT_URL_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "request body is empty" })),
        )
            .into_response();
    }

    let html = String::from_utf8_lossy(&body);
    match extract_article(&html, &document_url) {
        Some(article) => {
            tracing::debug!(url = %document_url, title = %article.title, "extracted article");
            Json(article).into_response()
        }
        None => {
            tracing::debug!(url = %document_url, "no article found");
            Json(serde_json::Value::Null).into_response()
        }
    }
}
