use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use super::AppState;
use crate::core::decoder::BatchEncoding;
use crate::core::RequestContext;
use crate::utils::error::{DecodeError, RelayError};

/// POST /api/v1/process
pub async fn process_batch(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(
                request_id = %ctx.request_id,
                error = %e,
                "Failed to read request body"
            );
            return RelayError::from(DecodeError::UnreadableBody(e.to_string())).into_response();
        }
    };

    let encoding =
        BatchEncoding::from_content_type(headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()));

    match state.engine.run(&bytes, encoding, &ctx).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Resource not found" })),
    )
        .into_response()
}
