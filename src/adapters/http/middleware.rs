//! Correlation and auth gate.
//!
//! Wraps every route, the 404 fallback included. A request only reaches the
//! inner service after its bearer token matched the shared secret; at that
//! point it carries a [`RequestContext`] in its extensions. The credential
//! itself is never logged. Every response, a rejected one included, carries
//! the correlation id in `X-Request-ID`.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::core::RequestContext;
use crate::utils::error::RelayError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const BEARER_PREFIX: &str = "Bearer ";

pub async fn access_log(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let started = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let ip = client_ip(&request);
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    if let Err(reason) = authorize(request.headers(), &state.auth_token) {
        warn!(
            request_id = %request_id,
            ip = %ip,
            url = %path,
            reason,
            "Request rejected by auth gate"
        );
        let mut response = RelayError::Unauthorized { reason }.into_response();
        attach_request_id(&mut response, &request_id);
        return response;
    }

    let ctx = RequestContext::new(request_id.clone(), state.batch_deadline);
    info!(
        request_id = %request_id,
        ip = %ip,
        url = %path,
        method = %method,
        principal = ?ctx.principal,
        started_at = %ctx.started_at.to_rfc3339(),
        "Request started"
    );
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        error!(
            request_id = %request_id,
            elapsed_ms,
            status = status.as_u16(),
            "Request failed"
        );
    } else {
        info!(
            request_id = %request_id,
            elapsed_ms,
            status = status.as_u16(),
            "Request done"
        );
    }

    attach_request_id(&mut response, &request_id);
    response
}

fn attach_request_id(response: &mut Response, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
}

/// 驗證 `Authorization: Bearer <token>`；比對採常數時間
fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), &'static str> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or("missing or malformed Authorization header")?;

    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err("invalid token")
    }
}

/// 取得呼叫端 IP：依序參考 X-Forwarded-For、X-Real-IP、連線位址
fn client_ip(request: &Request) -> String {
    let headers = request.headers();
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return forwarded.trim().to_string();
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.trim().to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
