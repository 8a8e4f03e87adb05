//! Inbound HTTP surface.
//!
//! Layer order, outermost first: panic recovery, security headers, CORS,
//! then the correlation and auth gate in front of every route.

pub mod handlers;
pub mod middleware;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::adapters::forwarder::HttpForwarder;
use crate::config::ServerConfig;
use crate::core::engine::BatchEngine;
use crate::core::transform::UserTransformer;
use crate::utils::error::{RelayError, Result};

pub use handlers::{not_found, process_batch};
pub use middleware::access_log;

/// Shared state handed to handlers and the auth gate. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BatchEngine>,
    pub auth_token: Arc<str>,
    pub batch_deadline: Duration,
    pub max_body_bytes: usize,
}

impl AppState {
    /// 依設定組出預設的轉換器與下游轉送
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let forwarder = HttpForwarder::new(config.server_url.clone(), config.forward_timeout())?;
        let engine = BatchEngine::new(
            Arc::new(UserTransformer),
            Arc::new(forwarder),
            config.max_concurrency(),
        );

        Ok(Self {
            engine: Arc::new(engine),
            auth_token: Arc::from(config.auth_token.as_str()),
            batch_deadline: config.batch_deadline(),
            max_body_bytes: config.max_body_bytes(),
        })
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.user_friendly_message() }))).into_response()
    }
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let gate = axum::middleware::from_fn_with_state(state.clone(), access_log);

    let layers = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(build_cors_layer(cors_origins));

    Router::new()
        .route("/api/v1/process", post(process_batch).fallback(not_found))
        .fallback(not_found)
        .layer(gate)
        .layer(layers)
        .with_state(state)
}

fn handle_panic(_payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("Handler panicked");
    RelayError::ServerError {
        message: "handler panicked".to_string(),
    }
    .into_response()
}

/// `"*"` 代表允許任意來源，否則逐一解析
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(url = %addr, "HTTP server started");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| RelayError::ServerError {
        message: format!("server error: {}", e),
    })
}
