use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::config::RelayConfig;
use super::obfuscate::{self, ObfuscateError};
use super::providers::ProviderTable;
use super::render::{self, XML_CONTENT_TYPE};
use super::transcode::{self, JSON_CONTENT_TYPE, TranscodeOutcome};
use super::upstream::{self, UpstreamClient};
use super::GatewayError;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-headers", "*"),
    ("access-control-allow-methods", "GET, POST, OPTIONS"),
];

#[derive(Clone)]
pub struct RelayHttpState {
    providers: Arc<ProviderTable>,
    upstream: UpstreamClient,
    max_body_bytes: usize,
}

impl RelayHttpState {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self {
            providers: Arc::new(ProviderTable::default()),
            upstream,
            max_body_bytes: super::config::DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn from_config(config: &RelayConfig) -> crate::Result<Self> {
        let upstream = UpstreamClient::new(config.request_timeout())?;
        Ok(Self::new(upstream)
            .with_provider_table(config.provider_table())
            .with_max_body_bytes(config.max_body_bytes))
    }

    pub fn with_provider_table(mut self, providers: ProviderTable) -> Self {
        self.providers = Arc::new(providers);
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes.max(1);
        self
    }

    pub fn providers(&self) -> &ProviderTable {
        &self.providers
    }
}

pub fn router(state: RelayHttpState) -> Router {
    Router::new()
        .route(
            "/obfuscate-key",
            post(handle_obfuscate_key).fallback(handle_proxy),
        )
        .route(
            "/deobfuscate-key",
            post(handle_deobfuscate_key).fallback(handle_proxy),
        )
        .route("/", any(handle_proxy))
        .route("/*path", any(handle_proxy))
        .layer(axum::middleware::from_fn(cors))
        .with_state(state)
}

/// Answers preflight requests and stamps CORS headers on every response.
async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
        body.into(),
    )
        .into_response()
}

fn map_gateway_error(err: GatewayError) -> Response {
    match err {
        GatewayError::UnsupportedProvider { .. } => {
            text_response(StatusCode::BAD_REQUEST, "Unsupported provider")
        }
        GatewayError::Upstream { .. } => text_response(StatusCode::BAD_GATEWAY, "Bad Gateway"),
        GatewayError::BodyTooLarge { limit } => text_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("request body exceeded {limit} bytes"),
        ),
        GatewayError::InvalidRequest { reason } => text_response(StatusCode::BAD_REQUEST, reason),
    }
}

#[derive(Debug, Serialize)]
struct KeyErrorResponse {
    error: &'static str,
}

fn key_error(message: &'static str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(KeyErrorResponse { error: message }),
    )
        .into_response()
}
