//! HTTP binding of the key-server protocol.
//!
//! Endpoints:
//!   GET  /v1/service    - `ServiceInfo`
//!   POST /v1/fetch_key  - `FetchKeyRequest` -> `FetchKeyResponse`
//!
//! Refusals carry an `ErrorResponse` body with the code's HTTP status.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tracing::{info, warn};

use crate::error::{KeyServerError, Result};
use crate::messages::{
    decode, encode, ErrorCode, ErrorResponse, FetchKeyRequest, FetchKeyResponse, ServiceInfo,
    CBOR_CONTENT_TYPE, FETCH_KEY_PATH, SERVICE_PATH,
};
use crate::server::KeyServer;

/// Router exposing `server` over HTTP.
pub fn router(server: Arc<dyn KeyServer>) -> Router {
    Router::new()
        .route(SERVICE_PATH, get(service_handler))
        .route(FETCH_KEY_PATH, post(fetch_key_handler))
        .with_state(server)
}

/// Serve `server` on `addr` until the process stops.
pub async fn serve(addr: &str, server: Arc<dyn KeyServer>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "key server listening");
    axum::serve(listener, router(server)).await
}

fn cbor_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response {
    match encode(body) {
        Ok(bytes) => (status, [(header::CONTENT_TYPE, CBOR_CONTENT_TYPE)], bytes).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn error_response(err: KeyServerError) -> Response {
    let code = err.code();
    let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    let message = match err {
        KeyServerError::Rejected { message, .. } => message,
        other => other.to_string(),
    };
    cbor_response(status, &ErrorResponse { code, message })
}

async fn service_handler(State(server): State<Arc<dyn KeyServer>>) -> Response {
    match server.service_info().await {
        Ok(info) => cbor_response(StatusCode::OK, &info),
        Err(e) => error_response(e),
    }
}

async fn fetch_key_handler(State(server): State<Arc<dyn KeyServer>>, body: Bytes) -> Response {
    let request: FetchKeyRequest = match decode(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "undecodable fetch_key request");
            return error_response(KeyServerError::rejected(ErrorCode::InvalidProof, e.to_string()));
        }
    };

    match server.fetch_key(&request).await {
        Ok(response) => cbor_response(StatusCode::OK, &response),
        Err(e) => error_response(e),
    }
}

/// A remote key server reached over HTTP.
pub struct HttpKeyServer {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpKeyServer {
    /// Client for the server at `endpoint` (e.g. `http://127.0.0.1:4000`).
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| KeyServerError::Transport(e.to_string()))?;
        Ok(Self::with_client(endpoint, client))
    }

    /// Client sharing an existing connection pool.
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// The base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn read_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| KeyServerError::Transport(format!("{}: {}", self.endpoint, e)))?;

        if status.is_success() {
            return decode(&body);
        }

        match decode::<ErrorResponse>(&body) {
            Ok(err) => Err(KeyServerError::Rejected {
                code: err.code,
                message: err.message,
            }),
            Err(_) => Err(KeyServerError::Transport(format!(
                "{} answered {}",
                self.endpoint, status
            ))),
        }
    }
}

#[async_trait]
impl KeyServer for HttpKeyServer {
    async fn service_info(&self) -> Result<ServiceInfo> {
        let response = self
            .client
            .get(format!("{}{}", self.endpoint, SERVICE_PATH))
            .send()
            .await
            .map_err(|e| KeyServerError::Transport(format!("{}: {}", self.endpoint, e)))?;
        self.read_response(response).await
    }

    async fn fetch_key(&self, request: &FetchKeyRequest) -> Result<FetchKeyResponse> {
        let response = self
            .client
            .post(format!("{}{}", self.endpoint, FETCH_KEY_PATH))
            .header(reqwest::header::CONTENT_TYPE, CBOR_CONTENT_TYPE)
            .body(encode(request)?)
            .send()
            .await
            .map_err(|e| KeyServerError::Transport(format!("{}: {}", self.endpoint, e)))?;
        self.read_response(response).await
    }
}
