//! HTTP front end.
//!
//! Endpoints:
//!   POST /upload             - multipart file, or a form/JSON `path` field
//!   GET  /download/{blob_id} - decrypted bytes
//!
//! Failures answer `{ "error": message }`; only missing or unusable input
//! is a 400.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sealgate_core::BlobHandle;

use crate::error::{GatewayError, Result};
use crate::gateway::{Gateway, UploadReceipt};

/// Form or JSON field naming a local file to upload.
pub const PATH_FIELD: &str = "path";

/// Multipart framing allowance on top of the plaintext limit.
const BODY_OVERHEAD: usize = 64 * 1024;

/// Body of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub blob_id: String,
    pub seal_id: String,
}

impl From<&UploadReceipt> for UploadResponse {
    fn from(receipt: &UploadReceipt) -> Self {
        Self {
            blob_id: receipt.blob_id.to_string(),
            seal_id: receipt.seal_id.to_hex(),
        }
    }
}

/// Body of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
struct PathUpload {
    path: String,
}

/// Router serving `gateway`.
pub fn router(gateway: Arc<Gateway>) -> Router {
    let limit = gateway.settings().max_upload_bytes.saturating_add(BODY_OVERHEAD);
    Router::new()
        .route("/upload", post(upload_handler))
        .route("/download/{blob_id}", get(download_handler))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(gateway)
}

/// Serve `gateway` on `addr` until the process stops.
pub async fn serve(addr: &str, gateway: Arc<Gateway>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "gateway listening");
    axum::serve(listener, router(gateway)).await
}

fn error_response(err: GatewayError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = ErrorBody {
        error: err.to_string(),
    };
    (status, Json(body)).into_response()
}

async fn upload_handler(State(gateway): State<Arc<Gateway>>, request: Request) -> Response {
    let plaintext = match upload_body(request).await {
        Ok(bytes) => bytes,
        Err(e) => return error_response(e),
    };

    match gateway.upload(&plaintext).await {
        Ok(receipt) => (StatusCode::OK, Json(UploadResponse::from(&receipt))).into_response(),
        Err(e) => error_response(e),
    }
}

async fn download_handler(
    State(gateway): State<Arc<Gateway>>,
    Path(blob_id): Path<String>,
) -> Response {
    match gateway.download(&BlobHandle::new(blob_id)).await {
        Ok(plaintext) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            plaintext,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Extract the bytes to upload from whichever body shape was sent.
async fn upload_body(request: Request) -> Result<Vec<u8>> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| GatewayError::Input(e.body_text()))?;
        multipart_body(multipart).await
    } else if content_type.starts_with("application/json") {
        let Json(upload) = Json::<PathUpload>::from_request(request, &())
            .await
            .map_err(|e| GatewayError::Input(e.body_text()))?;
        read_local(&upload.path).await
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(upload) = Form::<PathUpload>::from_request(request, &())
            .await
            .map_err(|e| GatewayError::Input(e.body_text()))?;
        read_local(&upload.path).await
    } else {
        Err(GatewayError::Input(
            "expected a multipart file, or a form or JSON path".into(),
        ))
    }
}

/// The first file field wins; a `path` field is the fallback.
async fn multipart_body(mut multipart: Multipart) -> Result<Vec<u8>> {
    let mut path = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::Input(e.body_text()))?
    {
        if field.file_name().is_some() {
            let data: Bytes = field
                .bytes()
                .await
                .map_err(|e| GatewayError::Input(e.body_text()))?;
            return Ok(data.to_vec());
        }
        if path.is_none() && field.name() == Some(PATH_FIELD) {
            path = Some(
                field
                    .text()
                    .await
                    .map_err(|e| GatewayError::Input(e.body_text()))?,
            );
        }
    }

    match path {
        Some(path) => read_local(&path).await,
        None => Err(GatewayError::Input("no file field in upload".into())),
    }
}

async fn read_local(path: &str) -> Result<Vec<u8>> {
    let path = path.trim();
    if path.is_empty() {
        return Err(GatewayError::Input("empty path".into()));
    }
    debug!(%path, "reading upload from local file");
    tokio::fs::read(path)
        .await
        .map_err(|e| GatewayError::Input(format!("{path}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Collaborators, GatewaySettings};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use sealgate_core::{ObjectId, PolicyNamespace, X25519StaticSecret};
    use sealgate_envelope::KeyServerPublic;
    use sealgate_keyserver::{KeyServer, KeyServerQuorum, LocalKeyServer, QuorumMember};
    use sealgate_policy::{EntryPoint, KeypairSigner, MemoryLedger, Network, Signer};
    use sealgate_store::MemoryBlobStore;
    use std::io::Write;
    use tower::ServiceExt;

    const PACKAGE: ObjectId = ObjectId::from_bytes([0x11; 32]);
    const ALLOWLIST: ObjectId = ObjectId::from_bytes([0xab; 32]);
    const BOUNDARY: &str = "sealgate-boundary";

    fn app() -> Router {
        let signer = Arc::new(KeypairSigner::generate());
        let ledger = Arc::new(MemoryLedger::new(Network::Localnet));
        ledger.publish_package(PACKAGE);
        ledger.create_allowlist(ALLOWLIST, [signer.address()]);

        let members = (0..2)
            .map(|i| {
                let secret = X25519StaticSecret::generate();
                let public = KeyServerPublic::new(secret.public_key(), 1);
                let server: Arc<dyn KeyServer> = Arc::new(LocalKeyServer::new(secret, ledger.clone()));
                QuorumMember {
                    name: format!("ks{i}"),
                    server,
                    public,
                }
            })
            .collect();

        let mut settings = GatewaySettings::new(PolicyNamespace::new(ALLOWLIST), EntryPoint::new(PACKAGE));
        settings.max_upload_bytes = 1024;

        let gateway = Gateway::new(
            settings,
            Collaborators {
                signer,
                ledger,
                quorum: Arc::new(KeyServerQuorum::new(members, 2).unwrap()),
                store: Arc::new(MemoryBlobStore::new()),
            },
        );
        router(Arc::new(gateway))
    }

    fn multipart_request(field: &str, filename: Option<&str>, data: &[u8]) -> Request {
        let disposition = match filename {
            Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
            None => format!("form-data; name=\"{field}\""),
        };
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        HttpRequest::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_multipart_upload_then_download() {
        let app = app();
        let response = app
            .clone()
            .oneshot(multipart_request("file", Some("notes.txt"), b"hello gateway"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let upload: UploadResponse = json_body(response).await;
        assert_eq!(upload.seal_id.len(), (32 + 5) * 2);

        let response = app
            .oneshot(
                HttpRequest::get(format!("/download/{}", upload.blob_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello gateway");
    }

    #[tokio::test]
    async fn test_json_path_upload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"from disk").unwrap();

        let body = serde_json::json!({ "path": file.path() }).to_string();
        let response = app()
            .oneshot(
                HttpRequest::post("/upload")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_file_is_bad_request() {
        let response = app()
            .oneshot(multipart_request("comment", None, b"no file here"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = json_body(response).await;
        assert!(body.error.contains("no file"));
    }

    #[tokio::test]
    async fn test_unsupported_body_is_bad_request() {
        let response = app()
            .oneshot(HttpRequest::post("/upload").body(Body::from("raw")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_server_error() {
        let response = app()
            .oneshot(multipart_request("file", Some("big.bin"), &[7u8; 2048]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = json_body(response).await;
        assert!(body.error.starts_with("encryption failed"));
    }

    #[tokio::test]
    async fn test_unknown_download_is_server_error() {
        let response = app()
            .oneshot(HttpRequest::get("/download/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = json_body(response).await;
        assert!(!body.error.is_empty());
    }
}
