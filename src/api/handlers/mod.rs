use axum::{
    body::{Body, Bytes},
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{Request, StatusCode},
    response::Response,
};

use super::{ProxyState, StaticState, UPLOAD_FIELD};
use crate::proxy::ProxyError;
use crate::store::StoreError;
use crate::supervisor::SupervisorStatus;

// ============================================================
// Error Handling
// ============================================================

/// Multipart problems keep their own status (400, or 413 past the body
/// limit) and message.
fn multipart_error(e: MultipartError) -> (StatusCode, String) {
    tracing::warn!("Malformed upload: {}", e);
    (e.status(), e.body_text())
}

/// Storage failures are reported to the client verbatim.
fn storage_error(e: StoreError) -> (StatusCode, String) {
    tracing::error!("Storage error: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> &'static str {
    "OK"
}

// ============================================================
// Upload
// ============================================================

struct Upload {
    file_name: String,
    contents: Bytes,
}

/// Pull the `file` part out of the form, skipping any other fields.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, (StatusCode, String)> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Rejected upload: {}", e);
        (e.status(), e.body_text())
    })?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("form field `{}` is not a file", UPLOAD_FIELD),
            )
        })?;
        let contents = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload {
            file_name,
            contents,
        });
    }

    Err((
        StatusCode::BAD_REQUEST,
        format!("missing form field `{}`", UPLOAD_FIELD),
    ))
}

fn uploaded(upload: &Upload) -> String {
    format!("File uploaded successfully: {}", upload.file_name)
}

pub async fn upload_static(
    State(state): State<StaticState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, (StatusCode, String)> {
    let upload = read_upload(multipart).await?;
    let markdown = String::from_utf8_lossy(&upload.contents);

    let deck = state.publish(&markdown).map_err(storage_error)?;
    tracing::info!(
        "Published {} ({} groups, {} slides)",
        upload.file_name,
        deck.len(),
        deck.slide_count()
    );

    Ok(uploaded(&upload))
}

pub async fn upload_proxy(
    State(state): State<ProxyState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, (StatusCode, String)> {
    let upload = read_upload(multipart).await?;

    state
        .store
        .save_document(&upload.contents)
        .map_err(storage_error)?;
    tracing::info!("Saved {}, restarting renderer", upload.file_name);
    state.supervisor.restart_in_background();

    Ok(uploaded(&upload))
}

pub async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

// ============================================================
// Delivery
// ============================================================

/// Forward anything else to the rendering server.
///
/// A refused connection means "not running" when no restart is pending and
/// the supervisor is stopped, and "starting" otherwise.
pub async fn proxy(
    State(state): State<ProxyState>,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    match state.proxy.forward(request).await {
        Err(ProxyError::Starting) if !state.supervisor.is_restarting() => {
            match state.supervisor.status().await {
                SupervisorStatus::Stopped => Err(ProxyError::NotRunning),
                SupervisorStatus::Running { .. } => Err(ProxyError::Starting),
            }
        }
        result => result,
    }
}
