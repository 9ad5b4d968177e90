//! Public link handler.

use axum::{
    body::Body,
    extract::{Path, State},
    response::Response,
};
use std::sync::Arc;

use super::file::{stream_response, Disposition};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /api/download/:link - Download a file through its public link.
///
/// No authentication: the link token is the credential. Unknown and
/// malformed tokens are both 404.
#[utoipa::path(
    get,
    path = "/api/download/{link}",
    tag = "links",
    params(("link" = String, Path, description = "Public link token")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown link or missing content"),
        (status = 429, description = "Too many requests")
    )
)]
pub async fn download_by_link(
    State(state): State<Arc<AppState>>,
    Path(link): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let download = state.files.download_by_link(&link).await?;
    stream_response(download, Disposition::Attachment)
}
