//! File handlers.

use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures::{StreamExt, TryStreamExt};
use std::io;
use std::sync::Arc;

use crate::auth::Principal;
use crate::file::{Download, FileScope, FileUpdate, StagedUpload};
use crate::web::dto::{
    ApiResponse, FileListQuery, FileResponse, UpdateFileRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::{AuthUser, ContentAuthUser};

/// How the client should present a streamed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Attachment,
    Inline,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Disposition::Attachment => "attachment",
            Disposition::Inline => "inline",
        }
    }
}

/// Build a Content-Disposition value that cannot inject headers.
///
/// Control characters are dropped and quotes/backslashes replaced in the
/// plain `filename`; names that needed changes or are not ASCII also get an
/// RFC 5987 `filename*`.
pub(crate) fn content_disposition_header(disposition: Disposition, filename: &str) -> String {
    let needs_encoding = !filename.is_ascii()
        || filename
            .chars()
            .any(|c| c.is_control() || c == '"' || c == '\\');
    if !needs_encoding {
        return format!("{}; filename=\"{}\"", disposition.as_str(), filename);
    }

    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    let clean: String = filename.chars().filter(|c| !c.is_control()).collect();

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition.as_str(),
        fallback,
        urlencoding::encode(&clean)
    )
}

/// Turn an opened download into a streaming response.
///
/// Headers carry the name resolved when the download was opened, so a
/// concurrent rename does not affect a transfer already in progress.
pub(crate) fn stream_response(
    download: Download,
    disposition: Disposition,
) -> Result<Response<Body>, ApiError> {
    let file = download.file;
    let content_type = mime_guess::from_path(&file.original_name)
        .first_or_octet_stream()
        .to_string();

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(disposition, &file.original_name),
        )
        .header(header::CONTENT_LENGTH, file.size)
        .header(header::CACHE_CONTROL, "private, no-cache");
    if disposition == Disposition::Inline {
        builder = builder.header(header::CONTENT_SECURITY_POLICY, "sandbox");
    }

    builder
        .body(Body::from_stream(download.content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// GET /api/files - List files.
///
/// Newest first. `user_id` and `all` only apply to administrators.
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "files",
    params(FileListQuery),
    responses(
        (status = 200, description = "Files", body = Vec<FileResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Query(query): Query<FileListQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let scope = match (query.all, query.user_id) {
        (true, _) => FileScope::All,
        (false, Some(user_id)) => FileScope::User(user_id),
        (false, None) => FileScope::Own,
    };
    let files = state.files.list(&principal, scope).await?;
    Ok(Json(ApiResponse::new(
        files.into_iter().map(FileResponse::from).collect(),
    )))
}

/// Stream a multipart `file` field into the blob store.
async fn stage_field(
    state: &AppState,
    principal: &Principal,
    field: Field<'_>,
) -> Result<StagedUpload, ApiError> {
    let filename = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("File field has no file name"))?;
    let data = field
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .boxed();
    Ok(state.files.stage(principal, &filename, data).await?)
}

/// Read the multipart body. A staged blob is kept in `staged` so the caller
/// can discard it whatever happens afterwards.
async fn read_upload(
    state: &AppState,
    principal: &Principal,
    multipart: &mut Multipart,
    staged: &mut Option<StagedUpload>,
    comment: &mut Option<String>,
) -> Result<(), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    })? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                if staged.is_some() {
                    return Err(ApiError::bad_request("Only one file per upload"));
                }
                *staged = Some(stage_field(state, principal, field).await?);
            }
            "comment" => {
                *comment = Some(field.text().await.map_err(|e| {
                    tracing::debug!("Failed to read comment: {}", e);
                    ApiError::bad_request("Invalid comment")
                })?);
            }
            _ => {}
        }
    }
    Ok(())
}

/// POST /api/files - Upload a file.
///
/// Request body: multipart/form-data with a `file` field and an optional
/// `comment` field.
#[utoipa::path(
    post,
    path = "/api/files",
    tag = "files",
    responses(
        (status = 201, description = "File uploaded", body = FileResponse),
        (status = 400, description = "Missing file, invalid input or file too large"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Storage failure")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileResponse>>), ApiError> {
    let mut staged = None;
    let mut comment = None;

    if let Err(e) = read_upload(&state, &principal, &mut multipart, &mut staged, &mut comment).await
    {
        if let Some(staged) = staged {
            state.files.discard(staged).await;
        }
        return Err(e);
    }

    let staged = staged.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let comment = comment.filter(|c| !c.trim().is_empty());
    let file = state.files.commit(staged, comment.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(file.into()))))
}

/// GET /api/files/:id - File metadata.
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "File", body = FileResponse),
        (status = 403, description = "Not your file"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let file = state.files.get(&principal, file_id).await?;
    Ok(Json(ApiResponse::new(file.into())))
}

/// PUT/PATCH /api/files/:id - Rename and/or change the comment.
#[utoipa::path(
    put,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    request_body = UpdateFileRequest,
    responses(
        (status = 200, description = "File updated", body = FileResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Not your file"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(file_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFileRequest>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let update = FileUpdate {
        original_name: req.original_name,
        comment: req.comment,
    };
    let file = state.files.update(&principal, file_id, update).await?;
    Ok(Json(ApiResponse::new(file.into())))
}

/// DELETE /api/files/:id - Delete a file.
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 403, description = "Not your file"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(file_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.files.delete(&principal, file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/files/:id/download - Download a file as an attachment.
#[utoipa::path(
    get,
    path = "/api/files/{id}/download",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID"),
        ("token" = Option<String>, Query, description = "Access token, when no Authorization header is sent")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 403, description = "Not your file"),
        (status = 404, description = "File or its content not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    ContentAuthUser(principal): ContentAuthUser,
    Path(file_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let download = state.files.download(&principal, file_id).await?;
    stream_response(download, Disposition::Attachment)
}

/// GET /api/files/:id/view - Show a file inline.
///
/// Does not count as a download.
#[utoipa::path(
    get,
    path = "/api/files/{id}/view",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID"),
        ("token" = Option<String>, Query, description = "Access token, when no Authorization header is sent")
    ),
    responses(
        (status = 200, description = "File content with inferred content type"),
        (status = 403, description = "Not your file"),
        (status = 404, description = "File or its content not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn view_file(
    State(state): State<Arc<AppState>>,
    ContentAuthUser(principal): ContentAuthUser,
    Path(file_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let download = state.files.view(&principal, file_id).await?;
    stream_response(download, Disposition::Inline)
}
