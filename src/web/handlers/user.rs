//! User administration handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::admin::{AccountUpdate, UserAdminService};
use crate::auth::RegistrationRequest;
use crate::web::dto::{
    ApiResponse, CreateUserRequest, UpdateUserRequest, UserSummary, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/users - List users.
///
/// Administrators see everyone; other users see only themselves.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    responses(
        (status = 200, description = "Users", body = Vec<UserSummary>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<ApiResponse<Vec<UserSummary>>>, ApiError> {
    let users = UserAdminService::new(state.db.pool(), &state.files)
        .list_users(&principal)
        .await?;
    Ok(Json(ApiResponse::new(
        users.into_iter().map(UserSummary::from).collect(),
    )))
}

/// GET /api/users/:id - Get a user.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserSummary),
        (status = 404, description = "User not found or not visible")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let user = UserAdminService::new(state.db.pool(), &state.files)
        .get_user(&principal, user_id)
        .await?;
    Ok(Json(ApiResponse::new(user.into())))
}

/// POST /api/users - Create an account (admin).
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserSummary),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Administrator privileges required"),
        (status = 409, description = "Username or email already taken")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserSummary>>), ApiError> {
    let request = RegistrationRequest::new(req.username, req.password, req.email, req.full_name);
    let user = UserAdminService::new(state.db.pool(), &state.files)
        .create_user(&principal, &request, req.is_admin)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(user.into()))))
}

/// PUT /api/users/:id - Update an account (admin).
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = UserSummary),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Username or email already taken")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(user_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let update = AccountUpdate {
        username: req.username,
        email: req.email,
        full_name: req.full_name,
        password: req.password,
        is_admin: req.is_admin,
    };
    let user = UserAdminService::new(state.db.pool(), &state.files)
        .update_user(&principal, user_id, update)
        .await?;
    Ok(Json(ApiResponse::new(user.into())))
}

/// DELETE /api/users/:id - Delete an account and its files (admin).
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    UserAdminService::new(state.db.pool(), &state.files)
        .delete_user(&principal, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
