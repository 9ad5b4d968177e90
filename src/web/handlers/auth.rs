//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;

use crate::auth::{authenticate, register_with_admin, RegistrationRequest};
use crate::db::{Database, NewRefreshToken, RefreshTokenRepository, User, UserRepository};
use crate::file::FileService;
use crate::web::dto::{
    ApiResponse, AuthResponse, LoginRequest, LogoutRequest, RefreshRequest, RefreshResponse,
    RegisterRequest, UserSummary, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, JwtClaims};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// File lifecycle service.
    pub files: FileService,
    /// JWT encoding key.
    pub encoding_key: EncodingKey,
    /// Access token expiry in seconds.
    pub access_token_expiry: u64,
    /// Refresh token expiry in days.
    pub refresh_token_expiry: u64,
}

impl AppState {
    pub fn new(
        db: Database,
        files: FileService,
        jwt_secret: &str,
        access_expiry: u64,
        refresh_expiry: u64,
    ) -> Self {
        Self {
            db,
            files,
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            access_token_expiry: access_expiry,
            refresh_token_expiry: refresh_expiry,
        }
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: user.id,
            username: user.username.clone(),
            iat: now,
            exp: now + self.access_token_expiry,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }

    /// A new, not yet stored, refresh token for a user.
    fn new_refresh_token(&self, user_id: i64) -> NewRefreshToken {
        let expires_at =
            chrono::Utc::now() + chrono::Duration::days(self.refresh_token_expiry as i64);
        NewRefreshToken {
            user_id,
            token: uuid::Uuid::new_v4().to_string(),
            expires_at: expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Issue an access token and a stored refresh token.
    async fn issue_tokens(&self, user: User) -> Result<AuthResponse, ApiError> {
        let access_token = self.generate_access_token(&user)?;
        let refresh = self.new_refresh_token(user.id);
        RefreshTokenRepository::new(self.db.pool())
            .create(&refresh)
            .await?;

        let user = UserRepository::new(self.db.pool())
            .get_with_stats(user.id)
            .await?
            .map(UserSummary::from)
            .unwrap_or_else(|| UserSummary::new_account(user));

        Ok(AuthResponse {
            access_token,
            refresh_token: refresh.token,
            expires_in: self.access_token_expiry,
            user,
        })
    }
}

/// POST /api/auth/register - Create an account and sign in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already taken")
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), ApiError> {
    let request = RegistrationRequest::new(req.username, req.password, req.email, req.full_name);
    let user = register_with_admin(state.db.pool(), &request, false).await?;

    let response = state.issue_tokens(user).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(response))))
}

/// POST /api/auth/login - Sign in.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "Unknown username"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let user = authenticate(state.db.pool(), &req.username, &req.password).await?;
    tracing::info!(user_id = user.id, "User logged in");

    let response = state.issue_tokens(user).await?;
    Ok(Json(ApiResponse::new(response)))
}

/// POST /api/auth/refresh - Exchange a refresh token for a new token pair.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New tokens", body = RefreshResponse),
        (status = 401, description = "Invalid, expired or already used refresh token")
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let invalid = || ApiError::unauthorized("Invalid or expired refresh token");
    let repo = RefreshTokenRepository::new(state.db.pool());

    let current = repo
        .get_valid_token(&req.refresh_token)
        .await?
        .ok_or_else(invalid)?;
    let user = UserRepository::new(state.db.pool())
        .get_by_id(current.user_id)
        .await?
        .ok_or_else(invalid)?;

    let replacement = state.new_refresh_token(user.id);
    let rotated = repo
        .rotate(&req.refresh_token, &replacement)
        .await?
        .ok_or_else(invalid)?;

    let response = RefreshResponse {
        access_token: state.generate_access_token(&user)?,
        refresh_token: rotated.token,
        expires_in: state.access_token_expiry,
    };
    Ok(Json(ApiResponse::new(response)))
}

/// POST /api/auth/logout - Revoke refresh tokens.
///
/// Revokes the given refresh token, or all of the caller's refresh tokens
/// when the body names none. Access tokens stay valid until they expire.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    request_body(content = LogoutRequest, description = "Optional refresh token"),
    responses(
        (status = 200, description = "Signed out"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
    body: Option<Json<LogoutRequest>>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let repo = RefreshTokenRepository::new(state.db.pool());
    let request = body.map(|Json(req)| req).unwrap_or_default();

    match request.refresh_token {
        Some(token) => {
            repo.revoke(principal.user_id, &token).await?;
        }
        None => {
            let revoked = repo.revoke_all_for_user(principal.user_id).await?;
            tracing::debug!(user_id = principal.user_id, revoked, "Revoked all sessions");
        }
    }

    tracing::info!(user_id = principal.user_id, "User logged out");
    Ok(Json(ApiResponse::new(())))
}

/// GET /api/auth/me - Current user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserSummary),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_with_stats(principal.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    Ok(Json(ApiResponse::new(UserSummary::from(user))))
}
