//! JWT authentication middleware.
//!
//! The token only identifies the account; the [`Principal`] is loaded from
//! the database on every request, so deletions and admin flag changes take
//! effect immediately.

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{resolve_principal, Principal};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::CloudError;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: i64,
    pub username: String,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// JWT ID (unique identifier).
    pub jti: String,
}

/// Keys and rules for verifying access tokens.
#[derive(Clone)]
pub struct JwtState {
    pub decoding_key: DecodingKey,
    pub validation: Validation,
}

impl JwtState {
    /// Create a new JWT state from a secret key.
    pub fn new(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            decoding_key,
            validation,
        }
    }

    /// Decode and verify a token.
    pub fn verify(&self, token: &str) -> Result<JwtClaims, ApiError> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                ApiError::unauthorized("Invalid or expired token")
            })
    }
}

/// Pull the bearer token from the Authorization header.
fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Pull an access token from the `token` query parameter.
fn query_token(parts: &Parts) -> Option<String> {
    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key == "token" {
                urlencoding::decode(value).ok().map(|s| s.into_owned())
            } else {
                None
            }
        })
    })
}

/// Verify `token` and resolve the account it names.
async fn authorize(
    parts: &Parts,
    state: &AppState,
    token: Option<String>,
) -> Result<Principal, ApiError> {
    let token = token.ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

    let jwt_state = parts
        .extensions
        .get::<Arc<JwtState>>()
        .ok_or_else(|| ApiError::internal("JWT state not configured"))?;
    let claims = jwt_state.verify(&token)?;

    resolve_principal(state.db.pool(), claims.sub)
        .await
        .map_err(|e| match e {
            CloudError::Auth(_) => ApiError::unauthorized("Invalid or expired token"),
            other => ApiError::from(other),
        })
}

/// Extractor for authenticated requests.
///
/// Yields the caller's current [`Principal`]; rejects with 401 when the
/// bearer token is missing, invalid, expired, or names an account that no
/// longer exists.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts);
        authorize(parts, state, token).await.map(AuthUser)
    }
}

/// Like [`AuthUser`], but also accepts the access token as a `token` query
/// parameter, so a plain `<a href>` or `<img src>` can fetch file content.
///
/// Only the download and view routes use it. A token in a URL can end up in
/// browser history, proxy logs and `Referer` headers; access tokens are
/// short-lived and responses carry `Referrer-Policy: no-referrer`.
#[derive(Debug, Clone)]
pub struct ContentAuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ContentAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).or_else(|| query_token(parts));
        authorize(parts, state, token).await.map(ContentAuthUser)
    }
}

/// Middleware function to inject JWT state into request extensions.
pub async fn jwt_auth(
    jwt_state: Arc<JwtState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(jwt_state);
    next.run(request).await
}
