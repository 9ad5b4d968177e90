//! Router configuration for the web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use super::dto;
use super::handlers::{self, AppState};
use super::middleware::{
    create_cors_layer, jwt_auth, link_rate_limit, login_rate_limit, security_headers, JwtState,
    RateLimitState,
};

/// OpenAPI document for the whole API.
#[derive(OpenApi)]
#[openapi(
    info(title = "MyCloud API", description = "Personal cloud file storage"),
    paths(
        handlers::register,
        handlers::login,
        handlers::refresh,
        handlers::logout,
        handlers::me,
        handlers::list_users,
        handlers::get_user,
        handlers::create_user,
        handlers::update_user,
        handlers::delete_user,
        handlers::list_files,
        handlers::upload_file,
        handlers::get_file,
        handlers::update_file,
        handlers::delete_file,
        handlers::download_file,
        handlers::view_file,
        handlers::download_by_link,
    ),
    components(schemas(
        dto::LoginRequest,
        dto::LogoutRequest,
        dto::RefreshRequest,
        dto::RegisterRequest,
        dto::CreateUserRequest,
        dto::UpdateUserRequest,
        dto::UpdateFileRequest,
        dto::AuthResponse,
        dto::RefreshResponse,
        dto::UserSummary,
        dto::FileResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Sign-up, sign-in and tokens"),
        (name = "users", description = "Accounts"),
        (name = "files", description = "Files"),
        (name = "links", description = "Public download links")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    rate_limits: Arc<RateLimitState>,
    cors_origins: &[String],
) -> Router {
    let login_limits = rate_limits.clone();
    let auth_routes = Router::new()
        .route(
            "/login",
            post(handlers::login).layer(middleware::from_fn(move |req, next| {
                login_rate_limit(login_limits.clone(), req, next)
            })),
        )
        .route("/register", post(handlers::register))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::me));

    let user_routes = Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        );

    // Upload size is enforced while streaming, not by the body limit.
    let file_routes = Router::new()
        .route(
            "/",
            get(handlers::list_files)
                .post(handlers::upload_file)
                .layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/:id",
            get(handlers::get_file)
                .put(handlers::update_file)
                .patch(handlers::update_file)
                .delete(handlers::delete_file),
        )
        .route("/:id/download", get(handlers::download_file))
        .route("/:id/view", get(handlers::view_file));

    let link_routes = Router::new().route(
        "/:link",
        get(handlers::download_by_link).layer(middleware::from_fn(move |req, next| {
            link_rate_limit(rate_limits.clone(), req, next)
        })),
    );

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/files", file_routes)
        .nest("/download", link_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn(move |req, next| {
                    jwt_auth(jwt_state.clone(), req, next)
                })),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "OK"
}

/// Swagger UI at `/swagger-ui`, document at `/api-docs/openapi.json`.
pub fn create_swagger_router() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
