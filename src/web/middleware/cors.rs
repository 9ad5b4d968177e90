//! CORS layer configuration.

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

const METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer.
///
/// With no (valid) origins configured any origin is allowed without
/// credentials; otherwise only the listed origins, with credentials.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    let layer = CorsLayer::new()
        .allow_methods(METHODS)
        .expose_headers([CONTENT_DISPOSITION]);

    if allowed.is_empty() {
        layer.allow_headers(Any).allow_origin(Any)
    } else {
        layer
            .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
            .allow_credentials(true)
            .allow_origin(allowed)
    }
}
