//! Security headers middleware.

use axum::{
    body::Body,
    http::{
        header::{self, HeaderValue},
        Request,
    },
    middleware::Next,
    response::Response,
};

/// Add hardening headers to every response.
///
/// Handlers may set their own `Cache-Control`; it is left alone.
/// Strict-Transport-Security belongs at the TLS-terminating proxy.
pub async fn security_headers(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );
    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static("no-store, max-age=0"));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn test_security_headers_added() {
        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .route(
                "/cached",
                get(|| async { ([(header::CACHE_CONTROL, "private, max-age=60")], "OK") }),
            )
            .layer(middleware::from_fn(security_headers));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(headers.get("Referrer-Policy").unwrap(), "no-referrer");
        assert_eq!(headers.get("Cache-Control").unwrap(), "no-store, max-age=0");

        let response = app
            .oneshot(Request::builder().uri("/cached").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("Cache-Control").unwrap(),
            "private, max-age=60"
        );
    }
}
