//! Web server for MyCloud.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::db::RefreshTokenRepository;
use crate::file::{FileService, FsBlobStore};
use crate::{CloudError, Database, Result};

use super::handlers::AppState;
use super::middleware::{JwtState, RateLimitState};
use super::router::{create_health_router, create_router, create_swagger_router};

/// Web server for the API.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    rate_limits: Arc<RateLimitState>,
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a server from configuration and an open database.
    ///
    /// Creates the blob storage root if it does not exist.
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        let web = &config.web;
        let addr: SocketAddr = format!("{}:{}", web.host, web.port)
            .parse()
            .map_err(|e| CloudError::Config(format!("invalid web server address: {e}")))?;

        let store = FsBlobStore::new(&config.files.storage_path)?;
        tracing::info!("File storage at: {}", config.files.storage_path);
        let files = FileService::new(db.pool().clone(), Arc::new(store))
            .with_max_upload_size(config.files.max_upload_bytes())
            .with_io_timeout(Duration::from_secs(config.files.io_timeout_secs))
            .with_span(tracing::info_span!("files"));

        let app_state = AppState::new(
            db,
            files,
            &web.jwt_secret,
            web.jwt_access_token_expiry_secs,
            web.jwt_refresh_token_expiry_days,
        );

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            jwt_state: Arc::new(JwtState::new(&web.jwt_secret)),
            rate_limits: Arc::new(RateLimitState::new(
                web.login_rate_limit,
                web.link_rate_limit,
            )),
            cors_origins: web.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state.
    pub fn state(&self) -> Arc<AppState> {
        self.app_state.clone()
    }

    /// The complete application: API, health check and API docs.
    pub fn router(&self) -> Router {
        create_router(
            self.app_state.clone(),
            self.jwt_state.clone(),
            self.rate_limits.clone(),
            &self.cors_origins,
        )
        .merge(create_health_router())
        .merge(create_swagger_router())
    }

    /// Remove expired and revoked refresh tokens every hour.
    fn start_token_cleanup_task(db: Database) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            // First tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                match RefreshTokenRepository::new(db.pool()).cleanup_expired().await {
                    Ok(0) => tracing::debug!("No expired refresh tokens to clean up"),
                    Ok(count) => tracing::info!(
                        deleted_count = count,
                        "Cleaned up expired/revoked refresh tokens"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Failed to cleanup refresh tokens"),
                }
            }
        });
    }

    async fn bind(self) -> std::io::Result<(TcpListener, Router)> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;

        Self::start_token_cleanup_task(self.app_state.db.clone());
        self.rate_limits.clone().start_cleanup_task();

        tracing::info!("Web server listening on http://{}", listener.local_addr()?);
        Ok((listener, router))
    }

    /// Run the web server until it fails.
    pub async fn run(self) -> std::io::Result<()> {
        let (listener, router) = self.bind().await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    /// Start serving in the background and return the bound address.
    ///
    /// Useful in tests that bind to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let (listener, router) = self.bind().await?;
        let local_addr = listener.local_addr()?;

        tokio::spawn(async move {
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
