//! Test helpers for web API tests.
//!
//! Builds the real application router over an in-memory database and a
//! temporary blob directory, and wraps the common API calls.

#![allow(dead_code)]

use std::path::PathBuf;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use mycloud::config::Config;
use mycloud::db::{UserRepository, UserUpdate};
use mycloud::web::WebServer;
use mycloud::Database;

pub const PASSWORD: &str = "password123";

/// A running application plus handles to its storage.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub storage_root: PathBuf,
    _dir: TempDir,
}

/// An account created through the API.
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
    pub refresh_token: String,
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.web.host = "127.0.0.1".to_string();
    config.web.port = 0;
    config.web.jwt_secret = "test-secret-key-for-testing-only".to_string();
    config.web.login_rate_limit = 1000;
    config.web.link_rate_limit = 1000;
    config.files.storage_path = dir.path().join("media").to_string_lossy().into_owned();
    config
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = test_config(&dir);
        adjust(&mut config);

        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        let web = WebServer::new(&config, db.clone()).expect("Failed to create web server");
        let server = TestServer::new(web.router()).expect("Failed to create test server");

        Self {
            server,
            db,
            storage_root: PathBuf::from(&config.files.storage_path),
            _dir: dir,
        }
    }

    /// Register an account and return its tokens.
    pub async fn register(&self, username: &str) -> TestUser {
        let response = self
            .server
            .post("/api/auth/register")
            .json(&json!({
                "username": username,
                "password": PASSWORD,
                "email": format!("{username}@example.com"),
                "full_name": format!("{username} tester"),
            }))
            .await;
        let body: Value = response.json();
        TestUser {
            id: body["data"]["user"]["id"].as_i64().expect("user id"),
            username: username.to_string(),
            token: body["data"]["access_token"]
                .as_str()
                .expect("access token")
                .to_string(),
            refresh_token: body["data"]["refresh_token"]
                .as_str()
                .expect("refresh token")
                .to_string(),
        }
    }

    /// Register an account and give it the admin flag.
    pub async fn register_admin(&self, username: &str) -> TestUser {
        let user = self.register(username).await;
        UserRepository::new(self.db.pool())
            .update(user.id, &UserUpdate::new().is_admin(true))
            .await
            .expect("Failed to promote user");
        user
    }

    /// Upload a file and return the `data` object of the response.
    pub async fn upload(&self, user: &TestUser, name: &str, content: &[u8]) -> Value {
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(content.to_vec())
                .file_name(name)
                .mime_type("application/octet-stream"),
        );
        let response = self
            .server
            .post("/api/files")
            .authorization_bearer(&user.token)
            .multipart(form)
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["data"].clone()
    }

    /// Number of blobs currently stored for a storage root.
    pub fn blob_count(&self, storage_root: &str) -> usize {
        std::fs::read_dir(self.storage_root.join(storage_root))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
