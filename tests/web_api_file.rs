//! Web API file tests.

mod common;

use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{json, Value};

use common::TestApp;
use mycloud::file::FileRepository;

fn file_id(file: &Value) -> i64 {
    file["id"].as_i64().expect("file id")
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_file() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;

    let form = MultipartForm::new()
        .add_text("comment", "Q3 numbers")
        .add_part(
            "file",
            Part::bytes(b"%PDF-1.4 report".to_vec())
                .file_name("report.pdf")
                .mime_type("application/pdf"),
        );
    let response = app
        .server
        .post("/api/files")
        .authorization_bearer(&alice.token)
        .multipart(form)
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let file = &body["data"];
    assert_eq!(file["owner_id"], alice.id);
    assert_eq!(file["original_name"], "report.pdf");
    assert_eq!(file["size"], 15);
    assert_eq!(file["comment"], "Q3 numbers");
    assert!(file["last_download_at"].is_null());
    let link = file["special_link"].as_str().unwrap();
    assert_eq!(file["link_url"], format!("/api/download/{link}"));
    assert_eq!(app.blob_count("user_alice"), 1);
}

#[tokio::test]
async fn test_upload_strips_directories_from_name() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;

    let file = app.upload(&alice, "../../etc/passwd", b"root").await;
    assert_eq!(file["original_name"], "passwd");
}

#[tokio::test]
async fn test_upload_without_file() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;

    let form = MultipartForm::new().add_text("comment", "nothing attached");
    let response = app
        .server
        .post("/api/files")
        .authorization_bearer(&alice.token)
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_two_files_rejected() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;

    let form = MultipartForm::new()
        .add_part("file", Part::bytes(b"one".to_vec()).file_name("one.txt"))
        .add_part("file", Part::bytes(b"two".to_vec()).file_name("two.txt"));
    let response = app
        .server
        .post("/api/files")
        .authorization_bearer(&alice.token)
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(app.blob_count("user_alice"), 0);
}

#[tokio::test]
async fn test_upload_too_large() {
    let app = TestApp::with_config(|config| config.files.max_upload_size_mb = 1).await;
    let alice = app.register("alice").await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(vec![0u8; 1024 * 1024 + 1]).file_name("big.bin"),
    );
    let response = app
        .server
        .post("/api/files")
        .authorization_bearer(&alice.token)
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(app.blob_count("user_alice"), 0);

    let response = app
        .server
        .get("/api/files")
        .authorization_bearer(&alice.token)
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_upload_requires_auth() {
    let app = TestApp::new().await;

    let form = MultipartForm::new().add_part("file", Part::bytes(b"x".to_vec()).file_name("x"));
    let response = app.server.post("/api/files").multipart(form).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Listing and metadata
// ============================================================================

#[tokio::test]
async fn test_list_files_scoped_to_owner() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let bob = app.register("bobby").await;
    app.upload(&alice, "a1.txt", b"1").await;
    app.upload(&alice, "a2.txt", b"2").await;
    app.upload(&bob, "b1.txt", b"3").await;

    let response = app
        .server
        .get("/api/files")
        .authorization_bearer(&alice.token)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let files = body["data"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f["owner_id"] == alice.id));

    // Non-admins cannot widen the scope.
    let response = app
        .server
        .get("/api/files?all=true")
        .authorization_bearer(&alice.token)
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 2);

    let response = app
        .server
        .get(&format!("/api/files?user_id={}", bob.id))
        .authorization_bearer(&alice.token)
        .await;
    let body: Value = response.json();
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|f| f["owner_id"] == alice.id));
}

#[tokio::test]
async fn test_admin_lists_all_files() {
    let app = TestApp::new().await;
    let admin = app.register_admin("admin").await;
    let alice = app.register("alice").await;
    let bob = app.register("bobby").await;
    app.upload(&alice, "a.txt", b"a").await;
    app.upload(&bob, "b.txt", b"b").await;

    let response = app
        .server
        .get("/api/files")
        .authorization_bearer(&admin.token)
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 0);

    let response = app
        .server
        .get("/api/files?all=true")
        .authorization_bearer(&admin.token)
        .await;
    assert_eq!(response.json::<Value>()["data"].as_array().unwrap().len(), 2);

    let response = app
        .server
        .get(&format!("/api/files?user_id={}", bob.id))
        .authorization_bearer(&admin.token)
        .await;
    let body: Value = response.json();
    let files = body["data"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["original_name"], "b.txt");
}

#[tokio::test]
async fn test_get_file() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "notes.txt", b"hello").await;

    let response = app
        .server
        .get(&format!("/api/files/{}", file_id(&file)))
        .authorization_bearer(&alice.token)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["original_name"], "notes.txt");
    assert_eq!(body["data"]["special_link"], file["special_link"]);
}

#[tokio::test]
async fn test_get_missing_file() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;

    let response = app
        .server
        .get("/api/files/9999")
        .authorization_bearer(&alice.token)
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_other_users_file_forbidden() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let bob = app.register("bobby").await;
    let file = app.upload(&alice, "private.txt", b"secret").await;
    let id = file_id(&file);

    app.server
        .get(&format!("/api/files/{id}"))
        .authorization_bearer(&bob.token)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .get(&format!("/api/files/{id}/download"))
        .authorization_bearer(&bob.token)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .put(&format!("/api/files/{id}"))
        .authorization_bearer(&bob.token)
        .json(&json!({ "original_name": "mine.txt" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .delete(&format!("/api/files/{id}"))
        .authorization_bearer(&bob.token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Still intact.
    let response = app
        .server
        .get(&format!("/api/files/{id}"))
        .authorization_bearer(&alice.token)
        .await;
    assert_eq!(response.json::<Value>()["data"]["original_name"], "private.txt");
}

#[tokio::test]
async fn test_admin_can_access_any_file() {
    let app = TestApp::new().await;
    let admin = app.register_admin("admin").await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "a.txt", b"abc").await;

    let response = app
        .server
        .get(&format!("/api/files/{}/download", file_id(&file)))
        .authorization_bearer(&admin.token)
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"abc");
}

// ============================================================================
// Update and delete
// ============================================================================

#[tokio::test]
async fn test_update_file_keeps_link() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "draft.txt", b"text").await;
    let id = file_id(&file);

    let response = app
        .server
        .put(&format!("/api/files/{id}"))
        .authorization_bearer(&alice.token)
        .json(&json!({ "original_name": "final.txt", "comment": "done" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["original_name"], "final.txt");
    assert_eq!(body["data"]["comment"], "done");
    assert_eq!(body["data"]["special_link"], file["special_link"]);
    assert_eq!(body["data"]["size"], 4);

    let response = app
        .server
        .patch(&format!("/api/files/{id}"))
        .authorization_bearer(&alice.token)
        .json(&json!({ "comment": "" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["original_name"], "final.txt");
    assert_eq!(body["data"]["comment"], "");

    // Downloads use the new name.
    let response = app
        .server
        .get(&format!("/api/files/{id}/download"))
        .authorization_bearer(&alice.token)
        .await;
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"final.txt\""
    );
}

#[tokio::test]
async fn test_update_file_invalid_name() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "a.txt", b"a").await;

    let response = app
        .server
        .put(&format!("/api/files/{}", file_id(&file)))
        .authorization_bearer(&alice.token)
        .json(&json!({ "original_name": "   " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_file() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "gone.txt", b"bye").await;
    let id = file_id(&file);
    let link = file["special_link"].as_str().unwrap().to_string();

    app.server
        .delete(&format!("/api/files/{id}"))
        .authorization_bearer(&alice.token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get(&format!("/api/files/{id}"))
        .authorization_bearer(&alice.token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get(&format!("/api/download/{link}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert_eq!(app.blob_count("user_alice"), 0);
}

// ============================================================================
// Downloads
// ============================================================================

#[tokio::test]
async fn test_download_file() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "report.pdf", b"%PDF-1.4").await;
    let id = file_id(&file);

    let response = app
        .server
        .get(&format!("/api/files/{id}/download"))
        .authorization_bearer(&alice.token)
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"%PDF-1.4");
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report.pdf\""
    );
    assert_eq!(headers[header::CONTENT_LENGTH], "8");

    let response = app
        .server
        .get(&format!("/api/files/{id}"))
        .authorization_bearer(&alice.token)
        .await;
    assert!(response.json::<Value>()["data"]["last_download_at"].is_string());
}

#[tokio::test]
async fn test_download_with_query_token() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "a.txt", b"a").await;
    let id = file_id(&file);

    app.server
        .get(&format!("/api/files/{id}/download?token={}", alice.token))
        .await
        .assert_status_ok();
    app.server
        .get(&format!("/api/files/{id}/view?token={}", alice.token))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_query_token_rejected_outside_content_routes() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "a.txt", b"a").await;

    app.server
        .get(&format!("/api/files/{}?token={}", file_id(&file), alice.token))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get(&format!("/api/files?token={}", alice.token))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get(&format!("/api/auth/me?token={}", alice.token))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_view_file_inline() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "page.html", b"<p>hi</p>").await;
    let id = file_id(&file);

    let response = app
        .server
        .get(&format!("/api/files/{id}/view"))
        .authorization_bearer(&alice.token)
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"<p>hi</p>");
    let headers = response.headers();
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "inline; filename=\"page.html\""
    );
    assert_eq!(headers[header::CONTENT_SECURITY_POLICY], "sandbox");

    // Viewing is not a download.
    let response = app
        .server
        .get(&format!("/api/files/{id}"))
        .authorization_bearer(&alice.token)
        .await;
    assert!(response.json::<Value>()["data"]["last_download_at"].is_null());
}

#[tokio::test]
async fn test_download_missing_blob() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "lost.txt", b"lost").await;
    let id = file_id(&file);

    let record = FileRepository::new(app.db.pool())
        .get_by_id(id)
        .await
        .unwrap()
        .unwrap();
    std::fs::remove_file(app.storage_root.join(&record.stored_path)).unwrap();

    let response = app
        .server
        .get(&format!("/api/files/{id}/download"))
        .authorization_bearer(&alice.token)
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "BLOB_MISSING");

    // The record stays; deleting it still works.
    app.server
        .delete(&format!("/api/files/{id}"))
        .authorization_bearer(&alice.token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

// ============================================================================
// Public links
// ============================================================================

#[tokio::test]
async fn test_public_link_download() {
    let app = TestApp::new().await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "shared.txt", b"for everyone").await;
    let link_url = file["link_url"].as_str().unwrap();

    let response = app.server.get(link_url).await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"for everyone");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"shared.txt\""
    );

    let response = app
        .server
        .get(&format!("/api/files/{}", file_id(&file)))
        .authorization_bearer(&alice.token)
        .await;
    assert!(response.json::<Value>()["data"]["last_download_at"].is_string());
}

#[tokio::test]
async fn test_public_link_unknown_or_malformed() {
    let app = TestApp::new().await;

    app.server
        .get("/api/download/9f0c2a44-1d1e-4c55-8a8f-5d0f3c1d2e3f")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get("/api/download/not-a-token")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_public_link_rate_limited() {
    let app = TestApp::with_config(|config| config.web.link_rate_limit = 1).await;
    let alice = app.register("alice").await;
    let file = app.upload(&alice, "a.txt", b"a").await;
    let link_url = file["link_url"].as_str().unwrap();

    app.server.get(link_url).await.assert_status_ok();
    app.server
        .get(link_url)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}
