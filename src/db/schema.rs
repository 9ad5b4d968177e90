//! Database schema and migrations for MyCloud.
//!
//! Migrations are applied in order; the schema_version table tracks which
//! ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: users and files
    r#"
CREATE TABLE users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password      TEXT NOT NULL,           -- Argon2 hash
    full_name     TEXT NOT NULL,
    is_admin      INTEGER NOT NULL DEFAULT 0,
    storage_root  TEXT NOT NULL UNIQUE,    -- assigned once at creation
    created_at    TEXT NOT NULL DEFAULT (datetime('now')),
    last_login    TEXT
);

CREATE TABLE files (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id          INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    original_name     TEXT NOT NULL,
    stored_path       TEXT NOT NULL UNIQUE,
    size              INTEGER NOT NULL,
    comment           TEXT NOT NULL DEFAULT '',
    created_at        TEXT NOT NULL DEFAULT (datetime('now')),
    last_download_at  TEXT,
    special_link      TEXT NOT NULL UNIQUE
);

CREATE INDEX idx_files_owner_id ON files(owner_id);
CREATE INDEX idx_files_created_at ON files(created_at);
"#,
    // v2: refresh tokens for the Web API
    r#"
CREATE TABLE refresh_tokens (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token       TEXT NOT NULL UNIQUE,
    expires_at  TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    revoked_at  TEXT
);

CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id);
"#,
];
