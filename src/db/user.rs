//! User model for MyCloud.

/// Prefix of every per-user storage root.
pub const STORAGE_ROOT_PREFIX: &str = "user_";

/// User entity representing a registered account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login username (unique, case-insensitive).
    pub username: String,
    /// Email address (unique, case-insensitive).
    pub email: String,
    /// Password hash (Argon2).
    pub password: String,
    /// Display name.
    pub full_name: String,
    /// Administrator flag.
    pub is_admin: bool,
    /// Directory, relative to the blob root, holding this user's files.
    ///
    /// Derived from the username at creation and never recomputed.
    pub storage_root: String,
    /// Account creation timestamp.
    pub created_at: String,
    /// Last login timestamp.
    pub last_login: Option<String>,
}

/// A user together with the number and total size of the files they own.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserWithStats {
    #[sqlx(flatten)]
    pub user: User,
    pub files_count: i64,
    pub total_size: i64,
}

/// Data for creating a new user.
///
/// The storage root is assigned here, once, and there is no way to change
/// it afterwards: [`UserUpdate`] has no field for it.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// Password hash (pre-hashed with Argon2).
    pub password: String,
    pub email: String,
    pub full_name: String,
    pub is_admin: bool,
    pub storage_root: String,
}

impl NewUser {
    /// Create a regular (non-admin) user.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Self {
        let username = username.into();
        let storage_root = format!("{STORAGE_ROOT_PREFIX}{username}");
        Self {
            username,
            password: password.into(),
            email: email.into(),
            full_name: full_name.into(),
            is_admin: false,
            storage_root,
        }
    }

    /// Set the administrator flag.
    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }
}

/// Data for updating an existing user.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// New password hash.
    pub password: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: Option<bool>,
}

impl UserUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn is_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = Some(is_admin);
        self
    }

    /// Check if the update has no changes.
    pub fn is_empty(&self) -> bool {
        self.password.is_none()
            && self.username.is_none()
            && self.email.is_none()
            && self.full_name.is_none()
            && self.is_admin.is_none()
    }
}
