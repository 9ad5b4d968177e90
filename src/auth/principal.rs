//! Authenticated principal and authorization predicates.
//!
//! Every file operation except public-link download, and every user
//! administration operation, runs on behalf of a [`Principal`].

use crate::db::User;
use crate::file::FileRecord;
use crate::{CloudError, Result};

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    /// Storage root new uploads are placed under.
    pub storage_root: String,
}

impl Principal {
    /// True iff `file` belongs to this principal.
    pub fn is_owner(&self, file: &FileRecord) -> bool {
        file.owner_id == self.user_id
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Owner or admin, otherwise `Forbidden`.
    pub fn require_owner_or_admin(&self, file: &FileRecord) -> Result<()> {
        if self.is_owner(file) || self.is_admin() {
            Ok(())
        } else {
            Err(CloudError::Forbidden(
                "you do not have access to this file".to_string(),
            ))
        }
    }

    /// Admin, otherwise `Forbidden`.
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CloudError::Forbidden(
                "administrator privileges required".to_string(),
            ))
        }
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
            storage_root: user.storage_root.clone(),
        }
    }
}

impl From<User> for Principal {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            storage_root: user.storage_root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(user_id: i64, is_admin: bool) -> Principal {
        Principal {
            user_id,
            username: format!("user{user_id}"),
            is_admin,
            storage_root: format!("user_user{user_id}"),
        }
    }

    fn file_owned_by(owner_id: i64) -> FileRecord {
        FileRecord {
            id: 1,
            owner_id,
            original_name: "a.txt".to_string(),
            stored_path: format!("user_user{owner_id}/x.txt"),
            size: 1,
            comment: String::new(),
            created_at: "2024-01-01 00:00:00".to_string(),
            last_download_at: None,
            special_link: "link".to_string(),
        }
    }

    #[test]
    fn test_owner_has_access() {
        let p = principal(1, false);
        let file = file_owned_by(1);
        assert!(p.is_owner(&file));
        assert!(p.require_owner_or_admin(&file).is_ok());
    }

    #[test]
    fn test_admin_has_access() {
        let p = principal(2, true);
        let file = file_owned_by(1);
        assert!(!p.is_owner(&file));
        assert!(p.require_owner_or_admin(&file).is_ok());
        assert!(p.require_admin().is_ok());
    }

    #[test]
    fn test_stranger_is_forbidden() {
        let p = principal(2, false);
        let file = file_owned_by(1);
        assert!(matches!(
            p.require_owner_or_admin(&file),
            Err(CloudError::Forbidden(_))
        ));
        assert!(matches!(p.require_admin(), Err(CloudError::Forbidden(_))));
    }
}
