//! Public download link tokens.
//!
//! A link token is the only credential needed to download a file through
//! its public link. Tokens are random UUID v4 values (122 random bits),
//! assigned when the file is registered and never changed afterwards.

use std::fmt;

use uuid::Uuid;

/// Opaque, unguessable token identifying a file's public link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkToken(String);

impl LinkToken {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse a token presented by a client.
    ///
    /// Returns None for anything that is not a UUID, which can never match a
    /// stored link. Accepts any UUID spelling and normalizes it to the
    /// lowercase hyphenated form used in the database.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim())
            .ok()
            .map(|uuid| Self(uuid.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LinkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the public download URL path for a token.
pub fn link_path(token: &str) -> String {
    format!("/api/download/{token}")
}
