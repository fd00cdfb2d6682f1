//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `SessionId`: UUID-based unique session identifier
//! - `Username`: validated chat username (3-12 alphanumeric characters)

use uuid::Uuid;

use crate::error::AppError;

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe session identification. A connection gets
/// a SessionId as soon as it is accepted, before any username is claimed.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated chat username
///
/// Usernames are 3-12 ASCII alphanumeric characters. The original casing is
/// preserved for display; uniqueness is enforced on the lowercase form via
/// [`Username::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Minimum accepted username length
    pub const MIN_LEN: usize = 3;
    /// Maximum accepted username length
    pub const MAX_LEN: usize = 12;

    /// Validate and construct a username from raw client input
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        let valid = (Self::MIN_LEN..=Self::MAX_LEN).contains(&trimmed.len())
            && trimmed.chars().all(|c| c.is_ascii_alphanumeric());
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(AppError::InvalidUsername(raw.trim().to_string()))
        }
    }

    /// The display form, as the user typed it
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The lowercase uniqueness key used by the user registry
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_unique() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_username_valid() {
        let name = Username::parse("Alice").unwrap();
        assert_eq!(name.as_str(), "Alice");
        assert_eq!(name.key(), "alice");
    }

    #[test]
    fn test_username_trims_whitespace() {
        let name = Username::parse("  bob42 \r").unwrap();
        assert_eq!(name.as_str(), "bob42");
    }

    #[test]
    fn test_username_too_short() {
        assert!(Username::parse("ab").is_err());
    }

    #[test]
    fn test_username_too_long() {
        assert!(Username::parse("abcdefghijklm").is_err());
    }

    #[test]
    fn test_username_rejects_symbols() {
        assert!(Username::parse("al ice").is_err());
        assert!(Username::parse("alice!").is_err());
        assert!(Username::parse("").is_err());
    }
}
