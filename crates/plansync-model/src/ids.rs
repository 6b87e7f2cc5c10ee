//! Identifier newtypes
//!
//! - [`UserId`]: session user, with the anonymous sentinel
//! - [`ProjectId`]: opaque project identifier (client- or server-generated)
//! - [`BackupId`]: time-derived ULID, sortable by capture time

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// User identifier used when nobody is signed in
pub const ANONYMOUS_USER: &str = "anonymous";

/// Prefix of identifiers generated on the client
const LOCAL_ID_PREFIX: &str = "local_";

/// User identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identifier (not validated; see [`UserId::parse`])
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a non-blank identifier
    ///
    /// # Errors
    /// `ValidationError::BlankIdentifier` if the input is empty or whitespace
    pub fn parse(id: &str) -> Result<Self, ValidationError> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::BlankIdentifier);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The anonymous sentinel
    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self(ANONYMOUS_USER.to_string())
    }

    /// Whether this is the anonymous sentinel
    #[inline]
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.0 == ANONYMOUS_USER
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Project identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Wrap an identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a client-side identifier
    #[must_use]
    pub fn new_local() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{}", Ulid::new().to_string().to_lowercase()))
    }

    /// Whether the identifier was generated on this client
    #[inline]
    #[must_use]
    pub fn is_client_generated(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Backup identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(pub Ulid);

impl BackupId {
    /// Generate new backup ID from the current time
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Milliseconds since the Unix epoch encoded in the identifier
    #[inline]
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for BackupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BackupId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|e| ValidationError::malformed(format!("invalid backup id '{s}': {e}")))
    }
}
