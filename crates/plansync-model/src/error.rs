//! Validation errors for records and payloads
//!
//! Validation errors are always surfaced to the caller and never retried.

/// Rejected payload or metadata
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Payload carried nothing
    #[error("project data is empty")]
    EmptyPayload,

    /// Payload is not the expected shape
    #[error("project data is malformed: {0}")]
    MalformedPayload(String),

    /// A required top-level field is absent
    #[error("project data is missing `{0}`")]
    MissingField(&'static str),

    /// Display name exceeds the limit
    #[error("project name is too long ({len} characters, max {max})")]
    NameTooLong { len: usize, max: usize },

    /// Description exceeds the limit
    #[error("project description is too long ({len} characters, max {max})")]
    DescriptionTooLong { len: usize, max: usize },

    /// Too many distinct tags
    #[error("too many tags ({count}, max {max})")]
    TooManyTags { count: usize, max: usize },

    /// One tag exceeds the limit
    #[error("tag '{tag}' is too long (max {max} characters)")]
    TagTooLong { tag: String, max: usize },

    /// Blank identifier where one is required
    #[error("identifier must not be blank")]
    BlankIdentifier,
}

impl ValidationError {
    /// Create malformed payload error
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }
}
