//! Project metadata and its sanitization rules
//!
//! Every write goes through [`ProjectMetadata::sanitize`]:
//! - blank names fall back to [`DEFAULT_PROJECT_NAME`]
//! - names, descriptions and tags are trimmed
//! - tags are deduplicated (case-insensitive, first spelling wins)
//! - limits are enforced by rejecting the call, never by truncation

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name used when the caller leaves it blank
pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";
/// Maximum display name length (characters)
pub const MAX_NAME_CHARS: usize = 100;
/// Maximum description length (characters)
pub const MAX_DESCRIPTION_CHARS: usize = 500;
/// Maximum number of distinct tags
pub const MAX_TAGS: usize = 10;
/// Maximum tag length (characters)
pub const MAX_TAG_CHARS: usize = 30;

/// Caller-supplied project metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Visible to everyone when true
    #[serde(default)]
    pub is_public: bool,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ProjectMetadata {
    /// Create metadata with a name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With visibility
    #[inline]
    #[must_use]
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// With tags
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Apply defaults and enforce limits
    ///
    /// # Errors
    /// - `ValidationError::NameTooLong` / `DescriptionTooLong` when over the limit
    /// - `ValidationError::TagTooLong` for any tag over [`MAX_TAG_CHARS`]
    /// - `ValidationError::TooManyTags` when more than [`MAX_TAGS`] remain after deduplication
    pub fn sanitize(&self) -> Result<Self, ValidationError> {
        let name = match self.name.trim() {
            "" => DEFAULT_PROJECT_NAME.to_string(),
            trimmed => trimmed.to_string(),
        };
        let len = name.chars().count();
        if len > MAX_NAME_CHARS {
            return Err(ValidationError::NameTooLong {
                len,
                max: MAX_NAME_CHARS,
            });
        }

        let description = self.description.trim().to_string();
        let len = description.chars().count();
        if len > MAX_DESCRIPTION_CHARS {
            return Err(ValidationError::DescriptionTooLong {
                len,
                max: MAX_DESCRIPTION_CHARS,
            });
        }

        let tags = sanitize_tags(&self.tags)?;

        Ok(Self {
            name,
            description,
            is_public: self.is_public,
            tags,
        })
    }
}

fn sanitize_tags(raw: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for tag in raw.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(ValidationError::TagTooLong {
                tag: tag.to_string(),
                max: MAX_TAG_CHARS,
            });
        }
        if seen.insert(tag.to_lowercase()) {
            tags.push(tag.to_string());
        }
    }
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::TooManyTags {
            count: tags.len(),
            max: MAX_TAGS,
        });
    }
    Ok(tags)
}
