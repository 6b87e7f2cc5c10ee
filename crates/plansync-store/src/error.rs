//! Error types for the local store

use std::path::PathBuf;

/// Local store failure
///
/// A failed write never leaves a key half-written: the key keeps its
/// previous value.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Write would exceed the configured size limit
    #[error("local storage is full: writing '{key}' needs {required} bytes but the limit is {limit} bytes")]
    QuotaExceeded {
        key: String,
        required: u64,
        limit: u64,
    },

    /// IO error on the backing file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Value could not be encoded
    #[error("failed to encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Key contains characters the backend cannot address
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is a size limit
    #[inline]
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_error_is_actionable() {
        let err = StoreError::QuotaExceeded {
            key: "plansync.backups".to_string(),
            required: 6_000_000,
            limit: 5_242_880,
        };
        assert!(err.is_quota_exceeded());
        assert!(err.to_string().contains("local storage is full"));
        assert!(!StoreError::InvalidKey("a/b".to_string()).is_quota_exceeded());
    }
}
