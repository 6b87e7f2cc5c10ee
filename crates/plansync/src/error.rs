//! Error types for the plansync engine
//!
//! One error surfaced by every engine operation:
//! - Validation and permission failures are surfaced immediately
//! - Transport failures are absorbed by the local fallback where one exists
//! - Storage failures carry an actionable message

use plansync_model::{ProjectId, ValidationError};
use plansync_remote::RemoteError;
use plansync_store::StoreError;
use serde::Serialize;

/// Engine error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// Malformed payload or metadata over the limits
    #[error("invalid project: {0}")]
    Validation(#[from] ValidationError),

    /// Caller does not own the record
    #[error("permission denied: {0}")]
    Permission(String),

    /// No backend holds the record
    #[error("{0} not found")]
    NotFound(String),

    /// Remote service unreachable and no local fallback applies
    #[error("remote service unavailable: {0}")]
    Transport(String),

    /// Stored data failed to parse
    #[error("stored data is corrupted: {0}")]
    StorageCorruption(String),

    /// Local store is full
    ///
    /// `remote_id` is set when the project was already created remotely
    /// and only the local mirror write failed.
    #[error("local storage is full ({required} bytes needed, limit {limit} bytes)")]
    QuotaExceeded {
        required: u64,
        limit: u64,
        remote_id: Option<ProjectId>,
    },

    /// Operation needs a signed-in user
    #[error("sign in required")]
    NotAuthenticated,

    /// Destructive operation called without confirmation
    #[error("confirmation required")]
    ConfirmationRequired,

    /// Other local storage failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Bad configuration or missing runtime
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Not-found error for a project
    #[inline]
    pub fn project_not_found(id: &ProjectId) -> Self {
        Self::NotFound(format!("project {id}"))
    }

    /// Check if the local store should take over
    #[inline]
    #[must_use]
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if error is a not-found
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Short message suitable for the person using the application
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => format!("The project could not be saved: {err}."),
            Self::Permission(_) => "You do not have permission to change this project.".to_string(),
            Self::NotFound(what) => format!("The {what} could not be found."),
            Self::Transport(_) => {
                "The server could not be reached. Check your connection and try again.".to_string()
            }
            Self::StorageCorruption(_) => {
                "Saved data could not be read and was skipped.".to_string()
            }
            Self::QuotaExceeded { .. } => {
                "Local storage is full. Delete old backups or projects to free space.".to_string()
            }
            Self::NotAuthenticated => "Sign in to continue.".to_string(),
            Self::ConfirmationRequired => "Please confirm this action to continue.".to_string(),
            Self::Storage(_) => "Saving to this device failed.".to_string(),
            Self::Config(_) => "The application is misconfigured.".to_string(),
        }
    }

    /// Attach the remote identifier to a quota failure after a remote create
    #[must_use]
    pub(crate) fn with_remote_id(self, id: &ProjectId) -> Self {
        match self {
            Self::QuotaExceeded {
                required, limit, ..
            } => Self::QuotaExceeded {
                required,
                limit,
                remote_id: Some(id.clone()),
            },
            other => other,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::QuotaExceeded {
                required, limit, ..
            } => Self::QuotaExceeded {
                required,
                limit,
                remote_id: None,
            },
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound => Self::NotFound("remote project".to_string()),
            RemoteError::Forbidden(message) => Self::Permission(message),
            RemoteError::InvalidBaseUrl(message) => Self::Config(message),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Result object for callers that want a flag and a message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    pub message: Option<String>,
    pub value: Option<T>,
}

impl<T> Outcome<T> {
    /// Successful outcome
    #[inline]
    #[must_use]
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            message: None,
            value: Some(value),
        }
    }

    /// Failed outcome carrying the user-facing message
    #[must_use]
    pub fn failed(error: &SyncError) -> Self {
        Self {
            success: false,
            message: Some(error.user_message()),
            value: None,
        }
    }
}

impl<T> From<Result<T, SyncError>> for Outcome<T> {
    fn from(result: Result<T, SyncError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(error) => Self::failed(&error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_map_to_taxonomy() {
        assert!(SyncError::from(RemoteError::NotFound).is_not_found());
        assert_eq!(
            SyncError::from(RemoteError::Forbidden("nope".into())),
            SyncError::Permission("nope".into())
        );
        assert!(SyncError::from(RemoteError::Transport("refused".into())).triggers_fallback());
        assert!(SyncError::from(RemoteError::from_status(503, "")).triggers_fallback());
        assert!(matches!(
            SyncError::from(RemoteError::InvalidBaseUrl("x".into())),
            SyncError::Config(_)
        ));
    }

    #[test]
    fn quota_errors_keep_sizes() {
        let err = SyncError::from(StoreError::QuotaExceeded {
            key: "plansync.projects".into(),
            required: 10,
            limit: 5,
        });
        assert_eq!(
            err,
            SyncError::QuotaExceeded {
                required: 10,
                limit: 5,
                remote_id: None
            }
        );

        let err = err.with_remote_id(&ProjectId::new("srv-1"));
        assert!(matches!(
            err,
            SyncError::QuotaExceeded { remote_id: Some(ref id), .. } if id.as_str() == "srv-1"
        ));
        assert!(err.user_message().contains("Local storage is full"));
    }

    #[test]
    fn outcome_from_result() {
        let ok: Outcome<u32> = Ok(3).into();
        assert!(ok.success);
        assert_eq!(ok.value, Some(3));

        let failed: Outcome<u32> = Err(SyncError::NotAuthenticated).into();
        assert!(!failed.success);
        assert_eq!(failed.message.as_deref(), Some("Sign in to continue."));
        assert_eq!(failed.value, None);
    }
}
