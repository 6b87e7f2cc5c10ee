//! Error types for the remote service client

use serde_json::Value;

/// Remote call failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// 404: the service does not know the project
    #[error("project not found")]
    NotFound,

    /// 403: the caller does not own the project
    #[error("permission denied: {0}")]
    Forbidden(String),

    /// Any other non-success status
    #[error("remote service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Connection refused, DNS failure, timeout, ...
    #[error("transport error: {0}")]
    Transport(String),

    /// Success status with an unreadable body
    #[error("invalid response from remote service: {0}")]
    Decode(String),

    /// Base URL could not be resolved
    #[error("invalid remote base url: {0}")]
    InvalidBaseUrl(String),
}

impl RemoteError {
    /// Map a non-success HTTP status and its body
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = error_message(body);
        match status {
            404 => Self::NotFound,
            403 => Self::Forbidden(message),
            _ => Self::Rejected { status, message },
        }
    }

    /// Check if error is a not-found response
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Check if error is an ownership rejection
    #[inline]
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }

    /// Check if the local store should take over
    ///
    /// Every failure other than not-found, forbidden and a bad
    /// configuration counts as a transport failure.
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::Transport(_) | Self::Decode(_)
        )
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::Transport(format!("connection failed: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Pull a readable message out of an error body
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for field in ["error", "message"] {
            if let Some(Value::String(message)) = map.get(field) {
                return message.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no details".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(RemoteError::from_status(404, ""), RemoteError::NotFound);
        assert_eq!(
            RemoteError::from_status(403, r#"{"error":"not your project"}"#),
            RemoteError::Forbidden("not your project".to_string())
        );
        assert_eq!(
            RemoteError::from_status(500, "boom"),
            RemoteError::Rejected {
                status: 500,
                message: "boom".to_string()
            }
        );
        assert_eq!(
            RemoteError::from_status(400, r#"{"message":"bad tags"}"#),
            RemoteError::Rejected {
                status: 400,
                message: "bad tags".to_string()
            }
        );
    }

    #[test]
    fn transport_classification() {
        assert!(RemoteError::Transport("refused".into()).is_transport());
        assert!(RemoteError::from_status(502, "").is_transport());
        assert!(RemoteError::Decode("eof".into()).is_transport());
        assert!(!RemoteError::NotFound.is_transport());
        assert!(!RemoteError::Forbidden(String::new()).is_transport());
        assert!(!RemoteError::InvalidBaseUrl(String::new()).is_transport());
    }
}
