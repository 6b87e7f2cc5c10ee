//! Remote service configuration
//!
//! Base path precedence:
//! 1. explicit override (`base_url_override`, filled from `PLANSYNC_API_URL` by the engine)
//! 2. `<origin>/api` in production deployments
//! 3. the local development URL

use crate::error::RemoteError;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the base URL
pub const API_URL_ENV: &str = "PLANSYNC_API_URL";
/// Base URL used in development deployments
pub const DEVELOPMENT_BASE_URL: &str = "http://localhost:3001/api";
/// Path of the service relative to the production origin
pub const PRODUCTION_API_PATH: &str = "/api";

/// Deployment flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    /// Served next to the client under `/api`
    Production,
    /// Local service on a fixed port
    #[default]
    Development,
}

/// Remote service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Explicit base URL, wins over everything else
    pub base_url_override: Option<String>,
    /// Deployment flavour
    pub deployment: Deployment,
    /// Origin the client is served from (production only)
    pub origin: Option<String>,
    /// Transport timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url_override: None,
            deployment: Deployment::Development,
            origin: None,
            timeout_secs: 10,
        }
    }
}

impl RemoteConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With explicit base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url_override = Some(url.into());
        self
    }

    /// With production origin
    #[inline]
    #[must_use]
    pub fn production(mut self, origin: impl Into<String>) -> Self {
        self.deployment = Deployment::Production;
        self.origin = Some(origin.into());
        self
    }

    /// With transport timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Resolve the base URL of the service
    ///
    /// # Errors
    /// `RemoteError::InvalidBaseUrl` if the chosen URL does not parse, or a
    /// production deployment has no origin
    pub fn resolve_base_url(&self) -> Result<Url, RemoteError> {
        let url = if let Some(raw) = &self.base_url_override {
            parse_base(raw)?
        } else {
            match self.deployment {
                Deployment::Production => {
                    let origin = self.origin.as_deref().ok_or_else(|| {
                        RemoteError::InvalidBaseUrl(
                            "production deployment needs an origin".to_string(),
                        )
                    })?;
                    parse_base(origin)?
                        .join(PRODUCTION_API_PATH)
                        .map_err(|e| RemoteError::InvalidBaseUrl(e.to_string()))?
                }
                Deployment::Development => parse_base(DEVELOPMENT_BASE_URL)?,
            }
        };
        Ok(url)
    }
}

fn parse_base(raw: &str) -> Result<Url, RemoteError> {
    let url = Url::parse(raw.trim()).map_err(|e| RemoteError::InvalidBaseUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(RemoteError::InvalidBaseUrl(format!("{raw}: not a base url")));
    }
    Ok(url)
}
