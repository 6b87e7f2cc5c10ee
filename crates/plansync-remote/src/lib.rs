//! plansync remote client
//!
//! Typed access to the remote project service. The persistence gateway only
//! sees the [`RemoteBackend`] trait; [`HttpRemote`] speaks HTTP/JSON to the
//! real service.
//!
//! # Error mapping
//!
//! | Response | [`RemoteError`] |
//! |---|---|
//! | 404 | `NotFound` |
//! | 403 | `Forbidden` |
//! | other non-2xx | `Rejected` |
//! | connect/timeout | `Transport` |
//! | unreadable body | `Decode` |

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod wire;

#[cfg(any(test, feature = "mock"))]
pub use backend::MockRemoteBackend;
pub use backend::RemoteBackend;
pub use config::{Deployment, RemoteConfig, API_URL_ENV, DEVELOPMENT_BASE_URL};
pub use error::RemoteError;
pub use http::HttpRemote;
pub use wire::{
    CreateProjectRequest, CreatedResponse, DeleteProjectRequest, ImportProjectRequest,
    RemoteProject, UpdateProjectRequest,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
