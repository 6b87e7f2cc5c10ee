//! The remote backend seam
//!
//! [`RemoteBackend`] is what the persistence gateway talks to. Production
//! code uses [`crate::HttpRemote`]; tests use a fake or the generated
//! `MockRemoteBackend` (feature `mock`).

use crate::error::RemoteError;
use crate::wire::{
    CreateProjectRequest, ImportProjectRequest, RemoteProject, UpdateProjectRequest,
};
use async_trait::async_trait;
use plansync_model::{ProjectId, UserId};

/// Remote project service
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Create a project; returns the server-generated identifier
    async fn create(&self, request: &CreateProjectRequest) -> Result<ProjectId, RemoteError>;

    /// Replace metadata and payload of an existing project
    async fn update(
        &self,
        id: &ProjectId,
        request: &UpdateProjectRequest,
    ) -> Result<(), RemoteError>;

    /// Load a full project as seen by `user`
    async fn load(&self, id: &ProjectId, user: &UserId) -> Result<RemoteProject, RemoteError>;

    /// Delete a project owned by `user`
    async fn delete(&self, id: &ProjectId, user: &UserId) -> Result<(), RemoteError>;

    /// Summaries of every project owned by `user`
    async fn list_for_user(&self, user: &UserId) -> Result<Vec<RemoteProject>, RemoteError>;

    /// Summaries of every public project
    async fn list_public(&self) -> Result<Vec<RemoteProject>, RemoteError>;

    /// Bulk import of a local project during migration
    async fn import(&self, request: &ImportProjectRequest) -> Result<ProjectId, RemoteError>;
}
