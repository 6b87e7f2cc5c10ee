//! Request and response bodies of the project service
//!
//! | Operation | Method | Path |
//! |---|---|---|
//! | create | POST | `/projects` |
//! | update | PUT | `/projects/:id` |
//! | load | GET | `/projects/:id?userId=` |
//! | delete | DELETE | `/projects/:id` |
//! | list (mine) | GET | `/projects/user/:userId` |
//! | list (public) | GET | `/projects/public` |
//! | import | POST | `/projects/import` |

use chrono::{DateTime, Utc};
use plansync_model::{
    PlanDocument, ProjectId, ProjectMetadata, ProjectRecord, ProjectSummary, Residency, SyncState,
    UserId, ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /projects`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub project_data: Value,
    pub is_public: bool,
    pub tags: Vec<String>,
}

impl CreateProjectRequest {
    /// Build from sanitized metadata and a validated payload
    ///
    /// # Errors
    /// `ValidationError` if the payload cannot be encoded
    pub fn new(
        user_id: UserId,
        metadata: &ProjectMetadata,
        payload: &PlanDocument,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            user_id,
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            project_data: payload.to_value()?,
            is_public: metadata.is_public,
            tags: metadata.tags.clone(),
        })
    }
}

/// Body of `PUT /projects/:id`
///
/// Carries `userId` so the service can check ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub project_data: Value,
    pub is_public: bool,
    pub tags: Vec<String>,
}

impl UpdateProjectRequest {
    /// Build from sanitized metadata and a validated payload
    ///
    /// # Errors
    /// `ValidationError` if the payload cannot be encoded
    pub fn new(
        user_id: UserId,
        metadata: &ProjectMetadata,
        payload: &PlanDocument,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            user_id,
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            project_data: payload.to_value()?,
            is_public: metadata.is_public,
            tags: metadata.tags.clone(),
        })
    }
}

/// Body of `POST /projects/import`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProjectRequest {
    #[serde(flatten)]
    pub project: CreateProjectRequest,
    /// Local identifier the project is migrated from
    pub original_id: ProjectId,
}

impl ImportProjectRequest {
    /// Build an import of a local record on behalf of `user_id`
    ///
    /// # Errors
    /// `ValidationError` if the payload cannot be encoded
    pub fn from_record(record: &ProjectRecord, user_id: UserId) -> Result<Self, ValidationError> {
        Ok(Self {
            project: CreateProjectRequest::new(user_id, &record.metadata(), &record.payload)?,
            original_id: record.id.clone(),
        })
    }
}

/// Body of `DELETE /projects/:id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProjectRequest {
    pub user_id: UserId,
}

/// `{ id }` returned by create and import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedResponse {
    #[serde(alias = "_id", alias = "projectId")]
    pub id: ProjectId,
}

/// Project document as served by the remote service
///
/// List endpoints return summaries without `projectData`. The owner is
/// required: a project without one would read as anonymous and become
/// editable by anyone once mirrored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProject {
    #[serde(alias = "_id")]
    pub id: ProjectId,
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteProject {
    /// Convert to a `Synced` record, validating the payload shape
    ///
    /// Missing timestamps are filled with `now`.
    ///
    /// # Errors
    /// `ValidationError` if `projectData` is absent or malformed
    pub fn into_record(self, now: DateTime<Utc>) -> Result<ProjectRecord, ValidationError> {
        let payload = match self.project_data {
            Some(data) => PlanDocument::from_value(data)?,
            None => return Err(ValidationError::MissingField("projectData")),
        };
        let created_at = self.created_at.unwrap_or(now);
        Ok(ProjectRecord {
            id: self.id,
            owner_id: self.user_id,
            name: self.name,
            description: self.description,
            is_public: self.is_public,
            tags: self.tags,
            payload,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at).max(created_at),
            sync_state: SyncState::Synced,
        })
    }

    /// List entry served remotely
    #[must_use]
    pub fn summary(&self, now: DateTime<Utc>) -> ProjectSummary {
        let created_at = self.created_at.unwrap_or(now);
        ProjectSummary {
            id: self.id.clone(),
            owner_id: self.user_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            is_public: self.is_public,
            tags: self.tags.clone(),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
            residency: Residency::Remote,
        }
    }
}

/// List endpoints answer either a bare array or `{ projects: [...] }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListResponse {
    Bare(Vec<RemoteProject>),
    Wrapped { projects: Vec<RemoteProject> },
}

impl ListResponse {
    pub(crate) fn into_projects(self) -> Vec<RemoteProject> {
        match self {
            Self::Bare(projects) | Self::Wrapped { projects } => projects,
        }
    }
}
