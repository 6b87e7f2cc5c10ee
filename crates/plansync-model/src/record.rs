//! Persisted records
//!
//! - [`ProjectRecord`]: the authoritative copy of a project in one backend
//! - [`ProjectSummary`]: list entry with a visible residency flag
//! - [`BackupRecord`]: immutable snapshot of a document
//! - [`MigrationMapping`]: local → remote identifier after migration

use crate::ids::{BackupId, ProjectId, UserId};
use crate::metadata::ProjectMetadata;
use crate::payload::PlanDocument;
use crate::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name recorded for snapshots of a document that was never saved
pub const UNSAVED_PROJECT_NAME: &str = "Unsaved document";

/// Synchronization state of a locally stored project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Never uploaded; candidate for migration
    #[default]
    LocalOnly,
    /// Mirror of a remote record
    Synced,
    /// Remote record with local edits written during a fallback
    PendingPush,
}

impl SyncState {
    /// Where the latest copy of the record lives
    #[inline]
    #[must_use]
    pub fn residency(self) -> Residency {
        match self {
            Self::Synced => Residency::Remote,
            Self::LocalOnly | Self::PendingPush => Residency::Local,
        }
    }
}

/// Which backend serves a listed project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Residency {
    /// Served by the remote service
    Remote,
    /// Locally resident, not yet synced
    Local,
}

/// Persisted project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    /// Set at creation, never changed
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub payload: PlanDocument,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_state: SyncState,
}

impl ProjectRecord {
    /// Create a record from sanitized metadata
    #[must_use]
    pub fn new(
        id: ProjectId,
        owner_id: UserId,
        metadata: ProjectMetadata,
        payload: PlanDocument,
        now: DateTime<Utc>,
        sync_state: SyncState,
    ) -> Self {
        Self {
            id,
            owner_id,
            name: metadata.name,
            description: metadata.description,
            is_public: metadata.is_public,
            tags: metadata.tags,
            payload,
            created_at: now,
            updated_at: now,
            sync_state,
        }
    }

    /// Current metadata
    #[must_use]
    pub fn metadata(&self) -> ProjectMetadata {
        ProjectMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            is_public: self.is_public,
            tags: self.tags.clone(),
        }
    }

    /// Replace metadata and payload, refreshing `updated_at`
    pub fn apply(&mut self, metadata: ProjectMetadata, payload: PlanDocument, now: DateTime<Utc>) {
        self.name = metadata.name;
        self.description = metadata.description;
        self.is_public = metadata.is_public;
        self.tags = metadata.tags;
        self.payload = payload;
        self.touch(now);
    }

    /// Refresh `updated_at` without letting it move backwards
    #[inline]
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.updated_at.max(now);
    }

    /// Whether `user` may update or delete this record
    #[inline]
    #[must_use]
    pub fn can_modify(&self, user: &UserId) -> bool {
        self.owner_id == *user || self.owner_id.is_anonymous()
    }

    /// Whether `user` may read this record
    #[inline]
    #[must_use]
    pub fn can_read(&self, user: &UserId) -> bool {
        self.is_public || self.can_modify(user)
    }

    /// List entry for this record, residency derived from its sync state
    #[must_use]
    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            is_public: self.is_public,
            tags: self.tags.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            residency: self.sync_state.residency(),
        }
    }
}

/// Project list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub residency: Residency,
}

/// How a backup was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Timer-driven; subject to retention pruning
    Automatic,
    /// User-requested; never pruned
    Manual,
}

/// Point-in-time snapshot of a document
///
/// The payload is kept as raw JSON and re-validated on restore, so a
/// damaged entry is reported instead of being loaded into the live document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: BackupId,
    /// `None` for a document that was never saved
    pub project_id: Option<ProjectId>,
    pub project_name: String,
    pub captured_at: DateTime<Utc>,
    pub kind: BackupKind,
    pub payload: Value,
}

impl BackupRecord {
    /// Whether retention pruning applies
    #[inline]
    #[must_use]
    pub fn is_automatic(&self) -> bool {
        self.kind == BackupKind::Automatic
    }

    /// Number of work items in the snapshot (0 if unreadable)
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.payload
            .get("tasks")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Decode and validate the stored payload
    ///
    /// # Errors
    /// `ValidationError` if the stored payload is not a valid document
    pub fn document(&self) -> Result<PlanDocument, ValidationError> {
        PlanDocument::from_value(self.payload.clone())
    }
}

/// Local identifier → remote identifier, written once per migrated project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationMapping {
    pub source: ProjectId,
    pub destination: ProjectId,
    pub migrated_at: DateTime<Utc>,
}
