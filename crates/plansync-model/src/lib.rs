//! plansync data model
//!
//! Plain records shared by every plansync crate. Nothing in here performs
//! I/O; the store and remote crates move these values around.
//!
//! # Core Concepts
//!
//! - [`ProjectRecord`]: a persisted planning document with owner, metadata and payload
//! - [`PlanDocument`]: the payload, validated for shape only
//! - [`ProjectMetadata`]: name/description/visibility/tags, sanitized before every write
//! - [`BackupRecord`]: an immutable point-in-time snapshot of a document
//! - [`MigrationMapping`]: local identifier → remote identifier after a bulk upload
//!
//! # Example
//!
//! ```rust,ignore
//! use plansync_model::{PlanDocument, ProjectMetadata};
//!
//! let payload = PlanDocument::from_value(serde_json::json!({ "tasks": [] }))?;
//! let metadata = ProjectMetadata::new("  ").sanitize()?;
//! assert_eq!(metadata.name, "Untitled Project");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod ids;
pub mod metadata;
pub mod payload;
pub mod record;

pub use error::ValidationError;
pub use ids::{BackupId, ProjectId, UserId, ANONYMOUS_USER};
pub use metadata::{
    ProjectMetadata, DEFAULT_PROJECT_NAME, MAX_DESCRIPTION_CHARS, MAX_NAME_CHARS, MAX_TAGS,
    MAX_TAG_CHARS,
};
pub use payload::{CameraState, PlanDocument, Swimlane, WorkItem, PLAN_DOCUMENT_VERSION};
pub use record::{
    BackupKind, BackupRecord, MigrationMapping, ProjectRecord, ProjectSummary, Residency,
    SyncState, UNSAVED_PROJECT_NAME,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
