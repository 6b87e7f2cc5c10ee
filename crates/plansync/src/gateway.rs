//! Persistence gateway
//!
//! Single entry point for saving, loading, deleting and listing projects.
//!
//! # Backend selection
//!
//! - Signed in: remote first. A transport failure falls back to the local
//!   store and is logged, not surfaced. A remote not-found on load, update
//!   or delete means the record may be local-only, so the local store is
//!   tried next.
//! - Anonymous: local store only, except that public records can be read
//!   and listed through the remote service.
//!
//! Validation and permission failures are surfaced immediately and never
//! fall back. A write that lands locally for a record the remote service
//! knows is tagged [`SyncState::PendingPush`].
//!
//! Identifiers of migrated local projects keep working: update, load and
//! delete follow the migration mapping to the remote identifier.

use crate::error::SyncError;
use crate::identity::{IdentityContext, SessionIdentity};
use chrono::Utc;
use plansync_model::{
    PlanDocument, ProjectId, ProjectMetadata, ProjectRecord, ProjectSummary, SyncState, UserId,
};
use plansync_remote::{
    CreateProjectRequest, ImportProjectRequest, RemoteBackend, RemoteError, UpdateProjectRequest,
};
use plansync_store::LocalRecords;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What to do after a remote failure
enum RemoteFailure {
    /// Remote does not have the record; try local
    Missing,
    /// Remote unreachable; local takes over
    Unreachable(RemoteError),
}

/// Split a remote error into a fallback decision or a surfaced error
fn classify(err: RemoteError) -> Result<RemoteFailure, SyncError> {
    if err.is_not_found() {
        Ok(RemoteFailure::Missing)
    } else if err.is_transport() {
        Ok(RemoteFailure::Unreachable(err))
    } else {
        Err(err.into())
    }
}

/// Remote-first, local-fallback project persistence
pub struct PersistenceGateway {
    identity: IdentityContext,
    remote: Arc<dyn RemoteBackend>,
    local: Arc<LocalRecords>,
}

impl PersistenceGateway {
    /// Create a gateway over both backends
    #[must_use]
    pub fn new(
        identity: IdentityContext,
        remote: Arc<dyn RemoteBackend>,
        local: Arc<LocalRecords>,
    ) -> Self {
        Self {
            identity,
            remote,
            local,
        }
    }

    /// Session identity the gateway consults
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    /// Local store
    #[inline]
    #[must_use]
    pub fn local(&self) -> &Arc<LocalRecords> {
        &self.local
    }

    /// Save a new project
    ///
    /// Returns the server identifier when the remote create succeeds,
    /// otherwise a locally generated one.
    ///
    /// # Errors
    /// - `SyncError::Validation` for an empty or malformed payload, or metadata over the limits
    /// - `SyncError::QuotaExceeded` if the local write fails for size; after a
    ///   successful remote create the error carries the remote identifier
    #[instrument(skip_all)]
    pub async fn create(
        &self,
        payload: Value,
        metadata: ProjectMetadata,
    ) -> Result<ProjectId, SyncError> {
        let metadata = metadata.sanitize()?;
        let payload = PlanDocument::from_value(payload)?;
        let identity = self.identity.snapshot();
        let now = Utc::now();

        if identity.authenticated {
            let request = CreateProjectRequest::new(identity.user_id.clone(), &metadata, &payload)?;
            match self.remote.create(&request).await {
                Ok(id) => {
                    let record = ProjectRecord::new(
                        id.clone(),
                        identity.user_id,
                        metadata,
                        payload,
                        now,
                        SyncState::Synced,
                    );
                    self.mirror(&record).await.map_err(|e| e.with_remote_id(&id))?;
                    info!(project_id = %id, "project created remotely");
                    return Ok(id);
                }
                Err(err) => {
                    let reason = err.to_string();
                    classify(err)?;
                    warn!(error = %reason, "remote create failed, saving locally");
                }
            }
        }

        let id = ProjectId::new_local();
        let record = ProjectRecord::new(
            id.clone(),
            identity.user_id,
            metadata,
            payload,
            now,
            SyncState::LocalOnly,
        );
        self.local.put_project(&record).await?;
        info!(project_id = %id, "project saved locally");
        Ok(id)
    }

    /// Replace payload and metadata of an existing project
    ///
    /// # Errors
    /// - `SyncError::Validation` for invalid input
    /// - `SyncError::Permission` if the caller does not own the record
    /// - `SyncError::NotFound` if no backend holds the record
    #[instrument(skip_all, fields(project_id = %id))]
    pub async fn update(
        &self,
        id: &ProjectId,
        payload: Value,
        metadata: ProjectMetadata,
    ) -> Result<(), SyncError> {
        let metadata = metadata.sanitize()?;
        let payload = PlanDocument::from_value(payload)?;
        let id = &self.resolve(id).await?;
        let identity = self.identity.snapshot();
        let now = Utc::now();
        let mut failure = None;

        if identity.authenticated {
            let request = UpdateProjectRequest::new(identity.user_id.clone(), &metadata, &payload)?;
            match self.remote.update(id, &request).await {
                Ok(()) => {
                    let record = match self.local.project(id).await? {
                        Some(mut record) => {
                            record.apply(metadata, payload, now);
                            record.sync_state = SyncState::Synced;
                            record
                        }
                        None => ProjectRecord::new(
                            id.clone(),
                            identity.user_id,
                            metadata,
                            payload,
                            now,
                            SyncState::Synced,
                        ),
                    };
                    self.mirror(&record).await?;
                    debug!("project updated remotely");
                    return Ok(());
                }
                Err(err) => failure = Some(classify(err)?),
            }
        }

        let existing = self.local.project(id).await?;
        let mut record = match (existing, &failure) {
            (Some(record), _) => {
                if !record.can_modify(&identity.user_id) {
                    return Err(permission_denied(id, &identity));
                }
                record
            }
            (None, Some(RemoteFailure::Unreachable(_))) => ProjectRecord::new(
                id.clone(),
                identity.user_id.clone(),
                metadata.clone(),
                payload.clone(),
                now,
                SyncState::PendingPush,
            ),
            (None, _) => return Err(SyncError::project_not_found(id)),
        };
        record.apply(metadata, payload, now);
        match failure {
            Some(RemoteFailure::Unreachable(err)) => {
                warn!(error = %err, "remote update failed, saving locally");
                if record.sync_state == SyncState::Synced {
                    record.sync_state = SyncState::PendingPush;
                }
            }
            Some(RemoteFailure::Missing) if record.sync_state != SyncState::LocalOnly => {
                debug!("remote no longer has the project, keeping it local-only");
                record.sync_state = SyncState::LocalOnly;
            }
            _ => {}
        }
        self.local.put_project(&record).await?;
        Ok(())
    }

    /// Load a full project
    ///
    /// A remote copy that is older than a pending local edit loses to the
    /// local copy.
    ///
    /// # Errors
    /// - `SyncError::NotFound` if no backend holds the record
    /// - `SyncError::Permission` if the record is private to someone else
    #[instrument(skip_all, fields(project_id = %id))]
    pub async fn load(&self, id: &ProjectId) -> Result<ProjectRecord, SyncError> {
        let id = &self.resolve(id).await?;
        let identity = self.identity.snapshot();

        if !identity.authenticated {
            return match self.load_local(id, &identity).await {
                Err(SyncError::NotFound(_)) => self.load_public(id).await,
                other => other,
            };
        }

        match self.remote.load(id, &identity.user_id).await {
            Ok(project) => {
                let remote = project.into_record(Utc::now())?;
                if let Some(local) = self.local.project(id).await? {
                    if local.sync_state == SyncState::PendingPush
                        && local.updated_at > remote.updated_at
                    {
                        debug!("pending local edit is newer than remote copy");
                        return Ok(local);
                    }
                }
                if remote.owner_id == identity.user_id {
                    if let Err(err) = self.local.put_project(&remote).await {
                        warn!(error = %err, "failed to refresh local mirror");
                    }
                }
                Ok(remote)
            }
            Err(err) => {
                if let RemoteFailure::Unreachable(err) = classify(err)? {
                    warn!(error = %err, "remote load failed, reading local copy");
                }
                self.load_local(id, &identity).await
            }
        }
    }

    /// Delete a project
    ///
    /// # Errors
    /// - `SyncError::Permission` if the caller does not own the record
    /// - `SyncError::NotFound` if no backend holds the record
    /// - `SyncError::Transport` if the remote service is unreachable and
    ///   the record is not local-only
    #[instrument(skip_all, fields(project_id = %id))]
    pub async fn delete(&self, id: &ProjectId) -> Result<(), SyncError> {
        let id = &self.resolve(id).await?;
        let identity = self.identity.snapshot();
        let mut unreachable = None;

        if identity.authenticated {
            match self.remote.delete(id, &identity.user_id).await {
                Ok(()) => {
                    if let Err(err) = self.local.remove_project(id).await {
                        warn!(error = %err, "failed to drop local mirror");
                    }
                    self.forget_current(id).await?;
                    info!("project deleted remotely");
                    return Ok(());
                }
                Err(err) => {
                    if let RemoteFailure::Unreachable(err) = classify(err)? {
                        unreachable = Some(err);
                    }
                }
            }
        }

        let Some(record) = self.local.project(id).await? else {
            return Err(match unreachable {
                Some(err) => err.into(),
                None => SyncError::project_not_found(id),
            });
        };
        if !record.can_modify(&identity.user_id) {
            return Err(permission_denied(id, &identity));
        }
        if let Some(err) = unreachable {
            if record.sync_state != SyncState::LocalOnly {
                warn!(error = %err, "cannot delete remote project while offline");
                return Err(err.into());
            }
        }
        self.local.remove_project(id).await?;
        self.forget_current(id).await?;
        info!("project deleted locally");
        Ok(())
    }

    /// Projects visible to the current user, newest first
    ///
    /// Signed in: remote projects plus local ones the remote set does not
    /// contain, flagged local. A pending local edit newer than its remote
    /// entry replaces it, as on load. Anonymous: local projects owned by
    /// the anonymous sentinel plus local public ones. Migrated sources are
    /// never listed.
    ///
    /// # Errors
    /// `SyncError::Storage` if the local store cannot be read
    #[instrument(skip(self))]
    pub async fn list_for_user(&self) -> Result<Vec<ProjectSummary>, SyncError> {
        let identity = self.identity.snapshot();

        let mut summaries = if identity.authenticated {
            let (remote, local, mappings) = futures::join!(
                self.remote.list_for_user(&identity.user_id),
                self.local.projects(),
                self.local.mappings(),
            );
            let local = local?;
            let migrated: HashSet<ProjectId> =
                mappings?.into_iter().map(|m| m.source).collect();

            match remote {
                Ok(remote) => {
                    let now = Utc::now();
                    let remote_ids: HashSet<ProjectId> =
                        remote.iter().map(|p| p.id.clone()).collect();
                    let pending: HashMap<&ProjectId, &ProjectRecord> = local
                        .iter()
                        .filter(|r| r.sync_state == SyncState::PendingPush)
                        .map(|r| (&r.id, r))
                        .collect();
                    let mut summaries: Vec<ProjectSummary> = remote
                        .iter()
                        .map(|p| {
                            let summary = p.summary(now);
                            match pending.get(&p.id) {
                                Some(local) if local.updated_at > summary.updated_at => {
                                    local.summary()
                                }
                                _ => summary,
                            }
                        })
                        .collect();
                    summaries.extend(
                        local
                            .iter()
                            .filter(|r| owned_by(r, &identity.user_id))
                            .filter(|r| r.sync_state != SyncState::Synced)
                            .filter(|r| !remote_ids.contains(&r.id) && !migrated.contains(&r.id))
                            .map(ProjectRecord::summary),
                    );
                    summaries
                }
                Err(err) => {
                    classify(err.clone())?;
                    warn!(error = %err, "remote list failed, listing local projects");
                    local
                        .iter()
                        .filter(|r| owned_by(r, &identity.user_id) && !migrated.contains(&r.id))
                        .map(ProjectRecord::summary)
                        .collect()
                }
            }
        } else {
            let (local, mappings) = futures::join!(self.local.projects(), self.local.mappings());
            let migrated: HashSet<ProjectId> =
                mappings?.into_iter().map(|m| m.source).collect();
            local?
                .iter()
                .filter(|r| r.owner_id.is_anonymous() || r.is_public)
                .filter(|r| !migrated.contains(&r.id))
                .map(ProjectRecord::summary)
                .collect()
        };

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    /// Public projects, from the remote service when it answers
    ///
    /// Falls back to local public projects on any remote failure.
    ///
    /// # Errors
    /// `SyncError::Storage` if the local store cannot be read
    #[instrument(skip(self))]
    pub async fn list_public(&self) -> Result<Vec<ProjectSummary>, SyncError> {
        match self.remote.list_public().await {
            Ok(projects) => {
                let now = Utc::now();
                Ok(projects.iter().map(|p| p.summary(now)).collect())
            }
            Err(err) => {
                warn!(error = %err, "remote public list failed, listing local projects");
                Ok(self
                    .local
                    .projects()
                    .await?
                    .iter()
                    .filter(|r| r.is_public)
                    .map(ProjectRecord::summary)
                    .collect())
            }
        }
    }

    /// Identifier of the project open in the editor
    ///
    /// # Errors
    /// `SyncError::Storage` if the local store cannot be read
    pub async fn current_project(&self) -> Result<Option<ProjectId>, SyncError> {
        Ok(self.local.current_project().await?)
    }

    /// Remember the project open in the editor
    ///
    /// # Errors
    /// `SyncError::QuotaExceeded` or `SyncError::Storage` on write failure
    pub async fn set_current_project(&self, id: Option<&ProjectId>) -> Result<(), SyncError> {
        Ok(self.local.set_current_project(id).await?)
    }

    /// Upload a local record through the import endpoint, without fallback
    ///
    /// # Errors
    /// - `SyncError::NotAuthenticated` when signed out
    /// - any remote failure, mapped
    pub async fn import_remote(&self, record: &ProjectRecord) -> Result<ProjectId, SyncError> {
        let identity = self.identity.snapshot();
        if !identity.authenticated {
            return Err(SyncError::NotAuthenticated);
        }
        let request = ImportProjectRequest::from_record(record, identity.user_id)?;
        Ok(self.remote.import(&request).await?)
    }

    /// Push a local record to its remote counterpart, without fallback
    ///
    /// # Errors
    /// - `SyncError::NotAuthenticated` when signed out
    /// - any remote failure, mapped
    pub async fn push_remote_update(&self, record: &ProjectRecord) -> Result<(), SyncError> {
        let identity = self.identity.snapshot();
        if !identity.authenticated {
            return Err(SyncError::NotAuthenticated);
        }
        let request =
            UpdateProjectRequest::new(identity.user_id, &record.metadata(), &record.payload)?;
        Ok(self.remote.update(&record.id, &request).await?)
    }

    /// Write a synced copy; quota failures surface, other failures are logged
    async fn mirror(&self, record: &ProjectRecord) -> Result<(), SyncError> {
        match self.local.put_project(record).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_quota_exceeded() => Err(err.into()),
            Err(err) => {
                warn!(project_id = %record.id, error = %err, "failed to write local mirror");
                Ok(())
            }
        }
    }

    /// Identifier that now stands for `id`: its migration destination, if any
    async fn resolve(&self, id: &ProjectId) -> Result<ProjectId, SyncError> {
        match self.local.mapping(id).await? {
            Some(mapping) => {
                debug!(source = %id, destination = %mapping.destination, "following migration mapping");
                Ok(mapping.destination)
            }
            None => Ok(id.clone()),
        }
    }

    async fn load_local(
        &self,
        id: &ProjectId,
        identity: &SessionIdentity,
    ) -> Result<ProjectRecord, SyncError> {
        let record = self
            .local
            .project(id)
            .await?
            .ok_or_else(|| SyncError::project_not_found(id))?;
        if !record.can_read(&identity.user_id) {
            return Err(permission_denied(id, identity));
        }
        Ok(record)
    }

    /// Read-only access to a remote public record for anonymous sessions
    async fn load_public(&self, id: &ProjectId) -> Result<ProjectRecord, SyncError> {
        match self.remote.load(id, &UserId::anonymous()).await {
            Ok(project) if project.is_public => Ok(project.into_record(Utc::now())?),
            Ok(_) => Err(SyncError::project_not_found(id)),
            Err(err) => {
                debug!(error = %err, "no public remote copy");
                Err(SyncError::project_not_found(id))
            }
        }
    }

    async fn forget_current(&self, id: &ProjectId) -> Result<(), SyncError> {
        if self.local.current_project().await?.as_ref() == Some(id) {
            self.local.set_current_project(None).await?;
        }
        Ok(())
    }
}

/// Records a signed-in user lists as their own
fn owned_by(record: &ProjectRecord, user: &UserId) -> bool {
    record.owner_id == *user || record.owner_id.is_anonymous()
}

fn permission_denied(id: &ProjectId, identity: &SessionIdentity) -> SyncError {
    SyncError::Permission(format!(
        "project {id} does not belong to {}",
        identity.user_id
    ))
}

impl fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("identity", &self.identity)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}
