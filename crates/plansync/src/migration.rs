//! One-time migration of local projects to the remote service
//!
//! Eligibility is decided per identifier through the mapping table, never
//! through the session-level completion marker:
//! - a local-only project owned by the user or the anonymous sentinel and
//!   absent from the mapping table is uploaded through the import endpoint
//! - each success is recorded as a [`MigrationMapping`] before the next
//!   item is processed, so a re-run uploads nothing twice
//! - the local source is then replaced by a synced copy under the remote
//!   identifier; the gateway follows the mapping for the old identifier
//! - a failed item is reported and the batch continues

use crate::error::SyncError;
use crate::gateway::PersistenceGateway;
use crate::identity::{IdentityContext, SessionIdentity};
use chrono::Utc;
use parking_lot::Mutex;
use plansync_model::{MigrationMapping, ProjectId, ProjectRecord, SyncState, UserId};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

/// A project that could not be processed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationFailure {
    pub project_id: ProjectId,
    pub project_name: String,
    pub message: String,
}

impl fmt::Display for MigrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to migrate '{}' ({}): {}",
            self.project_name, self.project_id, self.message
        )
    }
}

impl MigrationFailure {
    fn new(record: &ProjectRecord, error: &SyncError) -> Self {
        Self {
            project_id: record.id.clone(),
            project_name: record.name.clone(),
            message: error.to_string(),
        }
    }
}

/// Result of [`MigrationCoordinator::migrate_all`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub migrated_count: usize,
    pub errors: Vec<MigrationFailure>,
}

/// Result of [`MigrationCoordinator::reconcile_pending`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Pending edits accepted by the remote service
    pub pushed: usize,
    /// Records the remote service no longer knows, now local-only
    pub demoted: usize,
    pub errors: Vec<MigrationFailure>,
}

/// Moves local projects to the remote service after sign-in
pub struct MigrationCoordinator {
    identity: IdentityContext,
    gateway: Arc<PersistenceGateway>,
    running: tokio::sync::Mutex<()>,
    migrated_users: Mutex<HashSet<UserId>>,
}

impl MigrationCoordinator {
    /// Create a coordinator uploading through `gateway`
    #[must_use]
    pub fn new(identity: IdentityContext, gateway: Arc<PersistenceGateway>) -> Self {
        Self {
            identity,
            gateway,
            running: tokio::sync::Mutex::new(()),
            migrated_users: Mutex::new(HashSet::new()),
        }
    }

    /// Upload every eligible local project
    ///
    /// Runs are serialized; a second call waits for the first.
    ///
    /// # Errors
    /// - `SyncError::NotAuthenticated` when signed out
    /// - storage failures while enumerating candidates
    #[instrument(skip(self))]
    pub async fn migrate_all(&self) -> Result<MigrationReport, SyncError> {
        let _running = self.running.lock().await;
        let identity = self.identity.snapshot();
        if !identity.authenticated {
            return Err(SyncError::NotAuthenticated);
        }

        let local = self.gateway.local();
        let mapped: HashSet<ProjectId> = local
            .mappings()
            .await?
            .into_iter()
            .map(|m| m.source)
            .collect();
        let candidates: Vec<ProjectRecord> = local
            .projects()
            .await?
            .into_iter()
            .filter(|r| r.sync_state == SyncState::LocalOnly)
            .filter(|r| r.owner_id == identity.user_id || r.owner_id.is_anonymous())
            .filter(|r| !mapped.contains(&r.id))
            .collect();
        debug!(candidates = candidates.len(), "migration candidates");

        let current = local.current_project().await?;
        let mut report = MigrationReport::default();
        for record in candidates {
            match self.migrate_one(&record, &identity, current.as_ref()).await {
                Ok(destination) => {
                    debug!(source = %record.id, destination = %destination, "project migrated");
                    report.migrated_count += 1;
                }
                Err(err) => {
                    warn!(project_id = %record.id, error = %err, "project migration failed");
                    report.errors.push(MigrationFailure::new(&record, &err));
                }
            }
        }

        if report.migrated_count > 0 {
            if let Err(err) = local.mark_migration_completed(Utc::now()).await {
                warn!(error = %err, "failed to record migration marker");
            }
        }
        info!(
            migrated = report.migrated_count,
            failed = report.errors.len(),
            "migration finished"
        );
        Ok(report)
    }

    async fn migrate_one(
        &self,
        record: &ProjectRecord,
        identity: &SessionIdentity,
        current: Option<&ProjectId>,
    ) -> Result<ProjectId, SyncError> {
        let destination = self.gateway.import_remote(record).await?;
        let local = self.gateway.local();
        let mapping = MigrationMapping {
            source: record.id.clone(),
            destination: destination.clone(),
            migrated_at: Utc::now(),
        };
        local.put_mapping(&mapping).await?;

        let mirror = ProjectRecord {
            id: destination.clone(),
            owner_id: identity.user_id.clone(),
            sync_state: SyncState::Synced,
            ..record.clone()
        };
        if let Err(err) = local.put_project(&mirror).await {
            warn!(project_id = %destination, error = %err, "failed to mirror migrated project");
        }
        if let Err(err) = local.remove_project(&record.id).await {
            warn!(project_id = %record.id, error = %err, "failed to drop migrated source");
        }
        if current == Some(&record.id) {
            local.set_current_project(Some(&destination)).await?;
        }
        Ok(destination)
    }

    /// Push local edits made while the remote service was unreachable
    ///
    /// A record the remote service no longer knows becomes local-only so
    /// the next [`MigrationCoordinator::migrate_all`] uploads it.
    ///
    /// # Errors
    /// - `SyncError::NotAuthenticated` when signed out
    /// - storage failures while enumerating records
    #[instrument(skip(self))]
    pub async fn reconcile_pending(&self) -> Result<ReconcileReport, SyncError> {
        let _running = self.running.lock().await;
        let identity = self.identity.snapshot();
        if !identity.authenticated {
            return Err(SyncError::NotAuthenticated);
        }

        let local = self.gateway.local();
        let pending: Vec<ProjectRecord> = local
            .projects()
            .await?
            .into_iter()
            .filter(|r| r.sync_state == SyncState::PendingPush)
            .filter(|r| r.can_modify(&identity.user_id))
            .collect();

        let mut report = ReconcileReport::default();
        for mut record in pending {
            let next_state = match self.gateway.push_remote_update(&record).await {
                Ok(()) => SyncState::Synced,
                Err(err) if err.is_not_found() => SyncState::LocalOnly,
                Err(err) => {
                    warn!(project_id = %record.id, error = %err, "pending push failed");
                    report.errors.push(MigrationFailure::new(&record, &err));
                    continue;
                }
            };
            record.sync_state = next_state;
            match local.put_project(&record).await {
                Ok(()) if next_state == SyncState::Synced => report.pushed += 1,
                Ok(()) => report.demoted += 1,
                Err(err) => report
                    .errors
                    .push(MigrationFailure::new(&record, &SyncError::from(err))),
            }
        }
        info!(
            pushed = report.pushed,
            demoted = report.demoted,
            failed = report.errors.len(),
            "pending edits reconciled"
        );
        Ok(report)
    }

    /// Remote identifier a local project was migrated to
    ///
    /// # Errors
    /// `SyncError::Storage` if the local store cannot be read
    pub async fn mapping_for(&self, source: &ProjectId) -> Result<Option<ProjectId>, SyncError> {
        Ok(self
            .gateway
            .local()
            .mapping(source)
            .await?
            .map(|m| m.destination))
    }

    /// Every recorded mapping
    ///
    /// # Errors
    /// `SyncError::Storage` if the local store cannot be read
    pub async fn mappings(&self) -> Result<Vec<MigrationMapping>, SyncError> {
        Ok(self.gateway.local().mappings().await?)
    }

    /// Whether a migration has succeeded at least once on this device
    ///
    /// # Errors
    /// `SyncError::Storage` if the local store cannot be read
    pub async fn is_migration_completed(&self) -> Result<bool, SyncError> {
        Ok(self.gateway.local().migration_completed().await?.is_some())
    }

    /// Migrate (then reconcile) once per user on every sign-in
    ///
    /// Work runs on the current tokio runtime; failures are logged.
    ///
    /// # Errors
    /// - `SyncError::Config` outside a tokio runtime or when the identity
    ///   observer list is full
    pub fn watch_sign_in(self: &Arc<Self>, identity: &IdentityContext) -> Result<(), SyncError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Config(format!("sign-in migration needs a tokio runtime: {e}")))?;
        let coordinator: Weak<Self> = Arc::downgrade(self);
        identity.subscribe(move |session: &SessionIdentity| {
            if !session.authenticated {
                return;
            }
            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            if !coordinator.migrated_users.lock().insert(session.user_id.clone()) {
                return;
            }
            runtime.spawn(async move {
                if let Err(err) = coordinator.migrate_all().await {
                    warn!(error = %err, "sign-in migration failed");
                }
                if let Err(err) = coordinator.reconcile_pending().await {
                    warn!(error = %err, "sign-in reconciliation failed");
                }
            });
        })
    }
}

impl fmt::Debug for MigrationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationCoordinator")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
