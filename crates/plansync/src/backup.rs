//! Automatic and manual backups of the live document
//!
//! - Snapshots are immutable [`BackupRecord`]s in the local store
//! - The automatic timer is a tokio task owned by [`BackupEngine`];
//!   starting it again replaces the running one
//! - After every automatic snapshot the oldest automatic backups beyond
//!   the ceiling are pruned, counting every automatic backup in the local
//!   store, including ones written by earlier runs. Manual backups are
//!   never pruned.
//! - Restore is gated on explicit confirmation and re-validates the payload

use crate::config::BackupConfig;
use crate::error::SyncError;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use plansync_model::{
    BackupId, BackupKind, BackupRecord, PlanDocument, ProjectId, ValidationError,
    UNSAVED_PROJECT_NAME,
};
use plansync_store::LocalRecords;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use ulid::Generator;

/// The document as seen at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// `None` for a document that was never saved
    pub project_id: Option<ProjectId>,
    pub project_name: String,
    pub document: PlanDocument,
}

impl DocumentSnapshot {
    /// Snapshot of a saved project
    #[must_use]
    pub fn saved(project_id: ProjectId, project_name: impl Into<String>, document: PlanDocument) -> Self {
        Self {
            project_id: Some(project_id),
            project_name: project_name.into(),
            document,
        }
    }

    /// Snapshot of a document that was never saved
    #[must_use]
    pub fn unsaved(document: PlanDocument) -> Self {
        Self {
            project_id: None,
            project_name: UNSAVED_PROJECT_NAME.to_string(),
            document,
        }
    }
}

impl Default for DocumentSnapshot {
    fn default() -> Self {
        Self::unsaved(PlanDocument::empty())
    }
}

/// Access to the document being edited
pub trait LiveDocument: Send + Sync {
    /// Copy the current state
    fn capture(&self) -> DocumentSnapshot;

    /// Replace work items and view state
    fn replace(&self, document: PlanDocument);
}

/// Thread-safe in-memory [`LiveDocument`]
#[derive(Debug, Clone, Default)]
pub struct SharedDocument {
    inner: Arc<RwLock<DocumentSnapshot>>,
}

impl SharedDocument {
    /// Create an unsaved, empty document
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from an existing snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Current document
    #[must_use]
    pub fn document(&self) -> PlanDocument {
        self.inner.read().document.clone()
    }

    /// Record which project the document belongs to
    pub fn set_project(&self, project_id: Option<ProjectId>, project_name: impl Into<String>) {
        let mut state = self.inner.write();
        state.project_id = project_id;
        state.project_name = project_name.into();
    }
}

impl LiveDocument for SharedDocument {
    fn capture(&self) -> DocumentSnapshot {
        self.inner.read().clone()
    }

    fn replace(&self, document: PlanDocument) {
        self.inner.write().document = document;
    }
}

struct BackupInner {
    local: Arc<LocalRecords>,
    document: Arc<dyn LiveDocument>,
    max_auto_backups: usize,
    ids: Mutex<Generator>,
}

impl BackupInner {
    fn next_id(&self) -> BackupId {
        let mut ids = self.ids.lock();
        // Overflow only within one millisecond after 2^80 ids
        match ids.generate() {
            Ok(id) => BackupId(id),
            Err(_) => BackupId::new(),
        }
    }

    async fn write(&self, source: &DocumentSnapshot, kind: BackupKind) -> Result<BackupId, SyncError> {
        let record = BackupRecord {
            id: self.next_id(),
            project_id: source.project_id.clone(),
            project_name: source.project_name.clone(),
            captured_at: Utc::now(),
            kind,
            payload: source.document.to_value()?,
        };
        self.local.put_backup(&record).await?;
        debug!(backup_id = %record.id, ?kind, "backup written");
        Ok(record.id)
    }

    async fn tick(&self) -> Result<Option<BackupId>, SyncError> {
        let source = self.document.capture();
        if source.document.task_count() == 0 {
            debug!("document has no work items, skipping automatic backup");
            return Ok(None);
        }
        let id = self.write(&source, BackupKind::Automatic).await?;
        self.prune().await?;
        Ok(Some(id))
    }

    async fn prune(&self) -> Result<usize, SyncError> {
        let automatic: Vec<BackupId> = self
            .local
            .backups()
            .await?
            .into_iter()
            .filter(BackupRecord::is_automatic)
            .map(|b| b.id)
            .collect();
        let excess = automatic.len().saturating_sub(self.max_auto_backups);
        if excess == 0 {
            return Ok(0);
        }
        let removed = self.local.remove_backups(&automatic[..excess]).await?;
        debug!(removed, "pruned automatic backups");
        Ok(removed)
    }
}

/// Snapshot, retention and restore of the live document
pub struct BackupEngine {
    inner: Arc<BackupInner>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl BackupEngine {
    /// Create an engine over the local store and the live document
    #[must_use]
    pub fn new(local: Arc<LocalRecords>, document: Arc<dyn LiveDocument>, config: &BackupConfig) -> Self {
        Self {
            inner: Arc::new(BackupInner {
                local,
                document,
                max_auto_backups: config.max_auto_backups,
                ids: Mutex::new(Generator::new()),
            }),
            timer: Mutex::new(None),
        }
    }

    /// Store a manual backup of `source`
    ///
    /// # Errors
    /// - `SyncError::Validation` if the document has no work items and no swimlanes
    /// - `SyncError::QuotaExceeded` if the local store is full
    #[instrument(skip_all)]
    pub async fn snapshot(&self, source: &DocumentSnapshot) -> Result<BackupId, SyncError> {
        if source.document.is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }
        let id = self.inner.write(source, BackupKind::Manual).await?;
        info!(backup_id = %id, "manual backup created");
        Ok(id)
    }

    /// Store a manual backup of the live document
    ///
    /// # Errors
    /// Same as [`BackupEngine::snapshot`]
    pub async fn snapshot_live(&self) -> Result<BackupId, SyncError> {
        let source = self.inner.document.capture();
        self.snapshot(&source).await
    }

    /// Every backup, newest first
    ///
    /// # Errors
    /// `SyncError::Storage` if the local store cannot be read
    pub async fn list(&self) -> Result<Vec<BackupRecord>, SyncError> {
        let mut backups = self.inner.local.backups().await?;
        backups.reverse();
        Ok(backups)
    }

    /// Backups of one project, newest first
    ///
    /// # Errors
    /// `SyncError::Storage` if the local store cannot be read
    pub async fn list_for_project(&self, project_id: &ProjectId) -> Result<Vec<BackupRecord>, SyncError> {
        let mut backups = self.list().await?;
        backups.retain(|b| b.project_id.as_ref() == Some(project_id));
        Ok(backups)
    }

    /// Replace the live document with a backup
    ///
    /// Nothing changes unless `confirmed` is true and the stored payload
    /// is a valid document.
    ///
    /// # Errors
    /// - `SyncError::ConfirmationRequired` if `confirmed` is false
    /// - `SyncError::NotFound` if the backup does not exist
    /// - `SyncError::StorageCorruption` if the stored payload is invalid
    #[instrument(skip(self))]
    pub async fn restore(&self, id: BackupId, confirmed: bool) -> Result<PlanDocument, SyncError> {
        if !confirmed {
            return Err(SyncError::ConfirmationRequired);
        }
        let backup = self
            .inner
            .local
            .backup(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("backup {id}")))?;
        let document = backup.document().map_err(|err| {
            warn!(backup_id = %id, error = %err, "backup payload is invalid");
            SyncError::StorageCorruption(format!("backup {id}: {err}"))
        })?;
        self.inner.document.replace(document.clone());
        info!(backup_id = %id, tasks = document.task_count(), "backup restored");
        Ok(document)
    }

    /// Delete one backup
    ///
    /// # Errors
    /// `SyncError::NotFound` if the backup does not exist
    pub async fn delete(&self, id: BackupId) -> Result<(), SyncError> {
        if self.inner.local.remove_backups(&[id]).await? == 0 {
            return Err(SyncError::NotFound(format!("backup {id}")));
        }
        Ok(())
    }

    /// Run one automatic backup now: skipped for a document without work
    /// items, followed by retention pruning
    ///
    /// # Errors
    /// Storage failures
    pub async fn run_auto_backup_tick(&self) -> Result<Option<BackupId>, SyncError> {
        self.inner.tick().await
    }

    /// Start the periodic timer, replacing any running one
    ///
    /// The first backup is taken one `interval` after the call.
    ///
    /// # Errors
    /// `SyncError::Config` for a zero interval or outside a tokio runtime
    pub fn start_auto_backup(&self, interval: Duration) -> Result<(), SyncError> {
        if interval.is_zero() {
            return Err(SyncError::Config("backup interval must be positive".to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::Config(format!("automatic backup needs a tokio runtime: {e}")))?;

        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        let inner = Arc::clone(&self.inner);
        *timer = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = inner.tick().await {
                    warn!(error = %err, "automatic backup failed");
                }
            }
        }));
        info!(interval_ms = interval.as_millis(), "automatic backup started");
        Ok(())
    }

    /// Stop the periodic timer; no-op when none is running
    pub fn stop_auto_backup(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
            info!("automatic backup stopped");
        }
    }

    /// Whether the periodic timer is running
    #[must_use]
    pub fn is_auto_backup_running(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for BackupEngine {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

impl fmt::Debug for BackupEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupEngine")
            .field("max_auto_backups", &self.inner.max_auto_backups)
            .field("auto_backup_running", &self.is_auto_backup_running())
            .finish_non_exhaustive()
    }
}
