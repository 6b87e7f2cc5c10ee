//! plansync - offline-first persistence for planning documents
//!
//! Keeps a user's planning documents safe whether or not the remote
//! service is reachable:
//! - [`PersistenceGateway`] saves, loads, deletes and lists projects,
//!   remote first with a silent local fallback
//! - [`BackupEngine`] snapshots the live document on a timer and on demand,
//!   with retention and confirmed restore
//! - [`MigrationCoordinator`] uploads local projects once after sign-in,
//!   idempotently
//! - [`IdentityContext`] tells every component who is signed in
//!
//! # Example
//!
//! ```rust,ignore
//! use plansync::{Plansync, PlansyncConfig};
//!
//! # async fn example() -> Result<(), plansync::SyncError> {
//! let config = PlansyncConfig::load("plansync.toml")?.apply_env();
//! plansync::telemetry::init_tracing(&config.telemetry);
//!
//! let app = Plansync::open(config).await?;
//! app.start()?;
//!
//! app.identity().set_user("user-42");
//! let projects = app.gateway().list_for_user().await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod backup;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod migration;
pub mod telemetry;

pub use backup::{BackupEngine, DocumentSnapshot, LiveDocument, SharedDocument};
pub use config::{BackupConfig, IdentityConfig, PlansyncConfig, StoreConfig, DATA_DIR_ENV};
pub use error::{Outcome, SyncError};
pub use gateway::PersistenceGateway;
pub use identity::{IdentityContext, IdentityObserver, SessionIdentity};
pub use migration::{MigrationCoordinator, MigrationFailure, MigrationReport, ReconcileReport};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};

pub use plansync_model as model;
pub use plansync_remote::{HttpRemote, RemoteBackend, RemoteConfig};
pub use plansync_store::{FileStore, LocalRecords, MemoryStore};

use std::sync::Arc;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The engine wired together for a hosting application
#[derive(Debug)]
pub struct Plansync {
    config: PlansyncConfig,
    identity: IdentityContext,
    gateway: Arc<PersistenceGateway>,
    backups: BackupEngine,
    migration: Arc<MigrationCoordinator>,
    document: SharedDocument,
}

impl Plansync {
    /// Open the file-backed store and the HTTP client described by `config`
    ///
    /// # Errors
    /// - `SyncError::Storage` if the data directory cannot be created
    /// - `SyncError::Config` if no remote base URL resolves
    pub async fn open(config: PlansyncConfig) -> Result<Self, SyncError> {
        let store = FileStore::open(config.store.data_dir.clone(), config.store.quota_bytes).await?;
        let remote = HttpRemote::new(&config.remote)?;
        Ok(Self::with_backends(
            config,
            Arc::new(remote),
            Arc::new(LocalRecords::new(Arc::new(store))),
        ))
    }

    /// Wire the engine over arbitrary backends
    #[must_use]
    pub fn with_backends(
        config: PlansyncConfig,
        remote: Arc<dyn RemoteBackend>,
        local: Arc<LocalRecords>,
    ) -> Self {
        let identity = IdentityContext::new(config.identity.max_observers);
        let gateway = Arc::new(PersistenceGateway::new(
            identity.clone(),
            remote,
            Arc::clone(&local),
        ));
        let document = SharedDocument::new();
        let backups = BackupEngine::new(local, Arc::new(document.clone()), &config.backup);
        let migration = Arc::new(MigrationCoordinator::new(
            identity.clone(),
            Arc::clone(&gateway),
        ));
        Self {
            config,
            identity,
            gateway,
            backups,
            migration,
            document,
        }
    }

    /// Start the backup timer and sign-in migration
    ///
    /// # Errors
    /// `SyncError::Config` outside a tokio runtime or for a zero backup interval
    pub fn start(&self) -> Result<(), SyncError> {
        self.migration.watch_sign_in(&self.identity)?;
        self.backups.start_auto_backup(self.config.backup.interval())
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PlansyncConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    #[inline]
    #[must_use]
    pub fn gateway(&self) -> &Arc<PersistenceGateway> {
        &self.gateway
    }

    #[inline]
    #[must_use]
    pub fn backups(&self) -> &BackupEngine {
        &self.backups
    }

    #[inline]
    #[must_use]
    pub fn migration(&self) -> &Arc<MigrationCoordinator> {
        &self.migration
    }

    /// The live document snapshotted by the backup timer
    #[inline]
    #[must_use]
    pub fn document(&self) -> &SharedDocument {
        &self.document
    }
}
