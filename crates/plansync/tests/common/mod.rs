//! Shared wiring for engine scenario tests

#![allow(dead_code)]

use plansync::{IdentityContext, MigrationCoordinator, PersistenceGateway};
use plansync_store::{LocalRecords, MemoryStore};
use plansync_test_utils::FakeRemote;
use std::sync::Arc;

pub struct Harness {
    pub identity: IdentityContext,
    pub remote: Arc<FakeRemote>,
    pub local: Arc<LocalRecords>,
    pub gateway: Arc<PersistenceGateway>,
    pub migration: Arc<MigrationCoordinator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_local(LocalRecords::in_memory())
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self::with_local(LocalRecords::new(Arc::new(MemoryStore::with_quota(quota_bytes))))
    }

    fn with_local(local: LocalRecords) -> Self {
        let identity = IdentityContext::default();
        let remote = Arc::new(FakeRemote::new());
        let local = Arc::new(local);
        let gateway = Arc::new(PersistenceGateway::new(
            identity.clone(),
            remote.clone(),
            Arc::clone(&local),
        ));
        let migration = Arc::new(MigrationCoordinator::new(
            identity.clone(),
            Arc::clone(&gateway),
        ));
        Self {
            identity,
            remote,
            local,
            gateway,
            migration,
        }
    }
}
