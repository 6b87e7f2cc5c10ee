//! plansync local store
//!
//! The local persistent store used when the remote service is unreachable
//! or the user is anonymous, and the home of backups and migration state.
//!
//! # Architecture
//!
//! ```text
//! LocalRecords (typed collections, corruption-tolerant reads)
//!      │
//!      ▼
//! dyn KeyValueStore ──► MemoryStore (tests, ephemeral sessions)
//!                   └─► FileStore   (one JSON file per key, atomic rename)
//! ```
//!
//! The key space is shared and unsynchronized across processes; within one
//! process `LocalRecords` serializes its read-modify-write cycles.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod file;
pub mod kv;
pub mod records;

pub use error::StoreError;
pub use file::FileStore;
pub use kv::{KeyValueStore, MemoryStore};
pub use records::{
    LocalRecords, BACKUPS_KEY, CURRENT_PROJECT_KEY, MIGRATIONS_KEY, MIGRATION_COMPLETED_KEY,
    PROJECTS_KEY,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
