//! KV Record Service
//!
//! The public contract of the crate: create/get/update/delete/list/
//! batch-create/exists/remaining-ttl/count over tenant-scoped records,
//! composing the record store (paired value + metadata entries) with the
//! tenant index (membership for listing and counting).
//!
//! ```text
//! caller (authenticated tenant_id)
//!       │
//!       ▼
//! ┌─────────────────┐
//! │   KvService     │  validate → version → write
//! └────┬───────┬────┘
//!      │       │
//!      ▼       ▼
//! ┌─────────┐ ┌─────────────┐
//! │ Record  │ │ TenantIndex │
//! │ Store   │ │             │
//! └────┬────┘ └──────┬──────┘
//!      └───────┬─────┘
//!              ▼
//!       ExpiringStore
//! ```

pub mod kv;
pub mod types;

// Re-export the service and its public types
pub use kv::KvService;
pub use types::{
    BatchFailure, BatchOutcome, CreateRecord, ListPage, Record, ServiceStats, StatsSnapshot,
    UpdateRecord,
};
