//! # tenantkv - A Multi-Tenant Key-Value Record Layer
//!
//! tenantkv stores a value plus structured metadata (TTL, version counter,
//! tags, timestamps) per tenant, keeps a per-tenant index of live keys
//! consistent with an underlying expiring store, and reconciles drift between
//! the store's native expiry and the tenant-level index when entries expire
//! passively.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                             tenantkv                                │
//! │                                                                     │
//! │  caller ──> ┌─────────────┐                                         │
//! │             │  KvService  │  validation, versioning, pagination     │
//! │             └──────┬──────┘                                         │
//! │                    │                                                │
//! │        ┌───────────┴───────────┐                                    │
//! │        ▼                       ▼                                    │
//! │  ┌─────────────┐        ┌─────────────┐                             │
//! │  │ RecordStore │        │ TenantIndex │                             │
//! │  │ value+meta  │        │ key sets    │                             │
//! │  └──────┬──────┘        └──────┬──────┘                             │
//! │         └───────────┬──────────┘                                    │
//! │                     ▼                                               │
//! │        ┌──────────────────────────┐       ┌──────────────────────┐  │
//! │        │      ExpiringStore       │ <──── │      Reconciler      │  │
//! │        │  64 shards, TTL, sets,   │       │ (background sweep of │  │
//! │        │  atomic write batches    │       │  index/store drift)  │  │
//! │        └──────────────────────────┘       └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use tenantkv::backend::ExpiringStore;
//! use tenantkv::config::Config;
//! use tenantkv::reconcile::{Reconciler, ReconcilerConfig};
//! use tenantkv::service::{CreateRecord, KvService};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let config = Config::default();
//! let backend = Arc::new(ExpiringStore::new());
//! let service = KvService::new(Arc::clone(&backend), &config);
//!
//! // Reconcile index/store drift in the background
//! let _reconciler = Reconciler::start(
//!     Arc::clone(&backend),
//!     ReconcilerConfig { interval: config.sweep_interval },
//! );
//!
//! let record = service
//!     .create("tenant-1", CreateRecord {
//!         key: "session:42".into(),
//!         value: "payload".into(),
//!         ttl: Some(3600),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! assert_eq!(record.version, 1);
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`backend`]: sharded expiring store with atomic multi-key write batches
//! - [`store`]: record store (paired value + metadata entries) and tenant index
//! - [`service`]: the public create/get/update/delete/list/batch contract
//! - [`reconcile`]: background drift correction and tenant purge
//! - [`config`]: env-driven configuration, read once at startup
//! - [`error`]: the crate-wide error taxonomy
//!
//! ## Design Highlights
//!
//! ### Paired entries, one atomic write
//!
//! A record is two backend entries (value and metadata JSON) written and
//! removed as one batch with the same effective TTL, together with its tenant
//! index membership, so none of the three can outlive the others under
//! normal operation.
//!
//! ### Accepted write race
//!
//! Create's exists-check-then-write is not a compare-and-swap; concurrent
//! creates of the same key race and the last write wins. The unconditional
//! write is isolated in one record-store primitive so it can be upgraded to
//! a version-gated write later.
//!
//! ### Eventual index consistency
//!
//! The tenant index is a hint. Passive expiry removes data without updating
//! it; reads always check real existence, and the reconciler sweeps the gap
//! shut on a fixed interval.

pub mod backend;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod service;
pub mod store;

// Re-export commonly used types for convenience
pub use backend::{ExpiringStore, KeyTtl, WriteOp};
pub use config::Config;
pub use error::{BackendError, KvError};
pub use reconcile::{purge_tenant, sweep_once, Reconciler, ReconcilerConfig};
pub use service::{
    BatchFailure, BatchOutcome, CreateRecord, KvService, ListPage, Record, UpdateRecord,
};
pub use store::{RecordMeta, RecordStore, TenantIndex};

/// Version of tenantkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
