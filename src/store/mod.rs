//! Record Store and Tenant Index
//!
//! This module owns the tenant-scoped view of the backend:
//!
//! - [`RecordStore`] persists each record as two paired entries (value +
//!   metadata JSON) sharing an effective TTL, written atomically as a unit.
//! - [`TenantIndex`] tracks, per tenant, the set of key names believed live.
//!   It is a hint for listing and counting; ground truth for "is this key
//!   live" is always the record store.
//! - [`keyspace`] defines the shared key layout both rely on.

pub mod index;
pub mod keyspace;
pub mod record;

// Re-export commonly used types
pub use index::TenantIndex;
pub use record::{RecordMeta, RecordStore};
