//! Service Request and Response Types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A fully resolved record: the stored value plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub tenant_id: String,
    pub key: String,
    pub value: String,
    /// Requested TTL in seconds; None means no expiry.
    pub ttl: Option<u64>,
    /// Starts at 1, incremented on every successful update.
    pub version: u64,
    pub tags: BTreeMap<String, String>,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds.
    pub updated_at: u64,
    /// Unix seconds; None when no TTL is set.
    pub expires_at: Option<u64>,
}

/// Request payload for creating a record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRecord {
    pub key: String,
    pub value: String,
    pub ttl: Option<u64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Request payload for updating a record. Unset fields retain their previous
/// values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRecord {
    pub value: Option<String>,
    pub ttl: Option<u64>,
    pub tags: Option<BTreeMap<String, String>>,
}

/// One page of a listing, plus the pre-pagination total.
#[derive(Debug, Clone, Serialize)]
pub struct ListPage {
    pub items: Vec<Record>,
    /// Number of matching keys before pagination.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// A single failed item within a batch create.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub key: String,
    pub reason: String,
}

/// Result of a batch create: the records that succeeded and the per-item
/// failures, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub created: Vec<Record>,
    pub failed: Vec<BatchFailure>,
    /// Number of items in the request.
    pub total: usize,
}

/// Outcome counters for service operations, bumped on every call.
///
/// This is the injected observer the transport layer can poll for metrics;
/// the exact export format is out of scope here.
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub(crate) created: AtomicU64,
    pub(crate) fetched: AtomicU64,
    pub(crate) updated: AtomicU64,
    pub(crate) deleted: AtomicU64,
    pub(crate) listed: AtomicU64,
    pub(crate) batches: AtomicU64,
    pub(crate) conflicts: AtomicU64,
    pub(crate) not_found: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) store_errors: AtomicU64,
}

impl ServiceStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            listed: self.listed.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the service counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub created: u64,
    pub fetched: u64,
    pub updated: u64,
    pub deleted: u64,
    pub listed: u64,
    pub batches: u64,
    pub conflicts: u64,
    pub not_found: u64,
    pub rejected: u64,
    pub store_errors: u64,
}
