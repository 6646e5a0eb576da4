//! Record Store
//!
//! Persists and retrieves a record's value and metadata as two paired backend
//! entries sharing an effective TTL. The pair is always written and removed
//! through a single atomic batch together with the tenant's index membership,
//! so no observer ever sees one entry without the others mid-operation.
//!
//! Writes here are unconditional: the last successful `put` wins. The service
//! layer's exists-check-then-write is deliberately not a compare-and-swap;
//! if that ever changes, `put` is the one primitive to upgrade to a
//! version-gated write.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{ExpiringStore, KeyTtl, WriteOp};
use crate::error::KvError;
use crate::store::keyspace;

/// The metadata document stored next to every value, serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub tenant_id: String,
    /// Requested TTL in seconds; None means the record never expires.
    pub ttl: Option<u64>,
    /// Monotonically increasing per key lineage; a fresh create starts at 1.
    pub version: u64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Unix seconds, set once at creation.
    pub created_at: u64,
    /// Unix seconds, refreshed on every update.
    pub updated_at: u64,
    /// Derived expiry instant in unix seconds; None when no TTL is set.
    pub expires_at: Option<u64>,
}

/// Data-plane read/write/delete/TTL primitives for tenant-scoped records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    backend: Arc<ExpiringStore>,
}

impl RecordStore {
    pub fn new(backend: Arc<ExpiringStore>) -> Self {
        Self { backend }
    }

    /// Writes a record's value, metadata, and index membership together as
    /// one atomic unit.
    ///
    /// When `ttl_seconds` is set, both entries are written with that expiry so
    /// metadata can never outlive data (or vice versa) under normal operation.
    /// The write is unconditional; any existing pair is overwritten and the
    /// membership add is idempotent.
    pub fn put(
        &self,
        tenant_id: &str,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
        meta: &RecordMeta,
    ) -> Result<(), KvError> {
        let meta_json = serde_json::to_vec(meta)
            .map_err(|e| KvError::OperationFailed(format!("failed to encode record metadata: {}", e)))?;
        let ttl = ttl_seconds.map(Duration::from_secs);

        self.backend.apply(vec![
            WriteOp::PutValue {
                key: keyspace::value_key(tenant_id, key),
                value: Bytes::from(value.to_string()),
                ttl,
            },
            WriteOp::PutValue {
                key: keyspace::meta_key(tenant_id, key),
                value: Bytes::from(meta_json),
                ttl,
            },
            WriteOp::AddMember {
                set: keyspace::index_key(tenant_id),
                member: key.to_string(),
            },
        ])?;

        Ok(())
    }

    /// Returns the stored value and decoded metadata, or `None` if the value
    /// entry is absent.
    ///
    /// Metadata-without-data is reported as `None`: the value entry is ground
    /// truth, and orphaned metadata is drift for the reconciler, not something
    /// to surface to callers. Metadata that exists but fails to decode is a
    /// store error.
    pub fn fetch(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> Result<Option<(String, Option<RecordMeta>)>, KvError> {
        let value = match self.backend.get(&keyspace::value_key(tenant_id, key))? {
            Some(value) => value,
            None => return Ok(None),
        };

        let value = String::from_utf8(value.to_vec())
            .map_err(|_| KvError::OperationFailed("stored value is not valid UTF-8".to_string()))?;

        let meta = match self.backend.get(&keyspace::meta_key(tenant_id, key))? {
            Some(raw) => Some(serde_json::from_slice::<RecordMeta>(&raw)?),
            None => None,
        };

        Ok(Some((value, meta)))
    }

    /// Deletes both entries of a record and its index membership. Idempotent:
    /// absent entries are a no-op, not an error.
    pub fn remove(&self, tenant_id: &str, key: &str) -> Result<(), KvError> {
        self.backend.apply(vec![
            WriteOp::DeleteValue {
                key: keyspace::value_key(tenant_id, key),
            },
            WriteOp::DeleteValue {
                key: keyspace::meta_key(tenant_id, key),
            },
            WriteOp::RemoveMember {
                set: keyspace::index_key(tenant_id),
                member: key.to_string(),
            },
        ])?;

        Ok(())
    }

    /// Presence check on the value entry only.
    pub fn exists(&self, tenant_id: &str, key: &str) -> Result<bool, KvError> {
        Ok(self.backend.exists(&keyspace::value_key(tenant_id, key))?)
    }

    /// Remaining TTL of a record in seconds.
    ///
    /// Three unambiguous outcomes: `Ok(Some(secs))` for an expiring record,
    /// `Ok(None)` for a record with no expiry, `Err(NotFound)` when absent.
    pub fn remaining_ttl(&self, tenant_id: &str, key: &str) -> Result<Option<u64>, KvError> {
        match self.backend.ttl(&keyspace::value_key(tenant_id, key))? {
            KeyTtl::Missing => Err(KvError::NotFound(key.to_string())),
            KeyTtl::Persistent => Ok(None),
            KeyTtl::Expiring(remaining) => Ok(Some(remaining.as_secs())),
        }
    }
}
