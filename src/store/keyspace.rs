//! Backend Key Layout
//!
//! Every tenant-scoped record maps to three backend keys:
//!
//! ```text
//! kv:{tenant}:{key}          value entry (expiring)
//! kv:{tenant}:{key}:meta     metadata entry (expiring, same TTL)
//! tenant-keys:{tenant}       index set of key names (never expires)
//! ```
//!
//! The record store, tenant index, and reconciler all derive keys through
//! these helpers so the layout is defined in exactly one place.

use bytes::Bytes;

/// Prefix for value and metadata entries.
pub const KV_PREFIX: &str = "kv";

/// Suffix distinguishing a metadata entry from its value entry.
pub const META_SUFFIX: &str = "meta";

/// Prefix for per-tenant index sets.
pub const INDEX_PREFIX: &str = "tenant-keys";

/// Backend key for a record's value entry.
pub fn value_key(tenant_id: &str, key: &str) -> Bytes {
    Bytes::from(format!("{}:{}:{}", KV_PREFIX, tenant_id, key))
}

/// Backend key for a record's metadata entry.
pub fn meta_key(tenant_id: &str, key: &str) -> Bytes {
    Bytes::from(format!("{}:{}:{}:{}", KV_PREFIX, tenant_id, key, META_SUFFIX))
}

/// Backend key for a tenant's index set.
pub fn index_key(tenant_id: &str) -> Bytes {
    Bytes::from(format!("{}:{}", INDEX_PREFIX, tenant_id))
}

/// Prefix matching every value and metadata entry of one tenant.
pub fn tenant_entry_prefix(tenant_id: &str) -> Vec<u8> {
    format!("{}:{}:", KV_PREFIX, tenant_id).into_bytes()
}

/// Prefix matching every tenant index set.
pub fn index_scan_prefix() -> Vec<u8> {
    format!("{}:", INDEX_PREFIX).into_bytes()
}

/// Recovers the tenant id from an index set key, if it is one.
pub fn tenant_of_index_key(key: &[u8]) -> Option<String> {
    let prefix = index_scan_prefix();
    key.strip_prefix(prefix.as_slice())
        .and_then(|rest| std::str::from_utf8(rest).ok())
        .map(|tenant| tenant.to_string())
}
