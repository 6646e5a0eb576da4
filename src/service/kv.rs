//! KV Record Service Implementation
//!
//! Composes the record store and tenant index into the public contract:
//! create/get/update/delete/list/batch-create/exists/remaining-ttl/count.
//! The caller supplies the tenant id from its authenticated context; this
//! layer never authenticates, it only trusts the value.
//!
//! ## Concurrency
//!
//! Operations run synchronously and concurrently against the shared backend
//! with no in-process locking of their own; cross-entry atomicity is the
//! backend batch's job. Create's exists-check-then-write and update's
//! read-then-write are not compare-and-swap: concurrent writers to the same
//! key race and the last successful write wins. The unconditional write lives
//! in [`RecordStore::put`] so it can be upgraded to a version-gated write
//! without touching this layer.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::backend::ExpiringStore;
use crate::config::Config;
use crate::error::KvError;
use crate::service::types::{
    BatchFailure, BatchOutcome, CreateRecord, ListPage, Record, ServiceStats, StatsSnapshot,
    UpdateRecord,
};
use crate::store::{RecordMeta, RecordStore, TenantIndex};

/// Validation bounds, captured from [`Config`] at construction.
#[derive(Debug, Clone)]
struct Limits {
    max_key_bytes: usize,
    max_value_bytes: usize,
    max_batch_size: usize,
    max_tags: usize,
    max_tag_len: usize,
}

/// The tenant-scoped key-value record service.
///
/// # Example
///
/// ```
/// use tenantkv::backend::ExpiringStore;
/// use tenantkv::config::Config;
/// use tenantkv::service::{CreateRecord, KvService};
/// use std::sync::Arc;
///
/// let service = KvService::new(Arc::new(ExpiringStore::new()), &Config::default());
/// let record = service
///     .create("tenant-1", CreateRecord {
///         key: "greeting".into(),
///         value: "hello".into(),
///         ..Default::default()
///     })
///     .unwrap();
/// assert_eq!(record.version, 1);
/// ```
#[derive(Debug)]
pub struct KvService {
    store: RecordStore,
    index: TenantIndex,
    limits: Limits,
    stats: ServiceStats,
}

impl KvService {
    pub fn new(backend: Arc<ExpiringStore>, config: &Config) -> Self {
        Self {
            store: RecordStore::new(Arc::clone(&backend)),
            index: TenantIndex::new(backend),
            limits: Limits {
                max_key_bytes: config.max_key_bytes,
                max_value_bytes: config.max_value_bytes,
                max_batch_size: config.max_batch_size,
                max_tags: config.max_tags,
                max_tag_len: config.max_tag_len,
            },
            stats: ServiceStats::default(),
        }
    }

    /// Creates a new record for the tenant.
    ///
    /// Fails with `AlreadyExists` if a live record with this key exists.
    /// The new record always has `version == 1`.
    pub fn create(&self, tenant_id: &str, req: CreateRecord) -> Result<Record, KvError> {
        let result = self.create_inner(tenant_id, req);
        match &result {
            Ok(record) => {
                self.stats.created.fetch_add(1, Ordering::Relaxed);
                info!(tenant = tenant_id, key = %record.key, "record created");
            }
            Err(err) => self.note_failure(tenant_id, "create", err),
        }
        result
    }

    fn create_inner(&self, tenant_id: &str, req: CreateRecord) -> Result<Record, KvError> {
        let key = validate_key(&req.key, self.limits.max_key_bytes)?;
        validate_value(&req.value, self.limits.max_value_bytes)?;
        validate_ttl(req.ttl)?;
        validate_tags(&req.tags, &self.limits)?;

        if self.store.exists(tenant_id, &key)? {
            return Err(KvError::AlreadyExists(key));
        }

        let now = now_secs();
        let meta = RecordMeta {
            tenant_id: tenant_id.to_string(),
            ttl: req.ttl,
            version: 1,
            tags: req.tags,
            created_at: now,
            updated_at: now,
            expires_at: req.ttl.map(|ttl| now + ttl),
        };

        self.store.put(tenant_id, &key, &req.value, req.ttl, &meta)?;

        Ok(assemble(key, req.value, meta))
    }

    /// Retrieves a record by key.
    pub fn get(&self, tenant_id: &str, key: &str) -> Result<Record, KvError> {
        let result = self.get_inner(tenant_id, key);
        match &result {
            Ok(_) => {
                self.stats.fetched.fetch_add(1, Ordering::Relaxed);
                debug!(tenant = tenant_id, key = key, "record retrieved");
            }
            Err(err) => self.note_failure(tenant_id, "get", err),
        }
        result
    }

    fn get_inner(&self, tenant_id: &str, key: &str) -> Result<Record, KvError> {
        let (value, meta) = self
            .store
            .fetch(tenant_id, key)?
            .ok_or_else(|| KvError::NotFound(key.to_string()))?;

        // Missing metadata is tolerated with defaults; the value entry alone
        // still makes the record live.
        let meta = meta.unwrap_or_else(|| default_meta(tenant_id));

        Ok(assemble(key.to_string(), value, meta))
    }

    /// Updates a record, bumping its version.
    ///
    /// Unset fields retain their previous values; in particular an unset TTL
    /// preserves the previous expiry instant, so the remaining TTL keeps
    /// decreasing rather than being reset.
    pub fn update(&self, tenant_id: &str, key: &str, req: UpdateRecord) -> Result<Record, KvError> {
        let result = self.update_inner(tenant_id, key, req);
        match &result {
            Ok(record) => {
                self.stats.updated.fetch_add(1, Ordering::Relaxed);
                info!(
                    tenant = tenant_id,
                    key = key,
                    version = record.version,
                    "record updated"
                );
            }
            Err(err) => self.note_failure(tenant_id, "update", err),
        }
        result
    }

    fn update_inner(
        &self,
        tenant_id: &str,
        key: &str,
        req: UpdateRecord,
    ) -> Result<Record, KvError> {
        if let Some(value) = &req.value {
            validate_value(value, self.limits.max_value_bytes)?;
        }
        validate_ttl(req.ttl)?;
        if let Some(tags) = &req.tags {
            validate_tags(tags, &self.limits)?;
        }

        let (current_value, meta) = self
            .store
            .fetch(tenant_id, key)?
            .ok_or_else(|| KvError::NotFound(key.to_string()))?;
        let meta = meta.unwrap_or_else(|| default_meta(tenant_id));

        let now = now_secs();
        let value = req.value.unwrap_or(current_value);
        let tags = req.tags.unwrap_or(meta.tags);

        // An explicit TTL restarts the clock from now; an unset TTL keeps the
        // stored expiry instant, re-deriving the effective write TTL from it.
        let (ttl, expires_at, write_ttl) = match req.ttl {
            Some(ttl) => (Some(ttl), Some(now + ttl), Some(ttl)),
            None => match meta.expires_at {
                Some(exp) => (meta.ttl, Some(exp), Some(exp.saturating_sub(now).max(1))),
                None => (None, None, None),
            },
        };

        let new_meta = RecordMeta {
            tenant_id: tenant_id.to_string(),
            ttl,
            version: meta.version + 1,
            tags,
            created_at: meta.created_at,
            updated_at: now,
            expires_at,
        };

        self.store.put(tenant_id, key, &value, write_ttl, &new_meta)?;

        Ok(assemble(key.to_string(), value, new_meta))
    }

    /// Deletes a record and its index membership.
    pub fn delete(&self, tenant_id: &str, key: &str) -> Result<(), KvError> {
        let result = self.delete_inner(tenant_id, key);
        match &result {
            Ok(()) => {
                self.stats.deleted.fetch_add(1, Ordering::Relaxed);
                info!(tenant = tenant_id, key = key, "record deleted");
            }
            Err(err) => self.note_failure(tenant_id, "delete", err),
        }
        result
    }

    fn delete_inner(&self, tenant_id: &str, key: &str) -> Result<(), KvError> {
        if !self.store.exists(tenant_id, key)? {
            return Err(KvError::NotFound(key.to_string()));
        }

        self.store.remove(tenant_id, key)?;
        Ok(())
    }

    /// Lists the tenant's records, one fixed-size page at a time.
    ///
    /// The optional tag filter keeps only records whose tags contain every
    /// filter pair exactly. Filtering fetches each candidate record, so a
    /// filtered list is O(tenant key count), a scan rather than an indexed
    /// query. Keys that turn out to have passively expired since the
    /// index was read are silently skipped.
    pub fn list(
        &self,
        tenant_id: &str,
        page: usize,
        page_size: usize,
        tag_filter: Option<&BTreeMap<String, String>>,
    ) -> Result<ListPage, KvError> {
        let result = self.list_inner(tenant_id, page, page_size, tag_filter);
        match &result {
            Ok(list) => {
                self.stats.listed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    tenant = tenant_id,
                    page = page,
                    returned = list.items.len(),
                    total = list.total,
                    "records listed"
                );
            }
            Err(err) => self.note_failure(tenant_id, "list", err),
        }
        result
    }

    fn list_inner(
        &self,
        tenant_id: &str,
        page: usize,
        page_size: usize,
        tag_filter: Option<&BTreeMap<String, String>>,
    ) -> Result<ListPage, KvError> {
        if page == 0 {
            return Err(KvError::Validation("page must be at least 1".to_string()));
        }
        if page_size == 0 {
            return Err(KvError::Validation("page_size must be at least 1".to_string()));
        }

        // Index membership is unordered; sort for stable pagination.
        let mut keys = self.index.members(tenant_id)?;
        keys.sort();

        if let Some(filter) = tag_filter.filter(|filter| !filter.is_empty()) {
            let mut matched = Vec::with_capacity(keys.len());
            for key in keys {
                match self.get_inner(tenant_id, &key) {
                    Ok(record)
                        if filter.iter().all(|(k, v)| record.tags.get(k) == Some(v)) =>
                    {
                        matched.push(key)
                    }
                    Ok(_) => {}
                    Err(err) if err.is_not_found() => {}
                    Err(err) => return Err(err),
                }
            }
            keys = matched;
        }

        let total = keys.len();
        let start = (page - 1).saturating_mul(page_size);

        let mut items = Vec::new();
        for key in keys.iter().skip(start).take(page_size) {
            match self.get_inner(tenant_id, key) {
                Ok(record) => items.push(record),
                // Expired between index read and resolution; skip silently
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }

        Ok(ListPage {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Creates each item independently, in request order.
    ///
    /// Items that fail with a conflict or validation error are collected as
    /// per-item failures; partial success is allowed. Only when every item
    /// fails does the whole call fail.
    pub fn batch_create(
        &self,
        tenant_id: &str,
        items: Vec<CreateRecord>,
    ) -> Result<BatchOutcome, KvError> {
        let result = self.batch_create_inner(tenant_id, items);
        match &result {
            Ok(outcome) => {
                self.stats.batches.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .created
                    .fetch_add(outcome.created.len() as u64, Ordering::Relaxed);
                info!(
                    tenant = tenant_id,
                    created = outcome.created.len(),
                    failed = outcome.failed.len(),
                    "batch create completed"
                );
            }
            Err(err) => self.note_failure(tenant_id, "batch_create", err),
        }
        result
    }

    fn batch_create_inner(
        &self,
        tenant_id: &str,
        items: Vec<CreateRecord>,
    ) -> Result<BatchOutcome, KvError> {
        if items.is_empty() {
            return Err(KvError::Validation(
                "batch must contain at least one item".to_string(),
            ));
        }
        if items.len() > self.limits.max_batch_size {
            return Err(KvError::Validation(format!(
                "batch exceeds maximum of {} items",
                self.limits.max_batch_size
            )));
        }

        let mut seen = HashSet::new();
        for item in &items {
            if !seen.insert(item.key.trim().to_string()) {
                return Err(KvError::Validation(format!(
                    "duplicate key '{}' in batch",
                    item.key.trim()
                )));
            }
        }

        let total = items.len();
        let mut created = Vec::new();
        let mut failed = Vec::new();

        for item in items {
            let item_key = item.key.clone();
            match self.create_inner(tenant_id, item) {
                Ok(record) => created.push(record),
                Err(err @ (KvError::AlreadyExists(_) | KvError::Validation(_))) => {
                    warn!(tenant = tenant_id, key = %item_key, error = %err, "batch item failed");
                    failed.push(BatchFailure {
                        key: item_key,
                        reason: err.to_string(),
                    });
                }
                // Backend trouble aborts the whole batch
                Err(err) => return Err(err),
            }
        }

        if created.is_empty() {
            return Err(KvError::OperationFailed(format!(
                "batch create failed: all {} items failed",
                failed.len()
            )));
        }

        Ok(BatchOutcome {
            created,
            failed,
            total,
        })
    }

    /// Checks whether a live record exists for this key.
    pub fn exists(&self, tenant_id: &str, key: &str) -> Result<bool, KvError> {
        self.store.exists(tenant_id, key)
    }

    /// Remaining TTL in seconds: `Ok(Some(secs))`, `Ok(None)` for no expiry,
    /// `Err(NotFound)` when the record is absent.
    pub fn remaining_ttl(&self, tenant_id: &str, key: &str) -> Result<Option<u64>, KvError> {
        self.store.remaining_ttl(tenant_id, key)
    }

    /// Number of keys the tenant index currently tracks.
    ///
    /// This counts index membership, which may briefly include passively
    /// expired keys until the next reconciliation sweep.
    pub fn count(&self, tenant_id: &str) -> Result<u64, KvError> {
        self.index.count(tenant_id)
    }

    /// A point-in-time snapshot of the outcome counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn note_failure(&self, tenant_id: &str, op: &str, err: &KvError) {
        match err {
            KvError::AlreadyExists(_) => {
                self.stats.conflicts.fetch_add(1, Ordering::Relaxed);
                debug!(tenant = tenant_id, op = op, error = %err, "conflict");
            }
            KvError::NotFound(_) => {
                self.stats.not_found.fetch_add(1, Ordering::Relaxed);
                debug!(tenant = tenant_id, op = op, error = %err, "not found");
            }
            KvError::Validation(_) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(tenant = tenant_id, op = op, error = %err, "validation rejected");
            }
            KvError::Unavailable(_) | KvError::OperationFailed(_) => {
                self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                warn!(tenant = tenant_id, op = op, error = %err, "store failure");
            }
        }
    }
}

fn assemble(key: String, value: String, meta: RecordMeta) -> Record {
    Record {
        tenant_id: meta.tenant_id,
        key,
        value,
        ttl: meta.ttl,
        version: meta.version,
        tags: meta.tags,
        created_at: meta.created_at,
        updated_at: meta.updated_at,
        expires_at: meta.expires_at,
    }
}

fn default_meta(tenant_id: &str) -> RecordMeta {
    let now = now_secs();
    RecordMeta {
        tenant_id: tenant_id.to_string(),
        ttl: None,
        version: 1,
        tags: BTreeMap::new(),
        created_at: now,
        updated_at: now,
        expires_at: None,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn validate_key(key: &str, max_bytes: usize) -> Result<String, KvError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(KvError::Validation(
            "key cannot be empty or whitespace only".to_string(),
        ));
    }
    if trimmed.len() > max_bytes {
        return Err(KvError::Validation(format!(
            "key size exceeds maximum of {} bytes",
            max_bytes
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_value(value: &str, max_bytes: usize) -> Result<(), KvError> {
    if value.len() > max_bytes {
        return Err(KvError::Validation(format!(
            "value size exceeds maximum of {} bytes",
            max_bytes
        )));
    }
    Ok(())
}

/// Upper bound on requested TTLs (ten years). Anything above it is rejected
/// so the derived expiry instant and unix timestamp stay in range.
const MAX_TTL_SECONDS: u64 = 315_360_000;

fn validate_ttl(ttl: Option<u64>) -> Result<(), KvError> {
    match ttl {
        Some(0) => Err(KvError::Validation("ttl must be positive".to_string())),
        Some(ttl) if ttl > MAX_TTL_SECONDS => Err(KvError::Validation(format!(
            "ttl must be at most {} seconds",
            MAX_TTL_SECONDS
        ))),
        _ => Ok(()),
    }
}

fn validate_tags(tags: &BTreeMap<String, String>, limits: &Limits) -> Result<(), KvError> {
    if tags.len() > limits.max_tags {
        return Err(KvError::Validation(format!(
            "maximum {} tags allowed",
            limits.max_tags
        )));
    }
    for (key, value) in tags {
        if key.chars().count() > limits.max_tag_len || value.chars().count() > limits.max_tag_len {
            return Err(KvError::Validation(format!(
                "tag key and value must be at most {} characters",
                limits.max_tag_len
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> KvService {
        KvService::new(Arc::new(ExpiringStore::new()), &Config::default())
    }

    fn create_req(key: &str, value: &str) -> CreateRecord {
        CreateRecord {
            key: key.to_string(),
            value: value.to_string(),
            ..Default::default()
        }
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_create_then_get() {
        let svc = service();

        let created = svc
            .create(
                "t1",
                CreateRecord {
                    key: "user:1".into(),
                    value: "alice".into(),
                    ttl: Some(3600),
                    tags: tags(&[("env", "prod")]),
                },
            )
            .unwrap();
        assert_eq!(created.version, 1);
        assert_eq!(created.expires_at, Some(created.updated_at + 3600));

        let fetched = svc.get("t1", "user:1").unwrap();
        assert_eq!(fetched.value, "alice");
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.tags, tags(&[("env", "prod")]));
        assert_eq!(fetched.ttl, Some(3600));
    }

    #[test]
    fn test_create_without_ttl_never_expires() {
        let svc = service();

        let record = svc.create("t1", create_req("k", "v")).unwrap();
        assert_eq!(record.ttl, None);
        assert_eq!(record.expires_at, None);
        assert_eq!(svc.remaining_ttl("t1", "k").unwrap(), None);
    }

    #[test]
    fn test_create_duplicate_conflicts() {
        let svc = service();

        svc.create("t1", create_req("k", "v1")).unwrap();
        let err = svc.create("t1", create_req("k", "v2")).unwrap_err();
        assert!(err.is_conflict());

        // Original value untouched
        assert_eq!(svc.get("t1", "k").unwrap().value, "v1");
    }

    #[test]
    fn test_create_trims_key() {
        let svc = service();

        svc.create("t1", create_req("  padded  ", "v")).unwrap();
        assert_eq!(svc.get("t1", "padded").unwrap().value, "v");
    }

    #[test]
    fn test_validation_rejections() {
        let svc = service();

        assert!(svc.create("t1", create_req("   ", "v")).unwrap_err().is_validation());
        assert!(svc
            .create("t1", create_req(&"a".repeat(300), "v"))
            .unwrap_err()
            .is_validation());
        assert!(svc
            .create(
                "t1",
                CreateRecord {
                    key: "k".into(),
                    value: "v".into(),
                    ttl: Some(0),
                    tags: BTreeMap::new(),
                },
            )
            .unwrap_err()
            .is_validation());

        let too_many: BTreeMap<String, String> =
            (0..51).map(|i| (format!("tag{}", i), "v".to_string())).collect();
        assert!(svc
            .create(
                "t1",
                CreateRecord {
                    key: "k".into(),
                    value: "v".into(),
                    ttl: None,
                    tags: too_many,
                },
            )
            .unwrap_err()
            .is_validation());

        assert!(svc
            .create(
                "t1",
                CreateRecord {
                    key: "k".into(),
                    value: "v".into(),
                    ttl: None,
                    tags: tags(&[("env", &"x".repeat(101))]),
                },
            )
            .unwrap_err()
            .is_validation());

        // Nothing reached the store
        assert!(!svc.exists("t1", "k").unwrap());
    }

    #[test]
    fn test_extreme_ttl_rejected() {
        let svc = service();

        // A ttl large enough to overflow expiry arithmetic must be rejected,
        // not panic
        let err = svc
            .create(
                "t1",
                CreateRecord {
                    key: "k".into(),
                    value: "v".into(),
                    ttl: Some(u64::MAX),
                    tags: BTreeMap::new(),
                },
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert!(!svc.exists("t1", "k").unwrap());

        svc.create("t1", create_req("k", "v")).unwrap();
        assert!(svc
            .update(
                "t1",
                "k",
                UpdateRecord {
                    ttl: Some(MAX_TTL_SECONDS + 1),
                    ..Default::default()
                },
            )
            .unwrap_err()
            .is_validation());

        // The largest accepted ttl goes through
        let record = svc
            .update(
                "t1",
                "k",
                UpdateRecord {
                    ttl: Some(MAX_TTL_SECONDS),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(record.ttl, Some(MAX_TTL_SECONDS));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let config = Config {
            max_value_bytes: 8,
            ..Default::default()
        };
        let svc = KvService::new(Arc::new(ExpiringStore::new()), &config);

        assert!(svc
            .create("t1", create_req("k", "way too long for eight bytes"))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_update_increments_version() {
        let svc = service();

        svc.create("t1", create_req("k", "v1")).unwrap();

        let mut previous = 1;
        for i in 2..=5 {
            let updated = svc
                .update(
                    "t1",
                    "k",
                    UpdateRecord {
                        value: Some(format!("v{}", i)),
                        ..Default::default()
                    },
                )
                .unwrap();
            assert_eq!(updated.version, previous + 1);
            previous = updated.version;
        }

        let record = svc.get("t1", "k").unwrap();
        assert_eq!(record.version, 5);
        assert_eq!(record.value, "v5");
    }

    #[test]
    fn test_update_merges_unset_fields() {
        let svc = service();

        svc.create(
            "t1",
            CreateRecord {
                key: "k".into(),
                value: "v1".into(),
                ttl: None,
                tags: tags(&[("team", "core")]),
            },
        )
        .unwrap();
        let before = svc.get("t1", "k").unwrap();

        // Only tags change; value and creation time carry over
        let updated = svc
            .update(
                "t1",
                "k",
                UpdateRecord {
                    tags: Some(tags(&[("team", "infra")])),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.value, "v1");
        assert_eq!(updated.tags, tags(&[("team", "infra")]));
        assert_eq!(updated.created_at, before.created_at);
        assert_eq!(updated.version, 2);
    }

    #[test]
    fn test_update_preserves_expiry_instant() {
        let svc = service();

        let created = svc
            .create(
                "t1",
                CreateRecord {
                    key: "k".into(),
                    value: "v".into(),
                    ttl: Some(60),
                    tags: BTreeMap::new(),
                },
            )
            .unwrap();

        let updated = svc
            .update(
                "t1",
                "k",
                UpdateRecord {
                    tags: Some(tags(&[("x", "1")])),
                    ..Default::default()
                },
            )
            .unwrap();

        // TTL field and expiry instant survive an update that doesn't set them
        assert_eq!(updated.ttl, Some(60));
        assert_eq!(updated.expires_at, created.expires_at);
        let remaining = svc.remaining_ttl("t1", "k").unwrap().unwrap();
        assert!(remaining <= 60);
    }

    #[test]
    fn test_update_missing_not_found() {
        let svc = service();
        assert!(svc
            .update("t1", "ghost", UpdateRecord::default())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_delete_then_absent() {
        let svc = service();

        svc.create("t1", create_req("k", "v")).unwrap();
        svc.delete("t1", "k").unwrap();

        assert!(svc.get("t1", "k").unwrap_err().is_not_found());
        assert!(!svc.exists("t1", "k").unwrap());
        assert!(svc.remaining_ttl("t1", "k").unwrap_err().is_not_found());
        assert_eq!(svc.count("t1").unwrap(), 0);
    }

    #[test]
    fn test_delete_missing_not_found() {
        let svc = service();
        assert!(svc.delete("t1", "ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_round_trip_matches_count() {
        let svc = service();

        for key in ["a", "b", "c"] {
            svc.create("t1", create_req(key, "v")).unwrap();
        }
        svc.delete("t1", "b").unwrap();

        let page = svc.list("t1", 1, 10, None).unwrap();
        let keys: Vec<&str> = page.items.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(page.total, 2);
        assert_eq!(svc.count("t1").unwrap(), 2);
    }

    #[test]
    fn test_list_pagination() {
        let svc = service();

        for i in 0..5 {
            svc.create("t1", create_req(&format!("key{}", i), "v")).unwrap();
        }

        let first = svc.list("t1", 1, 2, None).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total, 5);

        let last = svc.list("t1", 3, 2, None).unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.total, 5);

        let beyond = svc.list("t1", 4, 2, None).unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 5);

        assert!(svc.list("t1", 0, 2, None).unwrap_err().is_validation());
        assert!(svc.list("t1", 1, 0, None).unwrap_err().is_validation());
    }

    #[test]
    fn test_list_tag_filter_exact_match() {
        let svc = service();

        svc.create(
            "t1",
            CreateRecord {
                key: "prod1".into(),
                value: "v".into(),
                ttl: None,
                tags: tags(&[("env", "prod"), ("team", "core")]),
            },
        )
        .unwrap();
        svc.create(
            "t1",
            CreateRecord {
                key: "dev1".into(),
                value: "v".into(),
                ttl: None,
                tags: tags(&[("env", "dev")]),
            },
        )
        .unwrap();
        svc.create("t1", create_req("untagged", "v")).unwrap();

        let filter = tags(&[("env", "prod")]);
        let page = svc.list("t1", 1, 10, Some(&filter)).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].key, "prod1");

        // All filter pairs must match
        let filter = tags(&[("env", "prod"), ("team", "infra")]);
        let page = svc.list("t1", 1, 10, Some(&filter)).unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_list_skips_passively_expired_keys() {
        let svc = service();

        svc.create(
            "t1",
            CreateRecord {
                key: "brief".into(),
                value: "v".into(),
                ttl: Some(1),
                tags: BTreeMap::new(),
            },
        )
        .unwrap();
        svc.create("t1", create_req("stable", "v")).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(1100));

        // Before any sweep the index still tracks both keys, but resolution
        // silently drops the expired one
        let page = svc.list("t1", 1, 10, None).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].key, "stable");
    }

    #[test]
    fn test_batch_create_partial_success() {
        let svc = service();

        svc.create("t1", create_req("b", "existing")).unwrap();

        let outcome = svc
            .batch_create(
                "t1",
                vec![
                    create_req("a", "1"),
                    create_req("b", "2"),
                    create_req("c", "3"),
                ],
            )
            .unwrap();

        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.failed[0].key, "b");

        assert_eq!(svc.get("t1", "a").unwrap().value, "1");
        assert_eq!(svc.get("t1", "c").unwrap().value, "3");
        assert_eq!(svc.get("t1", "b").unwrap().value, "existing");
    }

    #[test]
    fn test_batch_create_all_failed_is_store_error() {
        let svc = service();

        svc.create("t1", create_req("a", "v")).unwrap();
        svc.create("t1", create_req("b", "v")).unwrap();

        let err = svc
            .batch_create("t1", vec![create_req("a", "x"), create_req("b", "y")])
            .unwrap_err();
        assert!(matches!(err, KvError::OperationFailed(_)));
    }

    #[test]
    fn test_batch_rejects_duplicates_and_oversize() {
        let svc = service();

        let err = svc
            .batch_create("t1", vec![create_req("a", "1"), create_req("a", "2")])
            .unwrap_err();
        assert!(err.is_validation());
        // Rejected before any item was written
        assert!(!svc.exists("t1", "a").unwrap());

        assert!(svc.batch_create("t1", vec![]).unwrap_err().is_validation());

        let config = Config {
            max_batch_size: 2,
            ..Default::default()
        };
        let small = KvService::new(Arc::new(ExpiringStore::new()), &config);
        let err = small
            .batch_create(
                "t1",
                vec![create_req("a", "1"), create_req("b", "2"), create_req("c", "3")],
            )
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_tenants_are_isolated() {
        let svc = service();

        svc.create("t1", create_req("k", "from-t1")).unwrap();
        svc.create("t2", create_req("k", "from-t2")).unwrap();

        assert_eq!(svc.get("t1", "k").unwrap().value, "from-t1");
        assert_eq!(svc.get("t2", "k").unwrap().value, "from-t2");

        svc.delete("t1", "k").unwrap();
        assert!(svc.exists("t2", "k").unwrap());
        assert_eq!(svc.count("t1").unwrap(), 0);
        assert_eq!(svc.count("t2").unwrap(), 1);
    }

    #[test]
    fn test_stats_counters() {
        let svc = service();

        svc.create("t1", create_req("k", "v")).unwrap();
        let _ = svc.create("t1", create_req("k", "v")); // conflict
        let _ = svc.get("t1", "missing"); // not found
        let _ = svc.create("t1", create_req("", "v")); // validation
        svc.get("t1", "k").unwrap();

        let stats = svc.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.not_found, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.store_errors, 0);
    }
}
