//! Sharded Expiring Store with Atomic Write Batches
//!
//! This is the lowest layer of the crate: a thread-safe key-value engine with
//! TTL support that plays the role an external expiring store (and its
//! pipelined commands) would play in a deployed system.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: 64 shards instead of one big lock to reduce contention.
//! 2. **Lazy Expiry**: value entries are checked for expiry on access; a
//!    `purge_expired` pass reclaims entries nobody reads anymore.
//! 3. **Two keyspaces per shard**: expiring value entries and non-expiring
//!    membership sets are stored separately for type safety.
//! 4. **Ordered batch locking**: a write batch locks every involved shard in
//!    ascending order before mutating, so the batch is observed all-or-nothing
//!    and concurrent batches cannot deadlock.
//!
//! Expiry here is *passive* from the point of view of the layers above: an
//! entry with a TTL simply stops being observable once its deadline passes,
//! without any notification. Index sets referencing it are corrected later by
//! the reconciler.

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::error::BackendError;

/// Number of shards for the store.
/// More shards = less lock contention, but more memory overhead.
const NUM_SHARDS: usize = 64;

/// A stored value entry with optional expiry time.
#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    /// When this entry expires (None = never expires)
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            value,
            // A deadline beyond what Instant can represent means no expiry
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    #[inline]
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

/// The three distinct TTL states of a key. Callers that need to distinguish
/// "absent" from "present without expiry" must never see these conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist (or has already expired).
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key exists and expires after the remaining duration.
    Expiring(Duration),
}

/// A single mutation inside an atomic write batch.
///
/// Value ops and set ops address separate keyspaces, mirroring the split
/// between expiring data entries and non-expiring membership sets.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Write a value entry, with or without expiry. Overwrites unconditionally.
    PutValue {
        key: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
    },
    /// Delete a value entry. No-op if absent.
    DeleteValue { key: Bytes },
    /// Add a member to a set, creating the set if needed.
    AddMember { set: Bytes, member: String },
    /// Remove a member from a set. Empty sets are dropped.
    RemoveMember { set: Bytes, member: String },
    /// Drop a whole set.
    DeleteSet { set: Bytes },
}

impl WriteOp {
    /// The key that determines which shard this op lands on.
    fn target(&self) -> &Bytes {
        match self {
            WriteOp::PutValue { key, .. } | WriteOp::DeleteValue { key } => key,
            WriteOp::AddMember { set, .. }
            | WriteOp::RemoveMember { set, .. }
            | WriteOp::DeleteSet { set } => set,
        }
    }
}

/// A single shard containing a portion of the keyspace.
#[derive(Debug, Default)]
struct Shard {
    /// Expiring value entries
    values: RwLock<HashMap<Bytes, Entry>>,
    /// Non-expiring membership sets
    sets: RwLock<HashMap<Bytes, HashSet<String>>>,
}

/// Write guards over both keyspaces of one shard, held for the duration of a
/// batch.
struct ShardGuards<'a> {
    values: RwLockWriteGuard<'a, HashMap<Bytes, Entry>>,
    sets: RwLockWriteGuard<'a, HashMap<Bytes, HashSet<String>>>,
}

/// The sharded expiring store shared by every component in the crate.
///
/// # Thread Safety
///
/// Designed to be wrapped in an `Arc` and used concurrently from request
/// handlers and the background reconciler. Each call acquires and releases
/// shard locks internally; no external discipline is required.
///
/// # Example
///
/// ```
/// use tenantkv::backend::{ExpiringStore, WriteOp};
/// use bytes::Bytes;
///
/// let store = ExpiringStore::new();
/// store
///     .apply(vec![WriteOp::PutValue {
///         key: Bytes::from("greeting"),
///         value: Bytes::from("hello"),
///         ttl: None,
///     }])
///     .unwrap();
/// assert_eq!(store.get(&Bytes::from("greeting")).unwrap(), Some(Bytes::from("hello")));
/// ```
pub struct ExpiringStore {
    shards: Vec<Shard>,

    /// Statistics: number of value entries (approximate)
    value_count: AtomicU64,

    /// Statistics: number of expired entries reclaimed
    expired_count: AtomicU64,
}

impl std::fmt::Debug for ExpiringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("shards", &self.shards.len())
            .field("value_count", &self.value_count.load(Ordering::Relaxed))
            .field("expired_count", &self.expired_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for ExpiringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpiringStore {
    /// Creates a new store with default settings.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            value_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Applies a batch of writes as one atomic unit.
    ///
    /// Write locks for every shard touched by the batch are acquired in
    /// ascending shard order before the first mutation, so either every op in
    /// the batch is observable or none is, and two concurrent batches cannot
    /// deadlock against each other.
    pub fn apply(&self, ops: Vec<WriteOp>) -> Result<(), BackendError> {
        let mut shard_ids: Vec<usize> = ops
            .iter()
            .map(|op| self.shard_index(op.target()))
            .collect();
        shard_ids.sort_unstable();
        shard_ids.dedup();

        let mut guards: BTreeMap<usize, ShardGuards<'_>> = BTreeMap::new();
        for id in shard_ids {
            let shard = &self.shards[id];
            let values = shard.values.write().map_err(|_| BackendError::Poisoned)?;
            let sets = shard.sets.write().map_err(|_| BackendError::Poisoned)?;
            guards.insert(id, ShardGuards { values, sets });
        }

        for op in ops {
            let id = self.shard_index(op.target());
            let guard = guards.get_mut(&id).expect("shard guard acquired above");

            match op {
                WriteOp::PutValue { key, value, ttl } => {
                    match guard.values.get(&key) {
                        // Overwriting a dead entry reclaims it and stores anew
                        Some(entry) if entry.is_expired() => {
                            self.expired_count.fetch_add(1, Ordering::Relaxed);
                        }
                        Some(_) => {}
                        None => {
                            self.value_count.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    guard.values.insert(key, Entry::new(value, ttl));
                }
                WriteOp::DeleteValue { key } => {
                    if guard.values.remove(&key).is_some() {
                        self.value_count.fetch_sub(1, Ordering::Relaxed);
                    }
                }
                WriteOp::AddMember { set, member } => {
                    guard.sets.entry(set).or_default().insert(member);
                }
                WriteOp::RemoveMember { set, member } => {
                    if let Some(members) = guard.sets.get_mut(&set) {
                        members.remove(&member);
                        if members.is_empty() {
                            guard.sets.remove(&set);
                        }
                    }
                }
                WriteOp::DeleteSet { set } => {
                    guard.sets.remove(&set);
                }
            }
        }

        Ok(())
    }

    /// Gets the value for a key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist or has expired. Expired
    /// entries are reclaimed lazily on access.
    pub fn get(&self, key: &Bytes) -> Result<Option<Bytes>, BackendError> {
        let shard = self.shard(key);

        // Fast path: read lock for existing, non-expired keys
        {
            let values = shard.values.read().map_err(|_| BackendError::Poisoned)?;
            match values.get(key) {
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Key exists but is expired - need a write lock to reclaim it
        let mut values = shard.values.write().map_err(|_| BackendError::Poisoned)?;
        if let Some(entry) = values.get(key) {
            if entry.is_expired() {
                values.remove(key);
                self.value_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
            // Race: another thread may have rewritten the key meanwhile
            return Ok(Some(entry.value.clone()));
        }

        Ok(None)
    }

    /// Checks whether a value entry exists (and is not expired).
    pub fn exists(&self, key: &Bytes) -> Result<bool, BackendError> {
        let shard = self.shard(key);
        let values = shard.values.read().map_err(|_| BackendError::Poisoned)?;

        Ok(values.get(key).map(|e| !e.is_expired()).unwrap_or(false))
    }

    /// Reports the TTL state of a value entry.
    ///
    /// An expired-but-unreclaimed entry reports [`KeyTtl::Missing`]; passive
    /// expiry means observers never see a dead entry.
    pub fn ttl(&self, key: &Bytes) -> Result<KeyTtl, BackendError> {
        let shard = self.shard(key);
        let values = shard.values.read().map_err(|_| BackendError::Poisoned)?;

        let entry = match values.get(key) {
            Some(entry) if !entry.is_expired() => entry,
            _ => return Ok(KeyTtl::Missing),
        };

        Ok(match entry.expires_at {
            Some(exp) => KeyTtl::Expiring(exp.saturating_duration_since(Instant::now())),
            None => KeyTtl::Persistent,
        })
    }

    /// Returns all members of a set. Missing sets read as empty.
    pub fn members(&self, set: &Bytes) -> Result<Vec<String>, BackendError> {
        let shard = self.shard(set);
        let sets = shard.sets.read().map_err(|_| BackendError::Poisoned)?;

        Ok(sets
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Returns the cardinality of a set. Missing sets read as 0.
    pub fn set_len(&self, set: &Bytes) -> Result<u64, BackendError> {
        let shard = self.shard(set);
        let sets = shard.sets.read().map_err(|_| BackendError::Poisoned)?;

        Ok(sets.get(set).map(|members| members.len() as u64).unwrap_or(0))
    }

    /// Returns the keys of all live value entries starting with `prefix`.
    ///
    /// **Warning**: scans every shard; intended for maintenance paths, not
    /// the request path.
    pub fn scan_values(&self, prefix: &[u8]) -> Result<Vec<Bytes>, BackendError> {
        let mut result = Vec::new();

        for shard in &self.shards {
            let values = shard.values.read().map_err(|_| BackendError::Poisoned)?;
            for (key, entry) in values.iter() {
                if !entry.is_expired() && key.starts_with(prefix) {
                    result.push(key.clone());
                }
            }
        }

        Ok(result)
    }

    /// Returns the keys of all sets starting with `prefix`.
    pub fn scan_sets(&self, prefix: &[u8]) -> Result<Vec<Bytes>, BackendError> {
        let mut result = Vec::new();

        for shard in &self.shards {
            let sets = shard.sets.read().map_err(|_| BackendError::Poisoned)?;
            for key in sets.keys() {
                if key.starts_with(prefix) {
                    result.push(key.clone());
                }
            }
        }

        Ok(result)
    }

    /// Reclaims expired value entries from all shards.
    ///
    /// This is the store's own active expiry cycle; it complements the lazy
    /// reclamation done on reads.
    ///
    /// # Returns
    ///
    /// The number of entries reclaimed.
    pub fn purge_expired(&self) -> Result<u64, BackendError> {
        let mut reclaimed = 0u64;

        for shard in &self.shards {
            let mut values = shard.values.write().map_err(|_| BackendError::Poisoned)?;
            let before = values.len();

            values.retain(|_, entry| !entry.is_expired());

            reclaimed += (before - values.len()) as u64;
        }

        if reclaimed > 0 {
            self.value_count.fetch_sub(reclaimed, Ordering::Relaxed);
            self.expired_count.fetch_add(reclaimed, Ordering::Relaxed);
        }

        Ok(reclaimed)
    }

    /// Approximate number of value entries currently stored.
    pub fn len(&self) -> u64 {
        self.value_count.load(Ordering::Relaxed)
    }

    /// Returns true if no value entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> BackendStats {
        BackendStats {
            values: self.value_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy)]
pub struct BackendStats {
    /// Number of value entries currently stored
    pub values: u64,
    /// Total expired entries reclaimed
    pub expired: u64,
}
