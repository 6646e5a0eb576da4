//! Expiry Reconciler
//!
//! Passive expiry in the backend removes a record's data entry without
//! touching its tenant index membership (and sometimes leaves an orphaned
//! metadata entry behind if their deadlines straddle a read). This module
//! runs a periodic sweep that detects such drift and corrects it.
//!
//! ## Algorithm
//!
//! 1. Enumerate every tenant index set.
//! 2. For each tracked key, check the data entry's existence only.
//! 3. If absent: delete the metadata entry and the index member in one
//!    atomic batch; count it as cleaned.
//! 4. If present: no action. The sweep never refreshes a TTL or touches a
//!    live record.
//!
//! This is advisory housekeeping, not a correctness requirement for reads:
//! reads always check real existence, so a delayed sweep only degrades
//! list/count accuracy temporarily. A backend failure aborts the current
//! sweep; the loop logs it and retries from scratch on the next tick. Each
//! per-key correction is idempotent, so aborting mid-sweep is safe.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::backend::{ExpiringStore, WriteOp};
use crate::error::KvError;
use crate::store::keyspace;

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Interval between sweeps.
    pub interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(200),
        }
    }
}

/// A handle to the running reconciler task.
///
/// When this handle is dropped, the task stops.
#[derive(Debug)]
pub struct Reconciler {
    shutdown_tx: watch::Sender<bool>,
}

impl Reconciler {
    /// Starts the reconciler as a background task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use tenantkv::backend::ExpiringStore;
    /// use tenantkv::reconcile::{Reconciler, ReconcilerConfig};
    /// use std::sync::Arc;
    ///
    /// let backend = Arc::new(ExpiringStore::new());
    /// let reconciler = Reconciler::start(Arc::clone(&backend), ReconcilerConfig::default());
    ///
    /// // Sweeps run in the background; dropping the handle stops them.
    /// drop(reconciler);
    /// ```
    pub fn start(backend: Arc<ExpiringStore>, config: ReconcilerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(reconcile_loop(backend, config, shutdown_rx));

        info!("expiry reconciler started");

        Self { shutdown_tx }
    }

    /// Stops the reconciler. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("expiry reconciler stopped");
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main reconciliation loop. Sweep failures are logged and retried on
/// the next tick; they never take the host process down.
async fn reconcile_loop(
    backend: Arc<ExpiringStore>,
    config: ReconcilerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("reconciler received shutdown signal");
                    return;
                }
            }
        }

        // Active expiry pass first, so the drift sweep sees reality
        match backend.purge_expired() {
            Ok(0) => {}
            Ok(reclaimed) => debug!(reclaimed = reclaimed, "reclaimed expired entries"),
            Err(err) => warn!(error = %err, "active expiry pass failed"),
        }

        match sweep_once(&backend) {
            Ok(0) => trace!("reconciliation sweep found no drift"),
            Ok(cleaned) => info!(cleaned = cleaned, "reconciliation sweep completed"),
            Err(err) => warn!(error = %err, "reconciliation sweep aborted"),
        }
    }
}

/// Runs one full reconciliation sweep over every tenant.
///
/// Returns the number of stale entries cleaned. A backend failure aborts the
/// sweep entirely; no partial count is reported.
pub fn sweep_once(backend: &ExpiringStore) -> Result<u64, KvError> {
    let mut cleaned = 0u64;

    for set_key in backend.scan_sets(&keyspace::index_scan_prefix())? {
        let tenant_id = match keyspace::tenant_of_index_key(&set_key) {
            Some(tenant_id) => tenant_id,
            None => continue,
        };

        for key in backend.members(&set_key)? {
            if backend.exists(&keyspace::value_key(&tenant_id, &key))? {
                continue;
            }

            // Data entry passively expired: drop the orphaned metadata and
            // the index member as one corrective unit.
            backend.apply(vec![
                WriteOp::DeleteValue {
                    key: keyspace::meta_key(&tenant_id, &key),
                },
                WriteOp::RemoveMember {
                    set: set_key.clone(),
                    member: key.clone(),
                },
            ])?;

            cleaned += 1;
            debug!(tenant = %tenant_id, key = %key, "cleaned stale entry");
        }
    }

    Ok(cleaned)
}

/// Removes every record of one tenant and its entire index set.
///
/// Unconditional: it does not check individual expiry state. Used when a
/// tenant account is deleted. Returns the number of backend entries removed
/// (value and metadata entries both count).
pub fn purge_tenant(backend: &ExpiringStore, tenant_id: &str) -> Result<u64, KvError> {
    let entries = backend.scan_values(&keyspace::tenant_entry_prefix(tenant_id))?;
    let removed = entries.len() as u64;

    let mut ops: Vec<WriteOp> = entries
        .into_iter()
        .map(|key| WriteOp::DeleteValue { key })
        .collect();
    ops.push(WriteOp::DeleteSet {
        set: keyspace::index_key(tenant_id),
    });

    backend.apply(ops)?;

    info!(tenant = tenant_id, removed = removed, "tenant purged");

    Ok(removed)
}
