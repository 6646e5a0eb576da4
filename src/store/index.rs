//! Tenant Index
//!
//! Maintains, per tenant, the set of key names believed live. The index only
//! exists to make listing and counting cheap; it is a hint, not ground truth.
//! Passive expiry in the backend does not update it, so membership can lag
//! behind reality until the reconciler corrects the drift.

use std::sync::Arc;

use crate::backend::{ExpiringStore, WriteOp};
use crate::error::KvError;
use crate::store::keyspace;

/// Per-tenant membership index over the backend's non-expiring sets.
#[derive(Debug, Clone)]
pub struct TenantIndex {
    backend: Arc<ExpiringStore>,
}

impl TenantIndex {
    pub fn new(backend: Arc<ExpiringStore>) -> Self {
        Self { backend }
    }

    /// Adds a key to the tenant's index. Idempotent.
    pub fn add(&self, tenant_id: &str, key: &str) -> Result<(), KvError> {
        self.backend.apply(vec![WriteOp::AddMember {
            set: keyspace::index_key(tenant_id),
            member: key.to_string(),
        }])?;
        Ok(())
    }

    /// Removes a key from the tenant's index. Idempotent.
    pub fn remove(&self, tenant_id: &str, key: &str) -> Result<(), KvError> {
        self.backend.apply(vec![WriteOp::RemoveMember {
            set: keyspace::index_key(tenant_id),
            member: key.to_string(),
        }])?;
        Ok(())
    }

    /// Returns the full set of tracked key names (unordered).
    pub fn members(&self, tenant_id: &str) -> Result<Vec<String>, KvError> {
        Ok(self.backend.members(&keyspace::index_key(tenant_id))?)
    }

    /// Cardinality of the tenant's index.
    pub fn count(&self, tenant_id: &str) -> Result<u64, KvError> {
        Ok(self.backend.set_len(&keyspace::index_key(tenant_id))?)
    }

    /// Enumerates every tenant that currently has an index set.
    pub fn tenants(&self) -> Result<Vec<String>, KvError> {
        let keys = self.backend.scan_sets(&keyspace::index_scan_prefix())?;
        Ok(keys
            .iter()
            .filter_map(|key| keyspace::tenant_of_index_key(key))
            .collect())
    }

    /// Drops a tenant's entire index set.
    pub fn drop_tenant(&self, tenant_id: &str) -> Result<(), KvError> {
        self.backend.apply(vec![WriteOp::DeleteSet {
            set: keyspace::index_key(tenant_id),
        }])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> TenantIndex {
        TenantIndex::new(Arc::new(ExpiringStore::new()))
    }

    #[test]
    fn test_add_and_members() {
        let index = index();

        index.add("t1", "a").unwrap();
        index.add("t1", "b").unwrap();
        index.add("t1", "a").unwrap(); // idempotent

        let mut members = index.members("t1").unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(index.count("t1").unwrap(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let index = index();

        index.add("t1", "a").unwrap();
        index.remove("t1", "a").unwrap();
        index.remove("t1", "a").unwrap();
        assert_eq!(index.count("t1").unwrap(), 0);
    }

    #[test]
    fn test_tenants_are_isolated() {
        let index = index();

        index.add("t1", "a").unwrap();
        index.add("t2", "b").unwrap();

        assert_eq!(index.members("t1").unwrap(), vec!["a".to_string()]);
        assert_eq!(index.members("t2").unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn test_tenant_enumeration() {
        let index = index();

        index.add("alpha", "k").unwrap();
        index.add("beta", "k").unwrap();

        let mut tenants = index.tenants().unwrap();
        tenants.sort();
        assert_eq!(tenants, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_drop_tenant() {
        let index = index();

        index.add("t1", "a").unwrap();
        index.add("t1", "b").unwrap();
        index.drop_tenant("t1").unwrap();

        assert_eq!(index.count("t1").unwrap(), 0);
        assert!(index.tenants().unwrap().is_empty());
    }
}
