//! Error Taxonomy
//!
//! Every fallible operation in this crate resolves to [`KvError`].
//! The taxonomy separates expected caller-facing outcomes (`AlreadyExists`,
//! `NotFound`, `Validation`) from server faults (`Unavailable`,
//! `OperationFailed`), so a transport layer can map them to client codes
//! without inspecting error strings.
//!
//! Backend failures are caught at the record store boundary and wrapped here;
//! raw backend errors never reach callers of the service.

use thiserror::Error;

/// Failures originating inside the expiring store itself.
///
/// The backend is an in-process engine, so its only connectivity-style
/// failure mode is a lock left poisoned by a panicking writer. Anything
/// holding a `BackendError` should be treated as "the store is unavailable".
#[derive(Debug, Error)]
pub enum BackendError {
    /// A shard lock was poisoned; the shard's contents can no longer be trusted.
    #[error("storage shard lock poisoned")]
    Poisoned,
}

/// The error type returned by the record store, tenant index, service, and
/// reconciler.
#[derive(Debug, Error)]
pub enum KvError {
    /// A live record with this key already exists for the tenant.
    #[error("key '{0}' already exists")]
    AlreadyExists(String),

    /// No live record exists for this key.
    #[error("key '{0}' not found")]
    NotFound(String),

    /// The request violated a size or shape constraint. Raised before any
    /// backend interaction.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The backend could not be reached or is in an unusable state.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] BackendError),

    /// The backend accepted the call but the operation failed mid-way,
    /// or stored data failed to decode.
    #[error("store operation failed: {0}")]
    OperationFailed(String),
}

impl KvError {
    /// True for the expected "no such record" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound(_))
    }

    /// True for the expected duplicate-create outcome.
    pub fn is_conflict(&self) -> bool {
        matches!(self, KvError::AlreadyExists(_))
    }

    /// True when the request itself was malformed.
    pub fn is_validation(&self) -> bool {
        matches!(self, KvError::Validation(_))
    }

    /// True for server faults a transport layer should report as 5xx.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, KvError::Unavailable(_) | KvError::OperationFailed(_))
    }
}

impl From<serde_json::Error> for KvError {
    fn from(err: serde_json::Error) -> Self {
        KvError::OperationFailed(format!("failed to decode record metadata: {}", err))
    }
}
