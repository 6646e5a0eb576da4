//! Underlying Expiring Key-Value Backend
//!
//! This module provides the data-plane primitives everything else is built
//! on: an in-process, sharded key-value store with native TTL expiry and
//! membership sets, plus an atomic multi-key write batch (the equivalent of
//! a pipelined call against an external store).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ExpiringStore                          │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ values  │ │ values  │ │ values  │ │ shards  │           │
//! │  │ sets    │ │ sets    │ │ sets    │ │         │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Value entries may carry a TTL and expire passively (checked lazily on
//! access, reclaimed by [`ExpiringStore::purge_expired`]). Sets never expire;
//! keeping them consistent with expiring value entries is the job of the
//! reconciler, not this layer.

pub mod engine;

// Re-export commonly used types
pub use engine::{BackendStats, ExpiringStore, KeyTtl, WriteOp};
