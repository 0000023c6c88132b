//! Rampart Sync - Forum Topology Reconciliation
//!
//! Applies the declarative forum taxonomy to the persisted store and audits
//! the store for drift.
//!
//! # Architecture
//!
//! - **Reconcile**: one transaction per run; validate, optional wipe, upsert
//!   every node by slug in pre-order, seed empty leaf forums, stamp
//! - **Seed**: welcome thread and root post for forums with no threads
//! - **Drift**: read-only diff of config against a store snapshot
//! - **Config**: environment and taxonomy file loading
//!
//! # Example
//!
//! ```no_run
//! use rampart_store::MemoryStore;
//! use rampart_sync::{detect_drift, reconcile, SyncOptions};
//! use rampart_taxonomy::builtin;
//!
//! let store = MemoryStore::new();
//! let forest = builtin::forest();
//! let report = reconcile(&forest, &store, &SyncOptions::default())?;
//! assert!(detect_drift(&forest, &store)?.is_clean());
//! # let _ = report;
//! # Ok::<(), rampart_sync::SyncError>(())
//! ```

pub mod config;
pub mod drift;
mod error;
pub mod payload;
pub mod reconcile;
pub mod seed;

pub use config::SyncConfig;
pub use drift::{detect_drift, Discrepancy, DiscrepancyKind, DriftReport};
pub use error::{Result, SyncError};
pub use reconcile::{apply_nodes, reconcile, CancelToken, NodeOutcome, SyncOptions, SyncReport};
pub use seed::{seed_welcome_content, welcome_copy, SeedError};
