//! Rampart Store
//!
//! Persisted side of the forum taxonomy: one [`ForumRow`] per zone or forum,
//! keyed by slug, plus the threads and posts attached to forums.
//!
//! # Architecture
//!
//! - **Models**: rows, engine-owned fields, runtime counters, content
//! - **Store**: the [`TopologyStore`] / [`StoreTx`] interface the engine
//!   consumes; all writes happen inside one serialized transaction
//! - **Backends**: [`MemoryStore`] and RocksDB-backed [`RocksStore`]

mod error;
mod memory;
mod models;
mod rocks;
mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use models::{
    now_millis, ContentId, ContentItem, ContentKind, ForumRow, NewContent, OwnedFields, RowChange,
    RowId, RuntimeCounters, StoreSnapshot, SyncStamp, Upserted, WipeSummary,
};
pub use rocks::RocksStore;
pub use store::{Deadline, StoreTx, TopologyStore};
