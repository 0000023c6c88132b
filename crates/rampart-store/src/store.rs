//! Store interface consumed by the reconciliation engine.

use crate::error::{Result, StoreError};
use crate::models::{
    ContentId, ContentItem, ContentKind, ForumRow, NewContent, OwnedFields, RowId, StoreSnapshot,
    SyncStamp, Upserted, WipeSummary,
};
use std::time::{Duration, Instant};

/// Operations available inside a store transaction.
///
/// Every call is bounded by the transaction's deadline and fails with
/// [`StoreError::Timeout`] once it has passed.
pub trait StoreTx {
    /// Look up a row by slug.
    fn find_by_slug(&mut self, slug: &str) -> Result<Option<ForumRow>>;

    /// Insert a row for `fields.slug`, or update the engine-owned fields of the
    /// existing one in place. Runtime counters are never touched.
    fn upsert_by_slug(&mut self, fields: OwnedFields) -> Result<Upserted>;

    /// Number of content items of `kind` attached to a forum row.
    fn count_content(&mut self, forum_id: RowId, kind: ContentKind) -> Result<u64>;

    /// Insert a content item and update the forum's runtime counters.
    fn insert_content(&mut self, content: NewContent) -> Result<ContentId>;

    /// Insert a thread only if the forum has no threads yet. Returns `None`
    /// when a thread is already present.
    fn insert_thread_if_empty(&mut self, content: NewContent) -> Result<Option<ContentId>>;

    /// All content attached to a forum row, in insertion order.
    fn list_content(&mut self, forum_id: RowId) -> Result<Vec<ContentItem>>;

    /// All rows, ordered by id.
    fn read_all_rows(&mut self) -> Result<Vec<ForumRow>>;

    /// Delete every row and every content item.
    fn wipe(&mut self) -> Result<WipeSummary>;

    /// Record the outcome of a reconciliation.
    fn record_sync(&mut self, stamp: &SyncStamp) -> Result<()>;
}

/// A store that can run serialized, all-or-nothing transactions.
pub trait TopologyStore {
    /// Run `f` inside a transaction. Commits when `f` returns `Ok`, rolls back
    /// when it returns `Err`. Concurrent transactions on the same store are
    /// serialized.
    fn transaction<T, E, F>(&self, timeout: Duration, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> std::result::Result<T, E>,
        E: From<StoreError>;

    /// Read every row and the last sync stamp from one consistent snapshot.
    /// Never blocks on a running transaction.
    fn snapshot(&self) -> Result<StoreSnapshot>;
}

/// Time budget of a transaction.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    /// Fail once the budget is spent.
    pub fn check(&self) -> Result<()> {
        if self.started.elapsed() > self.timeout {
            return Err(StoreError::Timeout(self.timeout));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Remaining budget, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }
}
