//! In-memory store.
//!
//! Transactions work on a private copy of the committed state which replaces
//! it on commit, so an aborted transaction leaves nothing behind and snapshot
//! reads always see the last committed state.

use crate::error::{Result, StoreError};
use crate::models::{
    now_millis, ContentId, ContentItem, ContentKind, ForumRow, NewContent, OwnedFields, RowId,
    StoreSnapshot, SyncStamp, Upserted, WipeSummary,
};
use crate::store::{Deadline, StoreTx, TopologyStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    rows: BTreeMap<RowId, ForumRow>,
    slugs: HashMap<String, RowId>,
    content: BTreeMap<ContentId, ContentItem>,
    next_row_id: u64,
    next_content_id: u64,
    last_sync: Option<SyncStamp>,
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: RwLock<Arc<MemoryState>>,
    writer: Mutex<()>,
    failing_slug: Mutex<Option<String>>,
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Backend("memory store lock poisoned".into())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upsert of `slug` fail with a backend error, to simulate a
    /// write failure in the middle of a transaction.
    pub fn fail_upserts_for(&self, slug: &str) -> Result<()> {
        *self.failing_slug.lock().map_err(poisoned)? = Some(slug.to_string());
        Ok(())
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) -> Result<()> {
        *self.failing_slug.lock().map_err(poisoned)? = None;
        Ok(())
    }

    fn committed(&self) -> Result<Arc<MemoryState>> {
        Ok(Arc::clone(&*self.committed.read().map_err(poisoned)?))
    }
}

impl TopologyStore for MemoryStore {
    fn transaction<T, E, F>(&self, timeout: Duration, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let _writer = self.writer.lock().map_err(poisoned)?;
        let failing_slug = self.failing_slug.lock().map_err(poisoned)?.clone();

        let mut tx = MemoryTx {
            state: (*self.committed()?).clone(),
            deadline: Deadline::after(timeout),
            failing_slug,
        };

        let value = f(&mut tx)?;

        tx.deadline.check()?;
        *self.committed.write().map_err(poisoned)? = Arc::new(tx.state);
        Ok(value)
    }

    fn snapshot(&self) -> Result<StoreSnapshot> {
        let state = self.committed()?;
        Ok(StoreSnapshot {
            rows: state.rows.values().cloned().collect(),
            last_sync: state.last_sync.clone(),
        })
    }
}

struct MemoryTx {
    state: MemoryState,
    deadline: Deadline,
    failing_slug: Option<String>,
}

impl MemoryTx {
    fn forum_mut(&mut self, forum_id: RowId) -> Result<&mut ForumRow> {
        self.state
            .rows
            .get_mut(&forum_id)
            .ok_or_else(|| StoreError::NotFound(format!("forum row {}", forum_id)))
    }
}

impl StoreTx for MemoryTx {
    fn find_by_slug(&mut self, slug: &str) -> Result<Option<ForumRow>> {
        self.deadline.check()?;
        Ok(self
            .state
            .slugs
            .get(slug)
            .and_then(|id| self.state.rows.get(id))
            .cloned())
    }

    fn upsert_by_slug(&mut self, fields: OwnedFields) -> Result<Upserted> {
        self.deadline.check()?;
        if self.failing_slug.as_deref() == Some(fields.slug.as_str()) {
            return Err(StoreError::Backend(format!(
                "injected write failure for '{}'",
                fields.slug
            )));
        }

        let existing = self.find_by_slug(&fields.slug)?;
        let next_id = &mut self.state.next_row_id;
        let (row, change) = ForumRow::upsert(
            existing,
            fields,
            || {
                *next_id += 1;
                Ok(RowId(*next_id))
            },
            now_millis(),
        )?;

        let id = row.id;
        self.state.slugs.insert(row.fields.slug.clone(), id);
        self.state.rows.insert(id, row);
        Ok(Upserted { id, change })
    }

    fn count_content(&mut self, forum_id: RowId, kind: ContentKind) -> Result<u64> {
        self.deadline.check()?;
        Ok(self
            .state
            .content
            .values()
            .filter(|c| c.forum_id == forum_id && c.kind == kind)
            .count() as u64)
    }

    fn insert_content(&mut self, content: NewContent) -> Result<ContentId> {
        self.deadline.check()?;
        if let Some(thread_id) = content.thread_id {
            let in_forum = self
                .state
                .content
                .get(&thread_id)
                .is_some_and(|thread| thread.forum_id == content.forum_id);
            if !in_forum {
                return Err(StoreError::NotFound(format!("thread {}", thread_id)));
            }
        }

        let now = now_millis();
        let kind = content.kind;
        self.forum_mut(content.forum_id)?.counters.record(kind, now);

        self.state.next_content_id += 1;
        let id = ContentId(self.state.next_content_id);
        self.state
            .content
            .insert(id, ContentItem::from_new(id, content, now));
        Ok(id)
    }

    fn insert_thread_if_empty(&mut self, content: NewContent) -> Result<Option<ContentId>> {
        if self.count_content(content.forum_id, ContentKind::Thread)? > 0 {
            return Ok(None);
        }
        self.insert_content(content).map(Some)
    }

    fn list_content(&mut self, forum_id: RowId) -> Result<Vec<ContentItem>> {
        self.deadline.check()?;
        Ok(self
            .state
            .content
            .values()
            .filter(|c| c.forum_id == forum_id)
            .cloned()
            .collect())
    }

    fn read_all_rows(&mut self) -> Result<Vec<ForumRow>> {
        self.deadline.check()?;
        Ok(self.state.rows.values().cloned().collect())
    }

    fn wipe(&mut self) -> Result<WipeSummary> {
        self.deadline.check()?;
        let summary = WipeSummary {
            rows: self.state.rows.len(),
            content: self.state.content.len(),
        };
        self.state.rows.clear();
        self.state.slugs.clear();
        self.state.content.clear();
        Ok(summary)
    }

    fn record_sync(&mut self, stamp: &SyncStamp) -> Result<()> {
        self.deadline.check()?;
        self.state.last_sync = Some(stamp.clone());
        Ok(())
    }
}
