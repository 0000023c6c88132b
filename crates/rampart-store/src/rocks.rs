//! Persistent store using RocksDB.
//!
//! Key layout:
//!
//! - `row:{id:020}` → [`ForumRow`] JSON
//! - `slug:{slug}` → row id
//! - `content:{forum:020}:{id:020}` → [`ContentItem`] JSON
//! - `meta:*` → id counters, sync lock and last sync stamp

use crate::error::{Result, StoreError};
use crate::models::{
    now_millis, ContentId, ContentItem, ContentKind, ForumRow, NewContent, OwnedFields, RowChange,
    RowId, StoreSnapshot, SyncStamp, Upserted, WipeSummary,
};
use crate::store::{Deadline, StoreTx, TopologyStore};
use rocksdb::{
    DBAccess, DBWithThreadMode, Direction, ErrorKind, IteratorMode, MultiThreaded, Options,
    SnapshotWithThreadMode, Transaction, TransactionDB, TransactionDBOptions, TransactionOptions,
    WriteOptions,
};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

type Db = TransactionDB<MultiThreaded>;
type ReadOnlyDb = DBWithThreadMode<MultiThreaded>;

const ROW_PREFIX: &str = "row:";
const SLUG_PREFIX: &str = "slug:";
const CONTENT_PREFIX: &str = "content:";
const NEXT_ROW_ID: &[u8] = b"meta:next_row_id";
const NEXT_CONTENT_ID: &[u8] = b"meta:next_content_id";
const SYNC_LOCK: &[u8] = b"meta:sync_lock";
const LAST_SYNC: &[u8] = b"meta:last_sync";

fn row_key(id: RowId) -> String {
    format!("{}{:020}", ROW_PREFIX, id.0)
}

fn slug_key(slug: &str) -> String {
    format!("{}{}", SLUG_PREFIX, slug)
}

fn content_prefix(forum_id: RowId) -> String {
    format!("{}{:020}:", CONTENT_PREFIX, forum_id.0)
}

fn content_key(forum_id: RowId, id: ContentId) -> String {
    format!("{}{:020}", content_prefix(forum_id), id.0)
}

fn forum_guard_key(forum_id: RowId) -> String {
    format!("meta:forum_guard:{:020}", forum_id.0)
}

enum Handle {
    ReadWrite(Db),
    ReadOnly(ReadOnlyDb),
}

/// Storage backend for the persisted taxonomy.
pub struct RocksStore {
    handle: Handle,
    writer: Mutex<()>,
}

impl RocksStore {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let txn_opts = TransactionDBOptions::default();
        let db = Db::open(&opts, &txn_opts, path)?;
        Ok(Self {
            handle: Handle::ReadWrite(db),
            writer: Mutex::new(()),
        })
    }

    /// Open existing storage for snapshots only.
    ///
    /// Does not take the database lock, so it works while another process
    /// holds the store open for a sync. Sees the state as of opening.
    /// Transactions fail with [`StoreError::ReadOnly`].
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = ReadOnlyDb::open_for_read_only(&Options::default(), path, false)?;
        Ok(Self {
            handle: Handle::ReadOnly(db),
            writer: Mutex::new(()),
        })
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.handle, Handle::ReadOnly(_))
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX).max(1)
}

/// Map backend errors, reporting lock waits and expired transactions as
/// timeouts.
fn backend_error(e: rocksdb::Error, deadline: &Deadline) -> StoreError {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::Expired | ErrorKind::Busy => {
            StoreError::Timeout(deadline.timeout())
        }
        _ => StoreError::from(e),
    }
}

impl TopologyStore for RocksStore {
    fn transaction<T, E, F>(&self, timeout: Duration, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let Handle::ReadWrite(db) = &self.handle else {
            return Err(StoreError::ReadOnly.into());
        };
        let _writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Backend("sync lock poisoned".into()))?;
        let deadline = Deadline::after(timeout);

        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_lock_timeout(millis(timeout));
        txn_opts.set_expiration(millis(timeout));
        let txn = db.transaction_opt(&WriteOptions::default(), &txn_opts);

        // Serializes runs across store handles.
        txn.get_for_update(SYNC_LOCK, true)
            .map_err(|e| backend_error(e, &deadline))?;

        let result = {
            let mut tx = RocksTx {
                txn: &txn,
                deadline,
            };
            f(&mut tx)
        };

        match result {
            Ok(value) => {
                deadline.check()?;
                txn.commit().map_err(|e| backend_error(e, &deadline))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback() {
                    tracing::error!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    fn snapshot(&self) -> Result<StoreSnapshot> {
        match &self.handle {
            Handle::ReadWrite(db) => read_snapshot(&db.snapshot()),
            Handle::ReadOnly(db) => read_snapshot(&db.snapshot()),
        }
    }
}

fn read_snapshot<D: DBAccess>(snapshot: &SnapshotWithThreadMode<'_, D>) -> Result<StoreSnapshot> {
    let mut rows = Vec::new();
    let prefix = ROW_PREFIX.as_bytes();
    for item in snapshot.iterator(IteratorMode::From(prefix, Direction::Forward)) {
        let (key, value) = item?;
        if !key.starts_with(prefix) {
            break;
        }
        rows.push(serde_json::from_slice(&value)?);
    }

    let last_sync = match snapshot.get(LAST_SYNC)? {
        Some(data) => Some(serde_json::from_slice(&data)?),
        None => None,
    };

    Ok(StoreSnapshot { rows, last_sync })
}

struct RocksTx<'t, 'db> {
    txn: &'t Transaction<'db, Db>,
    deadline: Deadline,
}

impl RocksTx<'_, '_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.deadline.check()?;
        self.txn
            .get(key)
            .map_err(|e| backend_error(e, &self.deadline))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.deadline.check()?;
        self.txn
            .put(key, value)
            .map_err(|e| backend_error(e, &self.deadline))
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.deadline.check()?;
        self.txn
            .delete(key)
            .map_err(|e| backend_error(e, &self.deadline))
    }

    /// Key/value pairs under `prefix`, including this transaction's writes.
    fn scan(&self, prefix: &str) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        self.deadline.check()?;
        let prefix = prefix.as_bytes();
        let mut out = Vec::new();
        for item in self
            .txn
            .iterator(IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(|e| backend_error(e, &self.deadline))?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }

    fn next_id(&self, counter: &[u8]) -> Result<u64> {
        let current = match self.get(counter)? {
            Some(data) => parse_u64(&data)?,
            None => 0,
        };
        let next = current + 1;
        self.put(counter, next.to_string().as_bytes())?;
        Ok(next)
    }

    fn get_row(&self, id: RowId) -> Result<Option<ForumRow>> {
        match self.get(row_key(id).as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn put_row(&self, row: &ForumRow) -> Result<()> {
        self.put(row_key(row.id).as_bytes(), &serde_json::to_vec(row)?)
    }

    fn content_items(&self, forum_id: RowId) -> Result<Vec<ContentItem>> {
        self.scan(&content_prefix(forum_id))?
            .into_iter()
            .map(|(_, value)| Ok(serde_json::from_slice(&value)?))
            .collect()
    }
}

fn parse_u64(data: &[u8]) -> Result<u64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StoreError::Corrupt(format!("invalid integer {:?}", data)))
}

impl StoreTx for RocksTx<'_, '_> {
    fn find_by_slug(&mut self, slug: &str) -> Result<Option<ForumRow>> {
        let Some(data) = self.get(slug_key(slug).as_bytes())? else {
            return Ok(None);
        };
        let id = RowId(parse_u64(&data)?);
        match self.get_row(id)? {
            Some(row) => Ok(Some(row)),
            None => Err(StoreError::Corrupt(format!(
                "slug '{}' points at missing row {}",
                slug, id
            ))),
        }
    }

    fn upsert_by_slug(&mut self, fields: OwnedFields) -> Result<Upserted> {
        let existing = self.find_by_slug(&fields.slug)?;
        let (row, change) = ForumRow::upsert(
            existing,
            fields,
            || Ok(RowId(self.next_id(NEXT_ROW_ID)?)),
            now_millis(),
        )?;

        if change != RowChange::Unchanged {
            self.put_row(&row)?;
            self.put(
                slug_key(row.slug()).as_bytes(),
                row.id.0.to_string().as_bytes(),
            )?;
        }

        Ok(Upserted { id: row.id, change })
    }

    fn count_content(&mut self, forum_id: RowId, kind: ContentKind) -> Result<u64> {
        Ok(self
            .content_items(forum_id)?
            .iter()
            .filter(|c| c.kind == kind)
            .count() as u64)
    }

    fn insert_content(&mut self, content: NewContent) -> Result<ContentId> {
        let mut forum = self
            .get_row(content.forum_id)?
            .ok_or_else(|| StoreError::NotFound(format!("forum row {}", content.forum_id)))?;

        if let Some(thread_id) = content.thread_id {
            let thread_key = content_key(content.forum_id, thread_id);
            if self.get(thread_key.as_bytes())?.is_none() {
                return Err(StoreError::NotFound(format!("thread {}", thread_id)));
            }
        }

        let now = now_millis();
        let id = ContentId(self.next_id(NEXT_CONTENT_ID)?);
        forum.counters.record(content.kind, now);
        self.put_row(&forum)?;

        let item = ContentItem::from_new(id, content, now);
        self.put(
            content_key(item.forum_id, id).as_bytes(),
            &serde_json::to_vec(&item)?,
        )?;
        Ok(id)
    }

    fn insert_thread_if_empty(&mut self, content: NewContent) -> Result<Option<ContentId>> {
        self.deadline.check()?;
        self.txn
            .get_for_update(forum_guard_key(content.forum_id).as_bytes(), true)
            .map_err(|e| backend_error(e, &self.deadline))?;

        if self.count_content(content.forum_id, ContentKind::Thread)? > 0 {
            return Ok(None);
        }
        self.insert_content(content).map(Some)
    }

    fn list_content(&mut self, forum_id: RowId) -> Result<Vec<ContentItem>> {
        let mut items = self.content_items(forum_id)?;
        items.sort_by_key(|c| c.id);
        Ok(items)
    }

    fn read_all_rows(&mut self) -> Result<Vec<ForumRow>> {
        self.scan(ROW_PREFIX)?
            .into_iter()
            .map(|(_, value)| Ok(serde_json::from_slice(&value)?))
            .collect()
    }

    fn wipe(&mut self) -> Result<WipeSummary> {
        let mut summary = WipeSummary::default();
        for (key, _) in self.scan(ROW_PREFIX)? {
            self.delete(&key)?;
            summary.rows += 1;
        }
        for (key, _) in self.scan(SLUG_PREFIX)? {
            self.delete(&key)?;
        }
        for (key, _) in self.scan(CONTENT_PREFIX)? {
            self.delete(&key)?;
            summary.content += 1;
        }
        Ok(summary)
    }

    fn record_sync(&mut self, stamp: &SyncStamp) -> Result<()> {
        self.put(LAST_SYNC, &serde_json::to_vec(stamp)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::fields;
    use tempfile::tempdir;

    const BUDGET: Duration = Duration::from_secs(10);

    fn seed_pit(store: &RocksStore) -> (RowId, RowId) {
        store
            .transaction(BUDGET, |tx| {
                let zone = tx.upsert_by_slug(fields("the-pit", None))?;
                let forum = tx.upsert_by_slug(fields("shill-zone", Some((zone.id, "the-pit"))))?;
                Ok::<_, StoreError>((zone.id, forum.id))
            })
            .unwrap()
    }

    #[test]
    fn upsert_roundtrip() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let (zone, forum) = seed_pit(&store);
        assert_ne!(zone, forum);

        let rows = store.snapshot().unwrap().rows;
        assert_eq!(rows.len(), 2);
        let shill = rows.iter().find(|r| r.slug() == "shill-zone").unwrap();
        assert_eq!(shill.fields.parent_id, Some(zone));
        assert_eq!(shill.fields.parent_slug.as_deref(), Some("the-pit"));
    }

    #[test]
    fn upsert_twice_keeps_ids() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let first = seed_pit(&store);
        let second = seed_pit(&store);
        assert_eq!(first, second);

        let change = store
            .transaction(BUDGET, |tx| {
                Ok::<_, StoreError>(tx.upsert_by_slug(fields("the-pit", None))?.change)
            })
            .unwrap();
        assert_eq!(change, RowChange::Unchanged);
    }

    #[test]
    fn reads_see_uncommitted_writes() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let (found, count) = store
            .transaction(BUDGET, |tx| {
                tx.upsert_by_slug(fields("the-pit", None))?;
                let found = tx.find_by_slug("the-pit")?.is_some();
                Ok::<_, StoreError>((found, tx.read_all_rows()?.len()))
            })
            .unwrap();

        assert!(found);
        assert_eq!(count, 1);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();

        let result: Result<()> = store.transaction(BUDGET, |tx| {
            tx.upsert_by_slug(fields("the-pit", None))?;
            Err(StoreError::Backend("boom".into()))
        });

        assert!(result.is_err());
        assert!(store.snapshot().unwrap().rows.is_empty());
    }

    #[test]
    fn content_and_counters() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let (_, forum) = seed_pit(&store);

        let items = store
            .transaction(BUDGET, |tx| {
                let thread = tx
                    .insert_thread_if_empty(NewContent::sticky_thread(
                        forum,
                        "Welcome".into(),
                        "system".into(),
                    ))?
                    .ok_or_else(|| StoreError::Backend("expected insert".into()))?;
                tx.insert_content(NewContent::root_post(
                    forum,
                    thread,
                    "Hello".into(),
                    "system".into(),
                ))?;

                let again = tx.insert_thread_if_empty(NewContent::sticky_thread(
                    forum,
                    "Welcome".into(),
                    "system".into(),
                ))?;
                assert!(again.is_none());

                assert_eq!(tx.count_content(forum, ContentKind::Thread)?, 1);
                assert_eq!(tx.count_content(forum, ContentKind::Post)?, 1);
                tx.list_content(forum)
            })
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].thread_id, Some(items[0].id));

        let rows = store.snapshot().unwrap().rows;
        let shill = rows.iter().find(|r| r.id == forum).unwrap();
        assert_eq!(shill.counters.thread_count, 1);
        assert_eq!(shill.counters.post_count, 1);
    }

    #[test]
    fn wipe_and_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksStore::open(dir.path()).unwrap();
            let (_, forum) = seed_pit(&store);
            store
                .transaction(BUDGET, |tx| {
                    tx.insert_content(NewContent::sticky_thread(forum, "t".into(), "a".into()))
                })
                .unwrap();
        }

        let store = RocksStore::open(dir.path()).unwrap();
        assert_eq!(store.snapshot().unwrap().rows.len(), 2);

        let summary = store.transaction(BUDGET, |tx| tx.wipe()).unwrap();
        assert_eq!(summary, WipeSummary { rows: 2, content: 1 });
        assert!(store.snapshot().unwrap().rows.is_empty());

        // Ids keep increasing after a wipe.
        let (zone, _) = seed_pit(&store);
        assert!(zone.0 > 2);
    }

    #[test]
    fn read_only_handle_alongside_writer() {
        let dir = tempdir().unwrap();
        let writer = RocksStore::open(dir.path()).unwrap();
        seed_pit(&writer);

        let reader = RocksStore::open_read_only(dir.path()).unwrap();
        assert!(reader.is_read_only());
        assert!(!writer.is_read_only());
        assert_eq!(reader.snapshot().unwrap().rows.len(), 2);

        let result: Result<()> = reader.transaction(BUDGET, |tx| tx.wipe().map(|_| ()));
        assert!(matches!(result, Err(StoreError::ReadOnly)));

        // The writer keeps running transactions while the reader is open.
        let (zone, _) = seed_pit(&writer);
        assert!(writer
            .snapshot()
            .unwrap()
            .rows
            .iter()
            .any(|r| r.id == zone));
    }

    #[test]
    fn read_only_open_of_missing_store_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("never-synced");
        assert!(matches!(
            RocksStore::open_read_only(&missing),
            Err(StoreError::Backend(_))
        ));
    }

    #[test]
    fn sync_stamp_persists() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let stamp = SyncStamp {
            fingerprint: "f00d".into(),
            synced_at: 42,
            rows: 2,
        };
        store
            .transaction(BUDGET, |tx| tx.record_sync(&stamp))
            .unwrap();
        assert_eq!(store.snapshot().unwrap().last_sync, Some(stamp));
    }
}
