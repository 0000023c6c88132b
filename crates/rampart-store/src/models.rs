//! Persisted row and content models.

use crate::error::Result;
use rampart_taxonomy::{AccessLevel, EntityType};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Store-assigned row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned content identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub u64);

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fields of a row written by the reconciler.
///
/// `parent_slug` duplicates the parent's slug next to `parent_id` so lookups
/// by parent do not need a join. It is derived data and is rewritten on every
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedFields {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub entity_type: EntityType,
    pub parent_id: Option<RowId>,
    pub parent_slug: Option<String>,
    pub position: i32,

    // Theme
    pub color: String,
    pub icon: String,
    pub banner_image: Option<String>,
    pub theme_class: String,

    // Rules needed for query-time filtering
    pub allow_posting: bool,
    pub tipping_enabled: bool,
    pub xp_multiplier: f64,
    pub access_level: AccessLevel,
    pub required_prefix: bool,
    pub is_locked: bool,
    pub min_xp_to_post: u32,

    /// Full resolved rules and theme, canonical JSON
    pub extra_data: serde_json::Value,
}

/// Fields maintained by runtime subsystems. The reconciler never writes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCounters {
    pub thread_count: u64,
    pub post_count: u64,
    /// Unix millis of the latest thread or post
    pub last_activity_at: Option<u64>,
}

/// A persisted zone or forum row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumRow {
    pub id: RowId,
    pub fields: OwnedFields,
    #[serde(default)]
    pub counters: RuntimeCounters,
    pub created_at: u64,
    pub updated_at: u64,
}

/// What an upsert did to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowChange {
    Inserted,
    Updated,
    Unchanged,
}

/// Result of [`crate::StoreTx::upsert_by_slug`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: RowId,
    pub change: RowChange,
}

impl ForumRow {
    /// Merge engine-owned fields into an existing row, or build a new one.
    ///
    /// Existing rows keep their id, counters and `created_at`. Identical
    /// fields produce [`RowChange::Unchanged`] and an untouched row.
    pub fn upsert(
        existing: Option<ForumRow>,
        fields: OwnedFields,
        new_id: impl FnOnce() -> Result<RowId>,
        now: u64,
    ) -> Result<(ForumRow, RowChange)> {
        Ok(match existing {
            Some(row) if row.fields == fields => (row, RowChange::Unchanged),
            Some(row) => (
                ForumRow {
                    fields,
                    updated_at: now,
                    ..row
                },
                RowChange::Updated,
            ),
            None => (
                ForumRow {
                    id: new_id()?,
                    fields,
                    counters: RuntimeCounters::default(),
                    created_at: now,
                    updated_at: now,
                },
                RowChange::Inserted,
            ),
        })
    }

    pub fn slug(&self) -> &str {
        &self.fields.slug
    }
}

/// Kind of content attached to a forum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Thread,
    Post,
}

/// Content to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContent {
    pub forum_id: RowId,
    pub kind: ContentKind,
    /// Owning thread, for posts
    pub thread_id: Option<ContentId>,
    pub title: Option<String>,
    pub body: String,
    pub author: String,
    pub is_sticky: bool,
    /// First post of a thread
    pub is_root: bool,
}

impl NewContent {
    /// A sticky thread.
    pub fn sticky_thread(forum_id: RowId, title: String, author: String) -> Self {
        Self {
            forum_id,
            kind: ContentKind::Thread,
            thread_id: None,
            title: Some(title),
            body: String::new(),
            author,
            is_sticky: true,
            is_root: false,
        }
    }

    /// The opening post of a thread.
    pub fn root_post(forum_id: RowId, thread_id: ContentId, body: String, author: String) -> Self {
        Self {
            forum_id,
            kind: ContentKind::Post,
            thread_id: Some(thread_id),
            title: None,
            body,
            author,
            is_sticky: false,
            is_root: true,
        }
    }
}

/// A persisted thread or post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub forum_id: RowId,
    pub kind: ContentKind,
    pub thread_id: Option<ContentId>,
    pub title: Option<String>,
    pub body: String,
    pub author: String,
    pub is_sticky: bool,
    pub is_root: bool,
    pub created_at: u64,
}

impl ContentItem {
    pub fn from_new(id: ContentId, content: NewContent, now: u64) -> Self {
        Self {
            id,
            forum_id: content.forum_id,
            kind: content.kind,
            thread_id: content.thread_id,
            title: content.title,
            body: content.body,
            author: content.author,
            is_sticky: content.is_sticky,
            is_root: content.is_root,
            created_at: now,
        }
    }
}

impl RuntimeCounters {
    /// Account for newly inserted content.
    pub fn record(&mut self, kind: ContentKind, at: u64) {
        match kind {
            ContentKind::Thread => self.thread_count += 1,
            ContentKind::Post => self.post_count += 1,
        }
        self.last_activity_at = Some(at);
    }
}

/// Rows and content removed by a wipe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeSummary {
    pub rows: usize,
    pub content: usize,
}

/// Marker written at the end of every successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStamp {
    /// Fingerprint of the resolved forest that was synced
    pub fingerprint: String,
    pub synced_at: u64,
    pub rows: usize,
}

/// Consistent read of the persisted taxonomy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub rows: Vec<ForumRow>,
    pub last_sync: Option<SyncStamp>,
}

/// Current time as unix millis.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
