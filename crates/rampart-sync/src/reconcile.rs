//! Upsert reconciliation of the declarative forest into the store.
//!
//! A run is one store transaction: validate, optionally wipe, upsert every
//! node in pre-order, seed empty leaf forums, stamp. Any error rolls the whole
//! run back. Rows are never deleted outside an explicit wipe.

use crate::config::{SyncConfig, DEFAULT_AUTHOR, DEFAULT_TIMEOUT};
use crate::error::{Result, SyncError};
use crate::payload::owned_fields;
use crate::seed::{seed_welcome_content, SeedError};
use rampart_store::{
    now_millis, ContentKind, RowChange, RowId, StoreTx, SyncStamp, TopologyStore, WipeSummary,
};
use rampart_taxonomy::{canonical, validate, walk, EntityType, Forest, ResolvedNode};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cooperative cancellation flag shared with the host.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`SyncError::Cancelled`] once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }
}

/// Options for a reconciliation run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Delete all rows and content before reconciling
    pub wipe: bool,
    /// Author of bootstrap content
    pub author: String,
    /// Budget for the whole transaction
    pub timeout: Duration,
    pub cancel: CancelToken,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            wipe: false,
            author: DEFAULT_AUTHOR.to_string(),
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }
}

impl SyncOptions {
    /// Options taken from a run configuration.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            author: config.system_author.clone(),
            timeout: config.txn_timeout,
            ..Self::default()
        }
    }
}

/// What happened to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeOutcome {
    pub slug: String,
    pub entity_type: EntityType,
    pub id: RowId,
    pub change: RowChange,
}

/// Summary of a committed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Fingerprint of the forest that was applied
    pub fingerprint: String,
    pub wiped: Option<WipeSummary>,
    /// One entry per node, in pre-order
    pub outcomes: Vec<NodeOutcome>,
    /// Forums that received welcome content
    pub seeded: Vec<String>,
    /// Forums that gained content before their welcome thread could be written
    pub seed_races: Vec<String>,
}

impl SyncReport {
    fn count(&self, change: RowChange) -> usize {
        self.outcomes.iter().filter(|o| o.change == change).count()
    }

    pub fn inserted(&self) -> usize {
        self.count(RowChange::Inserted)
    }

    pub fn updated(&self) -> usize {
        self.count(RowChange::Updated)
    }

    pub fn unchanged(&self) -> usize {
        self.count(RowChange::Unchanged)
    }

    /// Nothing was written apart from the sync stamp.
    pub fn is_noop(&self) -> bool {
        self.wiped.is_none()
            && self.seeded.is_empty()
            && self.outcomes.iter().all(|o| o.change == RowChange::Unchanged)
    }

    pub fn outcome(&self, slug: &str) -> Option<&NodeOutcome> {
        self.outcomes.iter().find(|o| o.slug == slug)
    }
}

/// Reconcile `forest` into `store` in a single transaction.
///
/// Validation runs first; an invalid forest never opens a transaction.
pub fn reconcile<S: TopologyStore>(
    forest: &Forest,
    store: &S,
    options: &SyncOptions,
) -> Result<SyncReport> {
    validate(forest)?;
    options.cancel.check()?;

    let nodes = walk(forest);
    let fingerprint = canonical::fingerprint(&nodes)?;
    let started = Instant::now();

    info!(
        nodes = nodes.len(),
        wipe = options.wipe,
        fingerprint = %fingerprint,
        "Starting reconciliation"
    );

    let report = store.transaction(options.timeout, |tx| {
        let wiped = if options.wipe {
            let summary = tx.wipe()?;
            info!(rows = summary.rows, content = summary.content, "Wiped store");
            Some(summary)
        } else {
            None
        };

        let mut report = SyncReport {
            fingerprint: fingerprint.clone(),
            wiped,
            ..SyncReport::default()
        };
        apply_nodes(tx, &nodes, options, &mut report)?;

        options.cancel.check()?;
        tx.record_sync(&SyncStamp {
            fingerprint: fingerprint.clone(),
            synced_at: now_millis(),
            rows: nodes.len(),
        })?;
        Ok::<_, SyncError>(report)
    })?;

    info!(
        inserted = report.inserted(),
        updated = report.updated(),
        unchanged = report.unchanged(),
        seeded = report.seeded.len(),
        seed_races = report.seed_races.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Reconciliation committed"
    );

    Ok(report)
}

/// Upsert `nodes` in order and seed empty leaf forums.
///
/// `nodes` must list every parent before its children; a node whose parent
/// has not been written earlier in the same call fails with
/// [`SyncError::OrphanParent`].
pub fn apply_nodes(
    tx: &mut dyn StoreTx,
    nodes: &[ResolvedNode],
    options: &SyncOptions,
    report: &mut SyncReport,
) -> Result<()> {
    let mut written: HashMap<&str, RowId> = HashMap::with_capacity(nodes.len());

    for node in nodes {
        options.cancel.check()?;

        let parent_id = match node.parent_slug.as_deref() {
            None => None,
            Some(parent) => Some(*written.get(parent).ok_or_else(|| SyncError::OrphanParent {
                slug: node.slug.clone(),
                parent_slug: parent.to_string(),
            })?),
        };

        let upserted = tx.upsert_by_slug(owned_fields(node, parent_id)?)?;
        debug!(
            slug = %node.slug,
            entity = %node.entity_type,
            id = %upserted.id,
            change = ?upserted.change,
            "Reconciled node"
        );
        written.insert(node.slug.as_str(), upserted.id);
        report.outcomes.push(NodeOutcome {
            slug: node.slug.clone(),
            entity_type: node.entity_type,
            id: upserted.id,
            change: upserted.change,
        });

        if !node.is_leaf || tx.count_content(upserted.id, ContentKind::Thread)? > 0 {
            continue;
        }

        match seed_welcome_content(tx, upserted.id, &node.slug, &node.name, &options.author) {
            Ok(_) => report.seeded.push(node.slug.clone()),
            Err(SeedError::Race { slug }) => {
                warn!(forum = %slug, "Forum gained content before seeding, skipped welcome thread");
                report.seed_races.push(slug);
            }
            Err(SeedError::Store(e)) => return Err(e.into()),
        }
    }

    Ok(())
}
