//! Read-only comparison of the declarative forest against persisted rows.
//!
//! Both sides go through [`comparable_fields`], so the detector and the
//! reconciler agree on what "equal" means. Discrepancies are data: a
//! drifted store is a successful audit.

use crate::error::Result;
use crate::payload::{comparable_fields, owned_fields};
use rampart_store::{ForumRow, RowId, SyncStamp, TopologyStore};
use rampart_taxonomy::{canonical, validate, walk, EntityType, Forest, ResolvedNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Kind of drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Declared in config, no row in the store
    MissingInStore,
    /// Row in the store, not declared in config
    MissingInConfig,
    /// Row exists but an owned field differs
    FieldMismatch,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingInStore => "missing_in_store",
            Self::MissingInConfig => "missing_in_config",
            Self::FieldMismatch => "field_mismatch",
        }
    }
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One difference between config and store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub entity_type: EntityType,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl Discrepancy {
    fn missing(kind: DiscrepancyKind, entity_type: EntityType, identifier: &str) -> Self {
        Self {
            kind,
            entity_type,
            identifier: identifier.to_string(),
            field: None,
            expected: None,
            actual: None,
        }
    }

    fn mismatch(node: &ResolvedNode, field: &str, expected: Value, actual: Value) -> Self {
        Self {
            kind: DiscrepancyKind::FieldMismatch,
            entity_type: node.entity_type,
            identifier: node.slug.clone(),
            field: Some(field.to_string()),
            expected: Some(expected),
            actual: Some(actual),
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.entity_type, self.identifier)?;
        if let Some(field) = &self.field {
            let show = |v: &Option<Value>| v.as_ref().map_or("null".to_string(), |v| v.to_string());
            write!(
                f,
                " {}: expected {}, actual {}",
                field,
                show(&self.expected),
                show(&self.actual)
            )?;
        }
        Ok(())
    }
}

/// Result of an audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub discrepancies: Vec<Discrepancy>,
    /// Stamp of the last committed reconciliation, if any
    pub last_sync: Option<SyncStamp>,
    /// Fingerprint of the forest that was audited
    pub expected_fingerprint: String,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// The last sync applied exactly the audited forest.
    pub fn fingerprint_matches(&self) -> bool {
        self.last_sync
            .as_ref()
            .is_some_and(|stamp| stamp.fingerprint == self.expected_fingerprint)
    }

    pub fn count(&self, kind: DiscrepancyKind) -> usize {
        self.discrepancies.iter().filter(|d| d.kind == kind).count()
    }
}

/// Audit `store` against `forest` without writing anything.
///
/// Reads one consistent snapshot, so it can run next to a sync.
pub fn detect_drift<S: TopologyStore>(forest: &Forest, store: &S) -> Result<DriftReport> {
    validate(forest)?;

    let nodes = walk(forest);
    let expected_fingerprint = canonical::fingerprint(&nodes)?;
    let snapshot = store.snapshot()?;
    let discrepancies = diff(&nodes, &snapshot.rows)?;

    tracing::info!(
        nodes = nodes.len(),
        rows = snapshot.rows.len(),
        discrepancies = discrepancies.len(),
        "Drift audit complete"
    );

    Ok(DriftReport {
        discrepancies,
        last_sync: snapshot.last_sync,
        expected_fingerprint,
    })
}

/// Compare resolved nodes with persisted rows.
///
/// Output order: config nodes in pre-order, then store-only rows by slug.
pub fn diff(nodes: &[ResolvedNode], rows: &[ForumRow]) -> Result<Vec<Discrepancy>> {
    let by_slug: HashMap<&str, &ForumRow> = rows.iter().map(|r| (r.slug(), r)).collect();
    let declared: HashSet<&str> = nodes.iter().map(|n| n.slug.as_str()).collect();
    let mut out = Vec::new();

    for node in nodes {
        let Some(row) = by_slug.get(node.slug.as_str()) else {
            out.push(Discrepancy::missing(
                DiscrepancyKind::MissingInStore,
                node.entity_type,
                &node.slug,
            ));
            continue;
        };

        let expected = comparable_fields(&owned_fields(node, None)?)?;
        let actual = comparable_fields(&row.fields)?;
        let fields: BTreeSet<&String> = expected.keys().chain(actual.keys()).collect();
        for field in fields {
            let want = expected.get(field).cloned().unwrap_or(Value::Null);
            let have = actual.get(field).cloned().unwrap_or(Value::Null);
            if want != have {
                out.push(Discrepancy::mismatch(node, field, want, have));
            }
        }

        let parent_id = row
            .fields
            .parent_slug
            .as_deref()
            .and_then(|slug| by_slug.get(slug))
            .map(|parent| parent.id);
        if parent_id != row.fields.parent_id {
            out.push(Discrepancy::mismatch(
                node,
                "parent_id",
                id_value(parent_id),
                id_value(row.fields.parent_id),
            ));
        }
    }

    let mut undeclared: Vec<&ForumRow> = rows
        .iter()
        .filter(|r| !declared.contains(r.slug()))
        .collect();
    undeclared.sort_by(|a, b| a.slug().cmp(b.slug()));
    out.extend(undeclared.into_iter().map(|row| {
        Discrepancy::missing(
            DiscrepancyKind::MissingInConfig,
            row.fields.entity_type,
            row.slug(),
        )
    }));

    Ok(out)
}

fn id_value(id: Option<RowId>) -> Value {
    id.map_or(Value::Null, |id| Value::from(id.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::reconcile::{reconcile, SyncOptions};
    use rampart_store::{MemoryStore, RocksStore, StoreError};
    use rampart_taxonomy::{builtin, ZoneSpec};
    use std::time::Duration;

    fn synced(forest: &Forest) -> MemoryStore {
        let store = MemoryStore::new();
        reconcile(forest, &store, &SyncOptions::default()).unwrap();
        store
    }

    fn without_alpha() -> Forest {
        let mut forest = builtin::forest();
        let forums = &mut forest.zones[2].forums;
        forums.retain(|f| f.slug != "alpha-channel");
        // Keep bug-reports at the position it has in the full forest
        for forum in forums.iter_mut().filter(|f| f.slug == "bug-reports") {
            forum.position = Some(2);
        }
        forest
    }

    #[test]
    fn clean_after_sync() {
        let forest = builtin::forest();
        let store = synced(&forest);

        let report = detect_drift(&forest, &store).unwrap();
        assert!(report.is_clean(), "{:?}", report.discrepancies);
        assert!(report.fingerprint_matches());
    }

    #[test]
    fn audit_through_read_only_handle_while_writer_is_open() {
        let dir = tempfile::tempdir().unwrap();
        let forest = builtin::forest();
        let writer = RocksStore::open(dir.path()).unwrap();
        reconcile(&forest, &writer, &SyncOptions::default()).unwrap();

        let reader = RocksStore::open_read_only(dir.path()).unwrap();
        let report = detect_drift(&forest, &reader).unwrap();
        assert!(report.is_clean(), "{:?}", report.discrepancies);
        assert!(report.fingerprint_matches());

        // The writer is still usable with the reader open.
        let again = reconcile(&forest, &writer, &SyncOptions::default()).unwrap();
        assert!(again.is_noop());
    }

    #[test]
    fn empty_store_reports_every_node() {
        let forest = builtin::forest();
        let report = detect_drift(&forest, &MemoryStore::new()).unwrap();

        assert_eq!(report.count(DiscrepancyKind::MissingInStore), walk(&forest).len());
        assert_eq!(report.discrepancies[0].identifier, "the-pit");
        assert!(report.last_sync.is_none());
        assert!(!report.fingerprint_matches());
    }

    #[test]
    fn alpha_channel_drift_is_symmetric() {
        // Row present, declaration removed
        let store = synced(&builtin::forest());
        let report = detect_drift(&without_alpha(), &store).unwrap();
        assert_eq!(
            report.discrepancies,
            vec![Discrepancy::missing(
                DiscrepancyKind::MissingInConfig,
                EntityType::Forum,
                "alpha-channel"
            )]
        );

        // Declared, row never written
        let store = synced(&without_alpha());
        let report = detect_drift(&builtin::forest(), &store).unwrap();
        assert_eq!(
            report.discrepancies,
            vec![Discrepancy::missing(
                DiscrepancyKind::MissingInStore,
                EntityType::Forum,
                "alpha-channel"
            )]
        );
    }

    #[test]
    fn rule_change_is_a_field_mismatch() {
        let store = synced(&builtin::forest());
        let mut changed = builtin::forest();
        changed.zones[0].default_rules.tipping_enabled = Some(false);

        let report = detect_drift(&changed, &store).unwrap();
        assert_eq!(report.count(DiscrepancyKind::MissingInStore), 0);
        assert_eq!(report.count(DiscrepancyKind::MissingInConfig), 0);

        let shill = report
            .discrepancies
            .iter()
            .find(|d| d.identifier == "shill-zone" && d.field.as_deref() == Some("tipping_enabled"))
            .unwrap();
        assert_eq!(shill.expected, Some(Value::Bool(false)));
        assert_eq!(shill.actual, Some(Value::Bool(true)));

        // Nothing outside the changed zone drifts
        assert!(report
            .discrepancies
            .iter()
            .all(|d| ["the-pit", "shill-zone", "beg-zone", "memes"].contains(&d.identifier.as_str())));
        assert!(!report.fingerprint_matches());
    }

    #[test]
    fn tampered_parent_id_is_reported() {
        let store = synced(&builtin::forest());
        let (pit, casino) = store
            .transaction(Duration::from_secs(5), |tx| {
                let pit = tx.find_by_slug("the-pit")?.map(|r| r.id);
                let casino = tx.find_by_slug("casino-floor")?.map(|r| r.id);
                let mut row = tx
                    .find_by_slug("shill-zone")?
                    .ok_or_else(|| StoreError::NotFound("shill-zone".into()))?;
                row.fields.parent_id = casino;
                tx.upsert_by_slug(row.fields)?;
                Ok::<_, StoreError>((pit, casino))
            })
            .unwrap();

        let report = detect_drift(&builtin::forest(), &store).unwrap();
        assert_eq!(report.discrepancies.len(), 1);

        let d = &report.discrepancies[0];
        assert_eq!(d.kind, DiscrepancyKind::FieldMismatch);
        assert_eq!(d.identifier, "shill-zone");
        assert_eq!(d.field.as_deref(), Some("parent_id"));
        assert_eq!(d.expected, Some(id_value(pit)));
        assert_eq!(d.actual, Some(id_value(casino)));
    }

    #[test]
    fn store_only_rows_come_last_sorted_by_slug() {
        let mut extended = builtin::forest();
        extended.zones.push(ZoneSpec::new("zeta-lounge", "Zeta Lounge"));
        extended.zones.push(ZoneSpec::new("afterparty", "Afterparty"));
        let store = synced(&extended);

        let mut declared = builtin::forest();
        declared.zones[0].forums.retain(|f| f.slug != "memes");
        declared.zones.push(ZoneSpec::new("new-zone", "New Zone"));

        let report = detect_drift(&declared, &store).unwrap();
        let summary: Vec<_> = report
            .discrepancies
            .iter()
            .map(|d| (d.kind, d.identifier.as_str()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (DiscrepancyKind::MissingInStore, "new-zone"),
                (DiscrepancyKind::MissingInConfig, "afterparty"),
                (DiscrepancyKind::MissingInConfig, "memes"),
                (DiscrepancyKind::MissingInConfig, "zeta-lounge"),
            ]
        );
    }

    #[test]
    fn audit_never_writes() {
        let store = synced(&without_alpha());
        let before = store.snapshot().unwrap();
        detect_drift(&builtin::forest(), &store).unwrap();
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn invalid_forest_is_rejected() {
        let forest = Forest::new(vec![ZoneSpec::new("Not A Slug", "Bad")]);
        let err = detect_drift(&forest, &MemoryStore::new()).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn json_shape() {
        let missing = Discrepancy::missing(
            DiscrepancyKind::MissingInStore,
            EntityType::Forum,
            "alpha-channel",
        );
        assert_eq!(
            serde_json::to_value(&missing).unwrap(),
            serde_json::json!({
                "kind": "missing_in_store",
                "entity_type": "forum",
                "identifier": "alpha-channel",
            })
        );
        assert_eq!(missing.to_string(), "missing_in_store forum alpha-channel");
    }

    #[test]
    fn mismatch_display() {
        let node = &walk(&builtin::forest())[1];
        let d = Discrepancy::mismatch(node, "tipping_enabled", Value::Bool(false), Value::Bool(true));
        assert_eq!(
            d.to_string(),
            "field_mismatch forum shill-zone tipping_enabled: expected false, actual true"
        );
    }
}
