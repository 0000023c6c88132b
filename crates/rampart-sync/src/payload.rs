//! Row payloads derived from resolved nodes.

use crate::error::Result;
use rampart_store::{OwnedFields, RowId};
use rampart_taxonomy::canonical::canonical_value;
use rampart_taxonomy::{ForumRules, ForumTheme, ResolvedNode};
use serde::Serialize;
use serde_json::{Map, Value};

/// Fields whose values are store-assigned and cannot be derived from config.
pub const STORE_ASSIGNED_FIELDS: &[&str] = &["parent_id"];

#[derive(Serialize)]
struct ExtraData<'a> {
    rules: &'a ForumRules,
    theme: &'a ForumTheme,
}

/// Build the engine-owned fields of a row from its resolved node.
pub fn owned_fields(node: &ResolvedNode, parent_id: Option<RowId>) -> Result<OwnedFields> {
    let rules = &node.effective_rules;
    let theme = &node.effective_theme;

    Ok(OwnedFields {
        slug: node.slug.clone(),
        name: node.name.clone(),
        description: node.description.clone(),
        entity_type: node.entity_type,
        parent_id,
        parent_slug: node.parent_slug.clone(),
        position: node.position,
        color: theme.color.clone(),
        icon: theme.icon.clone(),
        banner_image: theme.banner_image.clone(),
        theme_class: theme.theme_class.clone(),
        allow_posting: rules.allow_posting,
        tipping_enabled: rules.tipping_enabled,
        xp_multiplier: rules.xp_multiplier,
        access_level: rules.access_level,
        required_prefix: rules.required_prefix,
        is_locked: rules.is_locked,
        min_xp_to_post: rules.min_xp_to_post,
        extra_data: canonical_value(&ExtraData { rules, theme })?,
    })
}

/// Canonical field map of a row, without store-assigned fields.
///
/// Config-derived and persisted rows are compared through this form.
pub fn comparable_fields(fields: &OwnedFields) -> Result<Map<String, Value>> {
    let Value::Object(mut map) = canonical_value(fields)? else {
        return Ok(Map::new());
    };
    for field in STORE_ASSIGNED_FIELDS {
        map.remove(*field);
    }
    Ok(map)
}
