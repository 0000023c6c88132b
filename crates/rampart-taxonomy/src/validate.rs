//! Structural validation of a forest.
//!
//! Runs to completion over the whole forest before anything is reconciled.
//! The identifier set is owned by a single [`validate`] call and threaded
//! through the walk together with the current depth.

use crate::error::{Result, ValidationError};
use crate::node::{Forest, TaxonomyNode};
use std::collections::HashSet;

/// Depth of a subforum below its zone. Nodes deeper than this are rejected.
pub const MAX_FORUM_DEPTH: usize = 2;

/// Validate identifier uniqueness, identifier format and nesting depth.
pub fn validate(forest: &Forest) -> Result<()> {
    let mut seen = HashSet::with_capacity(forest.node_count());
    for zone in forest.roots() {
        visit(zone, 0, &mut Vec::new(), &mut seen)?;
    }
    Ok(())
}

fn visit<'a>(
    node: TaxonomyNode<'a>,
    depth: usize,
    path: &mut Vec<String>,
    seen: &mut HashSet<&'a str>,
) -> Result<()> {
    path.push(node.path_segment());

    if depth > MAX_FORUM_DEPTH {
        return Err(ValidationError::NestingTooDeep {
            path: render_path(path),
        });
    }

    let slug = node.slug();
    if !is_valid_slug(slug) {
        return Err(ValidationError::InvalidIdentifier {
            identifier: slug.to_string(),
            path: render_path(path),
        });
    }
    if !seen.insert(slug) {
        return Err(ValidationError::DuplicateIdentifier {
            identifier: slug.to_string(),
            path: render_path(path),
        });
    }
    if let Some(field) = node.rules().invalid_field() {
        return Err(ValidationError::InvalidRule {
            field,
            path: render_path(path),
        });
    }

    for child in node.children() {
        visit(child, depth + 1, path, seen)?;
    }

    path.pop();
    Ok(())
}

fn render_path(path: &[String]) -> String {
    path.join(" > ")
}

/// Lowercase ASCII letters, digits and single inner hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
