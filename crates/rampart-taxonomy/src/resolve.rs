//! Rule and theme inheritance.
//!
//! Resolution is top-down and total: every node ends up with a fully populated
//! [`ForumRules`] and [`ForumTheme`].
//!
//! - Zone: hard-coded defaults, then the zone's `default_rules` / `theme`.
//! - Forum: the parent's effective values, then the forum's own overrides.

use crate::node::{EntityType, Forest, TaxonomyNode};
use crate::rules::ForumRules;
use crate::theme::ForumTheme;
use serde::{Deserialize, Serialize};

/// A node with its effective rules and theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNode {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub entity_type: EntityType,
    pub position: i32,
    /// 0 for zones, 1 for forums, 2 for subforums
    pub depth: usize,
    pub parent_slug: Option<String>,
    /// Forum without subforums
    pub is_leaf: bool,
    pub effective_rules: ForumRules,
    pub effective_theme: ForumTheme,
}

/// Resolve a single node against its parent's effective values.
///
/// Pass `None` for zones; they start from the hard-coded defaults.
pub fn resolve(
    node: TaxonomyNode<'_>,
    position: i32,
    parent: Option<&ResolvedNode>,
) -> ResolvedNode {
    let base_rules = parent.map(|p| p.effective_rules.clone()).unwrap_or_default();
    let base_theme = parent.map(|p| p.effective_theme.clone()).unwrap_or_default();

    let (description, declared_position, rules, theme, is_leaf) = match node {
        TaxonomyNode::Zone(zone) => (
            zone.description.clone(),
            zone.position,
            &zone.default_rules,
            &zone.theme,
            false,
        ),
        TaxonomyNode::Forum(forum) => (
            forum.description.clone(),
            forum.position,
            &forum.rules,
            &forum.theme,
            forum.subforums.is_empty(),
        ),
    };

    ResolvedNode {
        slug: node.slug().to_string(),
        name: node.name().to_string(),
        description,
        entity_type: node.entity_type(),
        position: declared_position.unwrap_or(position),
        depth: parent.map_or(0, |p| p.depth + 1),
        parent_slug: parent.map(|p| p.slug.clone()),
        is_leaf,
        effective_rules: base_rules.overlay(rules),
        effective_theme: base_theme.overlay(theme),
    }
}

/// Flatten the forest in pre-order (parents before children), resolving
/// every node on the way down.
///
/// Undeclared positions default to the node's index among its siblings.
pub fn walk(forest: &Forest) -> Vec<ResolvedNode> {
    let mut out = Vec::with_capacity(forest.node_count());
    for (index, zone) in forest.roots().enumerate() {
        walk_node(zone, index, None, &mut out);
    }
    out
}

fn walk_node(
    node: TaxonomyNode<'_>,
    index: usize,
    parent: Option<&ResolvedNode>,
    out: &mut Vec<ResolvedNode>,
) {
    let resolved = resolve(node, sibling_position(index), parent);
    let children: Vec<_> = node.children().collect();
    out.push(resolved.clone());
    for (child_index, child) in children.into_iter().enumerate() {
        walk_node(child, child_index, Some(&resolved), out);
    }
}

fn sibling_position(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ForumSpec, ZoneSpec};
    use crate::rules::{AccessLevel, PartialRules};
    use crate::theme::PartialTheme;

    fn pit(forum: ForumSpec) -> Forest {
        Forest::new(vec![ZoneSpec::new("the-pit", "The Pit")
            .with_default_rules(PartialRules::default().with_tipping(true))
            .with_theme(PartialTheme::new("red", "flame"))
            .with_forum(forum)])
    }

    #[test]
    fn zone_without_overrides_gets_defaults() {
        let zone = ZoneSpec::new("bare", "Bare");
        let resolved = resolve(TaxonomyNode::Zone(&zone), 0, None);

        assert_eq!(resolved.effective_rules, ForumRules::default());
        assert_eq!(resolved.effective_theme, ForumTheme::default());
        assert_eq!(resolved.depth, 0);
        assert_eq!(resolved.parent_slug, None);
        assert!(!resolved.is_leaf);
    }

    #[test]
    fn forum_inherits_zone_default_rules() {
        let nodes = walk(&pit(ForumSpec::new("shill-zone", "Shill Zone")));
        let forum = &nodes[1];

        assert_eq!(forum.slug, "shill-zone");
        assert!(forum.effective_rules.tipping_enabled);
        assert_eq!(forum.effective_theme.color, "red");
        assert_eq!(forum.parent_slug.as_deref(), Some("the-pit"));
        assert!(forum.is_leaf);
    }

    #[test]
    fn own_override_wins() {
        let nodes = walk(&pit(
            ForumSpec::new("shill-zone", "Shill Zone")
                .with_rules(PartialRules::default().with_tipping(false)),
        ));
        assert!(!nodes[1].effective_rules.tipping_enabled);
        assert!(nodes[0].effective_rules.tipping_enabled);
    }

    #[test]
    fn subforum_inherits_from_parent_forum() {
        let nodes = walk(&pit(
            ForumSpec::new("casino", "Casino")
                .with_rules(PartialRules::default().with_access_level(AccessLevel::Vip))
                .with_theme(PartialTheme {
                    icon: Some("dice".into()),
                    ..PartialTheme::default()
                })
                .with_subforum(
                    ForumSpec::new("high-rollers", "High Rollers")
                        .with_rules(PartialRules::default().with_xp_multiplier(2.0)),
                ),
        ));

        let parent = &nodes[1];
        let sub = &nodes[2];
        assert!(!parent.is_leaf);
        assert!(sub.is_leaf);
        assert_eq!(sub.depth, 2);
        assert_eq!(sub.parent_slug.as_deref(), Some("casino"));
        assert_eq!(sub.effective_rules.access_level, AccessLevel::Vip);
        assert!(sub.effective_rules.tipping_enabled);
        assert_eq!(sub.effective_rules.xp_multiplier, 2.0);
        assert_eq!(sub.effective_theme.icon, "dice");
        assert_eq!(sub.effective_theme.color, "red");
    }

    #[test]
    fn walk_is_pre_order_with_positions() {
        let forest = Forest::new(vec![
            ZoneSpec::new("a", "A")
                .with_forum(ForumSpec::new("a1", "A1"))
                .with_forum(ForumSpec::new("a2", "A2").with_position(10)),
            ZoneSpec::new("b", "B").with_forum(ForumSpec::new("b1", "B1")),
        ]);

        let nodes = walk(&forest);
        let order: Vec<_> = nodes.iter().map(|n| n.slug.as_str()).collect();
        assert_eq!(order, ["a", "a1", "a2", "b", "b1"]);

        let positions: Vec<_> = nodes.iter().map(|n| n.position).collect();
        assert_eq!(positions, [0, 0, 10, 1, 0]);
    }
}
