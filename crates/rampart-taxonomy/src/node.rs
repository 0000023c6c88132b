//! Declarative taxonomy tree.
//!
//! A [`Forest`] is a list of [`ZoneSpec`]s. Each zone holds an ordered list of
//! [`ForumSpec`]s, and each forum may hold one level of subforums. The
//! subforum list is recursive in the type; the nesting limit is enforced by
//! [`crate::validate`].

use crate::rules::PartialRules;
use crate::theme::PartialTheme;
use serde::{Deserialize, Serialize};

/// Kind of taxonomy entity, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Zone,
    Forum,
}

impl EntityType {
    /// Stable lowercase name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Zone => "zone",
            Self::Forum => "forum",
        }
    }

    /// Label used in validation paths.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Zone => "Zone",
            Self::Forum => "Forum",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A top-level zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoneSpec {
    /// Stable identifier, unique across the whole forest
    pub slug: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Sort order among zones; defaults to declaration order
    #[serde(default)]
    pub position: Option<i32>,

    /// Rules cascaded to every forum in the zone
    #[serde(default)]
    pub default_rules: PartialRules,

    #[serde(default)]
    pub theme: PartialTheme,

    #[serde(default)]
    pub forums: Vec<ForumSpec>,
}

impl ZoneSpec {
    /// Create an empty zone.
    pub fn new(slug: &str, name: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            description: None,
            position: None,
            default_rules: PartialRules::default(),
            theme: PartialTheme::default(),
            forums: Vec::new(),
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Builder: set the zone's default rules.
    pub fn with_default_rules(mut self, rules: PartialRules) -> Self {
        self.default_rules = rules;
        self
    }

    /// Builder: set theme.
    pub fn with_theme(mut self, theme: PartialTheme) -> Self {
        self.theme = theme;
        self
    }

    /// Builder: append a forum.
    pub fn with_forum(mut self, forum: ForumSpec) -> Self {
        self.forums.push(forum);
        self
    }
}

/// A forum or subforum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForumSpec {
    pub slug: String,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub position: Option<i32>,

    #[serde(default)]
    pub rules: PartialRules,

    #[serde(default)]
    pub theme: PartialTheme,

    #[serde(default)]
    pub subforums: Vec<ForumSpec>,
}

impl ForumSpec {
    /// Create a forum with no overrides and no subforums.
    pub fn new(slug: &str, name: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            description: None,
            position: None,
            rules: PartialRules::default(),
            theme: PartialTheme::default(),
            subforums: Vec::new(),
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Builder: set own rules.
    pub fn with_rules(mut self, rules: PartialRules) -> Self {
        self.rules = rules;
        self
    }

    /// Builder: set own theme.
    pub fn with_theme(mut self, theme: PartialTheme) -> Self {
        self.theme = theme;
        self
    }

    /// Builder: set explicit position.
    pub fn with_position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    /// Builder: append a subforum.
    pub fn with_subforum(mut self, forum: ForumSpec) -> Self {
        self.subforums.push(forum);
        self
    }
}

/// Borrowed view of any node in the forest.
#[derive(Debug, Clone, Copy)]
pub enum TaxonomyNode<'a> {
    Zone(&'a ZoneSpec),
    Forum(&'a ForumSpec),
}

impl<'a> TaxonomyNode<'a> {
    pub fn slug(&self) -> &'a str {
        match self {
            Self::Zone(z) => &z.slug,
            Self::Forum(f) => &f.slug,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            Self::Zone(z) => &z.name,
            Self::Forum(f) => &f.name,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Zone(_) => EntityType::Zone,
            Self::Forum(_) => EntityType::Forum,
        }
    }

    /// Rule overrides declared on this node (`default_rules` for a zone).
    pub fn rules(&self) -> &'a PartialRules {
        match self {
            Self::Zone(z) => &z.default_rules,
            Self::Forum(f) => &f.rules,
        }
    }

    /// Direct children, in declaration order.
    pub fn children(self) -> impl Iterator<Item = TaxonomyNode<'a>> {
        let forums: &'a [ForumSpec] = match self {
            Self::Zone(z) => &z.forums,
            Self::Forum(f) => &f.subforums,
        };
        forums.iter().map(TaxonomyNode::Forum)
    }

    /// Path segment such as `Zone:the-pit`.
    pub fn path_segment(&self) -> String {
        format!("{}:{}", self.entity_type().label(), self.slug())
    }
}

/// The whole declarative taxonomy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Forest {
    #[serde(default)]
    pub zones: Vec<ZoneSpec>,
}

impl Forest {
    pub fn new(zones: Vec<ZoneSpec>) -> Self {
        Self { zones }
    }

    /// Zones as tagged nodes.
    pub fn roots(&self) -> impl Iterator<Item = TaxonomyNode<'_>> {
        self.zones.iter().map(TaxonomyNode::Zone)
    }

    /// Total node count across all levels.
    pub fn node_count(&self) -> usize {
        fn count(node: TaxonomyNode<'_>) -> usize {
            1 + node.children().map(count).sum::<usize>()
        }
        self.roots().map(count).sum()
    }

    /// Parse a forest from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Parse a forest from JSON text.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
