//! Rampart Taxonomy
//!
//! Declarative description of the forum structure: zones, forums and one
//! level of subforums, each with partial rule and theme overrides.
//!
//! # Pipeline
//!
//! 1. [`validate`] checks the whole forest (unique identifiers, slug format,
//!    nesting depth) before anything touches storage.
//! 2. [`walk`] flattens the forest in pre-order and resolves every node's
//!    effective rules and theme via [`resolve`].
//! 3. [`canonical`] gives both the reconciler and the drift detector one
//!    definition of structural equality.

pub mod builtin;
pub mod canonical;
mod error;
mod node;
mod resolve;
mod rules;
mod theme;
mod validate;

pub use error::{Result, ValidationError};
pub use node::{EntityType, Forest, ForumSpec, TaxonomyNode, ZoneSpec};
pub use resolve::{resolve, walk, ResolvedNode};
pub use rules::{AccessLevel, ForumRules, PartialRules};
pub use theme::{ForumTheme, PartialTheme};
pub use validate::{is_valid_slug, validate, MAX_FORUM_DEPTH};

/// Fingerprint of the resolved forest.
///
/// Changes whenever any effective value, name or position changes.
pub fn forest_fingerprint(forest: &Forest) -> serde_json::Result<String> {
    canonical::fingerprint(&walk(forest))
}
