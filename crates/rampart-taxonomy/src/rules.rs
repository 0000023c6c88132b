//! Forum behavior rules.

use serde::{Deserialize, Serialize};

/// Who may see and post in a forum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Anyone, including guests
    #[default]
    Public,
    /// Any signed-in account
    Registered,
    /// Accounts at level 10 or above
    #[serde(rename = "level_10_plus")]
    Level10Plus,
    /// VIP accounts
    Vip,
    /// Moderators and admins
    Moderators,
    /// Admins only
    Admins,
}

impl AccessLevel {
    /// Stable name used in persisted rows.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Registered => "registered",
            Self::Level10Plus => "level_10_plus",
            Self::Vip => "vip",
            Self::Moderators => "moderators",
            Self::Admins => "admins",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully populated rule set for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumRules {
    pub allow_posting: bool,
    pub allow_polls: bool,
    pub tipping_enabled: bool,
    pub xp_enabled: bool,
    pub xp_multiplier: f64,
    pub access_level: AccessLevel,
    /// Threads must carry one of `allowed_prefixes`
    pub required_prefix: bool,
    pub allowed_prefixes: Vec<String>,
    pub min_xp_to_post: u32,
    pub is_locked: bool,
}

impl Default for ForumRules {
    fn default() -> Self {
        Self {
            allow_posting: true,
            allow_polls: true,
            tipping_enabled: false,
            xp_enabled: true,
            xp_multiplier: 1.0,
            access_level: AccessLevel::Public,
            required_prefix: false,
            allowed_prefixes: Vec::new(),
            min_xp_to_post: 0,
            is_locked: false,
        }
    }
}

impl ForumRules {
    /// Return a copy with every field set in `overrides` replacing ours.
    pub fn overlay(&self, overrides: &PartialRules) -> Self {
        Self {
            allow_posting: overrides.allow_posting.unwrap_or(self.allow_posting),
            allow_polls: overrides.allow_polls.unwrap_or(self.allow_polls),
            tipping_enabled: overrides.tipping_enabled.unwrap_or(self.tipping_enabled),
            xp_enabled: overrides.xp_enabled.unwrap_or(self.xp_enabled),
            xp_multiplier: overrides.xp_multiplier.unwrap_or(self.xp_multiplier),
            access_level: overrides.access_level.unwrap_or(self.access_level),
            required_prefix: overrides.required_prefix.unwrap_or(self.required_prefix),
            allowed_prefixes: overrides
                .allowed_prefixes
                .clone()
                .unwrap_or_else(|| self.allowed_prefixes.clone()),
            min_xp_to_post: overrides.min_xp_to_post.unwrap_or(self.min_xp_to_post),
            is_locked: overrides.is_locked.unwrap_or(self.is_locked),
        }
    }
}

/// Rule overrides declared on a single node. Unset fields inherit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PartialRules {
    pub allow_posting: Option<bool>,
    pub allow_polls: Option<bool>,
    pub tipping_enabled: Option<bool>,
    pub xp_enabled: Option<bool>,
    pub xp_multiplier: Option<f64>,
    pub access_level: Option<AccessLevel>,
    pub required_prefix: Option<bool>,
    pub allowed_prefixes: Option<Vec<String>>,
    pub min_xp_to_post: Option<u32>,
    pub is_locked: Option<bool>,
}

impl PartialRules {
    /// True when no field is overridden.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Name of the first override that cannot be persisted or compared.
    ///
    /// `xp_multiplier` must be finite and non-negative; NaN never compares
    /// equal to itself and infinities have no JSON form.
    pub fn invalid_field(&self) -> Option<&'static str> {
        match self.xp_multiplier {
            Some(m) if !m.is_finite() || m < 0.0 => Some("xp_multiplier"),
            _ => None,
        }
    }

    /// Builder: set `tipping_enabled`.
    pub fn with_tipping(mut self, enabled: bool) -> Self {
        self.tipping_enabled = Some(enabled);
        self
    }

    /// Builder: set `required_prefix`.
    pub fn with_required_prefix(mut self, required: bool) -> Self {
        self.required_prefix = Some(required);
        self
    }

    /// Builder: set `xp_multiplier`.
    pub fn with_xp_multiplier(mut self, multiplier: f64) -> Self {
        self.xp_multiplier = Some(multiplier);
        self
    }

    /// Builder: set `access_level`.
    pub fn with_access_level(mut self, level: AccessLevel) -> Self {
        self.access_level = Some(level);
        self
    }

    /// Builder: set `is_locked`.
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.is_locked = Some(locked);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_overlay_is_identity() {
        let base = ForumRules::default();
        assert_eq!(base.overlay(&PartialRules::default()), base);
    }

    #[test]
    fn overlay_replaces_only_set_fields() {
        let base = ForumRules::default();
        let rules = base.overlay(
            &PartialRules::default()
                .with_tipping(true)
                .with_xp_multiplier(2.5),
        );

        assert!(rules.tipping_enabled);
        assert_eq!(rules.xp_multiplier, 2.5);
        assert_eq!(rules.access_level, AccessLevel::Public);
        assert!(rules.allow_posting);
    }

    #[test]
    fn access_level_wire_names() {
        let json = serde_json::to_string(&AccessLevel::Level10Plus).unwrap();
        assert_eq!(json, "\"level_10_plus\"");
        assert_eq!(AccessLevel::Moderators.to_string(), "moderators");
    }

    #[test]
    fn partial_rules_reject_unknown_fields() {
        let parsed: Result<PartialRules, _> =
            serde_json::from_str(r#"{"tipping_enabld": true}"#);
        assert!(parsed.is_err());
    }
}
