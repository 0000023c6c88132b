//! Built-in forum taxonomy used when no taxonomy file is configured.

use crate::node::{Forest, ForumSpec, ZoneSpec};
use crate::rules::{AccessLevel, PartialRules};
use crate::theme::PartialTheme;

/// The default forest.
pub fn forest() -> Forest {
    Forest::new(vec![
        ZoneSpec::new("the-pit", "The Pit")
            .with_description("Raw, unfiltered, and often unhinged. Welcome to the heart of the chaos.")
            .with_default_rules(PartialRules::default().with_tipping(true).with_xp_multiplier(1.5))
            .with_theme(
                PartialTheme::new("red", "flame")
                    .with_theme_class("theme-pit")
                    .with_banner("/banners/the-pit.jpg"),
            )
            .with_forum(
                ForumSpec::new("shill-zone", "Shill Zone")
                    .with_description("Promote your bags, projects and referral links.")
                    .with_rules(PartialRules {
                        required_prefix: Some(true),
                        allowed_prefixes: Some(vec!["[SHILL]".into(), "[AMA]".into()]),
                        ..PartialRules::default()
                    }),
            )
            .with_forum(
                ForumSpec::new("beg-zone", "Beg Zone")
                    .with_description("Ask for tips. Shamelessly.")
                    .with_rules(PartialRules::default().with_xp_multiplier(0.5)),
            )
            .with_forum(ForumSpec::new("memes", "Memes").with_theme(PartialTheme {
                icon: Some("laugh".into()),
                ..PartialTheme::default()
            })),
        ZoneSpec::new("casino-floor", "Casino Floor")
            .with_description("Strategies, wins, losses and everything in between.")
            .with_default_rules(PartialRules {
                access_level: Some(AccessLevel::Registered),
                ..PartialRules::default()
            })
            .with_theme(PartialTheme::new("emerald", "dice").with_theme_class("theme-casino"))
            .with_forum(
                ForumSpec::new("dice-strategy", "Dice Strategy")
                    .with_description("Martingale is not a strategy. Discuss.")
                    .with_subforum(ForumSpec::new("dice-bots", "Dice Bots"))
                    .with_subforum(
                        ForumSpec::new("high-rollers", "High Rollers")
                            .with_rules(PartialRules::default().with_access_level(AccessLevel::Vip)),
                    ),
            )
            .with_forum(ForumSpec::new("big-wins", "Big Wins").with_rules(
                PartialRules::default().with_tipping(true).with_xp_multiplier(2.0),
            )),
        ZoneSpec::new("mission-control", "Mission Control")
            .with_description("Announcements, alpha and platform feedback.")
            .with_theme(PartialTheme::new("blue", "radar").with_theme_class("theme-mission"))
            .with_forum(
                ForumSpec::new("announcements", "Announcements").with_rules(PartialRules {
                    allow_posting: Some(false),
                    xp_enabled: Some(false),
                    ..PartialRules::default()
                }),
            )
            .with_forum(
                ForumSpec::new("alpha-channel", "Alpha Channel")
                    .with_rules(PartialRules::default().with_access_level(AccessLevel::Level10Plus)),
            )
            .with_forum(ForumSpec::new("bug-reports", "Bug Reports").with_rules(PartialRules {
                tipping_enabled: Some(false),
                required_prefix: Some(true),
                allowed_prefixes: Some(vec!["[BUG]".into(), "[FIXED]".into()]),
                ..PartialRules::default()
            })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::walk;
    use crate::validate::validate;

    #[test]
    fn builtin_forest_is_valid() {
        assert_eq!(validate(&forest()), Ok(()));
    }

    #[test]
    fn builtin_forest_has_leaves() {
        let leaves: Vec<_> = walk(&forest())
            .into_iter()
            .filter(|n| n.is_leaf)
            .map(|n| n.slug)
            .collect();
        assert!(leaves.contains(&"shill-zone".to_string()));
        assert!(leaves.contains(&"high-rollers".to_string()));
        assert!(!leaves.contains(&"dice-strategy".to_string()));
    }
}
