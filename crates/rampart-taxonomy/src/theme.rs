//! Visual theme data.

use serde::{Deserialize, Serialize};

/// Fully populated theme for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumTheme {
    /// Accent color name or hex value
    pub color: String,
    /// Icon identifier
    pub icon: String,
    /// Banner image path
    pub banner_image: Option<String>,
    /// Semantic CSS theme class
    pub theme_class: String,
}

impl Default for ForumTheme {
    fn default() -> Self {
        Self {
            color: "gray".to_string(),
            icon: "message-square".to_string(),
            banner_image: None,
            theme_class: "theme-default".to_string(),
        }
    }
}

impl ForumTheme {
    /// Return a copy with every field set in `overrides` replacing ours.
    pub fn overlay(&self, overrides: &PartialTheme) -> Self {
        Self {
            color: overrides.color.clone().unwrap_or_else(|| self.color.clone()),
            icon: overrides.icon.clone().unwrap_or_else(|| self.icon.clone()),
            banner_image: overrides
                .banner_image
                .clone()
                .or_else(|| self.banner_image.clone()),
            theme_class: overrides
                .theme_class
                .clone()
                .unwrap_or_else(|| self.theme_class.clone()),
        }
    }
}

/// Theme overrides declared on a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PartialTheme {
    pub color: Option<String>,
    pub icon: Option<String>,
    pub banner_image: Option<String>,
    pub theme_class: Option<String>,
}

impl PartialTheme {
    /// Theme override with a color and icon.
    pub fn new(color: &str, icon: &str) -> Self {
        Self {
            color: Some(color.to_string()),
            icon: Some(icon.to_string()),
            ..Self::default()
        }
    }

    /// Builder: set the theme class.
    pub fn with_theme_class(mut self, class: &str) -> Self {
        self.theme_class = Some(class.to_string());
        self
    }

    /// Builder: set the banner image.
    pub fn with_banner(mut self, banner: &str) -> Self {
        self.banner_image = Some(banner.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_keeps_unset_fields() {
        let base = ForumTheme::default().overlay(&PartialTheme::new("red", "flame"));
        let child = base.overlay(&PartialTheme {
            icon: Some("dice".into()),
            ..PartialTheme::default()
        });

        assert_eq!(child.color, "red");
        assert_eq!(child.icon, "dice");
        assert_eq!(child.theme_class, "theme-default");
        assert_eq!(child.banner_image, None);
    }

    #[test]
    fn banner_is_inherited() {
        let zone = ForumTheme::default().overlay(&PartialTheme::default().with_banner("pit.png"));
        let forum = zone.overlay(&PartialTheme::default());
        assert_eq!(forum.banner_image.as_deref(), Some("pit.png"));
    }
}
