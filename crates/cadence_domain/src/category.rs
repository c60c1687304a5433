use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Governs where a category is visible.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CategoryMode {
    Personal,
    Work,
    #[default]
    All,
}

impl CategoryMode {
    pub fn visible_in(self, app_mode: CategoryMode) -> bool {
        self == CategoryMode::All || app_mode == CategoryMode::All || self == app_mode
    }
}

/// Enumerated symbolic icon set. Unknown names deserialize to [`IconName::Tag`],
/// the documented fallback, so stale persisted data never fails to load.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IconName {
    Briefcase,
    Home,
    Heart,
    Book,
    Dumbbell,
    Cart,
    Palette,
    Bell,
    #[serde(other)]
    #[default]
    Tag,
}

impl IconName {
    pub fn from_name(name: &str) -> Self {
        match name {
            "briefcase" => Self::Briefcase,
            "home" => Self::Home,
            "heart" => Self::Heart,
            "book" => Self::Book,
            "dumbbell" => Self::Dumbbell,
            "cart" => Self::Cart,
            "palette" => Self::Palette,
            "bell" => Self::Bell,
            _ => Self::Tag,
        }
    }

    pub fn as_name(self) -> &'static str {
        match self {
            Self::Briefcase => "briefcase",
            Self::Home => "home",
            Self::Heart => "heart",
            Self::Book => "book",
            Self::Dumbbell => "dumbbell",
            Self::Cart => "cart",
            Self::Palette => "palette",
            Self::Bell => "bell",
            Self::Tag => "tag",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: IconName,
    pub mode: CategoryMode,
}

impl Category {
    pub fn new(name: impl Into<String>, icon: IconName, mode: CategoryMode) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            icon,
            mode,
        }
    }
}

/// Partial update for a category; only populated fields change.
#[derive(Debug, Clone, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub icon: Option<IconName>,
    pub mode: Option<CategoryMode>,
}

/// Personal-mode only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignee {
    pub id: String,
    pub name: String,
}

impl Assignee {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_icon_names_fall_back_to_tag() {
        assert_eq!(IconName::from_name("sparkles"), IconName::Tag);
        let parsed: IconName = serde_json::from_str("\"sparkles\"").unwrap();
        assert_eq!(parsed, IconName::Tag);
    }

    #[test]
    fn icon_names_round_trip() {
        for icon in [IconName::Briefcase, IconName::Heart, IconName::Bell] {
            assert_eq!(IconName::from_name(icon.as_name()), icon);
        }
    }

    #[test]
    fn mode_visibility_filter() {
        assert!(CategoryMode::All.visible_in(CategoryMode::Work));
        assert!(CategoryMode::Work.visible_in(CategoryMode::Work));
        assert!(!CategoryMode::Personal.visible_in(CategoryMode::Work));
        assert!(CategoryMode::Personal.visible_in(CategoryMode::All));
    }
}
