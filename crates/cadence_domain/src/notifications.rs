use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// System notification permission, read-only input to the scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    Default,
}

/// Parameter bag attached to a symbolic message key.
pub type MessageParams = BTreeMap<String, String>;

/// An in-app notification. Carries symbolic message keys and parameters;
/// rendering happens behind [`Localizer`], never in the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub id: String,
    pub activity_id: String,
    pub occurrence_key: String,
    pub threshold: String,
    pub title_key: String,
    pub body_key: String,
    pub params: MessageParams,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Platform notification surface. `show` is fire-and-forget; implementations
/// swallow platform failures rather than surfacing them.
pub trait SystemNotifier: Send + Sync {
    fn permission(&self) -> Permission;
    fn show(&self, title: &str, body: &str);
}

/// Resolves symbolic message keys to rendered text.
pub trait Localizer: Send + Sync {
    fn translate(&self, key: &str, params: &MessageParams) -> String;
}

/// Pass-through localizer: renders the key with its parameters appended.
/// Useful for tests and headless tooling.
#[derive(Debug, Default)]
pub struct KeyLocalizer;

impl Localizer for KeyLocalizer {
    fn translate(&self, key: &str, params: &MessageParams) -> String {
        if params.is_empty() {
            return key.to_string();
        }
        let rendered: Vec<String> = params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        format!("{key} [{}]", rendered.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_localizer_appends_params() {
        let mut params = MessageParams::new();
        params.insert("title".into(), "Gym".into());
        let text = KeyLocalizer.translate("reminder.1day_before.title", &params);
        assert_eq!(text, "reminder.1day_before.title [title=Gym]");
    }
}
