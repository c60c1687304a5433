use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

/// How an activity repeats. `days_of_week` holds weekday indices
/// (0 = Sunday .. 6 = Saturday) and is meaningful only for `Weekly`;
/// `day_of_month` (1..=31) only for `Monthly`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub kind: RecurrenceKind,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub days_of_week: BTreeSet<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
}

impl RecurrenceRule {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn daily() -> Self {
        Self {
            kind: RecurrenceKind::Daily,
            ..Self::default()
        }
    }

    pub fn weekly(days: impl IntoIterator<Item = u8>) -> Self {
        Self {
            kind: RecurrenceKind::Weekly,
            days_of_week: days.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn monthly(day_of_month: u8) -> Self {
        Self {
            kind: RecurrenceKind::Monthly,
            day_of_month: Some(day_of_month),
            ..Self::default()
        }
    }

    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.kind != RecurrenceKind::None
    }

    /// Whether two rules would key the same occurrence dates. Changing the
    /// end date keeps previously computed keys valid; changing the kind or
    /// the active selector does not.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.kind == other.kind
            && match self.kind {
                RecurrenceKind::Weekly => self.days_of_week == other.days_of_week,
                RecurrenceKind::Monthly => self.day_of_month == other.day_of_month,
                RecurrenceKind::None | RecurrenceKind::Daily => true,
            }
    }
}

/// Date-only ledger key for one occurrence, `YYYY-MM-DD`.
pub fn occurrence_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

impl Todo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            completed: false,
        }
    }
}

/// A master activity record. Recurring activities track per-occurrence
/// completion in `completed_occurrences`; non-recurring ones use the scalar
/// `completed` flag instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub category_id: Option<String>,
    pub notes: String,
    /// Local time-of-day the activity is due, when timed.
    pub time: Option<NaiveTime>,
    /// Personal-mode only.
    pub responsible_person_id: Option<String>,
    /// Anchors the recurrence series: the first possible occurrence.
    pub created_at: DateTime<Utc>,
    pub recurrence: RecurrenceRule,
    pub completed: bool,
    /// Entries are only ever `true`; un-completing removes the key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub completed_occurrences: BTreeMap<String, bool>,
    #[serde(default)]
    pub todos: Vec<Todo>,
}

impl Activity {
    pub fn anchor_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn is_occurrence_completed(&self, date: NaiveDate) -> bool {
        self.completed_occurrences.contains_key(&occurrence_key(date))
    }
}

/// Input for creating an activity. Todos are supplied as bare text; the
/// store assigns identities and every new todo starts incomplete.
#[derive(Debug, Clone, Default)]
pub struct ActivityDraft {
    pub title: String,
    pub category_id: Option<String>,
    pub notes: String,
    pub time: Option<NaiveTime>,
    pub responsible_person_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub recurrence: Option<RecurrenceRule>,
    pub todos: Vec<String>,
}

/// Partial update; only populated fields change. The outer `Option` marks
/// "field supplied", the inner one (where present) allows clearing.
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub title: Option<String>,
    pub category_id: Option<Option<String>>,
    pub notes: Option<String>,
    pub time: Option<Option<NaiveTime>>,
    pub responsible_person_id: Option<Option<String>>,
    pub created_at: Option<DateTime<Utc>>,
    pub recurrence: Option<RecurrenceRule>,
    pub todos: Option<Vec<Todo>>,
}

/// Parses a user-supplied `HH:MM` time-of-day.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}
