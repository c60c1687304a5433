use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, Utc};
use parking_lot::RwLock;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    activity::{occurrence_key, Activity, RecurrenceKind},
    notifications::{Localizer, MessageParams, NotificationRecord, Permission, SystemNotifier},
    occurrence::{generate_occurrences, OccurrenceMode},
    service::ActivityService,
    storage::{load_collection, save_collection, KeyValueStorage},
};

const NOTIFICATIONS_KEY: &str = "cadence.notifications";
const MAX_RECORDS: usize = 50;
const STARTING_SOON_MINUTES: i64 = 5;
const UPCOMING_WINDOW_DAYS: u64 = 8;

pub const THRESHOLD_STARTING_SOON: &str = "5min_soon";
pub const THRESHOLD_WEEK_BEFORE: &str = "1week_before";
pub const THRESHOLD_TWO_DAYS_BEFORE: &str = "2days_before";
pub const THRESHOLD_DAY_BEFORE: &str = "1day_before";

/// Periodic reminder evaluator. Each tick scans all activities, finds
/// occurrences crossing a reminder threshold and emits each distinct
/// `(activity, occurrence, threshold)` at most once per wall-clock day.
///
/// The dedup set is volatile: a process restart may re-emit a reminder
/// already shown earlier the same day.
pub struct ReminderScheduler {
    storage: Arc<dyn KeyValueStorage>,
    notifier: Box<dyn SystemNotifier>,
    localizer: Box<dyn Localizer>,
    records: RwLock<Vec<NotificationRecord>>,
    seen: HashSet<(String, String, &'static str)>,
    last_tick_day: Option<u32>,
}

impl ReminderScheduler {
    pub fn new(
        storage: Arc<dyn KeyValueStorage>,
        notifier: Box<dyn SystemNotifier>,
        localizer: Box<dyn Localizer>,
    ) -> Self {
        let loaded = load_collection::<Vec<NotificationRecord>>(storage.as_ref(), NOTIFICATIONS_KEY);
        Self {
            storage,
            notifier,
            localizer,
            records: RwLock::new(loaded.value),
            seen: HashSet::new(),
            last_tick_day: None,
        }
    }

    /// Runs one scan at local wall-clock time `now`. Meant to be driven on a
    /// coarse fixed interval (around once a minute).
    #[instrument(skip(self, service))]
    pub fn tick(&mut self, service: &ActivityService, now: NaiveDateTime) {
        let today = now.date();
        if self.last_tick_day != Some(today.day()) {
            self.seen.clear();
            self.last_tick_day = Some(today.day());
        }

        for activity in service.activities() {
            self.check_starting_soon(&activity, now);
            if activity.recurrence.is_recurring() {
                self.check_upcoming(&activity, today);
            }
        }
    }

    /// In-app notification feed, newest first.
    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.records.read().clone()
    }

    pub fn mark_read(&self, id: &str) {
        let mut next = self.records.read().clone();
        let Some(record) = next.iter_mut().find(|r| r.id == id) else {
            return;
        };
        record.read = true;
        self.replace_records(next);
    }

    pub fn clear(&self) {
        self.replace_records(Vec::new());
    }

    fn check_starting_soon(&mut self, activity: &Activity, now: NaiveDateTime) {
        let Some(time) = activity.time else { return };
        let today = now.date();
        for occ in generate_occurrences(activity, today, today, OccurrenceMode::Pending) {
            let starts_at = occ.date.and_time(time);
            let delta = starts_at.signed_duration_since(now);
            if delta >= Duration::zero() && delta <= Duration::minutes(STARTING_SOON_MINUTES) {
                self.emit(activity, occ.date, THRESHOLD_STARTING_SOON);
            }
        }
    }

    fn check_upcoming(&mut self, activity: &Activity, today: NaiveDate) {
        let start = today + Days::new(1);
        let end = today + Days::new(UPCOMING_WINDOW_DAYS);
        for occ in generate_occurrences(activity, start, end, OccurrenceMode::Pending) {
            let days_until = (occ.date - today).num_days();
            let threshold = match activity.recurrence.kind {
                RecurrenceKind::Weekly => (days_until == 1).then_some(THRESHOLD_DAY_BEFORE),
                RecurrenceKind::Monthly => match days_until {
                    7 => Some(THRESHOLD_WEEK_BEFORE),
                    2 => Some(THRESHOLD_TWO_DAYS_BEFORE),
                    1 => Some(THRESHOLD_DAY_BEFORE),
                    _ => None,
                },
                RecurrenceKind::None | RecurrenceKind::Daily => None,
            };
            if let Some(threshold) = threshold {
                self.emit(activity, occ.date, threshold);
            }
        }
    }

    fn emit(&mut self, activity: &Activity, date: NaiveDate, threshold: &'static str) {
        let key = occurrence_key(date);
        if !self
            .seen
            .insert((activity.id.clone(), key.clone(), threshold))
        {
            return;
        }

        let mut params = MessageParams::new();
        params.insert("title".into(), activity.title.clone());
        params.insert("date".into(), key.clone());
        let record = NotificationRecord {
            id: Uuid::new_v4().to_string(),
            activity_id: activity.id.clone(),
            occurrence_key: key,
            threshold: threshold.to_string(),
            title_key: format!("reminder.{threshold}.title"),
            body_key: format!("reminder.{threshold}.body"),
            params,
            created_at: Utc::now(),
            read: false,
        };

        let mut next = self.records.read().clone();
        next.insert(0, record.clone());
        next.truncate(MAX_RECORDS);
        self.replace_records(next);

        match self.notifier.permission() {
            Permission::Granted => {
                let title = self.localizer.translate(&record.title_key, &record.params);
                let body = self.localizer.translate(&record.body_key, &record.params);
                self.notifier.show(&title, &body);
            }
            state => {
                tracing::debug!(?state, threshold, "skipping system notification");
            }
        }
    }

    fn replace_records(&self, next: Vec<NotificationRecord>) {
        if let Err(err) = save_collection(self.storage.as_ref(), NOTIFICATIONS_KEY, &next) {
            tracing::warn!(%err, "failed to persist notification feed");
        }
        *self.records.write() = next;
    }
}
