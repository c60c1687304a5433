use std::sync::Arc;

use anyhow::Result;
use chrono::{Days, Local, Utc};

use cadence_domain::{
    activity::{parse_time_of_day, ActivityDraft, RecurrenceRule},
    category::{CategoryMode, IconName},
    notifications::{KeyLocalizer, Permission, SystemNotifier},
    occurrence::{generate_occurrences, OccurrenceMode},
    scheduler::ReminderScheduler,
    storage::{KeyValueStorage, MemoryStorage},
    ActivityService,
};

/// Logs notifications instead of raising platform ones.
struct ConsoleNotifier;

impl SystemNotifier for ConsoleNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    fn show(&self, title: &str, body: &str) {
        tracing::info!(title, body, "notification");
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    if let Err(err) = run() {
        eprintln!("Failed to start Cadence: {err}");
    }
}

fn run() -> Result<()> {
    let storage: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
    let service = ActivityService::builder()
        .with_storage(Arc::clone(&storage))
        .build();
    seed(&service)?;

    let today = Local::now().date_naive();
    let week_out = today + Days::new(7);
    println!("Agenda {today} .. {week_out}");
    for activity in service.activities() {
        for occ in generate_occurrences(&activity, today, week_out, OccurrenceMode::Pending) {
            println!("  {}  {}", occ.date, activity.title);
        }
    }

    let mut scheduler =
        ReminderScheduler::new(storage, Box::new(ConsoleNotifier), Box::new(KeyLocalizer));
    scheduler.tick(&service, Local::now().naive_local());
    for record in scheduler.notifications() {
        println!("reminder: {} ({})", record.title_key, record.occurrence_key);
    }
    Ok(())
}

fn seed(service: &ActivityService) -> Result<()> {
    let errands = service.create_category("Errands", IconName::Cart, CategoryMode::Personal)?;
    let work = service.create_category("Work", IconName::Briefcase, CategoryMode::Work)?;

    service.create_activity(ActivityDraft {
        title: "Daily standup".into(),
        category_id: Some(work.id),
        time: parse_time_of_day("09:30"),
        created_at: Some(Utc::now()),
        recurrence: Some(RecurrenceRule::daily()),
        ..Default::default()
    })?;
    service.create_activity(ActivityDraft {
        title: "Gym".into(),
        // Mon/Wed/Fri
        recurrence: Some(RecurrenceRule::weekly([1, 3, 5])),
        created_at: Some(Utc::now()),
        ..Default::default()
    })?;
    service.create_activity(ActivityDraft {
        title: "Pay rent".into(),
        category_id: Some(errands.id),
        recurrence: Some(RecurrenceRule::monthly(31)),
        created_at: Some(Utc::now()),
        todos: vec!["Check statement".into()],
        ..Default::default()
    })?;
    Ok(())
}
