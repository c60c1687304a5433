use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

use crate::activity::{Activity, RecurrenceKind};

/// Hard cap on generator steps. Guarantees termination under contradictory
/// rules (weekly with an empty day set) and bounds any single window walk.
pub const MAX_OCCURRENCE_STEPS: usize = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceMode {
    /// Every occurrence in range, completion ignored. Calendar rendering.
    All,
    /// Occurrences not yet marked complete. Reminder scheduling.
    Pending,
}

/// One concrete date on which a master activity is due. Derived on demand,
/// never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub activity_id: String,
}

/// Expands a master activity into its concrete occurrence dates within
/// `[range_start, range_end]`, both bounds inclusive at day granularity,
/// ascending and duplicate-free.
///
/// Monthly rules whose `day_of_month` exceeds a short month clamp to that
/// month's last day (31st -> Feb 28/29), never roll into the next month.
pub fn generate_occurrences(
    activity: &Activity,
    range_start: NaiveDate,
    range_end: NaiveDate,
    mode: OccurrenceMode,
) -> Vec<Occurrence> {
    if range_start > range_end {
        return Vec::new();
    }

    let anchor = activity.anchor_date();
    let mut cutoff = range_end;
    if let Some(end) = activity.recurrence.end_date {
        cutoff = cutoff.min(end.date_naive());
    }
    if cutoff < range_start || anchor > cutoff {
        return Vec::new();
    }

    let mut out = Vec::new();
    match activity.recurrence.kind {
        RecurrenceKind::None => {
            let pending_ok = mode == OccurrenceMode::All || !activity.completed;
            if anchor >= range_start && pending_ok {
                out.push(Occurrence {
                    date: anchor,
                    activity_id: activity.id.clone(),
                });
            }
        }
        RecurrenceKind::Daily | RecurrenceKind::Weekly => {
            walk_days(activity, anchor.max(range_start), cutoff, mode, &mut out);
        }
        RecurrenceKind::Monthly => {
            walk_months(activity, anchor, range_start, cutoff, mode, &mut out);
        }
    }
    out
}

fn walk_days(
    activity: &Activity,
    start: NaiveDate,
    cutoff: NaiveDate,
    mode: OccurrenceMode,
    out: &mut Vec<Occurrence>,
) {
    let rule = &activity.recurrence;
    let mut date = start;
    let mut steps = 0;
    while date <= cutoff && steps < MAX_OCCURRENCE_STEPS {
        let due = match rule.kind {
            RecurrenceKind::Weekly => rule.days_of_week.contains(&weekday_index(date)),
            _ => true,
        };
        if due && is_included(activity, date, mode) {
            out.push(Occurrence {
                date,
                activity_id: activity.id.clone(),
            });
        }
        steps += 1;
        let Some(next) = date.succ_opt() else { break };
        date = next;
    }
}

fn walk_months(
    activity: &Activity,
    anchor: NaiveDate,
    range_start: NaiveDate,
    cutoff: NaiveDate,
    mode: OccurrenceMode,
    out: &mut Vec<Occurrence>,
) {
    let Some(target_day) = activity.recurrence.day_of_month else {
        return;
    };
    if target_day == 0 {
        return;
    }

    // Jump straight to the window's month instead of iterating from the
    // anchor; the bounded walk below only corrects by a month or two.
    let mut month_start = anchor.with_day(1).unwrap_or(anchor);
    let months_ahead = (range_start.year() - month_start.year()) * 12
        + range_start.month() as i32
        - month_start.month() as i32;
    if months_ahead > 0 {
        month_start = month_start + Months::new(months_ahead as u32);
    }

    let mut candidate = clamp_to_month(month_start, target_day);
    let mut steps = 0;
    while (candidate < anchor || candidate < range_start) && steps < MAX_OCCURRENCE_STEPS {
        month_start = month_start + Months::new(1);
        candidate = clamp_to_month(month_start, target_day);
        steps += 1;
    }
    while candidate <= cutoff && steps < MAX_OCCURRENCE_STEPS {
        if is_included(activity, candidate, mode) {
            out.push(Occurrence {
                date: candidate,
                activity_id: activity.id.clone(),
            });
        }
        month_start = month_start + Months::new(1);
        candidate = clamp_to_month(month_start, target_day);
        steps += 1;
    }
}

fn is_included(activity: &Activity, date: NaiveDate, mode: OccurrenceMode) -> bool {
    mode == OccurrenceMode::All || !activity.is_occurrence_completed(date)
}

/// 0 = Sunday .. 6 = Saturday.
fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

fn clamp_to_month(month_start: NaiveDate, day: u8) -> NaiveDate {
    let last = days_in_month(month_start);
    month_start + Days::new(u64::from(day.clamp(1, last)) - 1)
}

fn days_in_month(month_start: NaiveDate) -> u8 {
    let next = month_start + Months::new(1);
    next.signed_duration_since(month_start).num_days() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{occurrence_key, RecurrenceRule};
    use chrono::{TimeZone, Utc};

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn activity(created: NaiveDate, recurrence: RecurrenceRule) -> Activity {
        Activity {
            id: "act".into(),
            title: "Test".into(),
            category_id: None,
            notes: String::new(),
            time: None,
            responsible_person_id: None,
            created_at: Utc
                .with_ymd_and_hms(created.year(), created.month(), created.day(), 9, 0, 0)
                .unwrap(),
            recurrence,
            completed: false,
            completed_occurrences: Default::default(),
            todos: Vec::new(),
        }
    }

    fn dates(occurrences: &[Occurrence]) -> Vec<NaiveDate> {
        occurrences.iter().map(|occ| occ.date).collect()
    }

    #[test]
    fn non_recurring_appears_only_inside_the_window() {
        let act = activity(ymd(2024, 6, 10), RecurrenceRule::none());
        let hits = generate_occurrences(&act, ymd(2024, 6, 1), ymd(2024, 6, 30), OccurrenceMode::All);
        assert_eq!(dates(&hits), vec![ymd(2024, 6, 10)]);

        let misses =
            generate_occurrences(&act, ymd(2024, 7, 1), ymd(2024, 7, 31), OccurrenceMode::All);
        assert!(misses.is_empty());
    }

    #[test]
    fn non_recurring_completed_is_hidden_only_in_pending_mode() {
        let mut act = activity(ymd(2024, 6, 10), RecurrenceRule::none());
        act.completed = true;
        let window = (ymd(2024, 6, 1), ymd(2024, 6, 30));
        assert_eq!(
            generate_occurrences(&act, window.0, window.1, OccurrenceMode::All).len(),
            1
        );
        assert!(generate_occurrences(&act, window.0, window.1, OccurrenceMode::Pending).is_empty());
    }

    #[test]
    fn inverted_range_is_empty() {
        let act = activity(ymd(2024, 6, 10), RecurrenceRule::daily());
        assert!(
            generate_occurrences(&act, ymd(2024, 6, 20), ymd(2024, 6, 1), OccurrenceMode::All)
                .is_empty()
        );
    }

    #[test]
    fn end_date_before_window_is_empty() {
        let act = activity(
            ymd(2024, 1, 1),
            RecurrenceRule::daily().with_end_date(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
        );
        assert!(
            generate_occurrences(&act, ymd(2024, 3, 1), ymd(2024, 3, 31), OccurrenceMode::All)
                .is_empty()
        );
    }

    #[test]
    fn daily_covers_every_day_from_the_later_of_anchor_and_window() {
        let act = activity(ymd(2024, 6, 10), RecurrenceRule::daily());
        let hits = generate_occurrences(&act, ymd(2024, 6, 8), ymd(2024, 6, 12), OccurrenceMode::All);
        assert_eq!(
            dates(&hits),
            vec![ymd(2024, 6, 10), ymd(2024, 6, 11), ymd(2024, 6, 12)]
        );
    }

    #[test]
    fn weekly_emits_only_selected_weekdays_with_small_gaps() {
        // Mon/Wed/Fri
        let act = activity(ymd(2024, 1, 1), RecurrenceRule::weekly([1, 3, 5]));
        let hits = generate_occurrences(&act, ymd(2024, 1, 1), ymd(2024, 2, 29), OccurrenceMode::All);
        assert!(!hits.is_empty());
        for occ in &hits {
            assert!([1, 3, 5].contains(&(occ.date.weekday().num_days_from_sunday() as u8)));
        }
        for pair in hits.windows(2) {
            let gap = (pair[1].date - pair[0].date).num_days();
            assert!((1..=2).contains(&gap), "gap of {gap} days");
        }
    }

    #[test]
    fn weekly_with_empty_day_set_terminates_empty() {
        let act = activity(ymd(2024, 1, 1), RecurrenceRule::weekly([]));
        let hits =
            generate_occurrences(&act, ymd(2024, 1, 1), ymd(2030, 12, 31), OccurrenceMode::All);
        assert!(hits.is_empty());
    }

    #[test]
    fn weekly_fast_forwards_to_a_distant_window() {
        let act = activity(ymd(2020, 1, 6), RecurrenceRule::weekly([1]));
        let hits = generate_occurrences(&act, ymd(2026, 3, 1), ymd(2026, 3, 31), OccurrenceMode::All);
        assert_eq!(
            dates(&hits),
            vec![
                ymd(2026, 3, 2),
                ymd(2026, 3, 9),
                ymd(2026, 3, 16),
                ymd(2026, 3, 23),
                ymd(2026, 3, 30),
            ]
        );
    }

    #[test]
    fn monthly_day_31_clamps_to_short_months() {
        let act = activity(ymd(2024, 1, 31), RecurrenceRule::monthly(31));
        let hits = generate_occurrences(&act, ymd(2024, 1, 1), ymd(2024, 3, 31), OccurrenceMode::All);
        // 2024 is a leap year: clamp lands on Feb 29, then back to the 31st.
        assert_eq!(
            dates(&hits),
            vec![ymd(2024, 1, 31), ymd(2024, 2, 29), ymd(2024, 3, 31)]
        );
    }

    #[test]
    fn monthly_clamp_in_non_leap_february() {
        let act = activity(ymd(2023, 1, 31), RecurrenceRule::monthly(31));
        let hits = generate_occurrences(&act, ymd(2023, 1, 1), ymd(2023, 3, 31), OccurrenceMode::All);
        assert_eq!(
            dates(&hits),
            vec![ymd(2023, 1, 31), ymd(2023, 2, 28), ymd(2023, 3, 31)]
        );
    }

    #[test]
    fn monthly_fast_forwards_across_years() {
        let act = activity(ymd(1999, 5, 15), RecurrenceRule::monthly(15));
        let hits = generate_occurrences(&act, ymd(2024, 1, 1), ymd(2024, 3, 31), OccurrenceMode::All);
        assert_eq!(
            dates(&hits),
            vec![ymd(2024, 1, 15), ymd(2024, 2, 15), ymd(2024, 3, 15)]
        );
    }

    #[test]
    fn monthly_respects_series_end_date() {
        let act = activity(
            ymd(2024, 1, 15),
            RecurrenceRule::monthly(15)
                .with_end_date(Utc.with_ymd_and_hms(2024, 4, 15, 9, 0, 0).unwrap()),
        );
        let hits =
            generate_occurrences(&act, ymd(2024, 1, 1), ymd(2024, 12, 31), OccurrenceMode::All);
        assert_eq!(
            dates(&hits),
            vec![
                ymd(2024, 1, 15),
                ymd(2024, 2, 15),
                ymd(2024, 3, 15),
                ymd(2024, 4, 15),
            ]
        );
    }

    #[test]
    fn pending_mode_skips_completed_occurrences() {
        let mut act = activity(ymd(2024, 1, 15), RecurrenceRule::monthly(15));
        act.completed_occurrences
            .insert(occurrence_key(ymd(2024, 2, 15)), true);
        let window = (ymd(2024, 1, 1), ymd(2024, 3, 31));

        let all = generate_occurrences(&act, window.0, window.1, OccurrenceMode::All);
        assert!(dates(&all).contains(&ymd(2024, 2, 15)));

        let pending = generate_occurrences(&act, window.0, window.1, OccurrenceMode::Pending);
        assert_eq!(dates(&pending), vec![ymd(2024, 1, 15), ymd(2024, 3, 15)]);
    }

    #[test]
    fn output_is_strictly_ascending() {
        let act = activity(ymd(2024, 1, 1), RecurrenceRule::weekly([0, 1, 2, 3, 4, 5, 6]));
        let hits = generate_occurrences(&act, ymd(2024, 1, 1), ymd(2024, 2, 1), OccurrenceMode::All);
        for pair in hits.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }
}
