//! Derived views over the task collection.
//!
//! Everything here is a pure function of the tasks and an explicit `now`, so
//! overdue/critical status is never stored and never needs a background job to
//! flip it.

use chrono::{Datelike, NaiveDate, TimeZone, Weekday};
use serde::Serialize;

use crate::models::{Settings, SortOrder, Task, Timestamp, DAY_MS, HOUR_MS};

/// Upper bound on calendar dots per day; the count itself is not capped.
pub const MAX_CALENDAR_DOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub active_count: usize,
    pub completed_today_count: usize,
    pub overdue_count: usize,
    pub critical_count: usize,
    pub total_count: usize,
    pub completed_count: usize,
}

impl TaskStats {
    pub fn progress_percent(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.completed_count as f64 / self.total_count as f64 * 100.0
    }

    pub fn severity(&self) -> Severity {
        if self.critical_count > 0 {
            Severity::Danger
        } else if self.overdue_count > 0 {
            Severity::Warning
        } else {
            Severity::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub task: Task,
    pub age_ms: Timestamp,
    pub age_label: String,
    pub danger: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
    pub day_start: Timestamp,
    pub day_end: Timestamp,
    pub day: u32,
    pub in_month: bool,
    pub weekend: bool,
    pub today: bool,
    pub task_count: usize,
    pub dot_count: usize,
}

/// Everything a view needs to redraw, computed for one instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSnapshot {
    pub now: Timestamp,
    pub active: Vec<Task>,
    pub completed: Vec<Task>,
    pub stats: TaskStats,
    pub severity: Severity,
    pub progress_percent: f64,
    pub reminders: Vec<Reminder>,
    pub calendar: Vec<CalendarCell>,
    pub settings: Settings,
    pub filter_day: Option<Timestamp>,
    pub undo_pending: bool,
}

/// Local midnight of the calendar day containing `ts`.
pub fn start_of_day<Tz: TimeZone>(ts: Timestamp, tz: &Tz) -> Timestamp {
    match tz.timestamp_millis_opt(ts).single() {
        Some(local) => local_midnight(local.date_naive(), tz)
            .unwrap_or_else(|| utc_day_floor(ts)),
        None => utc_day_floor(ts),
    }
}

fn utc_day_floor(ts: Timestamp) -> Timestamp {
    ts.saturating_sub(ts.rem_euclid(DAY_MS))
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<Timestamp> {
    // Some zones skip midnight on DST days; the day then starts at 01:00.
    [0, 1].iter().find_map(|hour| {
        let naive = date.and_hms_opt(*hour, 0, 0)?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_millis())
    })
}

fn in_window(ts: Timestamp, start: Timestamp, end: Timestamp) -> bool {
    ts >= start && ts < end
}

/// Active tasks ordered by `sort`, optionally limited to `[filter_day, filter_day + 24h)`.
pub fn active_tasks(
    tasks: &[Task],
    sort: SortOrder,
    filter_day: Option<Timestamp>,
    now: Timestamp,
) -> Vec<Task> {
    let mut actives: Vec<Task> = tasks
        .iter()
        .filter(|task| task.is_active())
        .filter(|task| match filter_day {
            Some(start) => in_window(task.created_at, start, start.saturating_add(DAY_MS)),
            None => true,
        })
        .cloned()
        .collect();

    // Stable sorts: equal keys keep raw collection order. Manual mode is the raw
    // collection order itself: reorders rewrite it and new tasks enter at the front.
    match sort {
        SortOrder::Newest => actives.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Oldest => actives.sort_by_key(|task| task.created_at),
        SortOrder::Overdue => actives.sort_by(|a, b| {
            b.is_overdue_at(now)
                .cmp(&a.is_overdue_at(now))
                .then_with(|| {
                    if a.is_overdue_at(now) {
                        a.created_at.cmp(&b.created_at)
                    } else {
                        b.created_at.cmp(&a.created_at)
                    }
                })
        }),
        SortOrder::Manual => {}
    }
    actives
}

/// Completed tasks, most recently completed first.
pub fn completed_tasks(tasks: &[Task]) -> Vec<Task> {
    let mut completed: Vec<Task> = tasks
        .iter()
        .filter(|task| task.is_completed)
        .cloned()
        .collect();
    completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    completed
}

pub fn stats<Tz: TimeZone>(tasks: &[Task], now: Timestamp, tz: &Tz) -> TaskStats {
    let today = start_of_day(now, tz);
    let mut out = TaskStats {
        active_count: 0,
        completed_today_count: 0,
        overdue_count: 0,
        critical_count: 0,
        total_count: tasks.len(),
        completed_count: 0,
    };
    for task in tasks {
        if task.is_completed {
            out.completed_count += 1;
            if task.completed_at.map(|at| at >= today).unwrap_or(false) {
                out.completed_today_count += 1;
            }
            continue;
        }
        out.active_count += 1;
        if task.is_overdue_at(now) {
            out.overdue_count += 1;
        }
        if task.is_critical_at(now) {
            out.critical_count += 1;
        }
    }
    out
}

/// Overdue active tasks, most overdue first.
pub fn reminders(tasks: &[Task], now: Timestamp) -> Vec<Reminder> {
    let mut overdue: Vec<&Task> = tasks.iter().filter(|task| task.is_overdue_at(now)).collect();
    overdue.sort_by_key(|task| task.created_at);
    overdue
        .into_iter()
        .map(|task| Reminder {
            task: task.clone(),
            age_ms: task.age_at(now),
            age_label: age_label(task.created_at, now),
            danger: task.is_critical_at(now),
        })
        .collect()
}

/// Tasks in any state created within `[day_start, day_end)`.
pub fn calendar_bucket(tasks: &[Task], day_start: Timestamp, day_end: Timestamp) -> usize {
    tasks
        .iter()
        .filter(|task| in_window(task.created_at, day_start, day_end))
        .count()
}

/// Monday-first grid for `month` of `year`. Leading cells come from the previous
/// month and trailing cells only complete the last week. Empty for an invalid month.
pub fn month_grid<Tz: TimeZone>(
    tasks: &[Task],
    year: i32,
    month: u32,
    now: Timestamp,
    tz: &Tz,
) -> Vec<CalendarCell> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let today = tz
        .timestamp_millis_opt(now)
        .single()
        .map(|local| local.date_naive());
    let lead = first.weekday().num_days_from_monday() as usize;
    let cell_count = (lead + days_in_month(first)).div_ceil(7) * 7;

    let mut cells = Vec::with_capacity(cell_count);
    let mut date = first - chrono::Duration::days(lead as i64);
    for _ in 0..cell_count {
        let next = date.succ_opt().unwrap_or(date);
        let day_start = local_midnight(date, tz).unwrap_or_default();
        let day_end = local_midnight(next, tz).unwrap_or(day_start.saturating_add(DAY_MS));
        let task_count = calendar_bucket(tasks, day_start, day_end);
        cells.push(CalendarCell {
            day_start,
            day_end,
            day: date.day(),
            in_month: date.month() == month,
            weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
            today: today == Some(date),
            task_count,
            dot_count: task_count.min(MAX_CALENDAR_DOTS),
        });
        date = next;
    }
    cells
}

fn days_in_month(first: NaiveDate) -> usize {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|next| (next - first).num_days() as usize)
        .unwrap_or(31)
}

/// Compact age text: `0m`, `12m`, `3h 4m`, `2d 1h 0m`.
pub fn age_label(created_at: Timestamp, now: Timestamp) -> String {
    let secs = now.saturating_sub(created_at) / 1000;
    if secs < 60 {
        return "0m".to_string();
    }
    let minutes = (secs / 60) % 60;
    let hours = (secs / 3600) % 24;
    let days = secs / 86_400;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

pub fn completed_label<Tz: TimeZone>(completed_at: Timestamp, now: Timestamp, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let elapsed = now.saturating_sub(completed_at);
    if elapsed < HOUR_MS {
        return "Completed just now".to_string();
    }
    if elapsed < DAY_MS {
        return format!("Completed {}h ago", elapsed / HOUR_MS);
    }
    match tz.timestamp_millis_opt(completed_at).single() {
        Some(local) => format!("Completed {}", local.format("%-d %b")),
        None => "Completed".to_string(),
    }
}
