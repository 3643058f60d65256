//! Week windows and the pure timeline aggregation.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

use furrever_client::utils::normalize_date_str;

use crate::error::TimelineError;
use crate::types::{
    DayBucket, EventStatus, TimelineEvent, TimelineStats, TimelineView, TodayProgress, ViewState,
};

/// Seven consecutive days starting on a Monday.
///
/// All seven days are always representable; constructors return `None` near the edges of
/// the calendar range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WeekWindow {
    start: NaiveDate,
}

impl WeekWindow {
    fn starting(start: NaiveDate) -> Option<Self> {
        start.checked_add_days(Days::new(6))?;
        Some(Self { start })
    }

    pub fn containing(date: NaiveDate) -> Option<Self> {
        let back = date.weekday().num_days_from_monday() as u64;
        Self::starting(date.checked_sub_days(Days::new(back))?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.start
            .checked_add_days(Days::new(6))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(7)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end()
    }

    /// Move by `weeks`; `None` when the result leaves the calendar range.
    pub fn shift(&self, weeks: i64) -> Option<Self> {
        let days = weeks.checked_mul(7)?;
        let start = if days >= 0 {
            self.start.checked_add_days(Days::new(days as u64))?
        } else {
            self.start.checked_sub_days(Days::new(days.unsigned_abs()))?
        };
        Self::starting(start)
    }

    pub fn next(&self) -> Option<Self> {
        self.shift(1)
    }

    pub fn prev(&self) -> Option<Self> {
        self.shift(-1)
    }
}

#[derive(Clone, Debug)]
pub struct TimelineQuery {
    /// `None` aggregates every pet.
    pub pet_id: Option<String>,
    pub window: WeekWindow,
    /// Local time used for today's progress and upcoming tasks.
    pub now: NaiveDateTime,
    pub upcoming_limit: usize,
}

/// Parse an optional `week_of` date; `None` selects the week containing `today`.
pub fn window_for(week_of: Option<&str>, today: NaiveDate) -> Result<WeekWindow, TimelineError> {
    match week_of.map(str::trim).filter(|s| !s.is_empty()) {
        None => WeekWindow::containing(today).ok_or_else(|| {
            TimelineError::InvalidRequest(format!("no week window around {today}"))
        }),
        Some(raw) => {
            let date = normalize_date_str(raw).ok_or_else(|| {
                TimelineError::InvalidRequest(format!("week_of is not a date: '{raw}'"))
            })?;
            WeekWindow::containing(date).ok_or_else(|| {
                TimelineError::InvalidRequest(format!("week_of is out of range: '{raw}'"))
            })
        }
    }
}

/// An event covers `day` when it starts on or before it and ends on or after it.
pub fn covers(event: &TimelineEvent, day: NaiveDate) -> bool {
    event.start_date.date() <= day && day <= event.end_date.date()
}

/// Mean progress of the events that carry one, rounded to one decimal; 0 when none do.
pub fn mean_progress<'a>(events: impl IntoIterator<Item = &'a TimelineEvent>) -> f64 {
    let (sum, count) = events
        .into_iter()
        .filter_map(|e| e.progress_percent)
        .fold((0u32, 0u32), |(s, c), p| (s + p as u32, c + 1));
    if count == 0 {
        0.0
    } else {
        (sum as f64 / count as f64 * 10.0).round() / 10.0
    }
}

fn completed(events: &[&TimelineEvent]) -> usize {
    events
        .iter()
        .filter(|e| e.status == EventStatus::Completed)
        .count()
}

/// Build the timeline view for `query` from a fetched event list.
pub fn aggregate(events: &[TimelineEvent], query: &TimelineQuery) -> TimelineView {
    let mut filtered: Vec<&TimelineEvent> = events
        .iter()
        .filter(|e| query.pet_id.as_deref().is_none_or(|id| e.pet_id == id))
        .collect();
    // stable: equal starts keep fetch order
    filtered.sort_by_key(|e| e.start_date);

    let days = query
        .window
        .days()
        .map(|date| {
            let on_day: Vec<&TimelineEvent> =
                filtered.iter().copied().filter(|e| covers(e, date)).collect();
            DayBucket {
                date,
                total: on_day.len(),
                completed: completed(&on_day),
                progress: mean_progress(on_day.iter().copied()),
                events: on_day.into_iter().cloned().collect(),
            }
        })
        .collect();

    let stats = TimelineStats {
        total_events: filtered.len(),
        completed_events: completed(&filtered),
        overall_progress: mean_progress(filtered.iter().copied()),
    };

    let today_date = query.now.date();
    let tasks = || filtered.iter().filter(|e| e.kind.is_task());
    let done_today = tasks()
        .filter(|e| e.status == EventStatus::Completed)
        .filter(|e| e.completed_at.unwrap_or(e.start_date).date() == today_date)
        .count();
    let pending_today = tasks()
        .filter(|e| e.status == EventStatus::Pending && e.start_date.date() == today_date)
        .count();

    let upcoming = tasks()
        .filter(|e| e.status == EventStatus::Pending && e.start_date >= query.now)
        .take(query.upcoming_limit)
        .map(|e| (*e).clone())
        .collect();

    TimelineView {
        pet_id: query.pet_id.clone(),
        week_start: query.window.start(),
        week_end: query.window.end(),
        days,
        stats,
        today: TodayProgress {
            date: today_date,
            tasks_completed_today: done_today,
            tasks_total_today: done_today + pending_today,
        },
        upcoming,
        state: if filtered.is_empty() {
            ViewState::Empty
        } else {
            ViewState::Populated
        },
    }
}
