//! Raw plans and tasks into [`TimelineEvent`]s.
//!
//! Normalization never fails as a whole: a record with a missing id, an
//! unreadable date or an end before its start is dropped, logged and reported
//! as a [`RecordIssue`].

use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use tracing::warn;

use furrever_client::utils::parse_timestamp;
use furrever_client::{
    Pet, PlanStatus, RecordList, RejectedRecord, ScheduledTask, TaskStatus, TreatmentPlan,
};

use crate::config::{MissingProgress, TimelineConfig};
use crate::error::TimelineError;
use crate::types::{EventKind, EventStatus, RecordIssue, RecordSource, TimelineEvent};

#[derive(Clone, Copy, Debug)]
pub struct NormalizeOptions {
    pub offset: FixedOffset,
    pub missing_progress: MissingProgress,
}

impl From<&TimelineConfig> for NormalizeOptions {
    fn from(cfg: &TimelineConfig) -> Self {
        Self {
            offset: cfg.utc_offset,
            missing_progress: cfg.missing_progress,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Normalized {
    pub events: Vec<TimelineEvent>,
    pub issues: Vec<RecordIssue>,
}

impl Normalized {
    pub fn extend(&mut self, other: Normalized) {
        self.events.extend(other.events);
        self.issues.extend(other.issues);
    }
}

/// Normalize one pet's records: plans first, then tasks, each in input order.
pub fn normalize_pet(
    pet: &Pet,
    plans: &[TreatmentPlan],
    tasks: &[ScheduledTask],
    opts: &NormalizeOptions,
) -> Normalized {
    let mut out = Normalized::default();
    for plan in plans {
        match plan_event(pet, plan, opts) {
            Ok(ev) => out.events.push(ev),
            Err(e) => out.issues.push(record_issue(
                RecordSource::Plan,
                &pet.pet_id,
                plan.plan_id.clone(),
                e.to_string(),
            )),
        }
    }
    for task in tasks {
        match task_event(pet, task, opts) {
            Ok(ev) => out.events.push(ev),
            Err(e) => out.issues.push(record_issue(
                RecordSource::Task,
                &pet.pet_id,
                task.task_id.clone(),
                e.to_string(),
            )),
        }
    }
    out
}

/// [`normalize_pet`] over decoded lists; elements that never decoded are reported
/// after the normalization issues.
pub fn normalize_lists(
    pet: &Pet,
    plans: &RecordList<TreatmentPlan>,
    tasks: &RecordList<ScheduledTask>,
    opts: &NormalizeOptions,
) -> Normalized {
    let mut out = normalize_pet(pet, &plans.records, &tasks.records, opts);
    out.issues
        .extend(rejected_issues(RecordSource::Plan, &pet.pet_id, &plans.rejected));
    out.issues
        .extend(rejected_issues(RecordSource::Task, &pet.pet_id, &tasks.rejected));
    out
}

/// One issue per list element the client could not decode.
pub fn rejected_issues(
    source: RecordSource,
    pet_id: &str,
    rejected: &[RejectedRecord],
) -> Vec<RecordIssue> {
    rejected
        .iter()
        .map(|r| {
            record_issue(
                source,
                pet_id,
                r.id.clone(),
                format!("record #{} did not decode: {}", r.index, r.reason),
            )
        })
        .collect()
}

/// One issue per pet the client could not decode.
pub fn rejected_pets(rejected: &[RejectedRecord]) -> Vec<RecordIssue> {
    rejected
        .iter()
        .map(|r| {
            record_issue(
                RecordSource::Pet,
                r.id.as_deref().unwrap_or_default(),
                r.id.clone(),
                format!("pet #{} did not decode: {}", r.index, r.reason),
            )
        })
        .collect()
}

fn record_issue(
    source: RecordSource,
    pet_id: &str,
    record_id: Option<String>,
    reason: String,
) -> RecordIssue {
    warn!(
        pet_id,
        record = record_id.as_deref().unwrap_or("?"),
        ?source,
        "dropping record: {reason}"
    );
    RecordIssue {
        source,
        pet_id: pet_id.to_string(),
        record_id,
        reason,
    }
}

pub fn plan_event(
    pet: &Pet,
    plan: &TreatmentPlan,
    opts: &NormalizeOptions,
) -> Result<TimelineEvent, TimelineError> {
    let plan_id = required_id(plan.plan_id.as_deref(), "planID")?;
    let start = required_date(plan.start_date.as_deref(), "startDate", opts.offset)?;
    let end = match plan.end_date.as_deref().map(str::trim) {
        None | Some("") => start,
        Some(raw) => parse_local(raw, opts.offset)
            .ok_or_else(|| TimelineError::parse("endDate", format!("not a timestamp: '{raw}'")))?,
    };
    if end < start {
        return Err(TimelineError::parse(
            "endDate",
            format!("{end} is before startDate {start}"),
        ));
    }

    let progress_percent = match plan.progress_percentage {
        Some(p) if p.is_finite() => Some(clamp_progress(p)),
        _ => match opts.missing_progress {
            MissingProgress::Zero => Some(0),
            MissingProgress::Exclude => None,
        },
    };

    Ok(TimelineEvent {
        id: format!("plan:{}:{}", pet.pet_id, plan_id),
        pet_id: pet.pet_id.clone(),
        pet_name: pet.name.clone(),
        title: title_or(plan.name.as_deref(), EventKind::Treatment),
        kind: EventKind::Treatment,
        start_date: start,
        end_date: end,
        status: plan_status(plan.status),
        progress_percent,
        notes: non_blank(plan.notes.as_deref().or(plan.description.as_deref())),
        completed_at: None,
    })
}

pub fn task_event(
    pet: &Pet,
    task: &ScheduledTask,
    opts: &NormalizeOptions,
) -> Result<TimelineEvent, TimelineError> {
    let task_id = required_id(task.task_id.as_deref(), "taskID")?;
    let start = required_date(
        task.scheduled_date_time.as_deref(),
        "scheduledDateTime",
        opts.offset,
    )?;
    let kind = task_kind(task.task_type.as_deref());

    // completion time is informational; an unreadable one does not drop the task
    let completed_at = task
        .completed_at
        .as_deref()
        .and_then(|raw| parse_local(raw, opts.offset));

    Ok(TimelineEvent {
        id: format!("task:{}:{}", pet.pet_id, task_id),
        pet_id: pet.pet_id.clone(),
        pet_name: pet.name.clone(),
        title: title_or(task.description.as_deref(), kind),
        kind,
        start_date: start,
        end_date: start,
        status: task_status(task.status),
        progress_percent: None,
        notes: non_blank(task.notes.as_deref()),
        completed_at,
    })
}

/// Map a free-form `taskType` onto a kind. Case, `_`, `-` and spaces are ignored.
pub fn task_kind(raw: Option<&str>) -> EventKind {
    let Some(raw) = raw else {
        return EventKind::TaskOther;
    };
    let key: String = raw
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect();
    match key.as_str() {
        "medication" | "medicine" => EventKind::TaskMedication,
        "feeding" | "food" => EventKind::TaskFeeding,
        "walk" | "exercise" => EventKind::TaskWalk,
        "vetvisit" | "vet" => EventKind::TaskVetVisit,
        "grooming" => EventKind::TaskGrooming,
        "appointment" => EventKind::TaskAppointment,
        _ => EventKind::TaskOther,
    }
}

/// Missing and unknown plan statuses fall back to the backend default.
pub fn plan_status(status: Option<PlanStatus>) -> EventStatus {
    match status {
        Some(PlanStatus::Completed) => EventStatus::Completed,
        Some(PlanStatus::Cancelled) => EventStatus::Cancelled,
        Some(PlanStatus::Active) | Some(PlanStatus::Unknown) | None => EventStatus::Active,
    }
}

/// Overdue tasks are still outstanding, so they stay `Pending`.
pub fn task_status(status: Option<TaskStatus>) -> EventStatus {
    match status {
        Some(TaskStatus::Completed) => EventStatus::Completed,
        Some(TaskStatus::Skipped) => EventStatus::Skipped,
        Some(TaskStatus::Pending)
        | Some(TaskStatus::Overdue)
        | Some(TaskStatus::Unknown)
        | None => EventStatus::Pending,
    }
}

pub fn clamp_progress(p: f64) -> u8 {
    p.round().clamp(0.0, 100.0) as u8
}

/// Parse a backend timestamp into a local calendar timestamp.
///
/// Plain dates are already calendar days and are not shifted by the offset.
pub fn parse_local(raw: &str, offset: FixedOffset) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    parse_timestamp(raw).map(|utc| utc.with_timezone(&offset).naive_local())
}

fn required_id<'a>(id: Option<&'a str>, field: &str) -> Result<&'a str, TimelineError> {
    id.map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TimelineError::parse(field, "missing"))
}

fn required_date(
    raw: Option<&str>,
    field: &str,
    offset: FixedOffset,
) -> Result<NaiveDateTime, TimelineError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TimelineError::parse(field, "missing"))?;
    parse_local(raw, offset)
        .ok_or_else(|| TimelineError::parse(field, format!("not a timestamp: '{raw}'")))
}

fn title_or(raw: Option<&str>, kind: EventKind) -> String {
    non_blank(raw).unwrap_or_else(|| kind.label().to_string())
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Offset, Utc};

    fn pet() -> Pet {
        serde_json::from_value(serde_json::json!({"petID": "p1", "name": "Buddy"})).unwrap()
    }

    fn opts() -> NormalizeOptions {
        NormalizeOptions {
            offset: Utc.fix(),
            missing_progress: MissingProgress::Zero,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn plan(id: &str, start: &str, end: Option<&str>, progress: Option<f64>) -> TreatmentPlan {
        TreatmentPlan {
            plan_id: Some(id.into()),
            name: Some("Skin Allergy Management".into()),
            start_date: Some(start.into()),
            end_date: end.map(Into::into),
            status: Some(PlanStatus::Active),
            progress_percentage: progress,
            ..Default::default()
        }
    }

    fn task(id: &str, kind: Option<&str>, when: &str) -> ScheduledTask {
        ScheduledTask {
            task_id: Some(id.into()),
            task_type: kind.map(Into::into),
            description: Some("Morning meds".into()),
            scheduled_date_time: Some(when.into()),
            status: Some(TaskStatus::Pending),
            ..Default::default()
        }
    }

    #[test]
    fn plan_maps_fields_and_deterministic_id() {
        let ev = plan_event(
            &pet(),
            &plan("pl1", "2024-01-01T00:00:00Z", Some("2024-01-03T00:00:00Z"), Some(50.0)),
            &opts(),
        )
        .unwrap();
        assert_eq!(ev.id, "plan:p1:pl1");
        assert_eq!(ev.pet_name, "Buddy");
        assert_eq!(ev.kind, EventKind::Treatment);
        assert_eq!(ev.start_date, at(2024, 1, 1, 0));
        assert_eq!(ev.end_date, at(2024, 1, 3, 0));
        assert_eq!(ev.status, EventStatus::Active);
        assert_eq!(ev.progress_percent, Some(50));
    }

    #[test]
    fn plan_without_end_is_a_point_event() {
        let ev = plan_event(&pet(), &plan("pl1", "2024-01-05", None, Some(10.0)), &opts()).unwrap();
        assert_eq!(ev.start_date, ev.end_date);
    }

    #[test]
    fn missing_progress_follows_policy() {
        let p = plan("pl1", "2024-01-05", None, None);
        assert_eq!(plan_event(&pet(), &p, &opts()).unwrap().progress_percent, Some(0));
        let exclude = NormalizeOptions {
            missing_progress: MissingProgress::Exclude,
            ..opts()
        };
        assert_eq!(plan_event(&pet(), &p, &exclude).unwrap().progress_percent, None);
    }

    #[test]
    fn progress_is_clamped_and_rounded() {
        assert_eq!(clamp_progress(140.0), 100);
        assert_eq!(clamp_progress(-3.0), 0);
        assert_eq!(clamp_progress(33.6), 34);
    }

    #[test]
    fn unknown_task_type_is_other() {
        let ev = task_event(&pet(), &task("t1", Some("UNKNOWN_TYPE"), "2024-01-02T08:00:00Z"), &opts())
            .unwrap();
        assert_eq!(ev.kind, EventKind::TaskOther);
        assert_eq!(ev.id, "task:p1:t1");
        assert_eq!(ev.start_date, ev.end_date);
        assert_eq!(ev.progress_percent, None);
    }

    #[test]
    fn task_kind_ignores_case_and_separators() {
        assert_eq!(task_kind(Some("VET_VISIT")), EventKind::TaskVetVisit);
        assert_eq!(task_kind(Some("vet-visit")), EventKind::TaskVetVisit);
        assert_eq!(task_kind(Some("Feeding")), EventKind::TaskFeeding);
        assert_eq!(task_kind(Some("MEDICATION")), EventKind::TaskMedication);
        assert_eq!(task_kind(Some("GROOMING")), EventKind::TaskGrooming);
        assert_eq!(task_kind(Some("WALK")), EventKind::TaskWalk);
        assert_eq!(task_kind(Some("APPOINTMENT")), EventKind::TaskAppointment);
        assert_eq!(task_kind(Some("OTHER")), EventKind::TaskOther);
        assert_eq!(task_kind(None), EventKind::TaskOther);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(task_status(Some(TaskStatus::Overdue)), EventStatus::Pending);
        assert_eq!(task_status(None), EventStatus::Pending);
        assert_eq!(task_status(Some(TaskStatus::Skipped)), EventStatus::Skipped);
        assert_eq!(plan_status(None), EventStatus::Active);
        assert_eq!(plan_status(Some(PlanStatus::Cancelled)), EventStatus::Cancelled);
        assert_eq!(plan_status(Some(PlanStatus::Completed)), EventStatus::Completed);
    }

    #[test]
    fn malformed_records_are_dropped_not_fatal() {
        let plans = vec![
            plan("good", "2024-01-01", None, Some(20.0)),
            plan("bad-date", "yesterday-ish", None, None),
            plan("backwards", "2024-01-05", Some("2024-01-01"), None),
        ];
        let mut no_id = task("x", Some("WALK"), "2024-01-02T08:00:00Z");
        no_id.task_id = None;
        let tasks = vec![no_id, task("t2", Some("WALK"), "2024-01-02T08:00:00Z")];

        let out = normalize_pet(&pet(), &plans, &tasks, &opts());
        let ids: Vec<_> = out.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["plan:p1:good", "task:p1:t2"]);
        assert_eq!(out.issues.len(), 3);
        assert_eq!(out.issues[0].record_id.as_deref(), Some("bad-date"));
        assert!(out.issues[0].reason.contains("startDate"));
        assert!(out.issues[1].reason.contains("before"));
        assert_eq!(out.issues[2].source, RecordSource::Task);
    }

    #[test]
    fn undecodable_list_elements_become_issues() {
        let plans: RecordList<TreatmentPlan> = RecordList::decode(
            vec![
                serde_json::json!({"planID": "good", "name": "Diet", "startDate": "2024-01-01"}),
                serde_json::json!({"planID": "bad", "name": 5, "startDate": "2024-01-02"}),
            ],
            "planID",
        );
        let tasks = RecordList::from(vec![task("t1", Some("WALK"), "2024-01-02T08:00:00Z")]);

        let out = normalize_lists(&pet(), &plans, &tasks, &opts());
        let ids: Vec<_> = out.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["plan:p1:good", "task:p1:t1"]);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].source, RecordSource::Plan);
        assert_eq!(out.issues[0].record_id.as_deref(), Some("bad"));
        assert!(out.issues[0].reason.contains("did not decode"));
    }

    #[test]
    fn offset_moves_instants_across_midnight() {
        let east = NormalizeOptions {
            offset: FixedOffset::east_opt(2 * 3600).unwrap(),
            ..opts()
        };
        let ev = task_event(&pet(), &task("t1", None, "2024-01-01T23:30:00Z"), &east).unwrap();
        assert_eq!(ev.start_date.date(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        // plain dates are calendar days already
        let ev = plan_event(&pet(), &plan("pl", "2024-01-01", None, None), &east).unwrap();
        assert_eq!(ev.start_date, at(2024, 1, 1, 0));
    }

    #[test]
    fn blank_titles_fall_back_to_kind_label() {
        let mut t = task("t1", Some("FEEDING"), "2024-01-02T08:00:00Z");
        t.description = Some("   ".into());
        let ev = task_event(&pet(), &t, &opts()).unwrap();
        assert_eq!(ev.title, "Feeding");
    }

    #[test]
    fn normalization_is_idempotent() {
        let plans = vec![plan("pl1", "2024-01-01", Some("2024-01-03"), Some(50.0))];
        let tasks = vec![task("t1", Some("WALK"), "1704182400000")];
        assert_eq!(
            normalize_pet(&pet(), &plans, &tasks, &opts()),
            normalize_pet(&pet(), &plans, &tasks, &opts())
        );
    }
}
