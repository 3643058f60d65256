use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use furrever_client::{Pet, TaskStatus};

/// What produced a timeline event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum EventKind {
    Treatment,
    TaskMedication,
    TaskFeeding,
    TaskWalk,
    TaskVetVisit,
    TaskGrooming,
    TaskAppointment,
    TaskOther,
}

impl EventKind {
    pub fn is_task(&self) -> bool {
        !matches!(self, EventKind::Treatment)
    }

    /// Title used when the source record has no name or description.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Treatment => "Treatment plan",
            EventKind::TaskMedication => "Medication",
            EventKind::TaskFeeding => "Feeding",
            EventKind::TaskWalk => "Walk",
            EventKind::TaskVetVisit => "Vet visit",
            EventKind::TaskGrooming => "Grooming",
            EventKind::TaskAppointment => "Appointment",
            EventKind::TaskOther => "Task",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum EventStatus {
    Pending,
    Completed,
    Skipped,
    Cancelled,
    Active,
}

/// A treatment plan or scheduled task in the unified timeline shape.
///
/// Dates are local calendar timestamps. `end_date` equals `start_date` for
/// point-in-time events and is never earlier than it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// `plan:{petId}:{planID}` or `task:{petId}:{taskID}`
    pub id: String,
    pub pet_id: String,
    pub pet_name: String,
    pub title: String,
    pub kind: EventKind,
    #[schemars(with = "String")]
    pub start_date: NaiveDateTime,
    #[schemars(with = "String")]
    pub end_date: NaiveDateTime,
    pub status: EventStatus,
    /// 0..=100, treatments only
    pub progress_percent: Option<u8>,
    pub notes: Option<String>,
    #[schemars(with = "Option<String>")]
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    Pet,
    Plan,
    Task,
}

/// A backend record left out of the timeline and the reason why.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordIssue {
    pub source: RecordSource,
    pub pet_id: String,
    pub record_id: Option<String>,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub events: Vec<TimelineEvent>,
    pub total: usize,
    pub completed: usize,
    pub progress: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStats {
    pub total_events: usize,
    pub completed_events: usize,
    /// Mean progress over events carrying one, one decimal. Independent of the window.
    pub overall_progress: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodayProgress {
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub tasks_completed_today: usize,
    pub tasks_total_today: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub enum ViewState {
    Empty,
    Populated,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineView {
    pub pet_id: Option<String>,
    #[schemars(with = "String")]
    pub week_start: NaiveDate,
    #[schemars(with = "String")]
    pub week_end: NaiveDate,
    pub days: Vec<DayBucket>,
    pub stats: TimelineStats,
    pub today: TodayProgress,
    pub upcoming: Vec<TimelineEvent>,
    pub state: ViewState,
}

// === Tool parameters ===

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct TimelineParams {
    /// Restrict to one pet; all pets when omitted
    pub pet_id: Option<String>,
    /// Any date inside the wanted week (YYYY-MM-DD); current week when omitted
    pub week_of: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SelectPetParams {
    /// Pet to focus on; omit to show every pet
    pub pet_id: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WeekNavigation {
    Next,
    Prev,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct NavigateParams {
    pub direction: WeekNavigation,
    /// Number of weeks to move (default 1)
    pub weeks: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct UpcomingParams {
    pub pet_id: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct TaskStatusParams {
    pub pet_id: String,
    pub task_id: String,
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct PlanProgressParams {
    pub pet_id: String,
    pub plan_id: String,
    /// 0-100
    pub progress: u8,
}

// === Tool results ===

#[derive(Debug, Serialize, JsonSchema)]
pub struct PetsResult {
    pub pets: Vec<Pet>,
    /// Pets the backend returned in a shape that could not be read.
    pub skipped: Vec<RecordIssue>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct TimelineResponse {
    pub timeline: TimelineView,
    /// Records dropped during normalization
    pub skipped: Vec<RecordIssue>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UpcomingResult {
    pub pet_id: String,
    pub tasks: Vec<TimelineEvent>,
    pub skipped: Vec<RecordIssue>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UpdateResult {
    pub ok: bool,
    pub message: String,
}
