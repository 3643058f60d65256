//! `FurreverClient` trait, raw backend records and a reqwest-based implementation.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub mod config;
pub mod http_client;
pub mod retry;
pub mod utils;

#[derive(Debug, Error)]
pub enum FurreverError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("decoding {what}: {message}")]
    Decode { what: String, message: String },
}

impl FurreverError {
    /// Map a non-success status code without a dedicated variant.
    pub fn from_status(status: u16, body: String) -> Self {
        FurreverError::Api { status, body }
    }

    /// Transport failures and 5xx responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FurreverError::Http(e) => !e.is_decode() && !e.is_builder(),
            FurreverError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, JsonSchema)]
pub struct Pet {
    #[serde(rename = "petID", deserialize_with = "deserialize_string")]
    pub pet_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub allergies: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Active,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Active => "ACTIVE",
            PlanStatus::Completed => "COMPLETED",
            PlanStatus::Cancelled => "CANCELLED",
            PlanStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Completed,
    Skipped,
    Overdue,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Skipped => "SKIPPED",
            TaskStatus::Overdue => "OVERDUE",
            TaskStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Treatment plan as stored by the backend.
///
/// Timestamps stay as raw strings: a single malformed value must only drop
/// its own record during normalization, never the whole list.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPlan {
    #[serde(rename = "planID", default, deserialize_with = "deserialize_opt_string")]
    pub plan_id: Option<String>,
    #[serde(rename = "petID", default, deserialize_with = "deserialize_opt_string")]
    pub pet_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub status: Option<PlanStatus>,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Scheduled care task as stored by the backend.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    #[serde(rename = "taskID", default, deserialize_with = "deserialize_opt_string")]
    pub task_id: Option<String>,
    #[serde(rename = "petID", default, deserialize_with = "deserialize_opt_string")]
    pub pet_id: Option<String>,
    /// Free-form on the wire; mapped onto a closed set during normalization.
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub scheduled_date_time: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_string")]
    pub completed_at: Option<String>,
}

fn deserialize_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string().into()),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn deserialize_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    deserialize_opt_string(deserializer)?.ok_or_else(|| D::Error::custom("missing id"))
}

/// A list response decoded one record at a time.
///
/// Records that do not fit their model are listed in `rejected`; the rest of the
/// list survives.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordList<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedRecord>,
}

/// A list element that failed to decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position in the response array.
    pub index: usize,
    /// The record's id, when one could still be read from the raw JSON.
    pub id: Option<String>,
    pub reason: String,
}

impl<T> Default for RecordList<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> From<Vec<T>> for RecordList<T> {
    fn from(records: Vec<T>) -> Self {
        Self {
            records,
            rejected: Vec::new(),
        }
    }
}

impl<T: DeserializeOwned> RecordList<T> {
    /// Decode each element of `values`; `id_field` names the raw id used in rejections.
    pub fn decode(values: Vec<serde_json::Value>, id_field: &str) -> Self {
        let mut list = Self::default();
        for (index, value) in values.into_iter().enumerate() {
            let id = match value.get(id_field) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            match serde_json::from_value::<T>(value) {
                Ok(record) => list.records.push(record),
                Err(e) => list.rejected.push(RejectedRecord {
                    index,
                    id,
                    reason: e.to_string(),
                }),
            }
        }
        list
    }
}

#[async_trait]
pub trait FurreverClient: Send + Sync + 'static {
    /// List every pet owned by the configured user.
    async fn get_pets(&self) -> Result<RecordList<Pet>, FurreverError>;

    async fn get_pet(&self, pet_id: &str) -> Result<Pet, FurreverError>;

    /// List a pet's treatment plans, optionally filtered by status server-side.
    async fn get_treatment_plans(
        &self,
        pet_id: &str,
        status: Option<PlanStatus>,
    ) -> Result<RecordList<TreatmentPlan>, FurreverError>;

    async fn get_scheduled_tasks(
        &self,
        pet_id: &str,
    ) -> Result<RecordList<ScheduledTask>, FurreverError>;

    /// Pending tasks scheduled from now on, soonest first.
    async fn get_upcoming_tasks(
        &self,
        pet_id: &str,
        limit: Option<u32>,
    ) -> Result<RecordList<ScheduledTask>, FurreverError>;

    async fn update_task_status(
        &self,
        pet_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<(), FurreverError>;

    async fn update_plan_progress(
        &self,
        pet_id: &str,
        plan_id: &str,
        progress: u8,
    ) -> Result<(), FurreverError>;
}
