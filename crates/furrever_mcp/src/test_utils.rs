//! Shared test fixtures and a mock `FurreverClient` used by unit tests.
#![cfg(test)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use furrever_client::{
    FurreverClient, FurreverError, Pet, PlanStatus, RecordList, ScheduledTask, TaskStatus,
    TreatmentPlan,
};
use serde_json::json;

/// In-memory backend with two pets.
///
/// p1 "Buddy": plan pl1 (2024-01-01..03, 50%), a plan with a broken start date,
/// tasks t1 (medication, pending) and t2 (unknown type, completed) on 2024-01-02.
/// p2 "Whiskers": task t3 (feeding) on 2024-01-04.
#[derive(Default)]
pub struct MockClient {
    pets: Vec<Pet>,
    plans: HashMap<String, Vec<TreatmentPlan>>,
    tasks: HashMap<String, Vec<ScheduledTask>>,
    delays: HashMap<String, Duration>,
    failing: Option<String>,
    per_pet_calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    pub writes: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn with_fixture() -> Self {
        let pets: Vec<Pet> = serde_json::from_value(json!([
            {"petID": "p1", "name": "Buddy", "species": "Dog"},
            {"petID": "p2", "name": "Whiskers", "species": "Cat"}
        ]))
        .expect("pets fixture");
        let p1_plans: Vec<TreatmentPlan> = serde_json::from_value(json!([
            {"planID": "pl1", "name": "Skin Allergy Management", "startDate": "2024-01-01T00:00:00Z",
             "endDate": "2024-01-03T00:00:00Z", "status": "ACTIVE", "progressPercentage": 50},
            {"planID": "bad", "name": "Broken", "startDate": "not-a-date"}
        ]))
        .expect("plans fixture");
        let p1_tasks: Vec<ScheduledTask> = serde_json::from_value(json!([
            {"taskID": "t1", "taskType": "MEDICATION", "description": "Morning meds",
             "scheduledDateTime": "2024-01-02T08:00:00.000Z", "status": "PENDING"},
            {"taskID": "t2", "taskType": "UNKNOWN_TYPE", "description": "Brush teeth",
             "scheduledDateTime": "2024-01-02T08:00:00.000Z", "status": "COMPLETED"}
        ]))
        .expect("tasks fixture");
        let p2_tasks: Vec<ScheduledTask> = serde_json::from_value(json!([
            {"taskID": "t3", "taskType": "FEEDING", "description": "Dinner",
             "scheduledDateTime": "2024-01-04T07:30:00Z", "status": "PENDING"}
        ]))
        .expect("tasks fixture");

        Self {
            pets,
            plans: HashMap::from([("p1".to_string(), p1_plans)]),
            tasks: HashMap::from([("p1".to_string(), p1_tasks), ("p2".to_string(), p2_tasks)]),
            ..Default::default()
        }
    }

    /// Delay every per-pet request for `pet_id`.
    pub fn delay_pet(mut self, pet_id: &str, delay: Duration) -> Self {
        self.delays.insert(pet_id.to_string(), delay);
        self
    }

    /// Fail every per-pet request for `pet_id` with a 503.
    pub fn failing_pet(mut self, pet_id: &str) -> Self {
        self.failing = Some(pet_id.to_string());
        self
    }

    pub fn calls_for(&self, pet_id: &str) -> usize {
        self.per_pet_calls
            .lock()
            .unwrap()
            .get(pet_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    async fn enter(&self, pet_id: &str) -> Result<(), FurreverError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .per_pet_calls
            .lock()
            .unwrap()
            .entry(pet_id.to_string())
            .or_default() += 1;
        if let Some(delay) = self.delays.get(pet_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.as_deref() == Some(pet_id) {
            return Err(FurreverError::from_status(503, "unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl FurreverClient for MockClient {
    async fn get_pets(&self) -> Result<RecordList<Pet>, FurreverError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        Ok(self.pets.clone().into())
    }

    async fn get_pet(&self, pet_id: &str) -> Result<Pet, FurreverError> {
        self.enter(pet_id).await?;
        self.pets
            .iter()
            .find(|p| p.pet_id == pet_id)
            .cloned()
            .ok_or_else(|| FurreverError::NotFound(pet_id.to_string()))
    }

    async fn get_treatment_plans(
        &self,
        pet_id: &str,
        status: Option<PlanStatus>,
    ) -> Result<RecordList<TreatmentPlan>, FurreverError> {
        self.enter(pet_id).await?;
        let plans = self.plans.get(pet_id).cloned().unwrap_or_default();
        Ok(match status {
            Some(s) => plans
                .into_iter()
                .filter(|p| p.status == Some(s))
                .collect::<Vec<_>>()
                .into(),
            None => plans.into(),
        })
    }

    async fn get_scheduled_tasks(
        &self,
        pet_id: &str,
    ) -> Result<RecordList<ScheduledTask>, FurreverError> {
        self.enter(pet_id).await?;
        Ok(self.tasks.get(pet_id).cloned().unwrap_or_default().into())
    }

    async fn get_upcoming_tasks(
        &self,
        pet_id: &str,
        limit: Option<u32>,
    ) -> Result<RecordList<ScheduledTask>, FurreverError> {
        self.enter(pet_id).await?;
        Ok(self
            .tasks
            .get(pet_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|t| t.status == Some(TaskStatus::Pending))
            .take(limit.unwrap_or(5) as usize)
            .collect::<Vec<_>>()
            .into())
    }

    async fn update_task_status(
        &self,
        pet_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<(), FurreverError> {
        self.enter(pet_id).await?;
        self.writes
            .lock()
            .unwrap()
            .push(format!("{pet_id}/{task_id}={}", status.as_str()));
        Ok(())
    }

    async fn update_plan_progress(
        &self,
        pet_id: &str,
        plan_id: &str,
        progress: u8,
    ) -> Result<(), FurreverError> {
        self.enter(pet_id).await?;
        self.writes
            .lock()
            .unwrap()
            .push(format!("{pet_id}/{plan_id}={progress}"));
        Ok(())
    }
}
