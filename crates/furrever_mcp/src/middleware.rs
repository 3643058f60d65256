//! Logging and metrics around every backend call.

use std::sync::Arc;
use std::time::Instant;

use furrever_client::{
    FurreverClient, FurreverError, Pet, PlanStatus, RecordList, ScheduledTask, TaskStatus,
    TreatmentPlan,
};
use tracing::debug;

pub const REQUESTS_TOTAL: &str = "furrever_client_requests_total";
pub const REQUEST_SECONDS: &str = "furrever_client_request_seconds";

/// Wraps a [`FurreverClient`], logging each call and recording
/// `furrever_client_requests_total{op,outcome}` and `furrever_client_request_seconds{op}`.
#[derive(Clone)]
pub struct LoggingMiddleware<C: FurreverClient> {
    inner: Arc<C>,
}

impl<C: FurreverClient> LoggingMiddleware<C> {
    pub fn new(client: C) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }

    async fn with_logging<F, Fut, T>(&self, operation: F, name: &'static str) -> Result<T, FurreverError>
    where
        F: FnOnce(Arc<C>) -> Fut,
        Fut: std::future::Future<Output = Result<T, FurreverError>>,
    {
        let start = Instant::now();
        debug!("Starting operation: {}", name);

        let result = operation(self.inner.clone()).await;

        let duration = start.elapsed();
        let outcome = match &result {
            Ok(_) => {
                debug!("Operation completed successfully: {} in {:?}", name, duration);
                "ok"
            }
            Err(e) => {
                debug!("Operation failed: {} in {:?} - error: {}", name, duration, e);
                "error"
            }
        };
        metrics::counter!(REQUESTS_TOTAL, "op" => name, "outcome" => outcome).increment(1);
        metrics::histogram!(REQUEST_SECONDS, "op" => name).record(duration.as_secs_f64());

        result
    }
}

#[async_trait::async_trait]
impl<C: FurreverClient + 'static> FurreverClient for LoggingMiddleware<C> {
    async fn get_pets(&self) -> Result<RecordList<Pet>, FurreverError> {
        self.with_logging(|client| async move { client.get_pets().await }, "get_pets")
            .await
    }

    async fn get_pet(&self, pet_id: &str) -> Result<Pet, FurreverError> {
        self.with_logging(
            |client| async move { client.get_pet(pet_id).await },
            "get_pet",
        )
        .await
    }

    async fn get_treatment_plans(
        &self,
        pet_id: &str,
        status: Option<PlanStatus>,
    ) -> Result<RecordList<TreatmentPlan>, FurreverError> {
        self.with_logging(
            |client| async move { client.get_treatment_plans(pet_id, status).await },
            "get_treatment_plans",
        )
        .await
    }

    async fn get_scheduled_tasks(
        &self,
        pet_id: &str,
    ) -> Result<RecordList<ScheduledTask>, FurreverError> {
        self.with_logging(
            |client| async move { client.get_scheduled_tasks(pet_id).await },
            "get_scheduled_tasks",
        )
        .await
    }

    async fn get_upcoming_tasks(
        &self,
        pet_id: &str,
        limit: Option<u32>,
    ) -> Result<RecordList<ScheduledTask>, FurreverError> {
        self.with_logging(
            |client| async move { client.get_upcoming_tasks(pet_id, limit).await },
            "get_upcoming_tasks",
        )
        .await
    }

    async fn update_task_status(
        &self,
        pet_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<(), FurreverError> {
        self.with_logging(
            |client| async move { client.update_task_status(pet_id, task_id, status).await },
            "update_task_status",
        )
        .await
    }

    async fn update_plan_progress(
        &self,
        pet_id: &str,
        plan_id: &str,
        progress: u8,
    ) -> Result<(), FurreverError> {
        self.with_logging(
            |client| async move { client.update_plan_progress(pet_id, plan_id, progress).await },
            "update_plan_progress",
        )
        .await
    }
}
