//! HTTP client implementation for the FurreverCare REST backend.
//!
//! This module provides a reqwest-based implementation of the [`FurreverClient`](crate::FurreverClient) trait.

use crate::config::Config;
use crate::retry::RetryPolicy;
use crate::{
    FurreverClient, FurreverError, Pet, PlanStatus, RecordList, ScheduledTask, TaskStatus,
    TreatmentPlan,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

/// Client for the FurreverCare API using reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestFurreverClient {
    base_url: String,
    user_id: String,
    api_token: SecretString,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl ReqwestFurreverClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - The API root (e.g., "https://furrevercare-deploy-8.onrender.com/api")
    /// * `user_id` - The user whose pets are read
    /// * `api_token` - Bearer token issued by the auth provider
    pub fn new(base_url: &str, user_id: impl Into<String>, api_token: SecretString) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.into(),
            api_token,
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.base_url, config.user_id.clone(), config.api_token.clone())
            .with_retry(RetryPolicy::with_retries(config.max_retries))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// `{base}/users/{user}/pets/{segments..}`, each segment percent-encoded on its own.
    fn pets_url(&self, segments: &[&str]) -> Result<reqwest::Url, FurreverError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| FurreverError::Config(format!("invalid base url '{}': {e}", self.base_url)))?;
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                FurreverError::Config(format!("base url cannot carry a path: '{}'", self.base_url))
            })?;
            path.pop_if_empty()
                .push("users")
                .push(&self.user_id)
                .push("pets")
                .extend(segments);
        }
        Ok(url)
    }

    fn pet_url(&self, pet_id: &str, rest: &[&str]) -> Result<reqwest::Url, FurreverError> {
        check_id("pet id", pet_id)?;
        let mut segments = vec![pet_id];
        segments.extend_from_slice(rest);
        self.pets_url(&segments)
    }

    /// Build an authenticated GET request.
    fn get_request(&self, url: reqwest::Url) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(self.api_token.expose_secret())
    }

    /// Build an authenticated PATCH request.
    fn patch_request(&self, url: reqwest::Url) -> reqwest::RequestBuilder {
        self.client
            .patch(url)
            .bearer_auth(self.api_token.expose_secret())
    }

    /// GET a JSON body, retrying per policy.
    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &reqwest::Url,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T, FurreverError> {
        self.retry
            .retry_async_when(
                move || async move {
                    let resp = self.get_request(url.clone()).query(query).send().await?;
                    self.handle_response(resp, what).await
                },
                FurreverError::is_retryable,
            )
            .await
    }

    /// GET a JSON array and decode it record by record.
    async fn fetch_list<T: serde::de::DeserializeOwned>(
        &self,
        url: &reqwest::Url,
        query: &[(&str, String)],
        what: &str,
        id_field: &str,
    ) -> Result<RecordList<T>, FurreverError> {
        let values: Vec<serde_json::Value> = self.fetch_json(url, query, what).await?;
        let list = RecordList::decode(values, id_field);
        if !list.rejected.is_empty() {
            tracing::warn!(
                what,
                decoded = list.records.len(),
                rejected = list.rejected.len(),
                "some records did not decode"
            );
        }
        Ok(list)
    }

    /// Execute a request with no expected response body.
    async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), FurreverError> {
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(self.error_from_response(resp).await);
        }
        Ok(())
    }

    /// Handle a response, converting status codes to appropriate errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
        what: &str,
    ) -> Result<T, FurreverError> {
        if !resp.status().is_success() {
            return Err(self.error_from_response(resp).await);
        }
        // Read body as text first so a shape mismatch reports what came back.
        let text = resp.text().await?;
        serde_json::from_str::<T>(&text).map_err(|e| {
            let body_snippet: String = text.chars().take(256).collect();
            FurreverError::Decode {
                what: what.to_string(),
                message: format!("{e} - body: {body_snippet}"),
            }
        })
    }

    /// Extract error information from a failed response.
    async fn error_from_response(&self, resp: reqwest::Response) -> FurreverError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();

        match status {
            404 => FurreverError::NotFound(body_snippet),
            401 | 403 => FurreverError::Auth(body_snippet),
            400 | 422 => FurreverError::InvalidInput(body_snippet),
            _ => FurreverError::from_status(status, body_snippet),
        }
    }
}

/// Ids become single path segments; empty and dot segments would change the path.
fn check_id(what: &str, id: &str) -> Result<(), FurreverError> {
    if id.trim().is_empty() || id == "." || id == ".." {
        return Err(FurreverError::InvalidInput(format!("invalid {what}: '{id}'")));
    }
    Ok(())
}

#[async_trait]
impl FurreverClient for ReqwestFurreverClient {
    async fn get_pets(&self) -> Result<RecordList<Pet>, FurreverError> {
        self.fetch_list(&self.pets_url(&[])?, &[], "pets", "petID")
            .await
    }

    async fn get_pet(&self, pet_id: &str) -> Result<Pet, FurreverError> {
        self.fetch_json(&self.pet_url(pet_id, &[])?, &[], "pet")
            .await
    }

    async fn get_treatment_plans(
        &self,
        pet_id: &str,
        status: Option<PlanStatus>,
    ) -> Result<RecordList<TreatmentPlan>, FurreverError> {
        let url = self.pet_url(pet_id, &["treatmentPlans"])?;
        let mut query = Vec::new();
        if let Some(s) = status {
            query.push(("status", s.as_str().to_string()));
        }
        self.fetch_list(&url, &query, "treatment plans", "planID")
            .await
    }

    async fn get_scheduled_tasks(
        &self,
        pet_id: &str,
    ) -> Result<RecordList<ScheduledTask>, FurreverError> {
        let url = self.pet_url(pet_id, &["scheduledTasks"])?;
        self.fetch_list(&url, &[], "scheduled tasks", "taskID")
            .await
    }

    async fn get_upcoming_tasks(
        &self,
        pet_id: &str,
        limit: Option<u32>,
    ) -> Result<RecordList<ScheduledTask>, FurreverError> {
        let url = self.pet_url(pet_id, &["scheduledTasks", "upcoming"])?;
        let query = [("limit", limit.unwrap_or(5).to_string())];
        self.fetch_list(&url, &query, "upcoming tasks", "taskID")
            .await
    }

    async fn update_task_status(
        &self,
        pet_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> Result<(), FurreverError> {
        if status == TaskStatus::Unknown {
            return Err(FurreverError::InvalidInput("unknown task status".into()));
        }
        check_id("task id", task_id)?;
        let url = self.pet_url(pet_id, &["scheduledTasks", task_id, "status"])?;
        let query = [("status", status.as_str())];
        self.execute_empty(self.patch_request(url).query(&query))
            .await
    }

    async fn update_plan_progress(
        &self,
        pet_id: &str,
        plan_id: &str,
        progress: u8,
    ) -> Result<(), FurreverError> {
        if progress > 100 {
            return Err(FurreverError::InvalidInput(format!(
                "progress must be within 0..=100, got {progress}"
            )));
        }
        check_id("plan id", plan_id)?;
        let url = self.pet_url(pet_id, &["treatmentPlans", plan_id, "progress"])?;
        let body = serde_json::json!({ "progress": progress });
        self.execute_empty(self.patch_request(url).json(&body))
            .await
    }
}
