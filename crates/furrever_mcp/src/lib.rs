use std::sync::Arc;

use rmcp::Json;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router};

use furrever_client::{FurreverClient, RecordList};

pub mod config;
pub mod domains;
pub mod error;
pub mod middleware;
pub mod services;
mod test_utils;
pub mod types;

pub use config::{MissingProgress, TimelineConfig};
pub use error::{TimelineError, TimelineResult};
pub use services::{FetchOutcome, RequestToken, Snapshot, TimelineSession, fetch_snapshot};
pub use types::*;

use crate::domains::normalize::NormalizeOptions;

#[derive(Clone)]
pub struct FurreverMcpHandler {
    client: Arc<dyn FurreverClient>,
    session: TimelineSession,
    tool_router: rmcp::handler::server::tool::ToolRouter<FurreverMcpHandler>,
}

#[tool_router]
impl FurreverMcpHandler {
    pub fn new(client: Arc<dyn FurreverClient>) -> Self {
        Self::with_config(client, TimelineConfig::default())
    }

    pub fn with_config(client: Arc<dyn FurreverClient>, config: TimelineConfig) -> Self {
        Self {
            session: TimelineSession::new(client.clone(), config),
            client,
            tool_router: Self::tool_router(),
        }
    }

    pub fn tool_count(&self) -> usize {
        self.tool_router.list_all().len()
    }

    pub fn session(&self) -> &TimelineSession {
        &self.session
    }

    #[tool(name = "list_pets", description = "List the user's pets")]
    async fn list_pets(&self) -> Result<Json<PetsResult>, String> {
        let pets = self.client.get_pets().await.map_err(|e| e.to_string())?;
        Ok(Json(PetsResult {
            skipped: domains::normalize::rejected_pets(&pets.rejected),
            pets: pets.records,
        }))
    }

    #[tool(
        name = "get_wellness_timeline",
        description = "Fetch treatment plans and scheduled tasks and group them into a Monday-aligned week with progress statistics"
    )]
    async fn get_wellness_timeline(
        &self,
        params: Parameters<TimelineParams>,
    ) -> Result<Json<TimelineResponse>, String> {
        let p = params.0;
        let (timeline, skipped) = self
            .session
            .load(p.pet_id.as_deref(), p.week_of.as_deref())
            .await?;
        Ok(Json(TimelineResponse { timeline, skipped }))
    }

    #[tool(
        name = "select_pet",
        description = "Focus the timeline on one pet (or all pets when pet_id is omitted), keeping the visible week"
    )]
    async fn select_pet(
        &self,
        params: Parameters<SelectPetParams>,
    ) -> Result<Json<TimelineResponse>, String> {
        let (timeline, skipped) = self.session.select_pet(params.0.pet_id.as_deref()).await?;
        Ok(Json(TimelineResponse { timeline, skipped }))
    }

    #[tool(
        name = "navigate_week",
        description = "Move the visible week forward or back without refetching"
    )]
    async fn navigate_week(
        &self,
        params: Parameters<NavigateParams>,
    ) -> Result<Json<TimelineResponse>, String> {
        let p = params.0;
        let weeks = i64::from(p.weeks.unwrap_or(1));
        let delta = match p.direction {
            WeekNavigation::Next => weeks,
            WeekNavigation::Prev => -weeks,
        };
        let (timeline, skipped) = self.session.navigate(delta).await?;
        Ok(Json(TimelineResponse { timeline, skipped }))
    }

    #[tool(
        name = "get_upcoming_tasks",
        description = "Next pending scheduled tasks for a pet, soonest first"
    )]
    async fn get_upcoming_tasks(
        &self,
        params: Parameters<UpcomingParams>,
    ) -> Result<Json<UpcomingResult>, String> {
        let p = params.0;
        let (pet, tasks) = tokio::try_join!(
            self.client.get_pet(&p.pet_id),
            self.client.get_upcoming_tasks(&p.pet_id, p.limit),
        )
        .map_err(|e| e.to_string())?;

        let opts = NormalizeOptions::from(self.session.config());
        let normalized = domains::normalize_lists(&pet, &RecordList::default(), &tasks, &opts);
        Ok(Json(UpcomingResult {
            pet_id: pet.pet_id,
            tasks: normalized.events,
            skipped: normalized.issues,
        }))
    }

    #[tool(
        name = "update_task_status",
        description = "Set a scheduled task's status (PENDING, COMPLETED, SKIPPED, OVERDUE)"
    )]
    async fn update_task_status(
        &self,
        params: Parameters<TaskStatusParams>,
    ) -> Result<Json<UpdateResult>, String> {
        let p = params.0;
        self.client
            .update_task_status(&p.pet_id, &p.task_id, p.status)
            .await
            .map_err(|e| e.to_string())?;
        self.session.reload_if_loaded().await?;
        Ok(Json(UpdateResult {
            ok: true,
            message: format!("task {} marked {}", p.task_id, p.status.as_str()),
        }))
    }

    #[tool(
        name = "update_plan_progress",
        description = "Set a treatment plan's progress percentage (0-100)"
    )]
    async fn update_plan_progress(
        &self,
        params: Parameters<PlanProgressParams>,
    ) -> Result<Json<UpdateResult>, String> {
        let p = params.0;
        if p.progress > 100 {
            return Err(format!("progress must be 0-100, got {}", p.progress));
        }
        self.client
            .update_plan_progress(&p.pet_id, &p.plan_id, p.progress)
            .await
            .map_err(|e| e.to_string())?;
        self.session.reload_if_loaded().await?;
        Ok(Json(UpdateResult {
            ok: true,
            message: format!("plan {} at {}%", p.plan_id, p.progress),
        }))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for FurreverMcpHandler {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo::new(
            rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
        )
        .with_instructions(
            "FurreverCare MCP server - lists pets and builds a weekly wellness timeline \
             from treatment plans and scheduled care tasks.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockClient;
    use chrono::NaiveDate;
    use furrever_client::TaskStatus;

    fn handler() -> (FurreverMcpHandler, Arc<MockClient>) {
        let client = Arc::new(MockClient::with_fixture());
        (FurreverMcpHandler::new(client.clone()), client)
    }

    #[tokio::test]
    async fn handler_registers_tools() {
        let (handler, _) = handler();
        let _clone = handler.clone();
        let tools = handler.tool_router.list_all();
        for name in [
            "list_pets",
            "get_wellness_timeline",
            "select_pet",
            "navigate_week",
            "get_upcoming_tasks",
            "update_task_status",
            "update_plan_progress",
        ] {
            assert!(tools.iter().any(|t| t.name == name), "missing tool {name}");
        }
        assert_eq!(handler.tool_count(), 7);
    }

    #[tokio::test]
    async fn list_pets_returns_backend_pets() {
        let (handler, _) = handler();
        let Json(res) = handler.list_pets().await.expect("pets");
        let names: Vec<_> = res.pets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Buddy", "Whiskers"]);
    }

    #[tokio::test]
    async fn timeline_for_week_of() {
        let (handler, _) = handler();
        let Json(res) = handler
            .get_wellness_timeline(Parameters(TimelineParams {
                pet_id: None,
                week_of: Some("2024-01-02".into()),
            }))
            .await
            .expect("timeline");
        let tl = res.timeline;
        assert_eq!(tl.week_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(tl.state, ViewState::Populated);
        assert_eq!(tl.stats.total_events, 4);
        assert_eq!(tl.stats.completed_events, 1);
        assert_eq!(tl.stats.overall_progress, 50.0);
        // plan spans Jan 1-3; both p1 tasks on Jan 2; p2 feeding on Jan 4
        let sizes: Vec<usize> = tl.days.iter().map(|d| d.total).collect();
        assert_eq!(sizes, vec![1, 3, 1, 1, 0, 0, 0]);
        let other = tl.days[1].events.iter().find(|e| e.id == "task:p1:t2").unwrap();
        assert_eq!(other.kind, EventKind::TaskOther);
        assert_eq!(res.skipped.len(), 1);
    }

    #[tokio::test]
    async fn bad_week_of_is_rejected() {
        let (handler, client) = handler();
        let err = handler
            .get_wellness_timeline(Parameters(TimelineParams {
                pet_id: None,
                week_of: Some("soon".into()),
            }))
            .await
            .err().unwrap();
        assert!(err.contains("week_of"));
        assert_eq!(client.total_calls(), 0);
    }

    #[tokio::test]
    async fn navigate_and_select() {
        let (handler, client) = handler();
        handler
            .get_wellness_timeline(Parameters(TimelineParams {
                pet_id: None,
                week_of: Some("2024-01-02".into()),
            }))
            .await
            .expect("timeline");
        let calls = client.total_calls();

        let Json(prev) = handler
            .navigate_week(Parameters(NavigateParams {
                direction: WeekNavigation::Prev,
                weeks: Some(2),
            }))
            .await
            .expect("prev");
        assert_eq!(
            prev.timeline.week_start,
            NaiveDate::from_ymd_opt(2023, 12, 18).unwrap()
        );
        assert_eq!(prev.timeline.state, ViewState::Populated);
        assert!(prev.timeline.days.iter().all(|d| d.events.is_empty()));
        assert_eq!(client.total_calls(), calls);

        let Json(sel) = handler
            .select_pet(Parameters(SelectPetParams {
                pet_id: Some("p1".into()),
            }))
            .await
            .expect("select");
        assert_eq!(sel.timeline.pet_id.as_deref(), Some("p1"));
        assert_eq!(sel.timeline.stats.total_events, 3);
        assert_eq!(client.calls_for("p2"), 2);
    }

    #[tokio::test]
    async fn navigate_week_rejects_out_of_range_jump() {
        let (handler, _) = handler();
        handler
            .get_wellness_timeline(Parameters(TimelineParams {
                pet_id: None,
                week_of: Some("2024-01-02".into()),
            }))
            .await
            .expect("timeline");

        let err = handler
            .navigate_week(Parameters(NavigateParams {
                direction: WeekNavigation::Next,
                weeks: Some(u32::MAX),
            }))
            .await
            .err().unwrap();
        assert!(err.contains("cannot move"));

        let Json(next) = handler
            .navigate_week(Parameters(NavigateParams {
                direction: WeekNavigation::Next,
                weeks: None,
            }))
            .await
            .expect("next");
        assert_eq!(
            next.timeline.week_start,
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }

    #[tokio::test]
    async fn upcoming_tasks_are_normalized() {
        let (handler, _) = handler();
        let Json(res) = handler
            .get_upcoming_tasks(Parameters(UpcomingParams {
                pet_id: "p1".into(),
                limit: Some(3),
            }))
            .await
            .expect("upcoming");
        assert_eq!(res.tasks.len(), 1);
        assert_eq!(res.tasks[0].id, "task:p1:t1");
        assert_eq!(res.tasks[0].pet_name, "Buddy");
        assert_eq!(res.tasks[0].kind, EventKind::TaskMedication);
    }

    #[tokio::test]
    async fn writes_refresh_loaded_timeline() {
        let (handler, client) = handler();
        handler
            .get_wellness_timeline(Parameters(TimelineParams {
                pet_id: Some("p2".into()),
                week_of: None,
            }))
            .await
            .expect("timeline");
        let before = client.calls_for("p2");

        let Json(res) = handler
            .update_task_status(Parameters(TaskStatusParams {
                pet_id: "p2".into(),
                task_id: "t3".into(),
                status: TaskStatus::Completed,
            }))
            .await
            .expect("update");
        assert!(res.ok);
        // one write plus plans and tasks of the reload
        assert_eq!(client.calls_for("p2"), before + 3);

        let err = handler
            .update_plan_progress(Parameters(PlanProgressParams {
                pet_id: "p1".into(),
                plan_id: "pl1".into(),
                progress: 120,
            }))
            .await
            .err().unwrap();
        assert!(err.contains("0-100"));
        assert_eq!(client.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_errors_surface_as_messages() {
        let client = Arc::new(MockClient::with_fixture().failing_pet("p1"));
        let handler = FurreverMcpHandler::new(client);
        let err = handler
            .get_wellness_timeline(Parameters(TimelineParams {
                pet_id: None,
                week_of: None,
            }))
            .await
            .err().unwrap();
        assert!(err.starts_with("fetch failed"));
    }
}
