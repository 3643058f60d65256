//! Fetch layer: concurrent per-pet fetches and the cached timeline session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::try_join_all;
use tokio::sync::Mutex;
use tracing::{debug, info};

use furrever_client::{FurreverClient, Pet};

use crate::config::TimelineConfig;
use crate::domains::normalize::{NormalizeOptions, Normalized, normalize_lists, rejected_pets};
use crate::domains::timeline::{TimelineQuery, WeekWindow, aggregate, window_for};
use crate::error::{TimelineError, TimelineResult};
use crate::types::{RecordIssue, TimelineEvent, TimelineView};

/// Everything one fetch cycle produced. Never mutated after creation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub pets: Vec<Pet>,
    /// Pet the fetch was scoped to, `None` for all pets.
    pub pet_id: Option<String>,
    pub events: Vec<TimelineEvent>,
    pub issues: Vec<RecordIssue>,
}

/// Fetch pets, then every selected pet's plans and tasks concurrently.
///
/// Output order is deterministic: pets in backend order, plans before tasks.
pub async fn fetch_snapshot(
    client: &dyn FurreverClient,
    pet_id: Option<&str>,
    opts: &NormalizeOptions,
) -> TimelineResult<Snapshot> {
    let pets = client.get_pets().await?;
    let selected: Vec<&Pet> = match pet_id {
        Some(id) => {
            let pet = pets
                .records
                .iter()
                .find(|p| p.pet_id == id)
                .ok_or_else(|| TimelineError::InvalidRequest(format!("unknown pet: {id}")))?;
            vec![pet]
        }
        None => pets.records.iter().collect(),
    };

    let per_pet = try_join_all(selected.into_iter().map(|pet| async move {
        let (plans, tasks) = tokio::try_join!(
            client.get_treatment_plans(&pet.pet_id, None),
            client.get_scheduled_tasks(&pet.pet_id),
        )?;
        debug!(
            pet_id = %pet.pet_id,
            plans = plans.records.len(),
            tasks = tasks.records.len(),
            rejected = plans.rejected.len() + tasks.rejected.len(),
            "fetched pet records"
        );
        Ok::<_, TimelineError>(normalize_lists(pet, &plans, &tasks, opts))
    }))
    .await?;

    let mut merged = Normalized::default();
    for n in per_pet {
        merged.extend(n);
    }
    let unreadable_pets = pets
        .rejected
        .iter()
        .filter(|r| pet_id.is_none() || r.id.as_deref() == pet_id)
        .cloned()
        .collect::<Vec<_>>();
    merged.issues.extend(rejected_pets(&unreadable_pets));
    Ok(Snapshot {
        pet_id: pet_id.map(str::to_string),
        pets: pets.records,
        events: merged.events,
        issues: merged.issues,
    })
}

/// Identifies one fetch; only the most recently issued token may apply its result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestToken(u64);

#[derive(Debug)]
pub enum FetchOutcome {
    Applied(Arc<Snapshot>),
    /// A newer request was issued while this one was in flight; its result was discarded.
    Stale,
}

#[derive(Default)]
struct SessionState {
    window: Option<WeekWindow>,
    snapshot: Option<Arc<Snapshot>>,
}

/// Selected pet, visible week and the last applied snapshot.
///
/// Changing the pet refetches; moving the week only re-aggregates the snapshot.
#[derive(Clone)]
pub struct TimelineSession {
    client: Arc<dyn FurreverClient>,
    config: TimelineConfig,
    generation: Arc<AtomicU64>,
    state: Arc<Mutex<SessionState>>,
}

impl TimelineSession {
    pub fn new(client: Arc<dyn FurreverClient>, config: TimelineConfig) -> Self {
        Self {
            client,
            config,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Issue a new token, invalidating every earlier one.
    pub fn begin_request(&self) -> RequestToken {
        RequestToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.generation.load(Ordering::SeqCst) == token.0
    }

    /// Store `snapshot` unless a newer request has been issued since `token`.
    pub async fn apply(&self, token: RequestToken, snapshot: Snapshot) -> FetchOutcome {
        self.apply_with_window(token, snapshot, None).await
    }

    async fn apply_with_window(
        &self,
        token: RequestToken,
        snapshot: Snapshot,
        window: Option<WeekWindow>,
    ) -> FetchOutcome {
        let mut state = self.state.lock().await;
        if !self.is_current(token) {
            debug!(?token, "discarding stale timeline response");
            return FetchOutcome::Stale;
        }
        let snapshot = Arc::new(snapshot);
        state.snapshot = Some(snapshot.clone());
        if window.is_some() {
            state.window = window;
        }
        FetchOutcome::Applied(snapshot)
    }

    /// Fetch and apply a snapshot scoped to `pet_id`.
    ///
    /// Errors of a request that has already been superseded are swallowed as `Stale`.
    pub async fn refresh(&self, pet_id: Option<&str>) -> TimelineResult<FetchOutcome> {
        self.fetch_and_apply(pet_id, None).await
    }

    async fn fetch_and_apply(
        &self,
        pet_id: Option<&str>,
        window: Option<WeekWindow>,
    ) -> TimelineResult<FetchOutcome> {
        let token = self.begin_request();
        let opts = NormalizeOptions::from(&self.config);
        match fetch_snapshot(self.client.as_ref(), pet_id, &opts).await {
            Ok(snapshot) => {
                info!(
                    pet_id = pet_id.unwrap_or("*"),
                    events = snapshot.events.len(),
                    skipped = snapshot.issues.len(),
                    "timeline fetched"
                );
                Ok(self.apply_with_window(token, snapshot, window).await)
            }
            Err(_) if !self.is_current(token) => Ok(FetchOutcome::Stale),
            Err(e) => Err(e),
        }
    }

    /// Fetch for `pet_id` and show the week containing `week_of` (current week when `None`).
    ///
    /// Returns the view of this request's own snapshot, or `Superseded` when a newer
    /// request replaced it before it could be applied.
    pub async fn load(
        &self,
        pet_id: Option<&str>,
        week_of: Option<&str>,
    ) -> TimelineResult<(TimelineView, Vec<RecordIssue>)> {
        let window = window_for(week_of, self.config.now_local().date())?;
        self.show(pet_id, window).await
    }

    /// Switch pet, keeping the visible week.
    pub async fn select_pet(
        &self,
        pet_id: Option<&str>,
    ) -> TimelineResult<(TimelineView, Vec<RecordIssue>)> {
        let window = self.state.lock().await.window;
        let window = match window {
            Some(w) => w,
            None => window_for(None, self.config.now_local().date())?,
        };
        self.show(pet_id, window).await
    }

    async fn show(
        &self,
        pet_id: Option<&str>,
        window: WeekWindow,
    ) -> TimelineResult<(TimelineView, Vec<RecordIssue>)> {
        match self.fetch_and_apply(pet_id, Some(window)).await? {
            FetchOutcome::Applied(snapshot) => Ok(self.view_of(&snapshot, window)),
            FetchOutcome::Stale => Err(TimelineError::Superseded),
        }
    }

    /// Move the visible week by `weeks`; never refetches.
    pub async fn navigate(&self, weeks: i64) -> TimelineResult<(TimelineView, Vec<RecordIssue>)> {
        let mut state = self.state.lock().await;
        let snapshot = state.snapshot.clone().ok_or_else(|| {
            TimelineError::InvalidRequest(
                "no timeline loaded yet; call get_wellness_timeline first".into(),
            )
        })?;
        let window = match state.window {
            Some(w) => w,
            None => window_for(None, self.config.now_local().date())?,
        };
        let moved = window.shift(weeks).ok_or_else(|| {
            TimelineError::InvalidRequest(format!(
                "cannot move {weeks} weeks from {}",
                window.start()
            ))
        })?;
        state.window = Some(moved);
        drop(state);
        Ok(self.view_of(&snapshot, moved))
    }

    /// Refetch with the current scope if a timeline is loaded. Used after writes.
    pub async fn reload_if_loaded(&self) -> TimelineResult<()> {
        let scope = {
            let state = self.state.lock().await;
            match &state.snapshot {
                Some(s) => s.pet_id.clone(),
                None => return Ok(()),
            }
        };
        self.refresh(scope.as_deref()).await.map(|_| ())
    }

    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.lock().await.snapshot.clone()
    }

    /// Aggregate the cached snapshot for the current window.
    pub async fn current(&self) -> TimelineResult<(TimelineView, Vec<RecordIssue>)> {
        let (snapshot, window) = {
            let state = self.state.lock().await;
            (state.snapshot.clone(), state.window)
        };
        let snapshot = snapshot
            .ok_or_else(|| TimelineError::InvalidRequest("no timeline loaded yet".into()))?;
        let window = match window {
            Some(w) => w,
            None => window_for(None, self.config.now_local().date())?,
        };
        Ok(self.view_of(&snapshot, window))
    }

    fn view_of(&self, snapshot: &Snapshot, window: WeekWindow) -> (TimelineView, Vec<RecordIssue>) {
        let query = TimelineQuery {
            pet_id: snapshot.pet_id.clone(),
            window,
            now: self.config.now_local(),
            upcoming_limit: self.config.upcoming_limit,
        };
        (aggregate(&snapshot.events, &query), snapshot.issues.clone())
    }
}
