use axum::debug_handler;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use furrever_client::config::Config;
use furrever_client::http_client::ReqwestFurreverClient;
use furrever_client::{FurreverClient, FurreverError, Pet};
use furrever_mcp::domains::normalize::NormalizeOptions;
use furrever_mcp::domains::timeline::{TimelineQuery, aggregate, window_for};
use furrever_mcp::middleware::LoggingMiddleware;
use furrever_mcp::{FurreverMcpHandler, TimelineConfig, TimelineError, TimelineResponse, fetch_snapshot};

struct AppState {
    client: Arc<dyn FurreverClient>,
    timeline: TimelineConfig,
    metrics: PrometheusHandle,
}

#[derive(Debug, Deserialize)]
struct TimelineQueryParams {
    pet_id: Option<String>,
    week_of: Option<String>,
}

#[debug_handler]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[debug_handler]
async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.metrics.render();
    ([("content-type", "text/plain; version=0.0.4")], body)
}

#[debug_handler]
async fn get_pets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Pet>>, (StatusCode, String)> {
    state
        .client
        .get_pets()
        .await
        .map(|pets| Json(pets.records))
        .map_err(|e| map_err(e.into()))
}

/// One fetch-and-aggregate cycle per request; nothing is cached between requests.
#[debug_handler]
async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimelineQueryParams>,
) -> Result<Json<TimelineResponse>, (StatusCode, String)> {
    let now = state.timeline.now_local();
    let window = window_for(params.week_of.as_deref(), now.date()).map_err(map_err)?;
    let opts = NormalizeOptions::from(&state.timeline);
    let snapshot = fetch_snapshot(state.client.as_ref(), params.pet_id.as_deref(), &opts)
        .await
        .map_err(map_err)?;
    let query = TimelineQuery {
        pet_id: snapshot.pet_id.clone(),
        window,
        now,
        upcoming_limit: state.timeline.upcoming_limit,
    };
    Ok(Json(TimelineResponse {
        timeline: aggregate(&snapshot.events, &query),
        skipped: snapshot.issues,
    }))
}

fn map_err(e: TimelineError) -> (StatusCode, String) {
    let status = match &e {
        TimelineError::Fetch(FurreverError::Auth(_)) => StatusCode::UNAUTHORIZED,
        TimelineError::Fetch(FurreverError::NotFound(_)) => StatusCode::NOT_FOUND,
        TimelineError::Fetch(_) => StatusCode::BAD_GATEWAY,
        TimelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        TimelineError::Superseded => StatusCode::CONFLICT,
        TimelineError::Parse { .. } | TimelineError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

/// Request timeout from `FURREVER_HTTP_TIMEOUT_SECS`, 30 seconds when unset or invalid.
fn request_timeout(raw: Option<&str>) -> Duration {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(30))
}


#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Configure logging from env var `FURREVER_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("FURREVER_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(format!("{log_env},rmcp=warn"))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmcp=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!(%log_env, "furrever_mcp:http: log filter");

    let handle = PrometheusBuilder::new().install_recorder()?;

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(%e, "missing credentials; aborting startup");
            std::process::exit(1);
        }
    };
    let timeline = TimelineConfig::from_env()?;

    let client: Arc<dyn FurreverClient> = Arc::new(LoggingMiddleware::new(
        ReqwestFurreverClient::from_config(&config),
    ));
    let state = Arc::new(AppState {
        client: client.clone(),
        timeline: timeline.clone(),
        metrics: handle,
    });

    // rmcp StreamableHttpService mounted at /mcp; one handler (and session) per MCP session
    let factory = move || -> Result<_, std::io::Error> {
        Ok(FurreverMcpHandler::with_config(client.clone(), timeline.clone()))
    };
    let session = Arc::new(
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default(),
    );
    let mcp_service = rmcp::transport::streamable_http_server::tower::StreamableHttpService::new(
        factory,
        session,
        rmcp::transport::streamable_http_server::tower::StreamableHttpServerConfig::default(),
    );

    let timeout = request_timeout(std::env::var("FURREVER_HTTP_TIMEOUT_SECS").ok().as_deref());
    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/pets", get(get_pets))
        .route("/timeline", get(get_timeline))
        .nest_service("/mcp", mcp_service)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .with_state(state);

    let addr: SocketAddr = std::env::var("ADDRESS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));
    info!(%addr, timeout_secs = timeout.as_secs(), "starting HTTP server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };

    let server = axum::serve(listener, app.into_make_service());
    if let Err(e) = server
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("failed to install ctrl+c handler: {e}");
            }
        })
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
