use std::sync::Arc;

use furrever_client::config::Config;
use furrever_client::http_client::ReqwestFurreverClient;
use furrever_mcp::middleware::LoggingMiddleware;
use furrever_mcp::{FurreverMcpHandler, TimelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configure logging from env var `FURREVER_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("FURREVER_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    // Keep rmcp internals quiet unless asked for explicitly
    let combined_filter = format!("{},rmcp=warn,serve_inner=warn", log_env);
    let env_filter = tracing_subscriber::EnvFilter::try_new(combined_filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmcp=warn,serve_inner=warn"));
    // stdout carries the MCP protocol
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!("furrever_mcp: log filter: {}", log_env);

    let config = Config::from_env()?;
    let timeline = TimelineConfig::from_env()?;
    tracing::info!(
        base_url = %config.base_url,
        user_id = %config.user_id,
        utc_offset = %timeline.utc_offset,
        "furrever_mcp: configuration loaded"
    );

    let client = LoggingMiddleware::new(ReqwestFurreverClient::from_config(&config));
    let handler = FurreverMcpHandler::with_config(Arc::new(client), timeline);
    tracing::info!("furrever_mcp: registered {} tools", handler.tool_count());

    tracing::info!("furrever_mcp: starting stdio MCP server...");

    use rmcp::serve_server;
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let server = serve_server(handler, transport).await?;

    tracing::info!("furrever_mcp: service initialized as server");

    server.waiting().await?;

    Ok(())
}
