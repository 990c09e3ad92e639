//! Travel assistant HTTP server
//!
//! Axum server exposing `/health` and `/ask` over an agent whose tools are
//! discovered on remote MCP servers at startup.

mod bootstrap;
mod config;
mod handlers;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_mcp::HttpConnector;

use crate::bootstrap::Bootstrap;
use crate::config::ServerConfig;
use crate::handlers::{ask, health_check, reload};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment first so RUST_LOG may come from .env
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        provider = %config.provider.kind(),
        model = %config.provider.model(),
        servers = config.servers.len(),
        "Configuration loaded"
    );
    for endpoint in &config.servers {
        tracing::info!("  MCP server: {}", endpoint);
    }

    let provider = config.provider.clone().build().context("failed to create LLM provider")?;
    let bootstrap = Arc::new(Bootstrap::new(
        &config,
        Arc::new(HttpConnector::default()),
        Arc::clone(&provider),
    ));

    let state = AppState::new(config.llm_timeout).with_bootstrap(Arc::clone(&bootstrap));

    // Bind before initializing so /health answers while tools load
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tokio::spawn(initialize(state.clone(), bootstrap, provider));

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Travel assistant running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health - Health check and tool list");
    tracing::info!("  POST /ask    - Ask the travel assistant");
    tracing::info!("  POST /reload - Reload MCP tools");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Probe the provider, load tools and install the agent
async fn initialize(state: AppState, bootstrap: Arc<Bootstrap>, provider: Arc<dyn LlmProvider>) {
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to LLM provider");
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::debug!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ LLM provider not available - queries will fail until it is");
        }
    }

    let context = bootstrap.build().await;
    if context.tools.is_empty() {
        tracing::warn!("⚠ No MCP tools available - the agent can only answer \"I don't know\"");
    }
    state.install(context);
    tracing::info!("Agent initialized");
}

fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/ask", post(ask))
        .route("/reload", post(reload))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
