// =============================================================================
// Market Analyst — Main Entry Point
// =============================================================================
//
// Serves the analysis API and, when enabled, refreshes the dashboard from
// live market data in the background. A missing generation key does not stop
// the server: analysis requests answer 503 until one is configured.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod api;
mod app_state;
mod generation;
mod indicators;
mod market_data;
mod poller;
mod runtime_config;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::cache::AnalysisCache;
use crate::analysis::orchestrator::AnalysisOrchestrator;
use crate::app_state::AppState;
use crate::generation::GroqClient;
use crate::market_data::{CoinGeckoClient, FearGreedClient};
use crate::runtime_config::{AnalystConfig, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Market Analyst — starting up");

    let config_path =
        std::env::var("ANALYST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = AnalystConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AnalystConfig::default()
    });
    config.apply_env_overrides();

    info!(
        coin_id = %config.coin_id,
        model = %config.model,
        cache_ttl_secs = config.cache_ttl_secs,
        request_timeout_secs = config.request_timeout_secs,
        "Configuration resolved"
    );

    // ── 2. Clients ───────────────────────────────────────────────────────
    let groq_key = std::env::var("GROQ_API_KEY").unwrap_or_default();
    if groq_key.trim().is_empty() {
        warn!("GROQ_API_KEY is not set — analysis requests will be rejected");
    }
    let generator = Arc::new(GroqClient::new(groq_key, config.generation_base_url.clone())?);

    let coingecko = Arc::new(CoinGeckoClient::new(
        std::env::var("COINGECKO_API_KEY").ok(),
    )?);
    if !coingecko.has_key() {
        warn!("COINGECKO_API_KEY is not set — dashboard refresh disabled");
    }
    let fear_greed = Arc::new(FearGreedClient::new()?);

    // ── 3. Build shared state ────────────────────────────────────────────
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        generator,
        AnalysisCache::new(config.cache_ttl()),
        config.orchestrator_settings(),
    ));
    let poller_enabled = config.poller_enabled;
    let state = Arc::new(AppState::new(config, orchestrator));

    // ── 4. Dashboard poller ──────────────────────────────────────────────
    if poller_enabled {
        tokio::spawn(poller::run_dashboard_poller(
            state.clone(),
            coingecko,
            fear_greed,
        ));
    } else {
        info!("Dashboard poller disabled by config");
    }

    // ── 5. Start the API server ──────────────────────────────────────────
    let bind_addr =
        std::env::var("ANALYST_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    // ── 6. Serve until Ctrl+C ────────────────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            warn!("Shutdown signal received — stopping gracefully");
        })
        .await?;

    info!(
        cache_entries = state.orchestrator.cache_len(),
        uptime_secs = state.uptime_secs(),
        "Market Analyst shut down complete."
    );
    Ok(())
}
