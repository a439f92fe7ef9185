// =============================================================================
// Dashboard Poller — periodic market fetch + analysis refresh
// =============================================================================
//
// Every `refresh_interval_secs`:
//   1. Skip (with a warning) if no CoinGecko key is configured.
//   2. Fetch spot price, OHLC for each distinct lookback, volumes, sentiment.
//   3. Run the analysis orchestrator on the assembled request.
//   4. Publish a DashboardSnapshot and bump the state version.
//
// A failed fetch or analysis is logged and recorded in the snapshot's
// `error` field; the loop itself never exits.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures_util::future::try_join_all;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::analysis::orchestrator::{AnalysisOrchestrator, AnalysisRequest};
use crate::app_state::{AppState, DashboardSnapshot, IndicatorPanel};
use crate::market_data::{CoinGeckoClient, FearGreedClient};
use crate::types::{Candle, Numeric};

/// Run the refresh loop forever.
pub async fn run_dashboard_poller(
    state: Arc<AppState>,
    coingecko: Arc<CoinGeckoClient>,
    fear_greed: Arc<FearGreedClient>,
) {
    let period = state.config.refresh_interval();
    info!(interval_secs = period.as_secs(), "dashboard poller starting");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !coingecko.has_key() {
            warn!("CoinGecko API key not configured — skipping dashboard refresh");
            continue;
        }

        let snapshot = refresh_once(&state, &coingecko, &fear_greed).await;
        state.publish_dashboard(snapshot);
    }
}

/// One refresh cycle. Always returns a snapshot; failures land in `error`.
pub async fn refresh_once(
    state: &AppState,
    coingecko: &CoinGeckoClient,
    fear_greed: &FearGreedClient,
) -> DashboardSnapshot {
    let config = &state.config;
    let mut snapshot = DashboardSnapshot {
        asset_name: config.asset_name.clone(),
        asset_ticker: config.asset_ticker.clone(),
        updated_at: Some(Utc::now().to_rfc3339()),
        ..Default::default()
    };

    let request = match fetch_request(state, coingecko, fear_greed).await {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "dashboard market fetch failed");
            snapshot.error = Some(format!("Error fetching market data: {e:#}"));
            return snapshot;
        }
    };

    snapshot.price = request.price.as_f64();
    snapshot.change_24h = request.change_24h;
    snapshot.sentiment = request.sentiment.clone();
    snapshot.indicators = indicator_panel(&request);

    match state.orchestrator.analyze(&request).await {
        Ok(outcome) => {
            info!(
                cache = %outcome.cache_status,
                fingerprint = %outcome.fingerprint,
                "dashboard analysis refreshed"
            );
            snapshot.narratives = Some(outcome.narratives);
            snapshot.cache_status = Some(outcome.cache_status);
        }
        Err(e) => {
            warn!(error = %e, "dashboard analysis failed");
            snapshot.error = Some(e.to_string());
        }
    }

    snapshot
}

/// Assemble an AnalysisRequest from live market data.
async fn fetch_request(
    state: &AppState,
    coingecko: &CoinGeckoClient,
    fear_greed: &FearGreedClient,
) -> Result<AnalysisRequest> {
    let config = &state.config;
    let coin = config.coin_id.as_str();
    let vs = config.vs_currency.as_str();

    let spot = coingecko.simple_price(coin, vs).await?;

    let lookbacks = [config.very_short_days, config.short_days, config.long_days];
    let days = distinct_lookbacks(lookbacks);
    let series = try_join_all(days.iter().map(|&d| coingecko.ohlc(coin, vs, d))).await?;
    let by_days: HashMap<u32, Vec<Candle>> = days.into_iter().zip(series).collect();
    let take = |d: u32| by_days.get(&d).cloned().unwrap_or_default();

    let very_short_data = take(lookbacks[0]);
    let short_data = take(lookbacks[1]);
    let long_data = take(lookbacks[2]);

    let volume_data = coingecko.volumes(coin, vs, config.very_short_days).await?;

    let sentiment = match fear_greed.latest().await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "sentiment fetch failed — using neutral reading");
            Default::default()
        }
    };

    Ok(AnalysisRequest {
        price: Numeric::Text(format!("{:.4}", spot.price)),
        change_24h: spot.change_24h,
        very_short_data,
        short_data,
        long_data,
        volume_data,
        sentiment: Some(sentiment),
    })
}

/// Unique lookbacks in first-seen order, so equal `days` share one fetch.
fn distinct_lookbacks(days: [u32; 3]) -> Vec<u32> {
    let mut out = Vec::with_capacity(3);
    for d in days {
        if !out.contains(&d) {
            out.push(d);
        }
    }
    out
}

fn indicator_panel(request: &AnalysisRequest) -> IndicatorPanel {
    let [very_short, short, long] = AnalysisOrchestrator::snapshots(request)
        .map(|snap| snap.map(|s| s.formatted()));
    IndicatorPanel {
        very_short,
        short,
        long,
    }
}
