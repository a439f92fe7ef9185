// =============================================================================
// Central Application State
// =============================================================================
//
// Ties the configuration, the analysis orchestrator, and the latest dashboard
// refresh together for the REST handlers, the WebSocket feed, and the poller.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock around the published dashboard snapshot.
//   - The orchestrator manages its own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::analysis::orchestrator::AnalysisOrchestrator;
use crate::analysis::snapshot::FormattedSnapshot;
use crate::runtime_config::AnalystConfig;
use crate::types::{CacheStatus, Narratives, Sentiment};

// =============================================================================
// Dashboard snapshot
// =============================================================================

/// Formatted indicator readings per timeframe. `None` where the series was
/// too short.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorPanel {
    pub very_short: Option<FormattedSnapshot>,
    pub short: Option<FormattedSnapshot>,
    pub long: Option<FormattedSnapshot>,
}

/// Result of the most recent dashboard refresh. Served by
/// `GET /api/v1/dashboard` and pushed over the WebSocket feed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub state_version: u64,
    pub asset_name: String,
    pub asset_ticker: String,
    pub price: Option<f64>,
    pub change_24h: Option<f64>,
    pub sentiment: Option<Sentiment>,
    pub indicators: IndicatorPanel,
    pub narratives: Option<Narratives>,
    pub cache_status: Option<CacheStatus>,
    /// Last refresh failure, if any.
    pub error: Option<String>,
    /// RFC 3339 time of the last completed refresh.
    pub updated_at: Option<String>,
    pub server_time: i64,
}

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    /// Monotonically increasing version bumped on every dashboard publish.
    /// WebSocket clients compare against this to decide when to push.
    pub state_version: AtomicU64,

    pub config: AnalystConfig,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub dashboard: RwLock<DashboardSnapshot>,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: AnalystConfig, orchestrator: Arc<AnalysisOrchestrator>) -> Self {
        let dashboard = DashboardSnapshot {
            asset_name: config.asset_name.clone(),
            asset_ticker: config.asset_ticker.clone(),
            ..Default::default()
        };

        Self {
            state_version: AtomicU64::new(1),
            config,
            orchestrator,
            dashboard: RwLock::new(dashboard),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Tracking ────────────────────────────────────────────────

    /// Atomically increment the state version and return the previous value.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Dashboard ───────────────────────────────────────────────────────

    /// Replace the published dashboard and notify WebSocket clients.
    pub fn publish_dashboard(&self, snapshot: DashboardSnapshot) {
        *self.dashboard.write() = snapshot;
        self.increment_version();
    }

    /// Current dashboard stamped with the state version and server time.
    pub fn build_snapshot(&self) -> DashboardSnapshot {
        let mut snapshot = self.dashboard.read().clone();
        snapshot.state_version = self.current_state_version();
        snapshot.server_time = Utc::now().timestamp_millis();
        snapshot
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::analysis::cache::AnalysisCache;
    use crate::generation::{CompletionRequest, TextGenerator};

    /// Generator that answers instantly with the prompt's first line.
    pub(crate) struct EchoGenerator {
        pub configured: bool,
    }

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<String> {
            let first = request
                .messages
                .last()
                .and_then(|m| m.content.lines().next())
                .unwrap_or_default();
            Ok(first.to_string())
        }

        fn is_configured(&self) -> bool {
            self.configured
        }
    }

    pub(crate) fn test_state(configured: bool) -> Arc<AppState> {
        let config = AnalystConfig::default();
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            Arc::new(EchoGenerator { configured }),
            AnalysisCache::new(config.cache_ttl()),
            config.orchestrator_settings(),
        ));
        Arc::new(AppState::new(config, orchestrator))
    }

    #[test]
    fn publish_bumps_version() {
        let state = test_state(true);
        let before = state.current_state_version();
        state.publish_dashboard(DashboardSnapshot {
            price: Some(0.45),
            ..Default::default()
        });
        assert_eq!(state.current_state_version(), before + 1);

        let snap = state.build_snapshot();
        assert_eq!(snap.state_version, before + 1);
        assert_eq!(snap.price, Some(0.45));
        assert!(snap.server_time > 0);
    }

    #[test]
    fn initial_dashboard_names_the_asset() {
        let state = test_state(true);
        let json = serde_json::to_value(state.build_snapshot()).unwrap();
        assert_eq!(json["assetName"], "Cardano");
        assert_eq!(json["assetTicker"], "ADA");
        assert!(json["narratives"].is_null());
        assert!(json["indicators"]["veryShort"].is_null());
    }
}
