// =============================================================================
// Runtime Configuration — analyst settings loaded from JSON + environment
// =============================================================================
//
// Every field carries `#[serde(default = "...")]` so a partial (or missing)
// config file still yields a complete configuration. Secrets never live in
// the file: API keys come from the environment only.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::orchestrator::OrchestratorSettings;
use crate::analysis::prompts::GenerationSettings;
use crate::generation::groq;

pub const DEFAULT_CONFIG_PATH: &str = "analyst_config.json";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_completion_tokens() -> u32 {
    200
}

fn default_generation_base_url() -> String {
    groq::DEFAULT_BASE_URL.to_string()
}

fn default_coin_id() -> String {
    "cardano".to_string()
}

fn default_asset_name() -> String {
    "Cardano".to_string()
}

fn default_asset_ticker() -> String {
    "ADA".to_string()
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_short_days() -> u32 {
    1
}

fn default_long_days() -> u32 {
    365
}

fn default_refresh_interval_secs() -> u64 {
    600
}

// =============================================================================
// AnalystConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystConfig {
    // ── Cache / orchestration ───────────────────────────────────────────
    /// Lifetime of a cached analysis, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Shared budget for the three concurrent completions, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    // ── Text generation ─────────────────────────────────────────────────
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_completion_tokens")]
    pub max_completion_tokens: u32,

    /// OpenAI-compatible base URL (without `/chat/completions`).
    #[serde(default = "default_generation_base_url")]
    pub generation_base_url: String,

    // ── Asset ───────────────────────────────────────────────────────────
    /// CoinGecko coin id.
    #[serde(default = "default_coin_id")]
    pub coin_id: String,

    #[serde(default = "default_asset_name")]
    pub asset_name: String,

    #[serde(default = "default_asset_ticker")]
    pub asset_ticker: String,

    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    // ── Dashboard poller ────────────────────────────────────────────────
    /// OHLC lookback (days) for the very-short series.
    #[serde(default = "default_short_days")]
    pub very_short_days: u32,

    #[serde(default = "default_short_days")]
    pub short_days: u32,

    #[serde(default = "default_long_days")]
    pub long_days: u32,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Run the background dashboard refresh loop.
    #[serde(default = "default_true")]
    pub poller_enabled: bool,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            model: default_model(),
            temperature: default_temperature(),
            max_completion_tokens: default_max_completion_tokens(),
            generation_base_url: default_generation_base_url(),
            coin_id: default_coin_id(),
            asset_name: default_asset_name(),
            asset_ticker: default_asset_ticker(),
            vs_currency: default_vs_currency(),
            very_short_days: default_short_days(),
            short_days: default_short_days(),
            long_days: default_long_days(),
            refresh_interval_secs: default_refresh_interval_secs(),
            poller_enabled: default_true(),
        }
    }
}

impl AnalystConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read analyst config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse analyst config from {}", path.display()))?;

        info!(
            path = %path.display(),
            coin_id = %config.coin_id,
            model = %config.model,
            cache_ttl_secs = config.cache_ttl_secs,
            "analyst config loaded"
        );

        Ok(config)
    }

    /// Apply `ANALYST_COIN_ID` if set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(coin) = std::env::var("ANALYST_COIN_ID") {
            let coin = coin.trim().to_lowercase();
            if !coin.is_empty() {
                self.coin_id = coin;
            }
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            generation: GenerationSettings {
                model: self.model.clone(),
                temperature: self.temperature,
                max_completion_tokens: self.max_completion_tokens,
            },
            asset_name: self.asset_name.clone(),
            asset_ticker: self.asset_ticker.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config: AnalystConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AnalystConfig::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.long_days, 365);
        assert!(config.poller_enabled);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config: AnalystConfig =
            serde_json::from_str(r#"{"coin_id": "bitcoin", "request_timeout_secs": 10}"#).unwrap();
        assert_eq!(config.coin_id, "bitcoin");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = AnalystConfig::load("/nonexistent/analyst_config.json").unwrap_err();
        assert!(format!("{err:#}").contains("failed to read analyst config"));
    }

    #[test]
    fn load_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!(
            "analyst_config_test_{}.json",
            std::process::id()
        ));
        let mut config = AnalystConfig::default();
        config.asset_ticker = "BTC".into();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = AnalystConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn orchestrator_settings_carry_generation_params() {
        let settings = AnalystConfig::default().orchestrator_settings();
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.generation.max_completion_tokens, 200);
        assert_eq!(settings.asset_ticker, "ADA");
    }
}
