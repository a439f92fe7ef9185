// =============================================================================
// Analysis Orchestrator — snapshot, fingerprint, cache, fan-out, fallback
// =============================================================================
//
// Per request:
//   1. Compute an IndicatorSnapshot for each of the three candle series.
//   2. Fingerprint price + selected indicator fields.
//   3. Fresh cache hit  -> return it, no generation call.
//   4. Miss             -> sweep expired entries, then run the three
//                          completions concurrently under one shared timeout.
//   5. Success          -> store under the fingerprint and return.
//      Timeout          -> serve the (possibly expired) entry for the same
//                          fingerprint if there is one, else Timeout.
//      Other failure    -> Generation error naming each failed timeframe.
//
// Concurrent requests with the same fingerprint are coalesced through the
// in-flight map: the first caller drives the generation, the rest await the
// same `OnceCell`. The in-flight entry is released when the leading call
// returns or is dropped. The cache mutex is never held across an await.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::analysis::cache::{fingerprint, AnalysisCache};
use crate::analysis::prompts::{self, GenerationSettings, PromptContext};
use crate::analysis::snapshot::{FormattedSnapshot, IndicatorSnapshot};
use crate::generation::{CompletionRequest, TextGenerator};
use crate::types::{CacheStatus, Candle, Narratives, Numeric, Sentiment, Timeframe};

/// Placeholder for a completion that came back empty.
const EMPTY_COMPLETION: &str = "No analysis";

// =============================================================================
// Request / response
// =============================================================================

/// Body of the inbound analysis request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub price: Numeric,
    #[serde(default, rename = "change24h")]
    pub change_24h: Option<f64>,
    #[serde(default)]
    pub very_short_data: Vec<Candle>,
    #[serde(default)]
    pub short_data: Vec<Candle>,
    #[serde(default)]
    pub long_data: Vec<Candle>,
    /// `[timestamp, volume]` pairs.
    #[serde(default)]
    pub volume_data: Vec<(f64, f64)>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
}

impl AnalysisRequest {
    pub fn candles(&self, timeframe: Timeframe) -> &[Candle] {
        match timeframe {
            Timeframe::VeryShort => &self.very_short_data,
            Timeframe::Short => &self.short_data,
            Timeframe::Long => &self.long_data,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub narratives: Narratives,
    pub cache_status: CacheStatus,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The request could not be interpreted (e.g. non-numeric price).
    InvalidRequest(String),
    /// No credentials for the generation service; nothing was attempted.
    NotConfigured,
    /// The shared generation window elapsed and no stale entry existed.
    Timeout,
    /// One or more completions failed, by timeframe.
    Generation(Vec<(Timeframe, String)>),
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::NotConfigured => write!(f, "AI analysis is not configured on this server"),
            Self::Timeout => write!(f, "Analysis request timed out. Please try again."),
            Self::Generation(failures) => {
                let parts: Vec<String> = failures
                    .iter()
                    .map(|(tf, msg)| format!("{tf}: {msg}"))
                    .collect();
                write!(f, "{}", parts.join("; "))
            }
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Orchestrator tunables that are not cache policy.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub request_timeout: Duration,
    pub generation: GenerationSettings,
    pub asset_name: String,
    pub asset_ticker: String,
}

type InFlight = Arc<OnceCell<Result<Narratives, AnalysisError>>>;

/// Removes the in-flight entry for `key` when the owning `analyze` call
/// finishes or is dropped mid-generation, unless a newer cell replaced it.
struct InFlightGuard<'a> {
    map: &'a Mutex<HashMap<String, InFlight>>,
    key: &'a str,
    cell: InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut map = self.map.lock();
        if map.get(self.key).is_some_and(|c| Arc::ptr_eq(c, &self.cell)) {
            map.remove(self.key);
        }
    }
}

// =============================================================================
// AnalysisOrchestrator
// =============================================================================

pub struct AnalysisOrchestrator {
    generator: Arc<dyn TextGenerator>,
    cache: Mutex<AnalysisCache>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    settings: OrchestratorSettings,
}

impl AnalysisOrchestrator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        cache: AnalysisCache,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            generator,
            cache: Mutex::new(cache),
            in_flight: Mutex::new(HashMap::new()),
            settings,
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn generator_configured(&self) -> bool {
        self.generator.is_configured()
    }

    /// Compute per-timeframe snapshots for `request`, in `Timeframe::ALL` order.
    pub fn snapshots(request: &AnalysisRequest) -> [Option<IndicatorSnapshot>; 3] {
        Timeframe::ALL.map(|tf| IndicatorSnapshot::compute(request.candles(tf), tf))
    }

    /// Produce the three narratives for `request`.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, AnalysisError> {
        let price = request.price.as_f64().ok_or_else(|| {
            AnalysisError::InvalidRequest(format!("price '{}' is not a number", request.price))
        })?;

        let [vs, s, l] = Self::snapshots(request).map(|snap| FormattedSnapshot::of(snap.as_ref()));
        let key = fingerprint(price, &vs, &s, &l);

        {
            let mut cache = self.cache.lock();
            let now = Instant::now();
            if let Some(entry) = cache.get_fresh(&key, now) {
                info!(
                    fingerprint = %key,
                    age_secs = entry.age(now).as_secs(),
                    "cache hit — returning cached analysis"
                );
                return Ok(AnalysisOutcome {
                    narratives: entry.narratives.clone(),
                    cache_status: CacheStatus::Hit,
                    fingerprint: key,
                });
            }
            let evicted = cache.sweep_expired(now, &key);
            if evicted > 0 {
                debug!(evicted, remaining = cache.len(), "expired cache entries swept");
            }
        }

        if !self.generator.is_configured() {
            warn!("generation API key not configured — skipping AI analysis");
            return Err(AnalysisError::NotConfigured);
        }

        let volume = prompts::volume_analysis(&request.volume_data);
        let ctx = PromptContext {
            asset_name: &self.settings.asset_name,
            asset_ticker: &self.settings.asset_ticker,
            price: &request.price,
            change_24h: request.change_24h,
            sentiment: request.sentiment.as_ref(),
            volume_analysis: &volume,
            very_short: &vs,
            short: &s,
            long: &l,
        };
        let requests = prompts::build_requests(&ctx, &self.settings.generation);

        let cell = self.in_flight.lock().entry(key.clone()).or_default().clone();
        let guard = InFlightGuard {
            map: &self.in_flight,
            key: &key,
            cell,
        };
        let result = guard
            .cell
            .get_or_init(|| self.generate_and_store(&key, requests))
            .await
            .clone();
        drop(guard);

        match result {
            Ok(narratives) => Ok(AnalysisOutcome {
                narratives,
                cache_status: CacheStatus::Miss,
                fingerprint: key,
            }),
            Err(AnalysisError::Timeout) => {
                let stale = self.cache.lock().get_any(&key).map(|e| e.narratives.clone());
                match stale {
                    Some(narratives) => {
                        warn!(fingerprint = %key, "generation timed out — serving stale analysis");
                        Ok(AnalysisOutcome {
                            narratives,
                            cache_status: CacheStatus::Stale,
                            fingerprint: key,
                        })
                    }
                    None => Err(AnalysisError::Timeout),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Run the three completions under the shared timeout and cache the
    /// result on success.
    async fn generate_and_store(
        &self,
        key: &str,
        requests: [(Timeframe, CompletionRequest); 3],
    ) -> Result<Narratives, AnalysisError> {
        info!(fingerprint = %key, "cache miss — requesting fresh analysis");

        let [very_short, short, long] = requests;
        let fan_out = async {
            tokio::join!(
                self.complete(very_short),
                self.complete(short),
                self.complete(long),
            )
        };

        let timeout = self.settings.request_timeout;
        let results = match tokio::time::timeout(timeout, fan_out).await {
            Ok(results) => results,
            Err(_) => {
                error!(
                    fingerprint = %key,
                    timeout_secs = timeout.as_secs(),
                    "generation timed out — in-flight requests aborted"
                );
                return Err(AnalysisError::Timeout);
            }
        };

        let mut texts = Vec::with_capacity(3);
        let mut failures = Vec::new();
        for (tf, result) in [results.0, results.1, results.2] {
            match result {
                Ok(text) => texts.push(text),
                Err(e) => {
                    error!(timeframe = %tf, error = %e, "generation failed");
                    failures.push((tf, e));
                }
            }
        }
        if !failures.is_empty() {
            return Err(AnalysisError::Generation(failures));
        }

        let [very_short_term, short_term, long_term]: [String; 3] = texts
            .try_into()
            .map_err(|_| AnalysisError::Generation(Vec::new()))?;
        let narratives = Narratives {
            very_short_term,
            short_term,
            long_term,
        };

        self.cache
            .lock()
            .insert(key.to_string(), narratives.clone(), Instant::now());
        info!(fingerprint = %key, "analysis cached");

        Ok(narratives)
    }

    async fn complete(
        &self,
        (timeframe, request): (Timeframe, CompletionRequest),
    ) -> (Timeframe, Result<String, String>) {
        let result = match self.generator.complete(&request).await {
            Ok(text) => {
                let text = text.trim();
                Ok(if text.is_empty() {
                    EMPTY_COMPLETION.to_string()
                } else {
                    text.to_string()
                })
            }
            Err(e) => Err(format!("{e:#}")),
        };
        (timeframe, result)
    }
}

// =============================================================================
// Tests
// =============================================================================
