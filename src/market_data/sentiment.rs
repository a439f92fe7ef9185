// =============================================================================
// Fear & Greed Index Client (alternative.me)
// =============================================================================

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::types::Sentiment;

pub const DEFAULT_URL: &str = "https://api.alternative.me/fng/?limit=1";

#[derive(Deserialize)]
struct FearGreedResponse {
    #[serde(default)]
    data: Vec<Sentiment>,
}

pub struct FearGreedClient {
    url: String,
    client: reqwest::Client,
}

impl FearGreedClient {
    pub fn new() -> Result<Self> {
        Self::with_url(DEFAULT_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client for FearGreedClient")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Latest index reading. An empty `data` array yields the neutral default.
    #[instrument(skip(self), name = "fng::latest")]
    pub async fn latest(&self) -> Result<Sentiment> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("GET /fng request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Fear & Greed GET /fng returned {}", status);
        }

        let body: FearGreedResponse = resp
            .json()
            .await
            .context("failed to parse /fng response")?;
        let sentiment = first_or_neutral(body);

        debug!(
            value = %sentiment.value,
            classification = %sentiment.value_classification,
            "sentiment fetched"
        );
        Ok(sentiment)
    }
}

fn first_or_neutral(body: FearGreedResponse) -> Sentiment {
    body.data.into_iter().next().unwrap_or_default()
}
