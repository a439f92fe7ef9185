// =============================================================================
// Groq Chat Completions Client
// =============================================================================
//
// Thin reqwest wrapper around the OpenAI-compatible endpoint
// `POST {base_url}/chat/completions`. The API key is sent as a bearer token
// and never logged.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{CompletionRequest, TextGenerator};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Clone)]
pub struct GroqClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl GroqClient {
    /// Build a client. No per-request timeout is set here; the orchestrator
    /// bounds the whole fan-out instead.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build reqwest client for GroqClient")?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl TextGenerator for GroqClient {
    #[instrument(skip_all, name = "groq::complete", fields(model = %request.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .context("POST /chat/completions request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("generation service returned {}: {}", status, body);
        }

        let body: CompletionResponse = resp
            .json()
            .await
            .context("failed to parse completion response")?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }

    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
