// =============================================================================
// Text Generation
// =============================================================================
//
// The orchestrator talks to the language model through `TextGenerator`, so the
// HTTP client can be swapped for a fake in tests. One call = one chat
// completion = one narrative.

pub mod groq;

pub use groq::GroqClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Body of an OpenAI-compatible `/chat/completions` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_completion_tokens: u32,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one completion and return the raw text of the first choice.
    ///
    /// Dropping the returned future must abort the underlying request.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// `false` when credentials are missing and no call should be attempted.
    fn is_configured(&self) -> bool {
        true
    }
}
