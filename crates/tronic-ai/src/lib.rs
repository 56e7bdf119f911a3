//! AI responder: a single `generate(prompt, history) -> text` contract over
//! an external generative API. Chat relay, command explanation, and the
//! freeform generation endpoints all go through this seam; callers decide
//! whether a failure is fatal to their operation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use tronic_types::api::Turn;

/// Upstream call budget. A call that outruns this is treated as failed;
/// the underlying request is dropped, not cancelled.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// How many trailing history turns are folded into the context window.
const MAX_HISTORY_TURNS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI responder is not configured (missing API key)")]
    MissingConfig,

    #[error("generation timed out")]
    Timeout,

    #[error("upstream request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("upstream response had no candidate text")]
    MalformedResponse,
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Timeout
        } else {
            AiError::Http(err)
        }
    }
}

#[async_trait]
pub trait Responder: Send + Sync {
    async fn generate(&self, prompt: &str, history: &[Turn]) -> Result<String, AiError>;
}

/// Concatenate prior turns (most recent last) and the new prompt into a
/// single textual context window.
pub fn build_context(prompt: &str, history: &[Turn]) -> String {
    let mut context = String::new();
    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    for turn in &history[start..] {
        context.push_str(&format!("{}: {}\n", turn.role, turn.content));
    }
    context.push_str(&format!("User: {}\nAssistant:", prompt));
    context
}

/// Client for a Gemini-style `generateContent` HTTP API.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self, AiError> {
        if api_key.trim().is_empty() {
            return Err(AiError::MissingConfig);
        }
        let http = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .map_err(AiError::Http)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl Responder for GeminiClient {
    async fn generate(&self, prompt: &str, history: &[Turn]) -> Result<String, AiError> {
        let text = if history.is_empty() {
            prompt.to_string()
        } else {
            build_context(prompt, history)
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": text }] }]
        });

        debug!("Requesting generation ({} chars of context)", text.len());

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let reply = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.is_empty())
            .ok_or(AiError::MalformedResponse)?;

        Ok(reply)
    }
}
