// client.rs
use crate::domain::Listing;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://models.inference.ai.azure.com/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const MAX_TOKENS: u32 = 100;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Normalization API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response envelope: {0}")]
    Envelope(String),

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Malformed result JSON: {0}")]
    Result(String),
}

impl From<reqwest::Error> for EnrichError {
    fn from(err: reqwest::Error) -> Self {
        EnrichError::Http(err.to_string())
    }
}

/// Corrected identity fields. An empty string means "not confident".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NormalizedFields {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub title: String,
}

/// The external text-normalization service.
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, listing: &Listing) -> Result<NormalizedFields, EnrichError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client (GitHub Models by default).
pub struct ChatNormalizer {
    http: reqwest::Client,
    token: String,
    endpoint: String,
    model: String,
}

impl ChatNormalizer {
    pub fn new(token: &str) -> Result<Self, EnrichError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            token: token.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    fn headers(&self) -> Result<HeaderMap, EnrichError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|e| EnrichError::Http(format!("invalid token header: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[async_trait]
impl Normalizer for ChatNormalizer {
    async fn normalize(&self, listing: &Listing) -> Result<NormalizedFields, EnrichError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(listing),
            }],
            temperature: 0.0,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(model = %self.model, external_id = %listing.external_id, "normalization request");

        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EnrichError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_completion(&body)
    }
}

#[cfg(test)]
impl ChatNormalizer {
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

/// Pulls the `{make, model, title}` object out of a chat-completions body.
pub fn parse_completion(body: &str) -> Result<NormalizedFields, EnrichError> {
    let envelope: ChatResponse =
        serde_json::from_str(body).map_err(|e| EnrichError::Envelope(e.to_string()))?;

    let content = envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(EnrichError::EmptyResponse)?;

    serde_json::from_str(&content).map_err(|e| EnrichError::Result(e.to_string()))
}

fn build_prompt(listing: &Listing) -> String {
    let year = listing
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        r#"You are a car listing normaliser. Given a raw car listing title and partial make/model,
return the correct make, model, and a clean title.

Rules:
- "make" must be the official brand name (e.g. "Toyota", "Mercedes-Benz", "Land Rover")
- "model" must be just the model name (e.g. "Corolla", "C-Class", "Defender 110")
- "title" must be a clean, readable title (e.g. "2019 Toyota Corolla SE")
- If you cannot determine make or model with confidence, return an empty string for that field
- Return ONLY valid JSON, no explanation

Raw listing:
Title: {}
Make: {}
Model: {}
Year: {}

Return exactly this JSON:
{{"make": "...", "model": "...", "title": "..."}}"#,
        listing.title, listing.make, listing.model, year
    )
}
