//! Google Gemini REST client.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use super::{ChatModel, ChatTurn, ReplyStream, TurnRole};
use crate::config::{GEMINI_MAX_OUTPUT_TOKENS, GEMINI_TEMPERATURE};
use crate::errors::{AppError, AppResult};

const API_KEY_HEADER: &str = "x-goog-api-key";
const SSE_DATA_PREFIX: &str = "data:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    User,
    Model,
}

impl From<TurnRole> for Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => Role::User,
            TurnRole::Model => Role::Model,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Role, text: &str) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    fn new(history: &[ChatTurn], prompt: &str) -> Self {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| Content::text(turn.role.into(), &turn.text))
            .collect();
        contents.push(Content::text(Role::User, prompt));

        Self {
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: GEMINI_MAX_OUTPUT_TOKENS,
                temperature: GEMINI_TEMPERATURE,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Pull complete `data:` lines out of `buffer`, leaving any partial line behind.
///
/// Works on raw bytes: a network chunk may end inside a multi-byte character,
/// and only whole lines are decoded.
fn drain_events(buffer: &mut Vec<u8>) -> Vec<AppResult<String>> {
    let mut chunks = Vec::new();
    let mut consumed = 0;

    while let Some(offset) = buffer[consumed..].iter().position(|&b| b == b'\n') {
        let end = consumed + offset;
        let raw = &buffer[consumed..end];
        consumed = end + 1;

        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(e) => {
                chunks.push(Err(AppError::upstream(format!(
                    "Gemini stream event is not UTF-8: {}",
                    e
                ))));
                continue;
            }
        };

        let Some(payload) = line.strip_prefix(SSE_DATA_PREFIX) else {
            continue;
        };
        let payload = payload.trim();
        if payload.is_empty() {
            continue;
        }

        match serde_json::from_str::<GenerateContentResponse>(payload) {
            Ok(event) => {
                let text = event.text();
                if !text.is_empty() {
                    chunks.push(Ok(text));
                }
            }
            Err(e) => chunks.push(Err(AppError::upstream(format!(
                "Malformed Gemini stream event: {}",
                e
            )))),
        }
    }

    buffer.drain(..consumed);
    chunks
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    async fn post(
        &self,
        url: String,
        history: &[ChatTurn],
        prompt: &str,
    ) -> AppResult<reqwest::Response> {
        let request = GenerateContentRequest::new(history, prompt);

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::upstream(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn complete(&self, history: &[ChatTurn], prompt: &str) -> AppResult<String> {
        let response = self
            .post(self.endpoint("generateContent"), history, prompt)
            .await?;

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream(format!("Malformed Gemini response: {}", e)))?;

        tracing::debug!(model = %self.model, turns = history.len(), "Gemini reply received");
        Ok(body.text())
    }

    async fn stream(&self, history: &[ChatTurn], prompt: &str) -> AppResult<ReplyStream> {
        let response = self
            .post(
                self.endpoint("streamGenerateContent?alt=sse"),
                history,
                prompt,
            )
            .await?;

        let chunks = response
            .bytes_stream()
            .scan(Vec::new(), |buffer: &mut Vec<u8>, chunk| {
                let events = match chunk {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        drain_events(buffer)
                    }
                    Err(e) => vec![Err(AppError::upstream(format!(
                        "Gemini stream interrupted: {}",
                        e
                    )))],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(stream::iter);

        Ok(chunks.boxed())
    }
}
