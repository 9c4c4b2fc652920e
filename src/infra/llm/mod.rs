//! Language model client abstraction.

mod gemini;
mod replies;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::config::LlmConfig;
use crate::domain::ChatMessage;
use crate::errors::AppResult;

pub use gemini::GeminiClient;
pub use replies::{fallback_reply, WELCOME_MESSAGE};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Incremental reply text
pub type ReplyStream = BoxStream<'static, AppResult<String>>;

/// Speaker of a prior turn as the model sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

/// One prior turn of the conversation sent as context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

impl From<&ChatMessage> for ChatTurn {
    fn from(message: &ChatMessage) -> Self {
        let role = if message.is_assistant() {
            TurnRole::Model
        } else {
            TurnRole::User
        };
        Self {
            role,
            text: message.content.clone(),
        }
    }
}

/// A hosted chat model.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Full reply to `prompt` given the earlier turns.
    async fn complete(&self, history: &[ChatTurn], prompt: &str) -> AppResult<String>;

    /// Same as `complete`, yielding the reply as it is generated.
    async fn stream(&self, history: &[ChatTurn], prompt: &str) -> AppResult<ReplyStream>;
}

/// Stand-in used when no API key is configured: always greets.
pub struct WelcomeModel;

#[async_trait]
impl ChatModel for WelcomeModel {
    async fn complete(&self, _history: &[ChatTurn], _prompt: &str) -> AppResult<String> {
        Ok(WELCOME_MESSAGE.to_string())
    }

    async fn stream(&self, _history: &[ChatTurn], _prompt: &str) -> AppResult<ReplyStream> {
        Ok(stream::iter([Ok(WELCOME_MESSAGE.to_string())]).boxed())
    }
}

/// Pick the model implementation for the given settings.
pub fn from_config(config: &LlmConfig) -> Arc<dyn ChatModel> {
    match &config.api_key {
        Some(api_key) => {
            tracing::info!(model = %config.model, "Gemini client configured");
            Arc::new(GeminiClient::new(
                api_key.clone(),
                config.model.clone(),
                config.base_url.clone(),
            ))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, replies will be the welcome message");
            Arc::new(WelcomeModel)
        }
    }
}
