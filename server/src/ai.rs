//! Chat proxy to OpenAI-compatible completion APIs.
//!
//! Providers are tried in order (OpenAI, then GLM). Each gets exactly one
//! request; when every configured provider fails the caller gets a canned reply.

use serde::{Deserialize, Serialize};

use crate::config::{AiConfig, LlmProviderConfig};

pub const SYSTEM_PROMPT: &str = "You are a helpful telehealth assistant. Give general health \
information in plain language, keep answers short, and always advise the user to consult \
their doctor for diagnosis or treatment. In an emergency, tell them to call local emergency \
services immediately.";

pub const FALLBACK_REPLY: &str = "I'm sorry, the AI assistant is unavailable right now. \
For medical concerns please contact your doctor through the chat, or call emergency \
services if this is urgent.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Glm,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("provider returned no content")]
    EmptyReply,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatTurn,
}

pub struct AiClient {
    http: reqwest::Client,
    openai: Option<LlmProviderConfig>,
    glm: Option<LlmProviderConfig>,
}

impl AiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            openai: config.openai.clone(),
            glm: config.glm.clone(),
        })
    }

    /// Reply to `message`, falling through providers in order
    pub async fn chat(&self, message: &str, history: &[ChatTurn]) -> (String, Provider) {
        let messages = build_messages(message, history);

        let providers = [
            (Provider::OpenAi, self.openai.as_ref()),
            (Provider::Glm, self.glm.as_ref()),
        ];
        for (provider, config) in providers {
            let Some(config) = config else { continue };
            match self.complete(config, messages.clone()).await {
                Ok(reply) => return (reply, provider),
                Err(e) => tracing::warn!(?provider, error = %e, "AI provider failed"),
            }
        }

        (FALLBACK_REPLY.to_string(), Provider::Fallback)
    }

    async fn complete(
        &self,
        config: &LlmProviderConfig,
        messages: Vec<ChatTurn>,
    ) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&CompletionRequest {
                model: &config.model,
                messages,
                temperature: 0.7,
                max_tokens: 500,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AiError::Status(response.status()));
        }

        let body: CompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AiError::EmptyReply)
    }
}

/// System prompt, then prior turns (only user/assistant roles), then the new message
fn build_messages(message: &str, history: &[ChatTurn]) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatTurn {
        role: "system".to_string(),
        content: SYSTEM_PROMPT.to_string(),
    });
    messages.extend(
        history
            .iter()
            .filter(|t| t.role == "user" || t.role == "assistant")
            .cloned(),
    );
    messages.push(ChatTurn {
        role: "user".to_string(),
        content: message.to_string(),
    });
    messages
}
