//! Push notifications through Firebase Cloud Messaging.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::FcmConfig;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("FCM returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct FcmPayload<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    data: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Clone)]
pub struct PushNotifier {
    http: reqwest::Client,
    server_key: Option<String>,
    endpoint: String,
}

impl PushNotifier {
    pub fn new(config: &FcmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_key: config.server_key.clone(),
            endpoint: config.endpoint.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.server_key.is_some()
    }

    /// Deliver one message; returns `Ok(false)` when FCM is not configured
    pub async fn send(&self, device_token: &str, message: &PushMessage) -> Result<bool, NotifyError> {
        let Some(key) = &self.server_key else {
            tracing::debug!("FCM not configured, skipping push");
            return Ok(false);
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, format!("key={key}"))
            .json(&FcmPayload {
                to: device_token,
                notification: FcmNotification {
                    title: &message.title,
                    body: &message.body,
                },
                data: &message.data,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }
        Ok(true)
    }

    /// Fire-and-forget delivery; failures are logged only
    pub fn spawn_send(&self, device_token: String, message: PushMessage) {
        if !self.is_enabled() {
            return;
        }
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&device_token, &message).await {
                tracing::warn!(error = %e, "push notification failed");
            }
        });
    }
}

/// Preview text for a chat push, cut on a char boundary
pub fn preview(body: &str, max_chars: usize) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
