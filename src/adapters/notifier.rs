//! Alert delivery
//!
//! `WebhookNotifier` posts a JSON alert to an HTTP endpoint (mail relay,
//! chat bridge, incident tool). `LogNotifier` is the fallback when no
//! endpoint is configured and only writes the alert to the log stream.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::errors::NotifyError;
use crate::adapters::traits::Notifier;
use crate::adapters::types::AlertCategory;

/// Request timeout for a single alert POST
const ALERT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct AlertPayload<'a> {
    subject: String,
    category: AlertCategory,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient: Option<&'a str>,
    timestamp: String,
}

/// Posts alerts to a webhook endpoint
pub struct WebhookNotifier {
    url: String,
    recipient: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Build a notifier for `url`; `api_key` is sent as a bearer token
    pub fn new(
        url: impl Into<String>,
        recipient: Option<String>,
        api_key: Option<&str>,
    ) -> Result<Self, NotifyError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = api_key {
            if let Ok(value) = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", key)) {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            } else {
                warn!("[ALERT] API key contains invalid header characters, sending unauthenticated");
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(ALERT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            url: url.into(),
            recipient,
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, category: AlertCategory, message: &str) -> Result<(), NotifyError> {
        let payload = AlertPayload {
            subject: format!("Volume bot alert: {}", category),
            category,
            message,
            recipient: self.recipient.as_deref(),
            timestamp: Utc::now().to_rfc3339(),
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        info!(category = %category, "[ALERT] Sent");
        Ok(())
    }
}

/// Writes alerts to the log only
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, category: AlertCategory, message: &str) -> Result<(), NotifyError> {
        warn!(category = %category, message = message, "[ALERT]");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_webhook_posts_alert() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/alerts")
            .match_header("authorization", "Bearer test-api-key")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"category":"CircuitBreaker","message":"price moved 12%","recipient":"ops@example.com"}"#
                    .to_string(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let notifier = WebhookNotifier::new(
            format!("{}/alerts", server.url()),
            Some("ops@example.com".to_string()),
            Some("test-api-key"),
        )
        .unwrap();

        let result = notifier.send(AlertCategory::CircuitBreaker, "price moved 12%").await;
        assert!(result.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_rejection_is_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/alerts")
            .with_status(503)
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/alerts", server.url()), None, None).unwrap();

        let result = notifier.send(AlertCategory::Error, "rpc down").await;
        assert!(matches!(result, Err(NotifyError::Rejected(503))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.send(AlertCategory::LowBalance, "0.01 left").await.is_ok());
    }
}
