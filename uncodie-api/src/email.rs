//! Outbound Email
//!
//! [`EmailClient`] is the delivery seam. [`SendGridClient`] talks to the
//! SendGrid v3 mail API; [`MockEmailClient`] records messages for tests.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use uncodie_core::{ConfigError, DeliveryError};

// ============================================================================
// TYPES
// ============================================================================

/// A single rendered email to one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// SendGrid categories, used for reporting.
    pub categories: Vec<String>,
    pub custom_args: Map<String, JsonValue>,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            categories: Vec::new(),
            custom_args: Map::new(),
        }
    }

    pub fn with_categories(mut self, categories: &[&str]) -> Self {
        self.categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_arg(mut self, key: &str, value: impl ToString) -> Self {
        self.custom_args
            .insert(key.to_string(), JsonValue::String(value.to_string()));
        self
    }
}

/// Provider acknowledgement for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailReceipt {
    pub message_id: Option<String>,
    pub status: u16,
}

#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, DeliveryError>;
}

// ============================================================================
// SENDGRID
// ============================================================================

#[derive(Clone)]
pub struct SendGridConfig {
    pub api_key: Option<String>,
    pub from_email: String,
    pub from_name: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for SendGridConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            from_email: "no-reply@uncodie.com".to_string(),
            from_name: "Uncodie".to_string(),
            base_url: "https://api.sendgrid.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for SendGridConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGridConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SendGridConfig {
    /// Load from environment variables.
    ///
    /// - `SENDGRID_API_KEY`: unset leaves delivery disabled
    /// - `SENDGRID_FROM_EMAIL`, `SENDGRID_FROM_NAME`: sender
    /// - `SENDGRID_BASE_URL` (default: https://api.sendgrid.com)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            api_key: non_empty("SENDGRID_API_KEY"),
            from_email: non_empty("SENDGRID_FROM_EMAIL").unwrap_or(defaults.from_email),
            from_name: non_empty("SENDGRID_FROM_NAME").unwrap_or(defaults.from_name),
            base_url: non_empty("SENDGRID_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout: defaults.timeout,
        }
    }
}

pub struct SendGridClient {
    client: reqwest::Client,
    config: SendGridConfig,
}

impl std::fmt::Debug for SendGridClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGridClient")
            .field("config", &self.config)
            .finish()
    }
}

impl SendGridClient {
    pub fn new(config: SendGridConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "SENDGRID_BASE_URL".to_string(),
                value: config.base_url.clone(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        if config.api_key.is_none() {
            tracing::warn!("SENDGRID_API_KEY is not set; emails will not be delivered");
        }
        Ok(Self { client, config })
    }

    fn payload(&self, message: &EmailMessage) -> JsonValue {
        let mut body = json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": { "email": self.config.from_email, "name": self.config.from_name },
            "subject": message.subject,
            "content": [{ "type": "text/html", "value": message.html }],
        });
        if !message.categories.is_empty() {
            body["categories"] = json!(message.categories);
        }
        if !message.custom_args.is_empty() {
            body["custom_args"] = JsonValue::Object(message.custom_args.clone());
        }
        body
    }
}

#[async_trait]
impl EmailClient for SendGridClient {
    async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, DeliveryError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(DeliveryError::NotConfigured)?;
        if message.to.trim().is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let url = format!("{}/v3/mail/send", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| DeliveryError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), to = %message.to, "SendGrid rejected email");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        tracing::debug!(to = %message.to, message_id = ?message_id, "Email accepted");
        Ok(EmailReceipt {
            message_id,
            status: status.as_u16(),
        })
    }
}

// ============================================================================
// RECORDING MOCK
// ============================================================================

#[derive(Debug, Default)]
struct MockState {
    sent: Vec<EmailMessage>,
    failing: Vec<String>,
}

/// In-memory [`EmailClient`] that records every accepted message.
#[derive(Debug, Default)]
pub struct MockEmailClient {
    state: Mutex<MockState>,
}

impl MockEmailClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reject every message addressed to `address`.
    pub fn fail_for(&self, address: &str) {
        self.state().failing.push(address.to_string());
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.state().sent.clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.state()
            .sent
            .iter()
            .filter(|m| m.to == address)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EmailClient for MockEmailClient {
    async fn send(&self, message: &EmailMessage) -> Result<EmailReceipt, DeliveryError> {
        let mut state = self.state();
        if state.failing.iter().any(|a| a == &message.to) {
            return Err(DeliveryError::Rejected {
                status: 400,
                body: format!("recipient {} rejected", message.to),
            });
        }
        state.sent.push(message.clone());
        Ok(EmailReceipt {
            message_id: Some(format!("mock_{}", state.sent.len())),
            status: 202,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_redacts_key() {
        let config = SendGridConfig {
            api_key: Some("SG.secret".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("SG.secret"));
    }

    #[test]
    fn test_payload_shape() {
        let client = SendGridClient::new(SendGridConfig::default()).unwrap();
        let message = EmailMessage::new("ana@globex.test", "Hello", "<p>Hi</p>")
            .with_categories(&["lead-assignment"])
            .with_arg("lead_id", "abc");
        let body = client.payload(&message);
        assert_eq!(body["personalizations"][0]["to"][0]["email"], "ana@globex.test");
        assert_eq!(body["content"][0]["type"], "text/html");
        assert_eq!(body["categories"][0], "lead-assignment");
        assert_eq!(body["custom_args"]["lead_id"], "abc");
    }

    #[tokio::test]
    async fn test_unconfigured_client_refuses() {
        let client = SendGridClient::new(SendGridConfig::default()).unwrap();
        let err = client
            .send(&EmailMessage::new("a@b.test", "s", "h"))
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::NotConfigured);
    }

    #[tokio::test]
    async fn test_mock_records_and_fails() {
        let mock = MockEmailClient::new();
        mock.fail_for("bounce@acme.test");

        assert!(mock
            .send(&EmailMessage::new("ok@acme.test", "s", "h"))
            .await
            .is_ok());
        assert!(mock
            .send(&EmailMessage::new("bounce@acme.test", "s", "h"))
            .await
            .is_err());
        assert_eq!(mock.sent().len(), 1);
        assert_eq!(mock.sent_to("ok@acme.test").len(), 1);
    }
}
