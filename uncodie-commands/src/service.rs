//! Agent framework client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use uncodie_core::{Command, CommandError, ConfigError};

use crate::request::CommandRequest;
use crate::CommandResult;

/// Submit and look up commands.
#[async_trait]
pub trait CommandService: Send + Sync {
    /// Submit a command. The returned snapshot carries the framework id.
    async fn submit_command(&self, request: &CommandRequest) -> CommandResult<Command>;

    /// Current snapshot of a command, `None` when the framework does not
    /// know the id.
    async fn get_command_by_id(&self, command_id: &str) -> CommandResult<Option<Command>>;
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Connection settings for the agent framework.
#[derive(Clone, Default)]
pub struct CommandServiceConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Where the framework should push completion snapshots.
    pub callback_url: Option<String>,
    /// Shared secret for `x-uncodie-signature` on callbacks.
    pub callback_secret: Option<String>,
    pub request_timeout: Duration,
}

impl CommandServiceConfig {
    /// Load from environment variables.
    ///
    /// - `UNCODIE_COMMANDS_URL`: framework base URL (unset disables submission)
    /// - `UNCODIE_COMMANDS_API_KEY`: bearer key
    /// - `UNCODIE_COMMANDS_CALLBACK_URL`: push completion endpoint
    /// - `UNCODIE_COMMANDS_CALLBACK_SECRET`: HMAC secret for callbacks
    /// - `UNCODIE_COMMANDS_TIMEOUT_SECS`: per-request timeout (default: 30)
    pub fn from_env() -> Self {
        let non_empty = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let request_timeout = std::env::var("UNCODIE_COMMANDS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Self {
            base_url: non_empty("UNCODIE_COMMANDS_URL").map(|u| u.trim_end_matches('/').to_string()),
            api_key: non_empty("UNCODIE_COMMANDS_API_KEY"),
            callback_url: non_empty("UNCODIE_COMMANDS_CALLBACK_URL"),
            callback_secret: non_empty("UNCODIE_COMMANDS_CALLBACK_SECRET"),
            request_timeout,
        }
    }
}

impl std::fmt::Debug for CommandServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("callback_url", &self.callback_url)
            .field("callback_secret", &self.callback_secret.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

// ============================================================================
// HTTP IMPLEMENTATION
// ============================================================================

/// `reqwest` client for the agent framework REST API.
pub struct HttpCommandService {
    client: Client,
    config: CommandServiceConfig,
}

impl HttpCommandService {
    pub fn new(config: CommandServiceConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "UNCODIE_COMMANDS_TIMEOUT_SECS".to_string(),
                value: format!("{:?}", config.request_timeout),
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.base_url.is_some()
    }

    fn base_url(&self) -> CommandResult<&str> {
        self.config
            .base_url
            .as_deref()
            .ok_or(CommandError::NotConfigured)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

impl std::fmt::Debug for HttpCommandService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCommandService")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl CommandService for HttpCommandService {
    async fn submit_command(&self, request: &CommandRequest) -> CommandResult<Command> {
        let url = format!("{}/commands", self.base_url()?);

        let mut body = request.clone();
        if body.callback_url.is_none() {
            body.callback_url = self.config.callback_url.clone();
        }

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CommandError::SubmitFailed {
                status: 0,
                message: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CommandError::SubmitFailed {
                status: status.as_u16(),
                message,
            });
        }

        let value: JsonValue = response
            .json()
            .await
            .map_err(|e| CommandError::InvalidResponse {
                reason: format!("Failed to parse submit response: {}", e),
            })?;
        let command = decode_command(value)?;

        tracing::info!(
            command_id = %command.id,
            task = %request.task,
            site_id = %request.site_id,
            "Command submitted"
        );
        Ok(command)
    }

    async fn get_command_by_id(&self, command_id: &str) -> CommandResult<Option<Command>> {
        let url = format!("{}/commands/{}", self.base_url()?, command_id);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| CommandError::LookupFailed {
                command_id: command_id.to_string(),
                message: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CommandError::LookupFailed {
                command_id: command_id.to_string(),
                message: format!("status {}", status.as_u16()),
            });
        }

        let value: JsonValue = response
            .json()
            .await
            .map_err(|e| CommandError::InvalidResponse {
                reason: format!("Failed to parse command {}: {}", command_id, e),
            })?;
        decode_command(value).map(Some)
    }
}

/// Decode a command snapshot, accepting a bare object or one wrapped in
/// `command` or `data`.
pub fn decode_command(value: JsonValue) -> CommandResult<Command> {
    let inner = match value {
        JsonValue::Object(mut map) if !map.contains_key("id") => map
            .remove("command")
            .or_else(|| map.remove("data"))
            .unwrap_or(JsonValue::Object(map)),
        other => other,
    };
    serde_json::from_value(inner).map_err(|e| CommandError::InvalidResponse {
        reason: format!("Unexpected command shape: {}", e),
    })
}
