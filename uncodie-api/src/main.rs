use std::sync::Arc;

use uncodie_api::telemetry::{init_tracing, TelemetryConfig};
use uncodie_api::{
    create_api_router, ApiError, ApiResult, AppConfig, AppState, DbClient, DbConfig,
    SendGridClient, SendGridConfig,
};
use uncodie_commands::{CommandServiceConfig, HttpCommandService, WaitPolicy};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = AppConfig::from_env()?;
    let addr = config.bind_addr()?;

    let db = DbClient::from_config(&DbConfig::from_env())?;

    let command_config = CommandServiceConfig::from_env();
    let callback_secret = command_config.callback_secret.clone();
    if callback_secret.is_none() {
        tracing::warn!("No callback secret configured; completion callbacks are accepted unsigned");
    }
    let commands = HttpCommandService::new(command_config)?;

    let email = SendGridClient::new(SendGridConfig::from_env())?;
    let policy = WaitPolicy::from_env();
    tracing::info!(
        environment = %config.environment,
        max_attempts = policy.max_attempts,
        deadline_secs = policy.deadline.as_secs(),
        "Configuration loaded"
    );

    let state = AppState::new(
        config,
        Arc::new(db),
        Arc::new(commands),
        Arc::new(email),
        policy,
        callback_secret,
    );
    let app = create_api_router(state);

    tracing::info!(%addr, "Starting Uncodie API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::system(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::system(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
