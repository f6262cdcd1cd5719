//! Uncodie API - REST Layer for the AI Sales Team
//!
//! Axum routes for the sales agent workflows, team notifications, robot
//! assistant and agent framework callbacks, together with the PostgreSQL
//! store, the SendGrid client and the email templates they rely on.

pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod macros;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod templates;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use config::{AppConfig, Branding};
pub use db::{DbClient, DbConfig};
pub use email::{
    EmailClient, EmailMessage, EmailReceipt, MockEmailClient, SendGridClient, SendGridConfig,
};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use notify::{TeamNotification, TeamNotifier, TeamNotifyReport};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use types::*;
