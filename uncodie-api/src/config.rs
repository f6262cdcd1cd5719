//! API Configuration Module
//!
//! Process-level settings loaded from environment variables with defaults
//! suitable for local development.

use std::net::SocketAddr;
use std::time::Duration;

use uncodie_agents::DEFAULT_ROBOT_PROVIDER;
use uncodie_core::ConfigError;

// ============================================================================
// BRANDING
// ============================================================================

/// Values interpolated into every email template.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Branding {
    pub company_name: String,
    pub branding_text: String,
    pub logo_url: Option<String>,
    /// Base URL of the web app; links in emails point here.
    pub app_url: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            company_name: "Uncodie".to_string(),
            branding_text: "Your AI sales team".to_string(),
            logo_url: None,
            app_url: "http://localhost:3000".to_string(),
        }
    }
}

// ============================================================================
// APP CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub branding: Branding,

    /// Robot SDK provider named in assistant contexts.
    pub robot_provider: String,

    /// `development`, `staging`, `production`, ...
    pub environment: String,

    pub bind_host: String,
    pub port: u16,

    /// Upper bound for any single request, agent waits included.
    pub request_timeout: Duration,

    /// Allowed CORS origins. Empty means allow all (dev mode).
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            branding: Branding::default(),
            robot_provider: DEFAULT_ROBOT_PROVIDER.to_string(),
            environment: "development".to_string(),
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout: Duration::from_secs(300),
            cors_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Create AppConfig from environment variables.
    ///
    /// Environment variables:
    /// - `NEXT_PUBLIC_APP_URL`: base URL used in email links
    /// - `UNCODIE_COMPANY_NAME`, `UNCODIE_BRANDING_TEXT`, `UNCODIE_LOGO_URL`: email branding
    /// - `ROBOT_SDK_PROVIDER`: robot provider (default: scrapybara)
    /// - `UNCODIE_ENVIRONMENT`, falling back to `NODE_ENV` (default: development)
    /// - `UNCODIE_API_BIND` (default: 0.0.0.0), `PORT` or `UNCODIE_API_PORT` (default: 3000)
    /// - `UNCODIE_REQUEST_TIMEOUT_SECS` (default: 300)
    /// - `UNCODIE_CORS_ORIGINS`: comma-separated allowed origins
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let branding = Branding {
            company_name: env_non_empty("UNCODIE_COMPANY_NAME")
                .unwrap_or(defaults.branding.company_name),
            branding_text: env_non_empty("UNCODIE_BRANDING_TEXT")
                .unwrap_or(defaults.branding.branding_text),
            logo_url: env_non_empty("UNCODIE_LOGO_URL"),
            app_url: env_non_empty("NEXT_PUBLIC_APP_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.branding.app_url),
        };

        let environment = env_non_empty("UNCODIE_ENVIRONMENT")
            .or_else(|| env_non_empty("NODE_ENV"))
            .map(|e| e.to_lowercase())
            .unwrap_or(defaults.environment);

        let port = match env_non_empty("PORT").or_else(|| env_non_empty("UNCODIE_API_PORT")) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                field: "PORT".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.port,
        };

        let request_timeout = env_non_empty("UNCODIE_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let cors_origins = env_non_empty("UNCODIE_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            branding,
            robot_provider: env_non_empty("ROBOT_SDK_PROVIDER").unwrap_or(defaults.robot_provider),
            environment,
            bind_host: env_non_empty("UNCODIE_API_BIND").unwrap_or(defaults.bind_host),
            port,
            request_timeout,
            cors_origins,
        })
    }

    /// Development mode exposes debug excerpts on system errors.
    pub fn is_development(&self) -> bool {
        matches!(self.environment.as_str(), "development" | "dev" | "local")
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "UNCODIE_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.is_development());
        assert!(!config.is_production());
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.robot_provider, "scrapybara");
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_bind_addr() {
        let config = AppConfig {
            bind_host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.bind_addr().unwrap().port(), 8080);

        let bad = AppConfig {
            bind_host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(bad.bind_addr().is_err());
    }

    #[test]
    fn test_production_is_not_development() {
        let config = AppConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
        assert!(!config.is_development());
    }
}
