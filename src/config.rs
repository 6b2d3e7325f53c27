// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read once at startup. Missing required values fail fast.

use chrono_tz::Tz;
use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Payment provider OAuth client ID (public)
    pub payment_client_id: String,
    /// Redirect URI registered with the payment provider
    pub payment_redirect_uri: String,
    /// Base URL of the provider's OAuth endpoints (authorize, token)
    pub payment_oauth_base_url: String,
    /// Base URL of the provider's REST API
    pub payment_api_base_url: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (KMS key location)
    pub gcp_region: String,
    /// Server port
    pub port: u16,
    /// Club timezone; check-in dates and years follow the local calendar
    pub club_timezone: Tz,

    // --- Secrets ---
    /// Payment provider OAuth client secret
    pub payment_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// Password for the club admin login
    pub admin_password: String,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            payment_client_id: "test_client_id".to_string(),
            payment_redirect_uri: "http://localhost:8080/auth/payment/callback".to_string(),
            // Port 9 (discard) so any accidental outbound call fails fast.
            payment_oauth_base_url: "http://127.0.0.1:9/oauth".to_string(),
            payment_api_base_url: "http://127.0.0.1:9/api".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "europe-north1".to_string(),
            port: 8080,
            club_timezone: chrono_tz::Europe::Oslo,
            payment_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            admin_password: "test_admin_password".to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is loaded first if present (local development).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw))?,
            Err(_) => 8080,
        };

        let club_timezone = match env::var("CLUB_TIMEZONE") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("CLUB_TIMEZONE", raw))?,
            Err(_) => chrono_tz::Europe::Oslo,
        };

        Ok(Self {
            payment_client_id: required("PAYMENT_CLIENT_ID")?,
            payment_redirect_uri: required("PAYMENT_REDIRECT_URI")?,
            payment_oauth_base_url: required("PAYMENT_OAUTH_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            payment_api_base_url: required("PAYMENT_API_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "europe-north1".to_string()),
            port,
            club_timezone,

            payment_client_secret: required("PAYMENT_CLIENT_SECRET")?,
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
            oauth_state_key: required("OAUTH_STATE_KEY")?.into_bytes(),
            admin_password: required("ADMIN_PASSWORD")?,
        })
    }
}

/// Read a required, trimmed, non-empty environment variable.
fn required(name: &'static str) -> Result<String, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(value.to_string())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
