// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment provider API client.
//!
//! Handles:
//! - OAuth authorization URL, code exchange and token refresh
//! - Requesting terminal pairing codes
//! - Rejected-token detection (so the UI can ask for a reconnect)

use crate::error::AppError;
use serde::Deserialize;

/// OAuth scopes requested from the provider.
pub const PAYMENT_SCOPES: &[&str] = &["READ:PAYMENT", "WRITE:PAYMENT"];

/// Payment provider API client.
#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    oauth_base_url: String,
    api_base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl PaymentClient {
    /// Create a new client with OAuth credentials.
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        oauth_base_url: String,
        api_base_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            oauth_base_url,
            api_base_url,
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// URL the operator is redirected to when connecting the provider.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.oauth_base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&PAYMENT_SCOPES.join(" ")),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base_url))
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AppError::PaymentApi(format!("Token exchange failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base_url))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::PaymentApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Ask the provider for a pairing code and the WebSocket that reports
    /// when the operator has entered it on the terminal.
    pub async fn request_pairing(&self, access_token: &str) -> Result<PairingCode, AppError> {
        let response = self
            .http
            .post(format!("{}/links/pairing", self.api_base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::PaymentApi(format!("Pairing request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(AppError::PaymentApi(AppError::PAYMENT_TOKEN_ERROR.to_string()));
            }

            // invalid_grant arrives as 400 with an OAuth error body
            return Err(AppError::PaymentApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PaymentApi(format!("JSON parse error: {}", e)))
    }
}

/// OAuth token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Some providers omit this on refresh; keep the old one then.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
}

/// Pairing code and completion socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCode {
    /// Code the operator types on the terminal
    pub code: String,
    /// WebSocket that emits the completion event
    pub websocket_url: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// PaymentService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::{documents, FirestoreDb};
use crate::models::PaymentTokens;
use crate::services::kms::{self, KmsService};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Provider connection state for the admin UI.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub connected_at: Option<String>,
    pub expires_at: Option<String>,
}

/// High-level payment service that owns the club's provider tokens.
///
/// This service encapsulates:
/// - Token retrieval and decryption from Firestore
/// - Automatic token refresh when expiring (with 5-minute margin)
/// - Re-encryption and storage of refreshed tokens
/// - An in-memory cache of the decrypted access token
/// - A mutex so only one request refreshes at a time
#[derive(Clone)]
pub struct PaymentService {
    client: PaymentClient,
    db: FirestoreDb,
    kms: KmsService,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
    refresh_lock: Arc<Mutex<()>>,
}

impl PaymentService {
    pub fn new(client: PaymentClient, db: FirestoreDb, kms: KmsService) -> Self {
        Self {
            client,
            db,
            kms,
            token_cache: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn client(&self) -> &PaymentClient {
        &self.client
    }

    /// AAD binding the ciphertexts to their Firestore document.
    fn aad() -> &'static [u8] {
        documents::PAYMENT_TOKENS.as_bytes()
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token, refreshing if needed.
    pub async fn get_valid_access_token(&self) -> Result<String, AppError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        // Fast path: cached and not about to expire
        if let Some(cached) = self.cached_token(margin).await {
            return Ok(cached);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another request may have refreshed while we waited
        if let Some(cached) = self.cached_token(margin).await {
            return Ok(cached);
        }

        let tokens = self
            .db
            .get_payment_tokens()
            .await?
            .ok_or(AppError::PaymentNotConnected)?;

        let expires_at = DateTime::parse_from_rfc3339(&tokens.expires_at)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse expiry: {}", e)))?
            .with_timezone(&Utc);

        if Utc::now() + margin < expires_at {
            let access_token = self
                .kms
                .decrypt(&tokens.access_token_encrypted, Self::aad())
                .await?;
            self.store_cache(&access_token, expires_at).await;
            return Ok(access_token);
        }

        tracing::info!("Payment access token expired, refreshing");

        let refresh_token = self
            .kms
            .decrypt(&tokens.refresh_token_encrypted, Self::aad())
            .await?;

        let refreshed = match self.client.refresh_token(&refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) if e.is_payment_token_error() => {
                tracing::warn!(error = %e, "Payment refresh token rejected, disconnecting");
                self.forget_tokens().await?;
                return Err(AppError::PaymentNotConnected);
            }
            Err(e) => return Err(e),
        };
        let new_refresh = refreshed
            .refresh_token
            .clone()
            .unwrap_or(refresh_token);

        let new_expires_at = self
            .save_tokens(
                &refreshed.access_token,
                &new_refresh,
                refreshed.expires_in,
                tokens.connected_at,
            )
            .await?;

        self.store_cache(&refreshed.access_token, new_expires_at)
            .await;

        tracing::info!("Payment token refreshed and cached");
        Ok(refreshed.access_token)
    }

    async fn cached_token(&self, margin: Duration) -> Option<String> {
        let cache = self.token_cache.read().await;
        cache
            .as_ref()
            .filter(|c| Utc::now() + margin < c.expires_at)
            .map(|c| c.access_token.clone())
    }

    async fn store_cache(&self, access_token: &str, expires_at: DateTime<Utc>) {
        *self.token_cache.write().await = Some(CachedToken {
            access_token: access_token.to_string(),
            expires_at,
        });
    }

    /// Encrypt and persist a token pair. Returns the access token expiry.
    async fn save_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in: i64,
        connected_at: String,
    ) -> Result<DateTime<Utc>, AppError> {
        let (enc_access, enc_refresh) =
            kms::encrypt_tokens(&self.kms, access_token, refresh_token, Self::aad()).await?;

        let expires_at = Utc::now() + Duration::seconds(expires_in.max(0));

        let tokens = PaymentTokens {
            access_token_encrypted: enc_access,
            refresh_token_encrypted: enc_refresh,
            expires_at: format_utc_rfc3339(expires_at),
            scopes: PAYMENT_SCOPES.iter().map(|s| s.to_string()).collect(),
            connected_at,
        };

        self.db.set_payment_tokens(&tokens).await?;
        Ok(expires_at)
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Exchange a verified authorization code and persist the tokens.
    ///
    /// Callers must have verified the OAuth state first.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<(), AppError> {
        let token_response = self.client.exchange_code(code).await?;

        let refresh_token = token_response.refresh_token.as_deref().ok_or_else(|| {
            AppError::PaymentApi("Token exchange returned no refresh token".to_string())
        })?;

        let expires_at = self
            .save_tokens(
                &token_response.access_token,
                refresh_token,
                token_response.expires_in,
                format_utc_rfc3339(Utc::now()),
            )
            .await?;

        self.store_cache(&token_response.access_token, expires_at)
            .await;

        tracing::info!("Payment provider connected, tokens stored");
        Ok(())
    }

    /// Forget the provider tokens.
    pub async fn disconnect(&self) -> Result<(), AppError> {
        let _guard = self.refresh_lock.lock().await;
        self.forget_tokens().await?;
        Ok(())
    }

    /// Delete stored tokens and the cache. Caller holds `refresh_lock`.
    async fn forget_tokens(&self) -> Result<(), AppError> {
        self.db.delete_payment_tokens().await?;
        *self.token_cache.write().await = None;
        Ok(())
    }

    pub async fn connection_status(&self) -> Result<ConnectionStatus, AppError> {
        let tokens = self.db.get_payment_tokens().await?;
        Ok(ConnectionStatus {
            connected: tokens.is_some(),
            connected_at: tokens.as_ref().map(|t| t.connected_at.clone()),
            expires_at: tokens.map(|t| t.expires_at),
        })
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Request a pairing code with a valid access token.
    pub async fn request_pairing(&self) -> Result<PairingCode, AppError> {
        let access_token = self.get_valid_access_token().await?;
        self.client.request_pairing(&access_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PaymentClient {
        PaymentClient::new(
            "club id".to_string(),
            "secret".to_string(),
            "https://kart.example.no/auth/payment/callback".to_string(),
            "https://oauth.example.com".to_string(),
            "https://api.example.com".to_string(),
        )
    }

    #[test]
    fn test_authorize_url_encodes_params() {
        let url = client().authorize_url("abc_DEF-123");
        assert!(url.starts_with("https://oauth.example.com/authorize?response_type=code"));
        assert!(url.contains("client_id=club%20id"));
        assert!(url.contains(
            "redirect_uri=https%3A%2F%2Fkart.example.no%2Fauth%2Fpayment%2Fcallback"
        ));
        assert!(url.contains("scope=READ%3APAYMENT%20WRITE%3APAYMENT"));
        assert!(url.ends_with("state=abc_DEF-123"));
    }

    #[test]
    fn test_pairing_code_wire_format() {
        let parsed: PairingCode =
            serde_json::from_str(r#"{"code":"ABCD1234","websocketUrl":"wss://ws.example.com/p/1"}"#)
                .unwrap();
        assert_eq!(parsed.code, "ABCD1234");
        assert_eq!(parsed.websocket_url, "wss://ws.example.com/p/1");
    }

    #[tokio::test]
    async fn test_not_connected_when_offline() {
        let service = PaymentService::new(client(), FirestoreDb::new_mock(), KmsService::new_mock());
        // Offline DB surfaces as a database error, never as a silent success.
        assert!(service.get_valid_access_token().await.is_err());
    }
}
