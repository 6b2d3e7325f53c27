// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth `state` parameter handling for the payment provider connection.
//!
//! The state is `base64url(nonce_hex|timestamp_hex|hmac_hex)`. It is sent to
//! the provider and also stored in an HttpOnly cookie. On callback the
//! returned state must equal the cookie, carry a valid signature and be
//! younger than [`STATE_MAX_AGE_SECS`]. All of this is checked before the
//! authorization code is looked at.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Cookie holding the state between redirect and callback.
pub const STATE_COOKIE: &str = "payment_oauth_state";

/// How long an issued state stays valid.
pub const STATE_MAX_AGE_SECS: i64 = 10 * 60;

const NONCE_BYTES: usize = 16;

/// Query parameters the provider sends to the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Why an OAuth callback was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthCallbackError {
    #[error("Provider returned error: {0}")]
    Provider(String),

    #[error("No stored OAuth state")]
    MissingState,

    #[error("OAuth state mismatch")]
    StateMismatch,

    #[error("OAuth state signature invalid")]
    InvalidSignature,

    #[error("OAuth state expired")]
    Expired,

    #[error("Authorization code missing")]
    MissingCode,

    #[error("Token exchange failed: {0}")]
    Exchange(String),
}

impl OAuthCallbackError {
    /// Stable code passed to the frontend in the redirect.
    pub fn code(&self) -> &'static str {
        match self {
            OAuthCallbackError::Provider(_) => "provider_error",
            OAuthCallbackError::MissingState => "missing_state",
            OAuthCallbackError::StateMismatch => "state_mismatch",
            OAuthCallbackError::InvalidSignature => "invalid_state",
            OAuthCallbackError::Expired => "state_expired",
            OAuthCallbackError::MissingCode => "missing_code",
            OAuthCallbackError::Exchange(_) => "token_exchange_failed",
        }
    }

    /// Localized message for the operator.
    pub fn user_message(&self) -> &'static str {
        match self {
            OAuthCallbackError::Provider(_) => {
                "Betalingsleverandøren avviste tilkoblingen."
            }
            OAuthCallbackError::MissingState
            | OAuthCallbackError::StateMismatch
            | OAuthCallbackError::InvalidSignature => {
                "Ugyldig sikkerhetsnøkkel. Start tilkoblingen på nytt."
            }
            OAuthCallbackError::Expired => "Tilkoblingen tok for lang tid. Prøv igjen.",
            OAuthCallbackError::MissingCode => "Mangler autorisasjonskode fra leverandøren.",
            OAuthCallbackError::Exchange(_) => {
                "Kunne ikke hente tilgangsnøkler fra betalingsleverandøren."
            }
        }
    }
}

/// Issue a new signed state for `now_millis`.
pub fn issue_state(secret: &[u8], now_millis: i64) -> anyhow::Result<String> {
    let mut nonce = [0u8; NONCE_BYTES];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| anyhow::anyhow!("System RNG failure"))?;

    let payload = format!("{}|{:x}", hex::encode(nonce), now_millis);
    let signature = sign(secret, &payload)?;

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

fn sign(secret: &[u8], payload: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("HMAC init failed: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check the state returned by the provider against the stored one.
pub fn verify_state(
    returned: Option<&str>,
    stored: Option<&str>,
    secret: &[u8],
    now_millis: i64,
) -> Result<(), OAuthCallbackError> {
    let stored = stored
        .filter(|s| !s.is_empty())
        .ok_or(OAuthCallbackError::MissingState)?;
    let returned = returned.ok_or(OAuthCallbackError::StateMismatch)?;

    if !bool::from(returned.as_bytes().ct_eq(stored.as_bytes())) {
        return Err(OAuthCallbackError::StateMismatch);
    }

    let decoded = URL_SAFE_NO_PAD
        .decode(returned)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
        .ok_or(OAuthCallbackError::InvalidSignature)?;

    let parts: Vec<&str> = decoded.splitn(3, '|').collect();
    let [nonce_hex, timestamp_hex, signature_hex] = parts[..] else {
        return Err(OAuthCallbackError::InvalidSignature);
    };

    let payload = format!("{}|{}", nonce_hex, timestamp_hex);
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| OAuthCallbackError::InvalidSignature)?;
    mac.update(payload.as_bytes());
    let signature = hex::decode(signature_hex).map_err(|_| OAuthCallbackError::InvalidSignature)?;
    mac.verify_slice(&signature)
        .map_err(|_| OAuthCallbackError::InvalidSignature)?;

    let issued_at =
        i64::from_str_radix(timestamp_hex, 16).map_err(|_| OAuthCallbackError::InvalidSignature)?;
    if now_millis - issued_at > STATE_MAX_AGE_SECS * 1000 || issued_at > now_millis {
        return Err(OAuthCallbackError::Expired);
    }

    Ok(())
}

/// Validate a callback and return the authorization code.
///
/// Order matters: a provider error or any state problem ends the flow
/// before the code is considered, so no token exchange can happen on a
/// forged callback.
pub fn validate_callback<'a>(
    params: &'a CallbackParams,
    stored_state: Option<&str>,
    secret: &[u8],
    now_millis: i64,
) -> Result<&'a str, OAuthCallbackError> {
    if let Some(error) = &params.error {
        let detail = params
            .error_description
            .as_deref()
            .map(|d| format!("{}: {}", error, d))
            .unwrap_or_else(|| error.clone());
        return Err(OAuthCallbackError::Provider(detail));
    }

    verify_state(params.state.as_deref(), stored_state, secret, now_millis)?;

    params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(OAuthCallbackError::MissingCode)
}
