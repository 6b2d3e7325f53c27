// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment provider credentials.

use serde::{Deserialize, Serialize};

/// The club's OAuth tokens for the payment provider (encrypted in Firestore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTokens {
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
    /// When the provider was connected
    pub connected_at: String,
}
