// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud KMS service for encrypting/decrypting payment provider tokens.
//!
//! Uses direct KMS encryption (not envelope encryption); the tokens are a
//! few hundred bytes and written rarely. Every ciphertext is bound to the
//! document it is stored in via additional authenticated data (AAD), so a
//! ciphertext copied into another document fails to decrypt.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

impl KmsService {
    /// KMS Key Ring Name
    const KEY_RING_NAME: &str = "kart-checkin";

    /// Create a new KMS service.
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, AppError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS auth config: {}", e))
            })?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS client: {}", e))
            })?;

        tracing::info!(key = %key_path, "KMS client ready");

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Create a mock KMS service for testing (offline mode).
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            key_path: "projects/mock/locations/mock/keyRings/mock/cryptoKeys/mock".to_string(),
            client: None,
        }
    }

    /// Encrypt plaintext bound to `aad`.
    /// Returns base64-encoded ciphertext.
    pub async fn encrypt(&self, plaintext: &str, aad: &[u8]) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        // Mock mode: "hex(aad)|plaintext", base64 encoded
        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return Ok(BASE64.encode(format!("{}|{}", hex::encode(aad), plaintext)));
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            additional_authenticated_data: aad.to_vec(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt base64-encoded ciphertext that was encrypted with the same `aad`.
    pub async fn decrypt(&self, ciphertext_b64: &str, aad: &[u8]) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Base64 decode failed: {}", e)))?;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return mock_decrypt(&ciphertext, aad);
            }
        }

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))?;

        let req = DecryptRequest {
            name: self.key_path.clone(),
            ciphertext,
            additional_authenticated_data: aad.to_vec(),
            ..Default::default()
        };

        let response = client
            .decrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS decrypt failed: {}", e)))?;

        String::from_utf8(response.plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }
}

#[cfg(debug_assertions)]
fn mock_decrypt(ciphertext: &[u8], aad: &[u8]) -> Result<String, AppError> {
    let text = std::str::from_utf8(ciphertext)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed (mock): {}", e)))?;
    let (aad_hex, plaintext) = text
        .split_once('|')
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Malformed mock ciphertext")))?;
    if aad_hex != hex::encode(aad) {
        return Err(AppError::Internal(anyhow::anyhow!(
            "KMS decrypt failed (mock): AAD mismatch"
        )));
    }
    Ok(plaintext.to_string())
}

/// Encrypt an access/refresh token pair before storing.
pub async fn encrypt_tokens(
    kms: &KmsService,
    access_token: &str,
    refresh_token: &str,
    aad: &[u8],
) -> Result<(String, String), AppError> {
    let encrypted_access = kms.encrypt(access_token, aad).await?;
    let encrypted_refresh = kms.encrypt(refresh_token, aad).await?;
    Ok((encrypted_access, encrypted_refresh))
}
