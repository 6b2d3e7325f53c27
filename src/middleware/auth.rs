// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin session JWTs and the middleware that checks them.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie carrying the admin session token.
pub const SESSION_COOKIE: &str = "kart_token";

/// Admin sessions last one club day.
pub const SESSION_TTL_SECS: usize = 12 * 60 * 60;

/// Only role issued today. Kept in the token so a check-in kiosk role can
/// be added without invalidating sessions.
pub const ROLE_ADMIN: &str = "admin";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (operator name)
    pub sub: String,
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated operator extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
}

/// Middleware that requires a valid admin session.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(t) => t.to_string(),
            None => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let claims = verify_jwt(&token, &state.config.jwt_signing_key)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if claims.role != ROLE_ADMIN {
        tracing::warn!(sub = %claims.sub, role = %claims.role, "Non-admin token rejected");
        return Err(StatusCode::FORBIDDEN);
    }

    request.extensions_mut().insert(AuthUser {
        subject: claims.sub,
    });

    Ok(next.run(request).await)
}

/// Decode and validate a session token.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Option<Claims> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Create a JWT for an admin session.
pub fn create_jwt(subject: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: subject.to_string(),
        role: ROLE_ADMIN.to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test_signing_key_that_is_long_enough";

    #[test]
    fn test_jwt_roundtrip() {
        let token = create_jwt("admin", KEY).unwrap();
        let claims = verify_jwt(&token, KEY).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, ROLE_ADMIN);
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECS);
    }

    #[test]
    fn test_jwt_wrong_key() {
        let token = create_jwt("admin", KEY).unwrap();
        assert!(verify_jwt(&token, b"another_key").is_none());
    }

    #[test]
    fn test_jwt_garbage() {
        assert!(verify_jwt("not.a.jwt", KEY).is_none());
    }
}
