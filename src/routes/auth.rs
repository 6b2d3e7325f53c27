// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin login and payment provider OAuth routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::services::oauth::{self, CallbackParams, OAuthCallbackError, STATE_COOKIE};
use crate::AppState;

/// Routes reachable without a session.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/payment/callback", get(payment_callback))
}

/// Routes that need an admin session.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/payment", get(payment_start))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    expires_in: usize,
}

/// Plain HTTP is only allowed for local development frontends.
fn is_local(frontend_url: &str) -> bool {
    frontend_url.starts_with("http://localhost") || frontend_url.starts_with("http://127.0.0.1")
}

/// Build a cookie with the attributes shared by creation and removal.
fn base_cookie(name: &'static str, value: String, frontend_url: &str) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(!is_local(frontend_url))
        .same_site(SameSite::Lax)
        .build()
}

fn removal_cookie(name: &'static str, frontend_url: &str) -> Cookie<'static> {
    let mut cookie = base_cookie(name, String::new(), frontend_url);
    cookie.make_removal();
    cookie
}

/// Exchange the club admin password for a session.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let expected = state.config.admin_password.as_bytes();
    if !bool::from(body.password.as_bytes().ct_eq(expected)) {
        tracing::warn!("Admin login failed");
        return Err(AppError::Unauthorized);
    }

    let token = create_jwt("admin", &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let mut cookie = base_cookie(SESSION_COOKIE, token.clone(), &state.config.frontend_url);
    cookie.set_max_age(time::Duration::seconds(SESSION_TTL_SECS as i64));

    tracing::info!("Admin logged in");

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token,
            expires_in: SESSION_TTL_SECS,
        }),
    ))
}

/// Clear the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(removal_cookie(SESSION_COOKIE, &state.config.frontend_url));
    (jar, StatusCode::NO_CONTENT)
}

/// Start the provider connection: store a fresh state and redirect.
async fn payment_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let oauth_state = oauth::issue_state(
        &state.config.oauth_state_key,
        chrono::Utc::now().timestamp_millis(),
    )?;

    let mut cookie = base_cookie(STATE_COOKIE, oauth_state.clone(), &state.config.frontend_url);
    cookie.set_max_age(time::Duration::seconds(oauth::STATE_MAX_AGE_SECS));

    let auth_url = state.payment_service.client().authorize_url(&oauth_state);

    tracing::info!("Starting payment provider OAuth flow");

    Ok((jar.add(cookie), Redirect::temporary(&auth_url)))
}

/// Provider callback. Validates the state before any token exchange and
/// always clears the state cookie.
async fn payment_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let settings_url = format!("{}/admin/settings", state.config.frontend_url);
    let stored = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.add(removal_cookie(STATE_COOKIE, &state.config.frontend_url));

    let result = match oauth::validate_callback(
        &params,
        stored.as_deref(),
        &state.config.oauth_state_key,
        chrono::Utc::now().timestamp_millis(),
    ) {
        Ok(code) => state
            .payment_service
            .handle_oauth_callback(code)
            .await
            .map_err(|e| OAuthCallbackError::Exchange(e.to_string())),
        Err(e) => Err(e),
    };

    let redirect = match result {
        Ok(()) => format!("{}?payment=connected", settings_url),
        Err(e) => {
            tracing::warn!(error = %e, code = e.code(), "Payment OAuth callback rejected");
            format!(
                "{}?error={}&message={}",
                settings_url,
                e.code(),
                urlencoding::encode(e.user_message())
            )
        }
    };

    (jar, Redirect::temporary(&redirect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_frontend_detection() {
        assert!(is_local("http://localhost:5173"));
        assert!(is_local("http://127.0.0.1:8080"));
        assert!(!is_local("https://kart.example.no"));
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = base_cookie(SESSION_COOKIE, "v".to_string(), "https://kart.example.no");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));

        let local = base_cookie(SESSION_COOKIE, "v".to_string(), "http://localhost:5173");
        assert_eq!(local.secure(), Some(false));
    }

    #[test]
    fn test_removal_cookie_matches_attributes() {
        let cookie = removal_cookie(STATE_COOKIE, "https://kart.example.no");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
