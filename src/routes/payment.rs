// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment provider connection and terminal pairing routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::pairing::{self, PairingState, PairingView};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/payment/status", get(status))
        .route("/api/payment/tokens", delete(disconnect))
        .route("/api/payment/terminal", delete(unlink_terminal))
        .route("/api/payment/pairing", post(start_pairing))
        .route(
            "/api/payment/pairing/{id}",
            get(get_pairing).delete(cancel_pairing),
        )
        .route("/api/payment/pairing/{id}/save", post(save_pairing))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PaymentStatusResponse {
    pub connected: bool,
    pub connected_at: Option<String>,
    pub expires_at: Option<String>,
    pub terminal_link_id: Option<String>,
}

async fn status(State(state): State<Arc<AppState>>) -> Result<Json<PaymentStatusResponse>> {
    let connection = state.payment_service.connection_status().await?;
    let settings = state.db.get_site_settings().await?;
    Ok(Json(PaymentStatusResponse {
        connected: connection.connected,
        connected_at: connection.connected_at,
        expires_at: connection.expires_at,
        terminal_link_id: settings.terminal_link_id,
    }))
}

async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode> {
    state.payment_service.disconnect().await?;
    tracing::info!(operator = %user.subject, "Payment provider disconnected by operator");
    Ok(StatusCode::NO_CONTENT)
}

async fn unlink_terminal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode> {
    state.db.set_terminal_link_id(None).await?;
    tracing::info!(operator = %user.subject, "Terminal link removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn start_pairing(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<PairingView>)> {
    let view = pairing::start_pairing(&state.payment_service, &state.pairing).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

fn find_session(state: &AppState, id: &str) -> Result<PairingView> {
    state
        .pairing
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Pairing session {}", id)))
}

async fn get_pairing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PairingView>> {
    Ok(Json(find_session(&state, &id)?))
}

/// Operator cancel: drops the session and closes its socket.
async fn cancel_pairing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.pairing.remove(&id) {
        return Err(AppError::NotFound(format!("Pairing session {}", id)));
    }
    tracing::info!(session = %id, operator = %user.subject, "Pairing cancelled by operator");
    Ok(StatusCode::NO_CONTENT)
}

/// Persist the link id of a successful pairing and end the session.
async fn save_pairing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PairingView>> {
    let view = find_session(&state, &id)?;
    let PairingState::Successful { link_id } = &view.state else {
        return Err(AppError::BadRequest(format!(
            "Pairing session {} has not completed",
            id
        )));
    };

    state.db.set_terminal_link_id(Some(link_id)).await?;
    state.pairing.remove(&id);

    tracing::info!(
        session = %id,
        link_id = %link_id,
        operator = %user.subject,
        "Terminal link saved"
    );
    Ok(Json(view))
}
