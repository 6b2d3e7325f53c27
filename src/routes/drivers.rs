// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Driver registration and record routes.

use crate::error::{AppError, Result};
use crate::models::driver::normalize_rfid;
use crate::models::{Driver, DriverInput};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

/// Public self-registration.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/register", post(register))
}

/// Admin driver management.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/drivers", get(list_drivers).post(create_driver))
        .route(
            "/api/drivers/{id}",
            get(get_driver).put(update_driver).delete(delete_driver),
        )
        .route("/api/drivers/rfid/{tag}", get(get_driver_by_rfid))
}

/// Reject a tag already held by another driver.
async fn ensure_rfid_free(state: &AppState, tag: Option<&str>, owner: Option<&str>) -> Result<()> {
    let Some(tag) = tag else {
        return Ok(());
    };
    if let Some(existing) = state.db.find_driver_by_rfid(tag).await? {
        if Some(existing.id.as_str()) != owner {
            return Err(AppError::Conflict(format!(
                "RFID tag {} is already registered",
                tag
            )));
        }
    }
    Ok(())
}

async fn insert_driver(state: &AppState, input: DriverInput) -> Result<Driver> {
    input.validate_on(chrono::Utc::now().date_naive())?;

    let rfid = normalize_rfid(input.rfid_tag.clone());
    ensure_rfid_free(state, rfid.as_deref(), None).await?;

    let now = format_utc_rfc3339(chrono::Utc::now());
    let driver = Driver::from_input(uuid::Uuid::new_v4().to_string(), input, &now);
    state.db.upsert_driver(&driver).await?;

    tracing::info!(driver_id = %driver.id, "Driver registered");
    Ok(driver)
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(input): Json<DriverInput>,
) -> Result<(StatusCode, Json<Driver>)> {
    let driver = insert_driver(&state, input).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(input): Json<DriverInput>,
) -> Result<(StatusCode, Json<Driver>)> {
    let driver = insert_driver(&state, input).await?;
    Ok((StatusCode::CREATED, Json(driver)))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Driver>>> {
    Ok(Json(state.db.list_drivers().await?))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Driver>> {
    state
        .db
        .get_driver(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Driver {}", id)))
}

async fn update_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<DriverInput>,
) -> Result<Json<Driver>> {
    input.validate_on(chrono::Utc::now().date_naive())?;

    let mut driver = state
        .db
        .get_driver(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Driver {}", id)))?;

    let rfid = normalize_rfid(input.rfid_tag.clone());
    ensure_rfid_free(&state, rfid.as_deref(), Some(&id)).await?;

    driver.apply_update(input, &format_utc_rfc3339(chrono::Utc::now()));
    state.db.upsert_driver(&driver).await?;

    Ok(Json(driver))
}

async fn delete_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if state.db.get_driver(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("Driver {}", id)));
    }
    state.db.delete_driver(&id).await?;
    tracing::info!(driver_id = %id, "Driver deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_driver_by_rfid(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> Result<Json<Driver>> {
    let tag = normalize_rfid(Some(tag))
        .ok_or_else(|| AppError::BadRequest("Empty RFID tag".to_string()))?;
    state
        .db
        .find_driver_by_rfid(&tag)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Driver with RFID {}", tag)))
}
