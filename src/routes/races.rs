// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Race and race signup routes.

use crate::error::{AppError, Result};
use crate::models::{Race, RaceInput, RaceSignup, SignupRequest};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/races", get(list_races).post(create_race))
        .route("/api/races/{id}", get(get_race).delete(delete_race))
        .route(
            "/api/races/{id}/signups",
            get(list_signups).post(create_signup),
        )
        .route(
            "/api/races/{id}/signups/{driver_id}",
            delete(delete_signup),
        )
}

async fn load_race(state: &AppState, id: &str) -> Result<Race> {
    state
        .db
        .get_race(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Race {}", id)))
}

async fn list_races(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Race>>> {
    Ok(Json(state.db.list_races().await?))
}

async fn create_race(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RaceInput>,
) -> Result<(StatusCode, Json<Race>)> {
    input.validate()?;

    let race = Race::from_input(
        uuid::Uuid::new_v4().to_string(),
        input,
        &format_utc_rfc3339(chrono::Utc::now()),
    );
    state.db.upsert_race(&race).await?;

    tracing::info!(race_id = %race.id, name = %race.name, "Race created");
    Ok((StatusCode::CREATED, Json(race)))
}

async fn get_race(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Race>> {
    Ok(Json(load_race(&state, &id).await?))
}

async fn delete_race(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    load_race(&state, &id).await?;
    state.db.delete_race(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_signup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<RaceSignup>)> {
    request.validate()?;

    let race = load_race(&state, &id).await?;
    let driver = state
        .db
        .get_driver(&request.driver_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Driver {}", request.driver_id)))?;

    let signup = RaceSignup {
        race_id: race.id,
        driver_id: driver.id.clone(),
        driver_name: driver.full_name(),
        klasse: request.klasse.or(driver.klasse),
        created_at: format_utc_rfc3339(chrono::Utc::now()),
    };

    // Create-only write; a second signup for the same pair is a conflict.
    state.db.create_race_signup(&signup).await?;

    tracing::info!(race_id = %signup.race_id, driver_id = %signup.driver_id, "Driver signed up");
    Ok((StatusCode::CREATED, Json(signup)))
}

async fn list_signups(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RaceSignup>>> {
    load_race(&state, &id).await?;
    Ok(Json(state.db.list_signups_for_race(&id).await?))
}

async fn delete_signup(
    State(state): State<Arc<AppState>>,
    Path((id, driver_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    if state.db.get_race_signup(&id, &driver_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Signup for driver {} in race {}",
            driver_id, id
        )));
    }
    state.db.delete_race_signup(&id, &driver_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
