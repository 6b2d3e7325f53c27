// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{CheckinHistoryEntry, CheckinRequest};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Datelike;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/checkins", post(check_in).get(list_for_year))
        .route("/api/checkins/driver/{id}", get(list_for_driver))
}

#[derive(Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

impl YearQuery {
    /// Requested year, defaulting to the current one.
    pub fn resolve(&self) -> Result<i32> {
        let year = self.year.unwrap_or_else(|| chrono::Utc::now().year());
        if !(2000..=2100).contains(&year) {
            return Err(AppError::BadRequest(format!("Invalid year {}", year)));
        }
        Ok(year)
    }
}

async fn check_in(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CheckinRequest>,
) -> Result<(StatusCode, Json<CheckinHistoryEntry>)> {
    if request.driver_id.trim().is_empty() {
        return Err(AppError::BadRequest("driver_id is required".to_string()));
    }
    let entry = state.checkin_service.check_in(&request, &user.subject).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn list_for_year(
    State(state): State<Arc<AppState>>,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<CheckinHistoryEntry>>> {
    let year = query.resolve()?;
    Ok(Json(state.db.list_checkins_for_year(year).await?))
}

async fn list_for_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CheckinHistoryEntry>>> {
    Ok(Json(state.db.list_checkins_for_driver(&id).await?))
}
