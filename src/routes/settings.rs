// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Site and training calendar settings routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{SiteSettings, TrainingSettings};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/settings/site", get(get_site).put(put_site))
        .route(
            "/api/settings/training/{year}",
            get(get_training).put(put_training),
        )
        .route("/api/settings/training/{year}/days", get(training_days))
}

async fn get_site(State(state): State<Arc<AppState>>) -> Result<Json<SiteSettings>> {
    Ok(Json(state.db.get_site_settings().await?))
}

/// Replace the site settings. The terminal link is owned by the pairing
/// flow and is kept as stored.
async fn put_site(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(mut settings): Json<SiteSettings>,
) -> Result<Json<SiteSettings>> {
    settings.validate()?;

    let current = state.db.get_site_settings().await?;
    settings.terminal_link_id = current.terminal_link_id;
    settings.updated_at = format_utc_rfc3339(chrono::Utc::now());

    state.db.set_site_settings(&settings).await?;
    tracing::info!(operator = %user.subject, "Site settings updated");
    Ok(Json(settings))
}

fn check_year(year: i32) -> Result<()> {
    if !(2000..=2100).contains(&year) {
        return Err(AppError::BadRequest(format!("Invalid year {}", year)));
    }
    Ok(())
}

async fn get_training(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
) -> Result<Json<TrainingSettings>> {
    check_year(year)?;
    Ok(Json(state.db.get_training_settings(year).await?))
}

async fn put_training(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(year): Path<i32>,
    Json(mut settings): Json<TrainingSettings>,
) -> Result<Json<TrainingSettings>> {
    check_year(year)?;
    if settings.year != year {
        return Err(AppError::BadRequest(format!(
            "Body year {} does not match path year {}",
            settings.year, year
        )));
    }
    settings.validate()?;
    settings.extra_dates.sort();
    settings.extra_dates.dedup();
    settings.cancelled_dates.sort();
    settings.cancelled_dates.dedup();
    settings.updated_at = format_utc_rfc3339(chrono::Utc::now());

    state.db.set_training_settings(&settings).await?;
    tracing::info!(year, operator = %user.subject, "Training calendar updated");
    Ok(Json(settings))
}

#[derive(Deserialize)]
pub struct MonthQuery {
    month: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TrainingDaysResponse {
    pub year: i32,
    pub month: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "string[]"))]
    pub days: Vec<NaiveDate>,
}

async fn training_days(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i32>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<TrainingDaysResponse>> {
    check_year(year)?;
    if !(1..=12).contains(&query.month) {
        return Err(AppError::BadRequest(format!("Invalid month {}", query.month)));
    }

    let calendar = state.db.get_training_settings(year).await?;
    Ok(Json(TrainingDaysResponse {
        year,
        month: query.month,
        days: calendar.training_days(query.month),
    }))
}
