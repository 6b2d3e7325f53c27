// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Attendance report routes.

use crate::error::Result;
use crate::models::AttendanceReport;
use crate::routes::checkins::YearQuery;
use crate::services::report::{attendance_csv, attendance_filename};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/reports/attendance", get(attendance))
        .route("/api/reports/attendance.csv", get(attendance_export))
}

async fn build_report(state: &AppState, year: i32) -> Result<AttendanceReport> {
    let entries = state.db.list_checkins_for_year(year).await?;
    Ok(AttendanceReport::build(year, &entries))
}

async fn attendance(
    State(state): State<Arc<AppState>>,
    Query(query): Query<YearQuery>,
) -> Result<Json<AttendanceReport>> {
    let year = query.resolve()?;
    Ok(Json(build_report(&state, year).await?))
}

async fn attendance_export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<YearQuery>,
) -> Result<impl IntoResponse> {
    let year = query.resolve()?;
    let report = build_report(&state, year).await?;
    let body = attendance_csv(&report)?;

    tracing::info!(year, drivers = report.drivers.len(), "Attendance exported");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", attendance_filename(year)),
            ),
        ],
        body,
    ))
}
