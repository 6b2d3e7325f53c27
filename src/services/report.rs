// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Attendance report export.

use crate::error::AppError;
use crate::models::AttendanceReport;

/// Excel only detects UTF-8 with a byte order mark.
pub const UTF8_BOM: &str = "\u{feff}";

/// Column headers of the attendance export.
pub const CSV_HEADERS: [&str; 5] = ["Navn", "Trening", "Løp", "Totalt", "Betalt (kr)"];

/// Render the report as a BOM-prefixed, comma-separated CSV document.
///
/// One row per driver, in report order.
pub fn attendance_csv(report: &AttendanceReport) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(CSV_HEADERS)
        .map_err(|e| AppError::Internal(e.into()))?;

    for driver in &report.drivers {
        writer
            .write_record([
                driver.driver_name.clone(),
                driver.trainings.to_string(),
                driver.races.to_string(),
                driver.total().to_string(),
                driver.amount_paid.to_string(),
            ])
            .map_err(|e| AppError::Internal(e.into()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("CSV flush failed: {}", e)))?;
    let body = String::from_utf8(bytes).map_err(|e| AppError::Internal(e.into()))?;

    Ok(format!("{}{}", UTF8_BOM, body))
}

/// Download file name for a year's export.
pub fn attendance_filename(year: i32) -> String {
    format!("oppmote-{}.csv", year)
}
