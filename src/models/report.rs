// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Yearly attendance aggregates.
//!
//! Built on demand from the check-in history; nothing here is stored.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::checkin::{CheckinHistoryEntry, EventType, PaymentStatus};

/// Per-driver totals for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    pub driver_id: String,
    pub driver_name: String,
    pub trainings: u32,
    pub races: u32,
    /// Sum of paid amounts, in kroner
    pub amount_paid: u64,
}

impl DriverStats {
    pub fn total(&self) -> u32 {
        self.trainings + self.races
    }
}

/// Attendance report for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceReport {
    pub year: i32,
    /// Ranked by total attendance, most first
    pub drivers: Vec<DriverStats>,
    pub total_trainings: u32,
    pub total_races: u32,
    pub unique_drivers: u32,
}

impl AttendanceReport {
    /// Aggregate `entries` for `year`.
    ///
    /// Entries from other years are ignored, so callers may pass unfiltered
    /// history. Drivers are ranked by `trainings + races` descending, then by
    /// name and ID so the order is stable.
    pub fn build(year: i32, entries: &[CheckinHistoryEntry]) -> Self {
        let mut by_driver: HashMap<&str, DriverStats> = HashMap::new();
        let mut total_trainings = 0;
        let mut total_races = 0;

        for entry in entries.iter().filter(|e| e.year == year) {
            let stats = by_driver
                .entry(entry.driver_id.as_str())
                .or_insert_with(|| DriverStats {
                    driver_id: entry.driver_id.clone(),
                    driver_name: entry.driver_name.clone(),
                    trainings: 0,
                    races: 0,
                    amount_paid: 0,
                });

            match entry.event_type {
                EventType::Training => {
                    stats.trainings += 1;
                    total_trainings += 1;
                }
                EventType::Race => {
                    stats.races += 1;
                    total_races += 1;
                }
            }

            if entry.payment_status == PaymentStatus::Paid {
                stats.amount_paid += u64::from(entry.amount);
            }
        }

        let mut drivers: Vec<DriverStats> = by_driver.into_values().collect();
        drivers.sort_by(|a, b| {
            b.total()
                .cmp(&a.total())
                .then_with(|| a.driver_name.cmp(&b.driver_name))
                .then_with(|| a.driver_id.cmp(&b.driver_id))
        });

        Self {
            year,
            unique_drivers: drivers.len() as u32,
            drivers,
            total_trainings,
            total_races,
        }
    }
}
