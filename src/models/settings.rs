// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Site-wide and training calendar settings.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Singleton club configuration.
///
/// Missing fields fall back to the defaults, so a document holding only the
/// terminal link still loads.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SiteSettings {
    /// Price of one training session, in kroner
    pub training_price: u32,
    /// Race fee when the race sets no class-specific fee
    pub default_race_price: u32,
    /// Paired card terminal link, set after a successful pairing
    pub terminal_link_id: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub club_name: String,
    #[validate(url)]
    pub logo_url: Option<String>,
    /// CSS colour, e.g. `#d32f2f`
    #[validate(length(min = 4, max = 9))]
    pub primary_color: Option<String>,
    pub updated_at: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            training_price: 0,
            default_race_price: 0,
            terminal_link_id: None,
            club_name: "Gokartklubb".to_string(),
            logo_url: None,
            primary_color: None,
            updated_at: String::new(),
        }
    }
}

/// Weekdays with training in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRule {
    /// 1 = January
    pub month: u32,
    pub weekdays: Vec<Weekday>,
}

/// Training calendar for one year.
///
/// A day is a training day if its weekday is listed for its month, or it is an
/// extra date, and it is not cancelled.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_training_settings"))]
pub struct TrainingSettings {
    pub year: i32,
    #[serde(default)]
    pub months: Vec<MonthRule>,
    #[serde(default)]
    pub extra_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub cancelled_dates: Vec<NaiveDate>,
    #[serde(default)]
    pub updated_at: String,
}

impl TrainingSettings {
    /// Empty calendar for `year`.
    pub fn empty(year: i32) -> Self {
        Self {
            year,
            months: Vec::new(),
            extra_dates: Vec::new(),
            cancelled_dates: Vec::new(),
            updated_at: String::new(),
        }
    }

    pub fn is_training_day(&self, date: NaiveDate) -> bool {
        if date.year() != self.year || self.cancelled_dates.contains(&date) {
            return false;
        }
        if self.extra_dates.contains(&date) {
            return true;
        }
        self.months
            .iter()
            .filter(|rule| rule.month == date.month())
            .any(|rule| rule.weekdays.contains(&date.weekday()))
    }

    /// All training days in `month`, in date order.
    pub fn training_days(&self, month: u32) -> Vec<NaiveDate> {
        let Some(first) = NaiveDate::from_ymd_opt(self.year, month, 1) else {
            return Vec::new();
        };
        first
            .iter_days()
            .take_while(|d| d.month() == month)
            .filter(|d| self.is_training_day(*d))
            .collect()
    }
}

fn validate_training_settings(settings: &TrainingSettings) -> Result<(), ValidationError> {
    let mut seen = [false; 13];
    for rule in &settings.months {
        if !(1..=12).contains(&rule.month) {
            return Err(ValidationError::new("month_out_of_range"));
        }
        if seen[rule.month as usize] {
            return Err(ValidationError::new("duplicate_month"));
        }
        seen[rule.month as usize] = true;
    }
    let outside_year = settings
        .extra_dates
        .iter()
        .chain(&settings.cancelled_dates)
        .any(|d| d.year() != settings.year);
    if outside_year {
        return Err(ValidationError::new("date_outside_year"));
    }
    Ok(())
}
