// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Race and race signup models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

/// Race stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Race {
    /// Race ID (also used as document ID)
    pub id: String,
    pub name: String,
    pub start_date: NaiveDate,
    /// Inclusive
    pub end_date: NaiveDate,
    /// Entry fee per klasse, in kroner
    #[serde(default)]
    pub class_fees: BTreeMap<String, u32>,
    pub description: Option<String>,
    pub created_at: String,
}

impl Race {
    pub fn from_input(id: String, input: RaceInput, now: &str) -> Self {
        Self {
            id,
            name: input.name.trim().to_string(),
            start_date: input.start_date,
            end_date: input.end_date,
            class_fees: input.class_fees,
            description: input.description,
            created_at: now.to_string(),
        }
    }

    /// True if `date` falls within the race weekend.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Class-specific fee, if the race sets one.
    pub fn fee_for(&self, klasse: Option<&str>) -> Option<u32> {
        klasse.and_then(|k| self.class_fees.get(k).copied())
    }
}

/// Race create payload.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_race_dates"))]
pub struct RaceInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub class_fees: BTreeMap<String, u32>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

fn validate_race_dates(input: &RaceInput) -> Result<(), ValidationError> {
    if input.end_date < input.start_date {
        return Err(ValidationError::new("end_before_start"));
    }
    Ok(())
}

/// One driver's entry in one race.
///
/// At most one signup exists per `(race_id, driver_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSignup {
    pub race_id: String,
    pub driver_id: String,
    pub driver_name: String,
    pub klasse: Option<String>,
    pub created_at: String,
}

impl RaceSignup {
    /// Deterministic document ID that makes duplicates collide.
    pub fn doc_id(&self) -> String {
        signup_doc_id(&self.race_id, &self.driver_id)
    }
}

/// Document ID for the signup of `driver_id` to `race_id`.
pub fn signup_doc_id(race_id: &str, driver_id: &str) -> String {
    format!(
        "{}:{}",
        urlencoding::encode(race_id),
        urlencoding::encode(driver_id)
    )
}

/// Signup payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1))]
    pub driver_id: String,
    #[validate(length(min = 1, max = 64))]
    pub klasse: Option<String>,
}
