// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Driver model for storage and API.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

/// Drivers younger than this on registration need a guardian.
pub const ADULT_AGE: u32 = 18;

/// Driver profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    /// Driver ID (also used as document ID)
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: NaiveDate,
    /// RFID tag used at the check-in kiosk
    pub rfid_tag: Option<String>,
    pub club: Option<String>,
    /// Driver license number
    pub license_number: Option<String>,
    /// Entrant license number, if different from the driver license
    pub entrant_license_number: Option<String>,
    /// Default competition class
    pub klasse: Option<String>,
    /// Required for minors
    pub guardian: Option<Guardian>,
    pub created_at: String,
    pub updated_at: String,
}

impl Driver {
    /// Build a new driver record from validated input.
    pub fn from_input(id: String, input: DriverInput, now: &str) -> Self {
        Self {
            id,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            phone: input.phone,
            birth_date: input.birth_date,
            rfid_tag: normalize_rfid(input.rfid_tag),
            club: input.club,
            license_number: input.license_number,
            entrant_license_number: input.entrant_license_number,
            klasse: input.klasse,
            guardian: input.guardian,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Apply a profile edit, keeping identity and creation time.
    pub fn apply_update(&mut self, input: DriverInput, now: &str) {
        let updated = Self::from_input(self.id.clone(), input, now);
        *self = Driver {
            created_at: std::mem::take(&mut self.created_at),
            ..updated
        };
    }

    /// "First Last", used in reports and check-in history.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Parent or guardian contact for a minor.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Guardian {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 4, max = 32))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
}

/// Registration / profile edit payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DriverInput {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 4, max = 32))]
    pub phone: Option<String>,
    pub birth_date: NaiveDate,
    #[validate(length(min = 1, max = 64))]
    pub rfid_tag: Option<String>,
    #[validate(length(max = 200))]
    pub club: Option<String>,
    #[validate(length(max = 64))]
    pub license_number: Option<String>,
    #[validate(length(max = 64))]
    pub entrant_license_number: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub klasse: Option<String>,
    #[validate(nested)]
    pub guardian: Option<Guardian>,
}

impl DriverInput {
    /// Field validation plus the cross-field rules that depend on `today`.
    pub fn validate_on(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => e,
        };

        if self.birth_date > today {
            errors.add("birth_date", ValidationError::new("birth_date_in_future"));
        } else if age_on(self.birth_date, today) < ADULT_AGE && self.guardian.is_none() {
            errors.add("guardian", ValidationError::new("guardian_required_for_minor"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Age in whole years on `date`.
pub fn age_on(birth_date: NaiveDate, date: NaiveDate) -> u32 {
    let mut age = date.year() - birth_date.year();
    if (date.month(), date.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// Tags are read by different scanners; store them trimmed and upper-case.
pub fn normalize_rfid(tag: Option<String>) -> Option<String> {
    tag.map(|t| t.trim().to_uppercase()).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(birth_date: NaiveDate, guardian: Option<Guardian>) -> DriverInput {
        DriverInput {
            first_name: "Ola".to_string(),
            last_name: "Nordmann".to_string(),
            email: "ola@example.no".to_string(),
            phone: Some("91234567".to_string()),
            birth_date,
            rfid_tag: Some(" 04a1b2c3 ".to_string()),
            club: Some("Rudskogen KK".to_string()),
            license_number: None,
            entrant_license_number: None,
            klasse: Some("Senior".to_string()),
            guardian,
        }
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        let born = date(2008, 6, 15);
        assert_eq!(age_on(born, date(2026, 6, 14)), 17);
        assert_eq!(age_on(born, date(2026, 6, 15)), 18);
    }

    #[test]
    fn test_minor_requires_guardian() {
        let today = date(2026, 5, 1);
        let err = input(date(2012, 1, 1), None).validate_on(today).unwrap_err();
        assert!(err.field_errors().contains_key("guardian"));

        let guardian = Guardian {
            name: "Kari Nordmann".to_string(),
            phone: "98765432".to_string(),
            email: None,
        };
        assert!(input(date(2012, 1, 1), Some(guardian))
            .validate_on(today)
            .is_ok());
    }

    #[test]
    fn test_adult_without_guardian_ok() {
        let today = date(2026, 5, 1);
        assert!(input(date(1990, 1, 1), None).validate_on(today).is_ok());
    }

    #[test]
    fn test_invalid_email_rejected() {
        let mut i = input(date(1990, 1, 1), None);
        i.email = "not-an-email".to_string();
        let err = i.validate_on(date(2026, 5, 1)).unwrap_err();
        assert!(err.field_errors().contains_key("email"));
    }

    #[test]
    fn test_future_birth_date_rejected() {
        let err = input(date(2030, 1, 1), None)
            .validate_on(date(2026, 5, 1))
            .unwrap_err();
        assert!(err.field_errors().contains_key("birth_date"));
    }

    #[test]
    fn test_from_input_normalizes() {
        let driver = Driver::from_input(
            "d1".to_string(),
            input(date(1990, 1, 1), None),
            "2026-05-01T10:00:00Z",
        );
        assert_eq!(driver.rfid_tag.as_deref(), Some("04A1B2C3"));
        assert_eq!(driver.full_name(), "Ola Nordmann");
    }

    #[test]
    fn test_apply_update_keeps_created_at() {
        let mut driver = Driver::from_input(
            "d1".to_string(),
            input(date(1990, 1, 1), None),
            "2026-01-01T00:00:00Z",
        );
        let mut edit = input(date(1990, 1, 1), None);
        edit.club = Some("Vestfold MSK".to_string());
        driver.apply_update(edit, "2026-02-01T00:00:00Z");

        assert_eq!(driver.id, "d1");
        assert_eq!(driver.created_at, "2026-01-01T00:00:00Z");
        assert_eq!(driver.updated_at, "2026-02-01T00:00:00Z");
        assert_eq!(driver.club.as_deref(), Some("Vestfold MSK"));
    }
}
