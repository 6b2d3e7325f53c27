// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in processing: validation, pricing and the history append.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{
    CheckinHistoryEntry, CheckinRequest, Driver, EventType, Race, RaceSignup, SiteSettings,
};
use crate::time_utils::format_utc_rfc3339;

/// Price of a check-in, in kroner.
///
/// Training uses the site price. A race uses the fee for the class if the
/// race sets one, else the site's default race price.
pub fn price_for(
    event_type: EventType,
    race: Option<&Race>,
    klasse: Option<&str>,
    settings: &SiteSettings,
) -> u32 {
    match event_type {
        EventType::Training => settings.training_price,
        EventType::Race => race
            .and_then(|r| r.fee_for(klasse))
            .unwrap_or(settings.default_race_price),
    }
}

/// Everything a check-in needs, loaded up front.
pub struct CheckinContext<'a> {
    pub driver: &'a Driver,
    pub race: Option<&'a Race>,
    pub signup: Option<&'a RaceSignup>,
    pub settings: &'a SiteSettings,
}

/// The club's calendar date at `now`.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Validate a request against its context and build the history entry.
///
/// Race dates and the recorded year follow the club's local calendar.
pub fn build_entry(
    id: String,
    request: &CheckinRequest,
    ctx: &CheckinContext<'_>,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<CheckinHistoryEntry, AppError> {
    let today = local_date(now, tz);
    let klasse = match request.event_type {
        EventType::Training => {
            if request.race_id.is_some() {
                return Err(AppError::BadRequest(
                    "Training check-in cannot reference a race".to_string(),
                ));
            }
            request.klasse.clone().or_else(|| ctx.driver.klasse.clone())
        }
        EventType::Race => {
            let race = ctx
                .race
                .ok_or_else(|| AppError::BadRequest("Race check-in needs a race".to_string()))?;
            if !race.covers(today) {
                return Err(AppError::BadRequest(format!(
                    "Race {} is not running on {}",
                    race.id, today
                )));
            }
            let signup = ctx.signup.ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Driver {} is not signed up for race {}",
                    ctx.driver.id, race.id
                ))
            })?;
            request
                .klasse
                .clone()
                .or_else(|| signup.klasse.clone())
                .or_else(|| ctx.driver.klasse.clone())
        }
    };

    let amount = price_for(
        request.event_type,
        ctx.race,
        klasse.as_deref(),
        ctx.settings,
    );

    Ok(CheckinHistoryEntry {
        id,
        driver_id: ctx.driver.id.clone(),
        driver_name: ctx.driver.full_name(),
        event_type: request.event_type,
        race_id: ctx.race.map(|r| r.id.clone()),
        klasse,
        checked_in_at: format_utc_rfc3339(now),
        year: today.year(),
        payment_status: request.payment_method.status(),
        payment_method: request.payment_method,
        amount,
    })
}

/// Check-in service backed by Firestore.
#[derive(Clone)]
pub struct CheckinService {
    db: FirestoreDb,
    tz: Tz,
}

impl CheckinService {
    pub fn new(db: FirestoreDb, tz: Tz) -> Self {
        Self { db, tz }
    }

    /// Record a check-in made by `operator` and return the stored entry.
    pub async fn check_in(
        &self,
        request: &CheckinRequest,
        operator: &str,
    ) -> Result<CheckinHistoryEntry, AppError> {
        let now = Utc::now();
        let today = local_date(now, self.tz);

        let driver = self
            .db
            .get_driver(&request.driver_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Driver {}", request.driver_id)))?;

        let settings = self.db.get_site_settings().await?;

        let (race, signup) = match (request.event_type, &request.race_id) {
            (EventType::Race, Some(race_id)) => {
                let race = self
                    .db
                    .get_race(race_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Race {}", race_id)))?;
                let signup = self.db.get_race_signup(race_id, &driver.id).await?;
                (Some(race), signup)
            }
            _ => (None, None),
        };

        if request.event_type == EventType::Training {
            let calendar = self.db.get_training_settings(today.year()).await?;
            if !calendar.is_training_day(today) {
                tracing::warn!(
                    driver_id = %driver.id,
                    date = %today,
                    "Training check-in on a non-training day"
                );
            }
        }

        let ctx = CheckinContext {
            driver: &driver,
            race: race.as_ref(),
            signup: signup.as_ref(),
            settings: &settings,
        };
        let entry = build_entry(
            uuid::Uuid::new_v4().to_string(),
            request,
            &ctx,
            now,
            self.tz,
        )?;

        self.db.add_checkin(&entry).await?;

        tracing::info!(
            driver_id = %entry.driver_id,
            event_type = ?entry.event_type,
            amount = entry.amount,
            paid = ?entry.payment_status,
            operator,
            "Driver checked in"
        );

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentMethod, PaymentStatus};
    use chrono::{NaiveDate, TimeZone};
    use std::collections::BTreeMap;

    const OSLO: Tz = chrono_tz::Europe::Oslo;

    fn driver() -> Driver {
        Driver {
            id: "d1".to_string(),
            first_name: "Ola".to_string(),
            last_name: "Nordmann".to_string(),
            email: "ola@example.no".to_string(),
            phone: None,
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            rfid_tag: None,
            club: None,
            license_number: None,
            entrant_license_number: None,
            klasse: Some("Senior".to_string()),
            guardian: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn settings() -> SiteSettings {
        SiteSettings {
            training_price: 250,
            default_race_price: 700,
            ..Default::default()
        }
    }

    fn race() -> Race {
        Race {
            id: "r1".to_string(),
            name: "Klubbløp".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 5, 9).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 5, 10).unwrap(),
            class_fees: BTreeMap::from([("Senior".to_string(), 900)]),
            description: None,
            created_at: String::new(),
        }
    }

    fn signup(klasse: Option<&str>) -> RaceSignup {
        RaceSignup {
            race_id: "r1".to_string(),
            driver_id: "d1".to_string(),
            driver_name: "Ola Nordmann".to_string(),
            klasse: klasse.map(String::from),
            created_at: String::new(),
        }
    }

    fn request(event_type: EventType, race_id: Option<&str>) -> CheckinRequest {
        CheckinRequest {
            driver_id: "d1".to_string(),
            event_type,
            race_id: race_id.map(String::from),
            klasse: None,
            payment_method: PaymentMethod::Terminal,
        }
    }

    fn race_day() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 9, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_training_checkin() {
        let d = driver();
        let s = settings();
        let ctx = CheckinContext {
            driver: &d,
            race: None,
            signup: None,
            settings: &s,
        };
        let entry = build_entry(
            "e1".to_string(),
            &request(EventType::Training, None),
            &ctx,
            race_day(),
            OSLO,
        )
        .unwrap();

        assert_eq!(entry.amount, 250);
        assert_eq!(entry.year, 2026);
        assert_eq!(entry.driver_name, "Ola Nordmann");
        assert_eq!(entry.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_race_checkin_uses_class_fee() {
        let (d, s, r, su) = (driver(), settings(), race(), signup(None));
        let ctx = CheckinContext {
            driver: &d,
            race: Some(&r),
            signup: Some(&su),
            settings: &s,
        };
        let entry = build_entry(
            "e1".to_string(),
            &request(EventType::Race, Some("r1")),
            &ctx,
            race_day(),
            OSLO,
        )
        .unwrap();

        assert_eq!(entry.amount, 900);
        assert_eq!(entry.klasse.as_deref(), Some("Senior"));
        assert_eq!(entry.race_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_race_checkin_falls_back_to_default_price() {
        let (d, s, r, su) = (driver(), settings(), race(), signup(Some("Mini")));
        let ctx = CheckinContext {
            driver: &d,
            race: Some(&r),
            signup: Some(&su),
            settings: &s,
        };
        let entry = build_entry(
            "e1".to_string(),
            &request(EventType::Race, Some("r1")),
            &ctx,
            race_day(),
            OSLO,
        )
        .unwrap();

        assert_eq!(entry.klasse.as_deref(), Some("Mini"));
        assert_eq!(entry.amount, 700);
    }

    #[test]
    fn test_race_checkin_requires_signup() {
        let (d, s, r) = (driver(), settings(), race());
        let ctx = CheckinContext {
            driver: &d,
            race: Some(&r),
            signup: None,
            settings: &s,
        };
        let result = build_entry(
            "e1".to_string(),
            &request(EventType::Race, Some("r1")),
            &ctx,
            race_day(),
            OSLO,
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_race_checkin_outside_race_dates() {
        let (d, s, r, su) = (driver(), settings(), race(), signup(None));
        let ctx = CheckinContext {
            driver: &d,
            race: Some(&r),
            signup: Some(&su),
            settings: &s,
        };
        let later = Utc.with_ymd_and_hms(2026, 5, 11, 8, 0, 0).unwrap();
        let result = build_entry(
            "e1".to_string(),
            &request(EventType::Race, Some("r1")),
            &ctx,
            later,
            OSLO,
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_training_with_race_id_rejected() {
        let (d, s) = (driver(), settings());
        let ctx = CheckinContext {
            driver: &d,
            race: None,
            signup: None,
            settings: &s,
        };
        let result = build_entry(
            "e1".to_string(),
            &request(EventType::Training, Some("r1")),
            &ctx,
            race_day(),
            OSLO,
        );
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_unpaid_checkin() {
        let (d, s) = (driver(), settings());
        let ctx = CheckinContext {
            driver: &d,
            race: None,
            signup: None,
            settings: &s,
        };
        let mut req = request(EventType::Training, None);
        req.payment_method = PaymentMethod::None;
        let entry = build_entry("e1".to_string(), &req, &ctx, race_day(), OSLO).unwrap();
        assert_eq!(entry.payment_status, PaymentStatus::Unpaid);
        // The price is still recorded so the debt is visible.
        assert_eq!(entry.amount, 250);
    }

    #[test]
    fn test_dates_follow_club_timezone() {
        let (d, s, su) = (driver(), settings(), signup(None));
        let mut r = race();
        r.start_date = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        r.end_date = r.start_date;
        let ctx = CheckinContext {
            driver: &d,
            race: Some(&r),
            signup: Some(&su),
            settings: &s,
        };
        // 00:30 on 1 January in Oslo is still New Year's Eve in UTC.
        let just_after_midnight = Utc.with_ymd_and_hms(2026, 12, 31, 23, 30, 0).unwrap();
        let entry = build_entry(
            "e1".to_string(),
            &request(EventType::Race, Some("r1")),
            &ctx,
            just_after_midnight,
            OSLO,
        )
        .unwrap();
        assert_eq!(entry.year, 2027);

        let utc = build_entry(
            "e2".to_string(),
            &request(EventType::Race, Some("r1")),
            &ctx,
            just_after_midnight,
            chrono_tz::UTC,
        );
        assert!(matches!(utc, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_local_date_in_summer_time() {
        // CEST is UTC+2
        let evening = Utc.with_ymd_and_hms(2026, 6, 30, 22, 15, 0).unwrap();
        assert_eq!(
            local_date(evening, OSLO),
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
        );
    }
}
