// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running and
//! FIRESTORE_EMULATOR_HOST to point at it. Ids are random so runs can share
//! one emulator.

use chrono::NaiveDate;
use kart_checkin::error::AppError;
use kart_checkin::models::{
    AttendanceReport, CheckinHistoryEntry, Driver, DriverInput, EventType, PaymentMethod,
    PaymentStatus, PaymentTokens, Race, RaceSignup,
};
use std::collections::BTreeMap;

mod common;
use common::test_db;

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn test_driver(rfid: Option<&str>) -> Driver {
    let input = DriverInput {
        first_name: "Test".to_string(),
        last_name: "Driver".to_string(),
        email: "test@example.no".to_string(),
        phone: None,
        birth_date: date(1990, 6, 1),
        rfid_tag: rfid.map(String::from),
        club: None,
        license_number: None,
        entrant_license_number: None,
        klasse: Some("Senior".to_string()),
        guardian: None,
    };
    Driver::from_input(unique_id("driver"), input, "2026-01-01T00:00:00Z")
}

fn test_race() -> Race {
    Race {
        id: unique_id("race"),
        name: "Klubbmesterskap".to_string(),
        start_date: date(2026, 6, 6),
        end_date: date(2026, 6, 7),
        class_fees: BTreeMap::from([("Senior".to_string(), 800)]),
        description: None,
        created_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

fn signup(race: &Race, driver: &Driver) -> RaceSignup {
    RaceSignup {
        race_id: race.id.clone(),
        driver_id: driver.id.clone(),
        driver_name: driver.full_name(),
        klasse: driver.klasse.clone(),
        created_at: "2026-01-02T00:00:00Z".to_string(),
    }
}

fn entry(driver: &Driver, event_type: EventType, year: i32, method: PaymentMethod) -> CheckinHistoryEntry {
    CheckinHistoryEntry {
        id: unique_id("checkin"),
        driver_id: driver.id.clone(),
        driver_name: driver.full_name(),
        event_type,
        race_id: None,
        klasse: driver.klasse.clone(),
        checked_in_at: format!("{}-05-01T18:00:00Z", year),
        year,
        payment_status: method.status(),
        payment_method: method,
        amount: 250,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DRIVER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_driver_crud_and_rfid_lookup() {
    require_emulator!();

    let db = test_db().await;
    let tag = unique_id("TAG").to_uppercase();
    let driver = test_driver(Some(&tag));

    assert!(db.get_driver(&driver.id).await.unwrap().is_none());

    db.upsert_driver(&driver).await.unwrap();

    let fetched = db.get_driver(&driver.id).await.unwrap().unwrap();
    assert_eq!(fetched.email, driver.email);

    let by_tag = db.find_driver_by_rfid(&tag).await.unwrap().unwrap();
    assert_eq!(by_tag.id, driver.id);

    db.delete_driver(&driver.id).await.unwrap();
    assert!(db.get_driver(&driver.id).await.unwrap().is_none());
    assert!(db.find_driver_by_rfid(&tag).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// RACE AND SIGNUP TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_duplicate_signup_is_conflict() {
    require_emulator!();

    let db = test_db().await;
    let driver = test_driver(None);
    let race = test_race();
    db.upsert_driver(&driver).await.unwrap();
    db.upsert_race(&race).await.unwrap();

    db.create_race_signup(&signup(&race, &driver)).await.unwrap();
    let second = db.create_race_signup(&signup(&race, &driver)).await;
    assert!(
        matches!(second, Err(AppError::Conflict(_))),
        "expected conflict, got {:?}",
        second
    );

    let signups = db.list_signups_for_race(&race.id).await.unwrap();
    assert_eq!(signups.len(), 1);
}

#[tokio::test]
async fn test_delete_race_removes_signups() {
    require_emulator!();

    let db = test_db().await;
    let race = test_race();
    db.upsert_race(&race).await.unwrap();

    for _ in 0..3 {
        let driver = test_driver(None);
        db.create_race_signup(&signup(&race, &driver)).await.unwrap();
    }

    let removed = db.delete_race(&race.id).await.unwrap();
    assert_eq!(removed, 3);
    assert!(db.get_race(&race.id).await.unwrap().is_none());
    assert!(db.list_signups_for_race(&race.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_signup_delete() {
    require_emulator!();

    let db = test_db().await;
    let driver = test_driver(None);
    let race = test_race();
    db.create_race_signup(&signup(&race, &driver)).await.unwrap();

    assert!(db
        .get_race_signup(&race.id, &driver.id)
        .await
        .unwrap()
        .is_some());
    db.delete_race_signup(&race.id, &driver.id).await.unwrap();
    assert!(db
        .get_race_signup(&race.id, &driver.id)
        .await
        .unwrap()
        .is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// CHECK-IN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_checkins_by_year_and_driver() {
    require_emulator!();

    let db = test_db().await;
    let driver = test_driver(None);

    db.add_checkin(&entry(&driver, EventType::Training, 2026, PaymentMethod::Terminal))
        .await
        .unwrap();
    db.add_checkin(&entry(&driver, EventType::Training, 2026, PaymentMethod::None))
        .await
        .unwrap();
    db.add_checkin(&entry(&driver, EventType::Race, 2025, PaymentMethod::Cash))
        .await
        .unwrap();

    let history = db.list_checkins_for_driver(&driver.id).await.unwrap();
    assert_eq!(history.len(), 3);

    let year: Vec<CheckinHistoryEntry> = db
        .list_checkins_for_year(2026)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.driver_id == driver.id)
        .collect();
    assert_eq!(year.len(), 2);
    assert_eq!(
        year.iter()
            .filter(|e| e.payment_status == PaymentStatus::Unpaid)
            .count(),
        1
    );

    let report = AttendanceReport::build(2026, &year);
    assert_eq!(report.drivers.len(), 1);
    assert_eq!(report.drivers[0].trainings, 2);
    assert_eq!(report.drivers[0].amount_paid, 250);
}

// ═══════════════════════════════════════════════════════════════════════════
// SETTINGS TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_terminal_link_update_keeps_other_settings() {
    require_emulator!();

    let db = test_db().await;
    let mut settings = db.get_site_settings().await.unwrap();
    settings.training_price = 275;
    db.set_site_settings(&settings).await.unwrap();

    let link = unique_id("link");
    db.set_terminal_link_id(Some(&link)).await.unwrap();

    let stored = db.get_site_settings().await.unwrap();
    assert_eq!(stored.terminal_link_id.as_deref(), Some(link.as_str()));
    assert_eq!(stored.training_price, 275);

    db.set_terminal_link_id(None).await.unwrap();
    assert!(db.get_site_settings().await.unwrap().terminal_link_id.is_none());
}

#[tokio::test]
async fn test_missing_training_calendar_is_empty() {
    require_emulator!();

    let db = test_db().await;
    let calendar = db.get_training_settings(2099).await.unwrap();
    assert_eq!(calendar.year, 2099);
    assert!(calendar.months.is_empty());
}

#[tokio::test]
async fn test_payment_tokens_roundtrip() {
    require_emulator!();

    let db = test_db().await;
    let tokens = PaymentTokens {
        access_token_encrypted: "enc-access".to_string(),
        refresh_token_encrypted: "enc-refresh".to_string(),
        expires_at: "2026-06-01T12:00:00Z".to_string(),
        scopes: vec!["READ:PAYMENT".to_string()],
        connected_at: "2026-06-01T10:00:00Z".to_string(),
    };

    db.set_payment_tokens(&tokens).await.unwrap();
    let stored = db.get_payment_tokens().await.unwrap().unwrap();
    assert_eq!(stored.refresh_token_encrypted, "enc-refresh");

    db.delete_payment_tokens().await.unwrap();
    assert!(db.get_payment_tokens().await.unwrap().is_none());
}
