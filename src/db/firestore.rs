// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Drivers (profiles, RFID lookup)
//! - Check-in history (append-only)
//! - Races and race signups
//! - Site and training settings
//! - Payment provider tokens

use crate::db::{collections, documents};
use crate::error::AppError;
use crate::models::race::signup_doc_id;
use crate::models::{
    CheckinHistoryEntry, Driver, PaymentTokens, Race, RaceSignup, SiteSettings, TrainingSettings,
};
use crate::time_utils::format_utc_rfc3339;
use firestore::errors::FirestoreError;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Driver Operations ───────────────────────────────────────

    /// Get a driver by ID.
    pub async fn get_driver(&self, driver_id: &str) -> Result<Option<Driver>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::DRIVERS)
            .obj()
            .one(driver_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all drivers, sorted by last name.
    pub async fn list_drivers(&self) -> Result<Vec<Driver>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::DRIVERS)
            .order_by([
                ("last_name", firestore::FirestoreQueryDirection::Ascending),
                ("first_name", firestore::FirestoreQueryDirection::Ascending),
            ])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the driver holding an RFID tag (tags are stored normalized).
    pub async fn find_driver_by_rfid(&self, rfid_tag: &str) -> Result<Option<Driver>, AppError> {
        let tag = rfid_tag.to_string();
        let drivers: Vec<Driver> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::DRIVERS)
            .filter(move |q| q.for_all([q.field("rfid_tag").eq(tag.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(drivers.into_iter().next())
    }

    /// Create or update a driver.
    pub async fn upsert_driver(&self, driver: &Driver) -> Result<(), AppError> {
        let _: Driver = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::DRIVERS)
            .document_id(&driver.id)
            .object(driver)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a driver record. Check-in history is kept for reporting.
    pub async fn delete_driver(&self, driver_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::DRIVERS)
            .document_id(driver_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Check-in Operations ─────────────────────────────────────

    /// Append a check-in entry. Entries are never updated.
    pub async fn add_checkin(&self, entry: &CheckinHistoryEntry) -> Result<(), AppError> {
        let _: CheckinHistoryEntry = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::CHECKIN_HISTORY)
            .document_id(&entry.id)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// All check-ins in a calendar year, newest first.
    pub async fn list_checkins_for_year(
        &self,
        year: i32,
    ) -> Result<Vec<CheckinHistoryEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CHECKIN_HISTORY)
            .filter(move |q| q.for_all([q.field("year").eq(year)]))
            .order_by([(
                "checked_in_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A driver's check-ins, newest first.
    pub async fn list_checkins_for_driver(
        &self,
        driver_id: &str,
    ) -> Result<Vec<CheckinHistoryEntry>, AppError> {
        let driver_id = driver_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CHECKIN_HISTORY)
            .filter(move |q| q.for_all([q.field("driver_id").eq(driver_id.clone())]))
            .order_by([(
                "checked_in_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Race Operations ─────────────────────────────────────────

    pub async fn get_race(&self, race_id: &str) -> Result<Option<Race>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RACES)
            .obj()
            .one(race_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All races, earliest first.
    pub async fn list_races(&self) -> Result<Vec<Race>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RACES)
            .order_by([("start_date", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn upsert_race(&self, race: &Race) -> Result<(), AppError> {
        let _: Race = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RACES)
            .document_id(&race.id)
            .object(race)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a race and all of its signups.
    ///
    /// Returns the number of signups removed.
    pub async fn delete_race(&self, race_id: &str) -> Result<usize, AppError> {
        let signups = self.list_signups_for_race(race_id).await?;
        let count = signups.len();

        self.batch_delete(&signups, collections::RACE_SIGNUPS, RaceSignup::doc_id)
            .await?;

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::RACES)
            .document_id(race_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(race_id, signups = count, "Race deleted");
        Ok(count)
    }

    // ─── Race Signup Operations ──────────────────────────────────

    pub async fn get_race_signup(
        &self,
        race_id: &str,
        driver_id: &str,
    ) -> Result<Option<RaceSignup>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RACE_SIGNUPS)
            .obj()
            .one(&signup_doc_id(race_id, driver_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a signup, failing with `Conflict` if the driver is already
    /// signed up to the race.
    ///
    /// The document ID is derived from `(race_id, driver_id)` and written with
    /// create-only semantics, so concurrent duplicates also collide.
    pub async fn create_race_signup(&self, signup: &RaceSignup) -> Result<(), AppError> {
        let result: Result<RaceSignup, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::RACE_SIGNUPS)
            .document_id(signup.doc_id())
            .object(signup)
            .execute()
            .await;

        signup_insert_result(result, signup)
    }

    /// Signups for a race, in signup order.
    pub async fn list_signups_for_race(&self, race_id: &str) -> Result<Vec<RaceSignup>, AppError> {
        let race_id = race_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RACE_SIGNUPS)
            .filter(move |q| q.for_all([q.field("race_id").eq(race_id.clone())]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn delete_race_signup(&self, race_id: &str, driver_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::RACE_SIGNUPS)
            .document_id(signup_doc_id(race_id, driver_id))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Settings Operations ─────────────────────────────────────

    /// Site settings, or defaults if never saved.
    pub async fn get_site_settings(&self) -> Result<SiteSettings, AppError> {
        let settings: Option<SiteSettings> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SETTINGS)
            .obj()
            .one(documents::SITE_SETTINGS)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(settings.unwrap_or_default())
    }

    pub async fn set_site_settings(&self, settings: &SiteSettings) -> Result<(), AppError> {
        let _: SiteSettings = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SETTINGS)
            .document_id(documents::SITE_SETTINGS)
            .object(settings)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Store the paired terminal link on the site settings.
    ///
    /// Only the `terminal_link_id` and `updated_at` fields are written.
    pub async fn set_terminal_link_id(&self, link_id: Option<&str>) -> Result<(), AppError> {
        let mut settings = self.get_site_settings().await?;
        settings.terminal_link_id = link_id.map(str::to_string);
        settings.updated_at = format_utc_rfc3339(chrono::Utc::now());

        let _: SiteSettings = self
            .get_client()?
            .fluent()
            .update()
            .fields(firestore::paths!(SiteSettings::{terminal_link_id, updated_at}))
            .in_col(collections::SETTINGS)
            .document_id(documents::SITE_SETTINGS)
            .object(&settings)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Training calendar for a year, or an empty one if never saved.
    pub async fn get_training_settings(&self, year: i32) -> Result<TrainingSettings, AppError> {
        let settings: Option<TrainingSettings> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TRAINING_SETTINGS)
            .obj()
            .one(&year.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(settings.unwrap_or_else(|| TrainingSettings::empty(year)))
    }

    pub async fn set_training_settings(&self, settings: &TrainingSettings) -> Result<(), AppError> {
        let _: TrainingSettings = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TRAINING_SETTINGS)
            .document_id(settings.year.to_string())
            .object(settings)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Payment Token Operations ────────────────────────────────

    /// Get the encrypted payment provider tokens.
    pub async fn get_payment_tokens(&self) -> Result<Option<PaymentTokens>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SETTINGS)
            .obj()
            .one(documents::PAYMENT_TOKENS)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store encrypted payment provider tokens.
    pub async fn set_payment_tokens(&self, tokens: &PaymentTokens) -> Result<(), AppError> {
        let _: PaymentTokens = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SETTINGS)
            .document_id(documents::PAYMENT_TOKENS)
            .object(tokens)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete payment provider tokens (disconnect).
    pub async fn delete_payment_tokens(&self) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::SETTINGS)
            .document_id(documents::PAYMENT_TOKENS)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Map a create-only signup insert to the API error space.
fn signup_insert_result(
    result: Result<RaceSignup, FirestoreError>,
    signup: &RaceSignup,
) -> Result<(), AppError> {
    match result {
        Ok(_) => Ok(()),
        Err(FirestoreError::DataConflictError(_)) => Err(AppError::Conflict(format!(
            "Driver {} is already signed up for race {}",
            signup.driver_id, signup.race_id
        ))),
        Err(e) => Err(AppError::Database(e.to_string())),
    }
}
