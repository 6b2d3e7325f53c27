// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use kart_checkin::config::Config;
use kart_checkin::db::FirestoreDb;
use kart_checkin::middleware::auth::create_jwt;
use kart_checkin::routes::create_router;
use kart_checkin::services::{
    CheckinService, KmsService, PairingRegistry, PaymentClient, PaymentService,
};
use kart_checkin::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Payment service against `config`'s provider URLs, mock KMS.
#[allow(dead_code)]
pub fn test_payment_service(config: &Config, db: FirestoreDb) -> PaymentService {
    let client = PaymentClient::new(
        config.payment_client_id.clone(),
        config.payment_client_secret.clone(),
        config.payment_redirect_uri.clone(),
        config.payment_oauth_base_url.clone(),
        config.payment_api_base_url.clone(),
    );
    PaymentService::new(client, db, KmsService::new_mock())
}

/// Build app state and router around an explicit config and database.
#[allow(dead_code)]
pub fn create_app(config: Config, db: FirestoreDb) -> (axum::Router, Arc<AppState>) {
    let payment_service = test_payment_service(&config, db.clone());
    let checkin_service = CheckinService::new(db.clone(), config.club_timezone);

    let state = Arc::new(AppState {
        config,
        checkin_service,
        db,
        payment_service,
        pairing: PairingRegistry::new(),
    });

    (create_router(state.clone()), state)
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_app(Config::test_default(), test_db_offline())
}

/// Create a test app whose cookies are scoped to `frontend_url`.
#[allow(dead_code)]
pub fn create_test_app_with_frontend_url(frontend_url: &str) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.frontend_url = frontend_url.to_string();
    create_app(config, test_db_offline())
}

/// Admin session token for the test config.
#[allow(dead_code)]
pub fn admin_token(state: &AppState) -> String {
    create_jwt("admin", &state.config.jwt_signing_key).expect("JWT creation failed")
}
