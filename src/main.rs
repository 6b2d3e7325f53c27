// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Kart-Checkin API Server
//!
//! Registers go-kart club drivers, records training and race check-ins,
//! and pairs the club's card terminal with the payment provider.

use kart_checkin::{
    config::Config,
    db::FirestoreDb,
    services::{CheckinService, KmsService, PairingRegistry, PaymentClient, PaymentService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Kart-Checkin API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    // Initialize KMS service
    let kms = KmsService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        "token-encryption",
    )
    .await?;
    tracing::info!("KMS service initialized");

    let payment_client = PaymentClient::new(
        config.payment_client_id.clone(),
        config.payment_client_secret.clone(),
        config.payment_redirect_uri.clone(),
        config.payment_oauth_base_url.clone(),
        config.payment_api_base_url.clone(),
    );
    let payment_service = PaymentService::new(payment_client, db.clone(), kms);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        checkin_service: CheckinService::new(db.clone(), config.club_timezone),
        db,
        payment_service,
        pairing: PairingRegistry::new(),
    });

    // Build router
    let app = kart_checkin::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM (Cloud Run sends the latter).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kart_checkin=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
