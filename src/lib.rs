// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Kart-Checkin: driver registration and check-in for a go-kart club
//!
//! This crate provides the backend API for registering drivers, checking
//! them in to trainings and races, and pairing the club's card terminal.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{CheckinService, PairingRegistry, PaymentService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub checkin_service: CheckinService,
    pub payment_service: PaymentService,
    pub pairing: PairingRegistry,
}
