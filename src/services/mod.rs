// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod checkin;
pub mod kms;
pub mod oauth;
pub mod pairing;
pub mod payment;
pub mod report;

pub use checkin::CheckinService;
pub use kms::KmsService;
pub use oauth::{CallbackParams, OAuthCallbackError};
pub use pairing::{PairingRegistry, PairingState, PairingView};
pub use payment::{ConnectionStatus, PaymentClient, PaymentService};
