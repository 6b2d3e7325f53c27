// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod checkin;
pub mod driver;
pub mod payment;
pub mod race;
pub mod report;
pub mod settings;

pub use checkin::{CheckinHistoryEntry, CheckinRequest, EventType, PaymentMethod, PaymentStatus};
pub use driver::{Driver, DriverInput, Guardian};
pub use payment::PaymentTokens;
pub use race::{Race, RaceInput, RaceSignup, SignupRequest};
pub use report::{AttendanceReport, DriverStats};
pub use settings::{MonthRule, SiteSettings, TrainingSettings};
