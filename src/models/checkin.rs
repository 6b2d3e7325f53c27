// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Check-in history model.

use serde::{Deserialize, Serialize};

/// What the driver checked in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Training,
    Race,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card terminal
    Terminal,
    Cash,
    Invoice,
    /// Not paid at check-in
    None,
}

impl PaymentMethod {
    pub fn status(self) -> PaymentStatus {
        match self {
            PaymentMethod::None => PaymentStatus::Unpaid,
            _ => PaymentStatus::Paid,
        }
    }
}

/// One row per physical check-in. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinHistoryEntry {
    /// Entry ID (also used as document ID)
    pub id: String,
    pub driver_id: String,
    /// Driver name at check-in time (denormalized for reports)
    pub driver_name: String,
    pub event_type: EventType,
    pub race_id: Option<String>,
    pub klasse: Option<String>,
    /// Check-in time (RFC 3339, UTC)
    pub checked_in_at: String,
    /// Calendar year of `checked_in_at`, stored for range queries
    pub year: i32,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    /// Amount in whole kroner
    pub amount: u32,
}

/// Check-in request payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckinRequest {
    pub driver_id: String,
    pub event_type: EventType,
    pub race_id: Option<String>,
    /// Overrides the driver's default class
    pub klasse: Option<String>,
    pub payment_method: PaymentMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_status() {
        assert_eq!(PaymentMethod::Terminal.status(), PaymentStatus::Paid);
        assert_eq!(PaymentMethod::Cash.status(), PaymentStatus::Paid);
        assert_eq!(PaymentMethod::None.status(), PaymentStatus::Unpaid);
    }

    #[test]
    fn test_event_type_wire_format() {
        let json = serde_json::to_string(&EventType::Training).unwrap();
        assert_eq!(json, "\"training\"");
        let parsed: PaymentMethod = serde_json::from_str("\"terminal\"").unwrap();
        assert_eq!(parsed, PaymentMethod::Terminal);
    }
}
