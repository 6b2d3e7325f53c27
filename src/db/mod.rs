//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const DRIVERS: &str = "drivers";
    /// Append-only check-in log
    pub const CHECKIN_HISTORY: &str = "checkin_history";
    pub const RACES: &str = "races";
    /// Keyed by `{race_id}:{driver_id}`
    pub const RACE_SIGNUPS: &str = "race_signups";
    /// Keyed by year
    pub const TRAINING_SETTINGS: &str = "training_settings";
    pub const SETTINGS: &str = "settings";
}

/// Document IDs of singleton documents.
pub mod documents {
    /// `settings/site`
    pub const SITE_SETTINGS: &str = "site";
    /// `settings/payment_tokens`
    pub const PAYMENT_TOKENS: &str = "payment_tokens";
}
