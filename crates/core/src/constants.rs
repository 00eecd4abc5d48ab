//! Constants used throughout the Sehati core crate.
//!
//! Slice names are persisted storage keys and must stay stable across releases.

/// Storage key for the core booking slice.
pub const BOOKING_SLICE: &str = "healthcare-storage";

/// Storage key for the enhanced features slice (records, family, reminders, follow-ups).
pub const ENHANCED_SLICE: &str = "enhanced-features-storage";

/// Storage key for the pharmacy workflow slice.
pub const PHARMACY_SLICE: &str = "pharmacy-storage";

/// Storage key for the medical assistant slice.
pub const ASSISTANT_SLICE: &str = "medical-ai-storage";

/// Version written into every persisted slice envelope.
pub const STORAGE_FORMAT_VERSION: u32 = 1;

/// Default directory for persisted slices when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "sehati_data";

/// Session user when none is configured.
pub const DEFAULT_USER_ID: &str = "user-1";

/// Flat service fee added to every professional pharmacy order, in LYD.
pub const PHARMACY_SERVICE_FEE: f64 = 5.0;

/// Probability that the simulated payment processor approves a charge.
pub const DEFAULT_PAYMENT_SUCCESS_RATE: f64 = 0.9;

/// Simulated network latency for payments, prescription review and escalation.
pub const DEFAULT_SIMULATED_DELAY_MS: u64 = 2_000;

/// Age at which a family member counts as an adult.
pub const ADULT_AGE_YEARS: u32 = 18;

/// Days an issued prescription stays valid.
pub const PRESCRIPTION_VALIDITY_DAYS: i64 = 30;

/// Window for upcoming check-up alerts.
pub const CHECKUP_ALERT_WINDOW_DAYS: i64 = 7;

/// Appended to every assistant reply that carries medical content.
pub const MEDICAL_DISCLAIMER: &str =
    "⚠️ هذه المعلومات للتوعية فقط ولا تغني عن استشارة الطبيب المختص.";

// Entity id prefixes.
pub(crate) const APPOINTMENT_PREFIX: &str = "apt";
pub(crate) const LAB_BOOKING_PREFIX: &str = "lab";
pub(crate) const QUICK_ORDER_PREFIX: &str = "ord";
pub(crate) const AMBULANCE_PREFIX: &str = "amb";
pub(crate) const NOTIFICATION_PREFIX: &str = "notif";
pub(crate) const RATING_PREFIX: &str = "rating";
pub(crate) const TRANSACTION_PREFIX: &str = "txn";
pub(crate) const RECORD_PREFIX: &str = "rec";
pub(crate) const AUDIT_PREFIX: &str = "audit";
pub(crate) const ACCESS_PREFIX: &str = "access";
pub(crate) const CONDITION_PREFIX: &str = "cond";
pub(crate) const FAMILY_PREFIX: &str = "fm";
pub(crate) const REMINDER_PREFIX: &str = "rem";
pub(crate) const DOSE_LOG_PREFIX: &str = "dose";
pub(crate) const FOLLOW_UP_PREFIX: &str = "fu";
pub(crate) const FOLLOW_UP_MESSAGE_PREFIX: &str = "fumsg";
pub(crate) const PRESCRIPTION_PREFIX: &str = "rx";
pub(crate) const ORDER_PREFIX: &str = "order";
pub(crate) const CONVERSATION_PREFIX: &str = "conv";
pub(crate) const AI_MESSAGE_PREFIX: &str = "msg";
