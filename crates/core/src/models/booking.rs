//! Core booking entities: appointments, lab bookings, quick pharmacy orders, ambulance
//! requests, notifications, ratings, the wallet ledger, favorites and the cart.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sehati_ids::EntityId;
use sehati_types::Stars;
use serde::{Deserialize, Serialize};

// ============================================================================
// Appointments
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    InPerson,
    Video,
    HomeVisit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    Wallet,
    /// Local mobile payment services (Sadad, Tadawul, MobiCash).
    MobileWallet,
}

impl PaymentMethod {
    pub fn is_cash(self) -> bool {
        matches!(self, PaymentMethod::CashOnDelivery)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: EntityId,
    pub patient_id: String,
    pub patient_name: String,
    /// Set when the appointment was booked on behalf of a family member.
    #[serde(default)]
    pub family_member_id: Option<EntityId>,
    pub doctor_id: String,
    pub doctor_name: String,
    pub specialty: String,
    #[serde(default)]
    pub clinic_id: Option<String>,
    #[serde(default)]
    pub clinic_name: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub fee: f64,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the booking flow; the store assigns id, status and timestamps.
#[derive(Clone, Debug)]
pub struct NewAppointment {
    pub patient_id: String,
    pub patient_name: String,
    pub family_member_id: Option<EntityId>,
    pub doctor_id: String,
    pub doctor_name: String,
    pub specialty: String,
    pub clinic_id: Option<String>,
    pub clinic_name: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub appointment_type: AppointmentType,
    pub fee: f64,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct AppointmentUpdate {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub appointment_type: Option<AppointmentType>,
    pub status: Option<AppointmentStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

// ============================================================================
// Fees
// ============================================================================

/// Itemised price of a booking, in LYD.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub base: f64,
    pub delivery_fee: f64,
    pub service_fee: f64,
    pub total: f64,
}

impl FeeBreakdown {
    pub fn new(base: f64, delivery_fee: f64, service_fee: f64) -> Self {
        Self {
            base,
            delivery_fee,
            service_fee,
            total: base + delivery_fee + service_fee,
        }
    }
}

// ============================================================================
// Lab bookings
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabBookingStatus {
    Pending,
    Confirmed,
    SampleCollected,
    Processing,
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabBooking {
    pub id: EntityId,
    pub patient_id: String,
    pub lab_id: String,
    pub lab_name: String,
    pub tests: Vec<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub home_collection: bool,
    pub status: LabBookingStatus,
    pub fees: FeeBreakdown,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewLabBooking {
    pub patient_id: String,
    pub lab_id: String,
    pub lab_name: String,
    pub tests: Vec<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub home_collection: bool,
    pub fees: FeeBreakdown,
}

// ============================================================================
// Quick pharmacy orders (cart checkout)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PharmacyOrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub medication_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PharmacyOrder {
    pub id: EntityId,
    pub patient_id: String,
    pub pharmacy_id: String,
    pub pharmacy_name: String,
    pub items: Vec<OrderItem>,
    pub status: PharmacyOrderStatus,
    pub fees: FeeBreakdown,
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewPharmacyOrder {
    pub patient_id: String,
    pub pharmacy_id: String,
    pub pharmacy_name: String,
    pub items: Vec<OrderItem>,
    pub delivery_fee: f64,
    pub service_fee: f64,
    pub payment_method: PaymentMethod,
    pub delivery_address: String,
}

#[derive(Clone, Debug, Default)]
pub struct PharmacyOrderUpdate {
    pub status: Option<PharmacyOrderStatus>,
    pub delivery_address: Option<String>,
}

// ============================================================================
// Ambulance requests
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbulanceStatus {
    Requested,
    Dispatched,
    EnRoute,
    Arrived,
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmbulanceRequest {
    pub id: EntityId,
    pub patient_id: String,
    pub pickup_location: String,
    #[serde(default)]
    pub destination: Option<String>,
    pub emergency_type: String,
    pub status: AmbulanceStatus,
    pub fees: FeeBreakdown,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewAmbulanceRequest {
    pub patient_id: String,
    pub pickup_location: String,
    pub destination: Option<String>,
    pub emergency_type: String,
    pub fees: FeeBreakdown,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Appointment,
    Lab,
    Pharmacy,
    Ambulance,
    Payment,
    Rating,
    Reminder,
    FollowUp,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: EntityId,
    pub user_id: String,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Ratings
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Doctor,
    Clinic,
    Lab,
    Pharmacy,
    Ambulance,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: EntityId,
    pub user_id: String,
    pub service_type: ServiceType,
    pub service_id: String,
    pub service_name: String,
    pub stars: Stars,
    #[serde(default)]
    pub comment: Option<String>,
    /// True when the rating follows a completed service episode.
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewRating {
    pub service_type: ServiceType,
    pub service_id: String,
    pub service_name: String,
    pub stars: Stars,
    pub comment: Option<String>,
    pub verified: bool,
}

/// A rating the user still owes for a completed service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingRating {
    pub service_type: ServiceType,
    pub service_id: String,
    pub service_name: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Wallet
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    TopUp,
    Payment,
    Refund,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: EntityId,
    pub kind: TransactionType,
    /// Always positive; the direction comes from `kind`.
    pub amount: f64,
    pub description: String,
    #[serde(default)]
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// The balance effect of this transaction.
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            TransactionType::TopUp | TransactionType::Refund => self.amount,
            TransactionType::Payment => -self.amount,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub kind: TransactionType,
    pub amount: f64,
    pub description: String,
    pub reference_id: Option<String>,
}

// ============================================================================
// Favorites and cart
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteKind {
    Doctor,
    Clinic,
    Pharmacy,
    Lab,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Favorite {
    pub kind: FavoriteKind,
    pub target_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub medication_id: String,
    pub quantity: u32,
}
