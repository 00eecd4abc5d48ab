//! Prescriptions, the pharmacy catalogue and professional pharmacy orders.

use crate::models::booking::PaymentMethod;
use chrono::{DateTime, NaiveDate, Utc};
use sehati_ids::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Prescriptions
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionSource {
    /// Issued by a doctor inside the app; trusted by construction.
    InApp,
    /// Photo of an external paper prescription.
    Upload,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    PendingValidation,
    Validated,
    Approved,
    Rejected,
    Expired,
}

impl PrescriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrescriptionStatus::PendingValidation => "pending_validation",
            PrescriptionStatus::Validated => "validated",
            PrescriptionStatus::Approved => "approved",
            PrescriptionStatus::Rejected => "rejected",
            PrescriptionStatus::Expired => "expired",
        }
    }
}

/// A line item. `quantity` always lies in `[1, max_quantity]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionMedication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    #[serde(default)]
    pub instructions: Option<String>,
    pub quantity: u32,
    pub max_quantity: u32,
    pub price: f64,
    pub is_selected: bool,
}

/// Deterministic checks run when a prescription enters the system.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub doctor_verified: bool,
    pub date_valid: bool,
    pub medication_clarity: bool,
    pub is_duplicate: bool,
    pub is_expired: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PharmacistApproval {
    pub pharmacist_id: String,
    pub pharmacist_name: String,
    pub approved_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: EntityId,
    pub patient_id: String,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub clinic_name: Option<String>,
    pub source: PrescriptionSource,
    #[serde(default)]
    pub image_ref: Option<String>,
    pub issued_on: NaiveDate,
    pub medications: Vec<PrescriptionMedication>,
    pub status: PrescriptionStatus,
    pub validation: ValidationResult,
    #[serde(default)]
    pub pharmacist_approval: Option<PharmacistApproval>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    pub is_auto_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prescription {
    /// Ids of the line items currently selected for ordering.
    pub fn selected_medication_ids(&self) -> BTreeSet<String> {
        self.medications
            .iter()
            .filter(|m| m.is_selected)
            .map(|m| m.id.clone())
            .collect()
    }
}

/// Input for both prescription paths.
#[derive(Clone, Debug)]
pub struct NewPrescription {
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub doctor_name: Option<String>,
    pub clinic_name: Option<String>,
    pub image_ref: Option<String>,
    pub issued_on: NaiveDate,
    pub medications: Vec<NewPrescriptionMedication>,
}

#[derive(Clone, Debug)]
pub struct NewPrescriptionMedication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub instructions: Option<String>,
    pub quantity: u32,
    pub max_quantity: u32,
    pub price: f64,
}

// ============================================================================
// Pharmacies
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub phone: String,
    pub distance_km: f64,
    pub delivery_fee: f64,
    pub delivery_minutes: u32,
    pub rating: f64,
    pub is_open: bool,
    pub available_medications: BTreeSet<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockAvailability {
    Full,
    Partial,
    None,
}

/// A catalogue pharmacy annotated against one prescription's selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PharmacyWithStock {
    pub pharmacy: Pharmacy,
    pub stock_availability: StockAvailability,
    pub available: Vec<String>,
    pub missing: Vec<String>,
}

// ============================================================================
// Professional orders
// ============================================================================

/// Order lifecycle, in order of progression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPrescription,
    PrescriptionReview,
    PrescriptionApproved,
    PaymentPending,
    Confirmed,
    Preparing,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_final(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Position along the fulfilment path. `Cancelled` sits outside it.
    fn stage(self) -> Option<u8> {
        match self {
            OrderStatus::PendingPrescription => Some(0),
            OrderStatus::PrescriptionReview => Some(1),
            OrderStatus::PrescriptionApproved => Some(2),
            OrderStatus::PaymentPending => Some(3),
            OrderStatus::Confirmed => Some(4),
            OrderStatus::Preparing => Some(5),
            OrderStatus::ReadyForPickup => Some(6),
            OrderStatus::OutForDelivery => Some(7),
            OrderStatus::Delivered => Some(8),
            OrderStatus::Cancelled => None,
        }
    }

    /// Orders only move forward; cancellation has its own path.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        match (self.stage(), next.stage()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    /// States past payment, reachable only once the order is paid or cash on delivery.
    pub fn requires_settled_payment(self) -> bool {
        self.stage().is_some_and(|s| s >= 4)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingPrescription => "pending_prescription",
            OrderStatus::PrescriptionReview => "prescription_review",
            OrderStatus::PrescriptionApproved => "prescription_approved",
            OrderStatus::PaymentPending => "payment_pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cod,
    Refunded,
}

impl PaymentStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Cod)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cod => "cod",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub medication_id: String,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
}

/// State-centric log entry: what state, when.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    Patient,
    Pharmacist,
    Courier,
    System,
}

/// Actor-centric log entry: who did what.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderAuditEntry {
    pub action: String,
    pub actor_id: String,
    pub actor_type: ActorType,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub service_fee: f64,
    pub total_amount: f64,
}

impl OrderTotals {
    /// `total = Σ(price × quantity) + delivery_fee + service_fee`.
    pub fn compute(lines: &[OrderLine], delivery_fee: f64, service_fee: f64) -> Self {
        let subtotal: f64 = lines.iter().map(|l| l.price * f64::from(l.quantity)).sum();
        Self {
            subtotal,
            delivery_fee,
            service_fee,
            total_amount: subtotal + delivery_fee + service_fee,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PharmacyOrderProfessional {
    pub id: EntityId,
    pub prescription_id: EntityId,
    pub patient_id: String,
    pub pharmacy_id: String,
    pub pharmacy_name: String,
    pub medications: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub delivery_address: String,
    pub status_history: Vec<StatusHistoryEntry>,
    pub audit_log: Vec<OrderAuditEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: f64, quantity: u32) -> OrderLine {
        OrderLine {
            medication_id: "m".into(),
            name: "m".into(),
            quantity,
            price,
        }
    }

    #[test]
    fn test_totals_add_delivery_and_service_fee() {
        let totals = OrderTotals::compute(&[line(12.5, 2), line(3.0, 3)], 10.0, 5.0);

        assert_eq!(totals.subtotal, 34.0);
        assert_eq!(totals.total_amount, 49.0);
    }

    #[test]
    fn test_totals_of_empty_order_are_fees_only() {
        let totals = OrderTotals::compute(&[], 7.0, 5.0);
        assert_eq!(totals.subtotal, 0.0);
        assert_eq!(totals.total_amount, 12.0);
    }

    #[test]
    fn test_order_status_only_moves_forward() {
        assert!(OrderStatus::PaymentPending.can_advance_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_advance_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Confirmed.can_advance_to(OrderStatus::PaymentPending));
        assert!(!OrderStatus::Preparing.can_advance_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Confirmed.can_advance_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_advance_to(OrderStatus::Confirmed));
    }

    #[test]
    fn test_fulfilment_states_need_settled_payment() {
        assert!(!OrderStatus::PaymentPending.requires_settled_payment());
        assert!(OrderStatus::Confirmed.requires_settled_payment());
        assert!(OrderStatus::Delivered.requires_settled_payment());
        assert!(PaymentStatus::Cod.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
    }
}
