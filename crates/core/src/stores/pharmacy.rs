//! Pharmacy workflow store.
//!
//! Two ways in: an in-app prescription is trusted and approved immediately; an uploaded one
//! is validated deterministically and then waits for a pharmacist review. Approved
//! prescriptions can be matched against the pharmacy catalogue and turned into orders.
//!
//! ```text
//! upload ──▶ pending_validation ──review──▶ approved ──▶ order
//!                               └─────────▶ rejected
//! in-app ─────────────────────────────────▶ approved
//! approved ──(validity window passes)──▶ expired
//! ```
//!
//! Orders keep two separate logs: `status_history` records which state the order entered
//! and when, `audit_log` records who acted.

use crate::catalog;
use crate::config::CoreConfig;
use crate::constants::{
    ORDER_PREFIX, PHARMACY_SLICE, PRESCRIPTION_PREFIX, PRESCRIPTION_VALIDITY_DAYS,
};
use crate::error::{StoreError, StoreResult};
use crate::models::booking::PaymentMethod;
use crate::models::pharmacy::*;
use crate::persistence::{load_slice, save_slice, PersistedSlice, SliceStorage};
use crate::services::{
    PaymentOutcome, PaymentProcessor, PaymentRequest, PrescriptionReviewer, ReviewDecision,
};
use chrono::{NaiveDate, Utc};
use sehati_ids::{EntityId, IdGenerator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Persisted fields of the pharmacy store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PharmacySlice {
    pub prescriptions: Vec<Prescription>,
    pub orders: Vec<PharmacyOrderProfessional>,
}

impl PersistedSlice for PharmacySlice {
    const NAME: &'static str = PHARMACY_SLICE;
}

pub struct PharmacyStore {
    cfg: Arc<CoreConfig>,
    storage: Arc<dyn SliceStorage>,
    payments: Arc<dyn PaymentProcessor>,
    reviewer: Arc<dyn PrescriptionReviewer>,
    ids: IdGenerator,
    state: PharmacySlice,
    pharmacies: Vec<Pharmacy>,
    selected_prescription_id: Option<EntityId>,
    selected_pharmacy_id: Option<String>,
    is_processing_payment: bool,
}

impl PharmacyStore {
    pub fn open(
        cfg: Arc<CoreConfig>,
        storage: Arc<dyn SliceStorage>,
        payments: Arc<dyn PaymentProcessor>,
        reviewer: Arc<dyn PrescriptionReviewer>,
    ) -> Self {
        let state = load_slice::<PharmacySlice>(storage.as_ref());
        Self {
            cfg,
            storage,
            payments,
            reviewer,
            ids: IdGenerator::new(),
            state,
            pharmacies: catalog::pharmacies(),
            selected_prescription_id: None,
            selected_pharmacy_id: None,
            is_processing_payment: false,
        }
    }

    fn persist(&self) {
        save_slice(self.storage.as_ref(), &self.state);
    }

    pub fn snapshot(&self) -> &PharmacySlice {
        &self.state
    }

    pub fn pharmacies(&self) -> &[Pharmacy] {
        &self.pharmacies
    }

    pub fn select_prescription(&mut self, id: Option<EntityId>) {
        self.selected_prescription_id = id;
    }

    pub fn selected_prescription_id(&self) -> Option<&EntityId> {
        self.selected_prescription_id.as_ref()
    }

    pub fn select_pharmacy(&mut self, id: Option<String>) {
        self.selected_pharmacy_id = id;
    }

    pub fn selected_pharmacy_id(&self) -> Option<&str> {
        self.selected_pharmacy_id.as_deref()
    }

    pub fn is_processing_payment(&self) -> bool {
        self.is_processing_payment
    }
}

// ============================================================================
// PRESCRIPTIONS
// ============================================================================

fn check_prices(meds: &[NewPrescriptionMedication]) -> StoreResult<()> {
    meds.iter().try_for_each(|m| StoreError::check_amount("medication price", m.price))
}

fn to_line_items(meds: Vec<NewPrescriptionMedication>) -> Vec<PrescriptionMedication> {
    meds.into_iter()
        .map(|m| {
            let max_quantity = m.max_quantity.max(1);
            PrescriptionMedication {
                id: m.id,
                name: m.name,
                dosage: m.dosage,
                instructions: m.instructions,
                quantity: m.quantity.clamp(1, max_quantity),
                max_quantity,
                price: m.price,
                is_selected: true,
            }
        })
        .collect()
}

impl PharmacyStore {
    fn validate(&self, new: &NewPrescription, today: NaiveDate) -> ValidationResult {
        let mut issues = Vec::new();

        let doctor_verified = new.doctor_id.is_some()
            || new
                .doctor_name
                .as_deref()
                .is_some_and(|n| !n.trim().is_empty());
        if !doctor_verified {
            issues.push("لم يتم التعرف على الطبيب".to_owned());
        }

        let age_days = (today - new.issued_on).num_days();
        let is_expired = age_days > PRESCRIPTION_VALIDITY_DAYS;
        let date_valid = age_days >= 0 && !is_expired;
        if age_days < 0 {
            issues.push("تاريخ الوصفة في المستقبل".to_owned());
        }
        if is_expired {
            issues.push("الوصفة منتهية الصلاحية".to_owned());
        }

        let medication_clarity = !new.medications.is_empty()
            && new
                .medications
                .iter()
                .all(|m| !m.name.trim().is_empty() && !m.dosage.trim().is_empty());
        if !medication_clarity {
            issues.push("الأدوية أو الجرعات غير واضحة".to_owned());
        }

        let ids: BTreeSet<&str> = new.medications.iter().map(|m| m.id.as_str()).collect();
        let is_duplicate = self.state.prescriptions.iter().any(|p| {
            p.patient_id == new.patient_id
                && p.issued_on == new.issued_on
                && p.medications.iter().map(|m| m.id.as_str()).collect::<BTreeSet<_>>() == ids
        });
        if is_duplicate {
            issues.push("تم رفع هذه الوصفة من قبل".to_owned());
        }

        ValidationResult {
            is_valid: doctor_verified && date_valid && medication_clarity && !is_duplicate,
            doctor_verified,
            date_valid,
            medication_clarity,
            is_duplicate,
            is_expired,
            issues,
        }
    }

    fn insert_prescription(
        &mut self,
        new: NewPrescription,
        source: PrescriptionSource,
        status: PrescriptionStatus,
        validation: ValidationResult,
    ) -> EntityId {
        let now = Utc::now();
        let id = self.ids.next(PRESCRIPTION_PREFIX);
        self.state.prescriptions.push(Prescription {
            id: id.clone(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            doctor_name: new.doctor_name,
            clinic_name: new.clinic_name,
            source,
            image_ref: new.image_ref,
            issued_on: new.issued_on,
            medications: to_line_items(new.medications),
            status,
            validation,
            pharmacist_approval: None,
            rejection_reason: None,
            is_auto_approved: source == PrescriptionSource::InApp,
            created_at: now,
            updated_at: now,
        });
        self.persist();
        id
    }

    /// Adds a prescription written inside the app. It is approved on arrival.
    pub fn add_in_app_prescription(
        &mut self,
        new: NewPrescription,
        today: NaiveDate,
    ) -> StoreResult<EntityId> {
        if new.medications.is_empty() {
            return Err(StoreError::InvalidInput(
                "an in-app prescription needs at least one medication".into(),
            ));
        }
        check_prices(&new.medications)?;
        let validation = self.validate(&new, today);
        let id = self.insert_prescription(
            new,
            PrescriptionSource::InApp,
            PrescriptionStatus::Approved,
            validation,
        );

        tracing::info!("in-app prescription {} auto-approved", id);
        Ok(id)
    }

    /// Adds an uploaded prescription in `pending_validation` with its checks filled in.
    pub fn upload_prescription(
        &mut self,
        new: NewPrescription,
        today: NaiveDate,
    ) -> StoreResult<EntityId> {
        check_prices(&new.medications)?;
        let validation = self.validate(&new, today);
        if !validation.is_valid {
            tracing::info!("uploaded prescription has issues: {:?}", validation.issues);
        }
        let id = self.insert_prescription(
            new,
            PrescriptionSource::Upload,
            PrescriptionStatus::PendingValidation,
            validation,
        );

        tracing::info!("prescription {} uploaded, awaiting review", id);
        Ok(id)
    }

    fn prescription_mut(&mut self, id: &EntityId) -> StoreResult<&mut Prescription> {
        self.state
            .prescriptions
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| StoreError::not_found("prescription", id))
    }

    /// Sends a pending prescription to the pharmacist and applies the decision.
    pub async fn review_prescription(&mut self, id: &EntityId) -> StoreResult<PrescriptionStatus> {
        let pending = self
            .prescription(id)
            .ok_or_else(|| StoreError::not_found("prescription", id))?
            .clone();
        if pending.status != PrescriptionStatus::PendingValidation {
            return Err(StoreError::InvalidTransition {
                kind: "prescription",
                from: pending.status.as_str().into(),
                to: PrescriptionStatus::Approved.as_str().into(),
            });
        }

        let reviewer = Arc::clone(&self.reviewer);
        let decision = reviewer.review(&pending).await;

        let prescription = self.prescription_mut(id)?;
        match decision {
            ReviewDecision::Approved(approval) => {
                prescription.status = PrescriptionStatus::Approved;
                prescription.pharmacist_approval = Some(approval);
            }
            ReviewDecision::Rejected { reason } => {
                prescription.status = PrescriptionStatus::Rejected;
                prescription.rejection_reason = Some(reason);
            }
        }
        prescription.updated_at = Utc::now();
        let status = prescription.status;
        self.persist();

        tracing::info!("prescription {} reviewed: {}", id, status.as_str());
        Ok(status)
    }

    /// Expires approved prescriptions older than the validity window. Returns how many.
    pub fn expire_stale_prescriptions(&mut self, today: NaiveDate) -> usize {
        let now = Utc::now();
        let mut expired = 0;
        for p in self.state.prescriptions.iter_mut().filter(|p| {
            p.status == PrescriptionStatus::Approved
                && (today - p.issued_on).num_days() > PRESCRIPTION_VALIDITY_DAYS
        }) {
            p.status = PrescriptionStatus::Expired;
            p.validation.is_expired = true;
            p.updated_at = now;
            expired += 1;
        }
        if expired > 0 {
            self.persist();
            tracing::info!("{} prescriptions expired", expired);
        }
        expired
    }

    fn medication_mut(
        &mut self,
        prescription_id: &EntityId,
        medication_id: &str,
    ) -> StoreResult<&mut PrescriptionMedication> {
        self.prescription_mut(prescription_id)?
            .medications
            .iter_mut()
            .find(|m| m.id == medication_id)
            .ok_or_else(|| StoreError::not_found("prescription medication", medication_id))
    }

    /// Flips a line's selection. Returns the new selection state.
    pub fn toggle_medication_selection(
        &mut self,
        prescription_id: &EntityId,
        medication_id: &str,
    ) -> StoreResult<bool> {
        let line = self.medication_mut(prescription_id, medication_id)?;
        line.is_selected = !line.is_selected;
        let selected = line.is_selected;
        self.persist();
        Ok(selected)
    }

    /// Sets a line's quantity, clamped into `[1, max_quantity]`. Returns the stored value.
    pub fn update_medication_quantity(
        &mut self,
        prescription_id: &EntityId,
        medication_id: &str,
        quantity: i64,
    ) -> StoreResult<u32> {
        let line = self.medication_mut(prescription_id, medication_id)?;
        let clamped = quantity.clamp(1, i64::from(line.max_quantity.max(1)));
        line.quantity = u32::try_from(clamped).unwrap_or(1);
        let stored = line.quantity;
        self.persist();
        Ok(stored)
    }

    pub fn prescription(&self, id: &EntityId) -> Option<&Prescription> {
        self.state.prescriptions.iter().find(|p| &p.id == id)
    }

    pub fn prescriptions(&self) -> &[Prescription] {
        &self.state.prescriptions
    }
}

// ============================================================================
// STOCK MATCHING
// ============================================================================

/// Classifies a pharmacy against the selected medication ids.
///
/// An empty selection is contained in every stock and classifies as `full`.
pub fn classify_stock(pharmacy: &Pharmacy, selected: &BTreeSet<String>) -> PharmacyWithStock {
    let (available, missing): (Vec<String>, Vec<String>) = selected
        .iter()
        .cloned()
        .partition(|id| pharmacy.available_medications.contains(id));

    let stock_availability = if missing.is_empty() {
        StockAvailability::Full
    } else if available.is_empty() {
        StockAvailability::None
    } else {
        StockAvailability::Partial
    };

    PharmacyWithStock {
        pharmacy: pharmacy.clone(),
        stock_availability,
        available,
        missing,
    }
}

impl PharmacyStore {
    /// Every catalogue pharmacy annotated against the prescription's selection, nearest first.
    pub fn get_pharmacies_with_stock(
        &self,
        prescription_id: &EntityId,
    ) -> StoreResult<Vec<PharmacyWithStock>> {
        let selected = self
            .prescription(prescription_id)
            .ok_or_else(|| StoreError::not_found("prescription", prescription_id))?
            .selected_medication_ids();

        let mut result: Vec<PharmacyWithStock> = self
            .pharmacies
            .iter()
            .map(|p| classify_stock(p, &selected))
            .collect();
        result.sort_by(|a, b| a.pharmacy.distance_km.total_cmp(&b.pharmacy.distance_km));
        Ok(result)
    }
}

// ============================================================================
// ORDERS
// ============================================================================

impl PharmacyStore {
    /// Order lines, pharmacy and patient for an order that `create_order` would accept.
    fn draft_order(
        &self,
        prescription_id: &EntityId,
        pharmacy_id: &str,
    ) -> StoreResult<(Vec<OrderLine>, &Pharmacy, String)> {
        let prescription = self
            .prescription(prescription_id)
            .ok_or_else(|| StoreError::not_found("prescription", prescription_id))?;
        if prescription.status != PrescriptionStatus::Approved {
            return Err(StoreError::PrescriptionNotApproved(
                prescription_id.to_string(),
            ));
        }
        let pharmacy = self
            .pharmacies
            .iter()
            .find(|p| p.id == pharmacy_id)
            .ok_or_else(|| StoreError::not_found("pharmacy", pharmacy_id))?;

        let lines: Vec<OrderLine> = prescription
            .medications
            .iter()
            .filter(|m| m.is_selected)
            .map(|m| OrderLine {
                medication_id: m.id.clone(),
                name: m.name.clone(),
                quantity: m.quantity,
                price: m.price,
            })
            .collect();
        if lines.is_empty() {
            return Err(StoreError::NoMedicationsSelected(
                prescription_id.to_string(),
            ));
        }

        Ok((lines, pharmacy, prescription.patient_id.clone()))
    }

    /// Prices the current selection at a pharmacy without creating anything.
    pub fn quote_order(
        &self,
        prescription_id: &EntityId,
        pharmacy_id: &str,
    ) -> StoreResult<OrderTotals> {
        let (lines, pharmacy, _) = self.draft_order(prescription_id, pharmacy_id)?;
        Ok(OrderTotals::compute(
            &lines,
            pharmacy.delivery_fee,
            self.cfg.service_fee(),
        ))
    }

    /// Turns an approved prescription's selection into an order.
    ///
    /// Cash on delivery orders are confirmed at once; other methods wait in `payment_pending`
    /// until [`Self::process_payment`] succeeds.
    pub fn create_order(
        &mut self,
        prescription_id: &EntityId,
        pharmacy_id: &str,
        payment_method: PaymentMethod,
        delivery_address: &str,
    ) -> StoreResult<EntityId> {
        let (lines, pharmacy, patient_id) = self.draft_order(prescription_id, pharmacy_id)?;
        let totals = OrderTotals::compute(&lines, pharmacy.delivery_fee, self.cfg.service_fee());
        let pharmacy_name = pharmacy.name.clone();

        let (status, payment_status) = if payment_method.is_cash() {
            (OrderStatus::Confirmed, PaymentStatus::Cod)
        } else {
            (OrderStatus::PaymentPending, PaymentStatus::Pending)
        };
        let now = Utc::now();
        let id = self.ids.next(ORDER_PREFIX);

        self.state.orders.push(PharmacyOrderProfessional {
            id: id.clone(),
            prescription_id: prescription_id.clone(),
            patient_id: patient_id.clone(),
            pharmacy_id: pharmacy_id.to_owned(),
            pharmacy_name,
            medications: lines,
            payment_method,
            payment_status,
            status,
            delivery_address: delivery_address.to_owned(),
            status_history: vec![StatusHistoryEntry {
                status,
                timestamp: now,
                note: None,
            }],
            audit_log: vec![OrderAuditEntry {
                action: "order_created".into(),
                actor_id: patient_id,
                actor_type: ActorType::Patient,
                timestamp: now,
                details: format!("total {:.2} LYD", totals.total_amount),
            }],
            totals,
            created_at: now,
            updated_at: now,
        });
        self.persist();

        tracing::info!("pharmacy order {} created ({})", id, status.as_str());
        Ok(id)
    }

    fn order_mut(&mut self, id: &EntityId) -> StoreResult<&mut PharmacyOrderProfessional> {
        self.state
            .orders
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| StoreError::not_found("pharmacy order", id))
    }

    /// Charges a `payment_pending` order through the payment processor.
    ///
    /// Returns `Ok(false)` when the charge is declined; the order is then left untouched and
    /// may be retried. An order whose payment is already settled is never charged again.
    pub async fn process_payment(&mut self, order_id: &EntityId) -> StoreResult<bool> {
        let order = self
            .order(order_id)
            .ok_or_else(|| StoreError::not_found("pharmacy order", order_id))?;
        if order.status != OrderStatus::PaymentPending {
            return Err(StoreError::InvalidTransition {
                kind: "pharmacy order",
                from: order.status.as_str().into(),
                to: OrderStatus::Confirmed.as_str().into(),
            });
        }
        if order.payment_status != PaymentStatus::Pending {
            return Err(StoreError::InvalidTransition {
                kind: "order payment",
                from: order.payment_status.as_str().into(),
                to: PaymentStatus::Paid.as_str().into(),
            });
        }
        let request = PaymentRequest {
            reference_id: order_id.to_string(),
            amount: order.totals.total_amount,
            method: order.payment_method,
        };

        self.is_processing_payment = true;
        let payments = Arc::clone(&self.payments);
        let outcome = payments.charge(&request).await;
        self.is_processing_payment = false;

        let PaymentOutcome::Approved { transaction_ref } = outcome else {
            tracing::warn!("payment for order {} declined", order_id);
            return Ok(false);
        };

        let now = Utc::now();
        let order = self.order_mut(order_id)?;
        order.payment_status = PaymentStatus::Paid;
        order.status = OrderStatus::Confirmed;
        order.status_history.push(StatusHistoryEntry {
            status: OrderStatus::Confirmed,
            timestamp: now,
            note: Some("payment received".into()),
        });
        order.audit_log.push(OrderAuditEntry {
            action: "payment_completed".into(),
            actor_id: order.patient_id.clone(),
            actor_type: ActorType::Patient,
            timestamp: now,
            details: format!("{:.2} LYD, ref {transaction_ref}", request.amount),
        });
        order.updated_at = now;
        self.persist();

        tracing::info!("payment for order {} completed", order_id);
        Ok(true)
    }

    /// Moves a live order forward to `status`, logging both the new state and the actor.
    ///
    /// Backward moves are refused, as is any fulfilment state while payment is outstanding.
    pub fn update_order_status(
        &mut self,
        order_id: &EntityId,
        status: OrderStatus,
        note: Option<String>,
        actor_id: &str,
        actor_type: ActorType,
    ) -> StoreResult<()> {
        if status == OrderStatus::Cancelled {
            return self.cancel_order(
                order_id,
                note.as_deref().unwrap_or("cancelled"),
                actor_id,
                actor_type,
            );
        }

        let order = self.order_mut(order_id)?;
        let unpaid = status.requires_settled_payment() && !order.payment_status.is_settled();
        if !order.status.can_advance_to(status) || unpaid {
            return Err(StoreError::InvalidTransition {
                kind: "pharmacy order",
                from: order.status.as_str().into(),
                to: status.as_str().into(),
            });
        }

        let now = Utc::now();
        let from = order.status;
        order.status = status;
        order.status_history.push(StatusHistoryEntry {
            status,
            timestamp: now,
            note,
        });
        order.audit_log.push(OrderAuditEntry {
            action: "status_changed".into(),
            actor_id: actor_id.to_owned(),
            actor_type,
            timestamp: now,
            details: format!("{} -> {}", from.as_str(), status.as_str()),
        });
        order.updated_at = now;
        self.persist();

        tracing::info!("order {} moved to {}", order_id, status.as_str());
        Ok(())
    }

    /// Cancels an order that has not been delivered. A paid order is marked refunded.
    pub fn cancel_order(
        &mut self,
        order_id: &EntityId,
        reason: &str,
        actor_id: &str,
        actor_type: ActorType,
    ) -> StoreResult<()> {
        let order = self.order_mut(order_id)?;
        if order.status.is_final() {
            return Err(StoreError::InvalidTransition {
                kind: "pharmacy order",
                from: order.status.as_str().into(),
                to: OrderStatus::Cancelled.as_str().into(),
            });
        }

        let now = Utc::now();
        if order.payment_status == PaymentStatus::Paid {
            order.payment_status = PaymentStatus::Refunded;
        }
        order.status = OrderStatus::Cancelled;
        order.status_history.push(StatusHistoryEntry {
            status: OrderStatus::Cancelled,
            timestamp: now,
            note: Some(reason.to_owned()),
        });
        order.audit_log.push(OrderAuditEntry {
            action: "order_cancelled".into(),
            actor_id: actor_id.to_owned(),
            actor_type,
            timestamp: now,
            details: reason.to_owned(),
        });
        order.updated_at = now;
        self.persist();

        tracing::info!("order {} cancelled", order_id);
        Ok(())
    }

    pub fn order(&self, id: &EntityId) -> Option<&PharmacyOrderProfessional> {
        self.state.orders.iter().find(|o| &o.id == id)
    }

    pub fn orders(&self) -> &[PharmacyOrderProfessional] {
        &self.state.orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemorySliceStorage;
    use crate::services::{ScriptedPaymentProcessor, ScriptedReviewer};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn store_with(
        storage: Arc<dyn SliceStorage>,
        approve_payments: bool,
        reviewer: ScriptedReviewer,
    ) -> PharmacyStore {
        PharmacyStore::open(
            Arc::new(CoreConfig::default()),
            storage,
            Arc::new(ScriptedPaymentProcessor::always(approve_payments)),
            Arc::new(reviewer),
        )
    }

    fn store() -> PharmacyStore {
        store_with(
            Arc::new(MemorySliceStorage::new()),
            true,
            ScriptedReviewer::approving(),
        )
    }

    fn med(id: &str, price: f64, quantity: u32, max: u32) -> NewPrescriptionMedication {
        NewPrescriptionMedication {
            id: id.into(),
            name: format!("drug {id}"),
            dosage: "10mg".into(),
            instructions: None,
            quantity,
            max_quantity: max,
            price,
        }
    }

    fn prescription(meds: Vec<NewPrescriptionMedication>) -> NewPrescription {
        NewPrescription {
            patient_id: "user-1".into(),
            doctor_id: Some("doc-1".into()),
            doctor_name: Some("د. خالد".into()),
            clinic_name: None,
            image_ref: None,
            issued_on: NaiveDate::from_ymd_opt(2026, 10, 10).unwrap(),
            medications: meds,
        }
    }

    fn pharmacy(stock: &[&str]) -> Pharmacy {
        Pharmacy {
            id: "p".into(),
            name: "p".into(),
            address: String::new(),
            city: String::new(),
            phone: String::new(),
            distance_km: 1.0,
            delivery_fee: 10.0,
            delivery_minutes: 30,
            rating: 4.0,
            is_open: true,
            available_medications: stock.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    fn ids(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_stock_classification() {
        let stocked = pharmacy(&["a", "b", "c"]);

        let full = classify_stock(&stocked, &ids(&["a", "b"]));
        assert_eq!(full.stock_availability, StockAvailability::Full);

        let partial = classify_stock(&stocked, &ids(&["a", "z"]));
        assert_eq!(partial.stock_availability, StockAvailability::Partial);
        assert_eq!(partial.missing, vec!["z".to_owned()]);

        let none = classify_stock(&stocked, &ids(&["y", "z"]));
        assert_eq!(none.stock_availability, StockAvailability::None);

        let empty = classify_stock(&stocked, &BTreeSet::new());
        assert_eq!(empty.stock_availability, StockAvailability::Full);
    }

    #[test]
    fn test_pharmacies_sorted_by_distance() {
        let mut store = store();
        let rx = store
            .add_in_app_prescription(prescription(vec![med("med-006", 15.0, 1, 2)]), today())
            .unwrap();

        let ranked = store.get_pharmacies_with_stock(&rx).unwrap();
        let distances: Vec<f64> = ranked.iter().map(|p| p.pharmacy.distance_km).collect();
        let mut sorted = distances.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(distances, sorted);
        assert_eq!(ranked[0].pharmacy.id, "pharm-003");
    }

    #[test]
    fn test_quantity_clamping_is_idempotent() {
        let mut store = store();
        let rx = store
            .add_in_app_prescription(prescription(vec![med("m1", 5.0, 1, 4)]), today())
            .unwrap();

        for (input, expected) in [(-3, 1), (0, 1), (3, 3), (99, 4)] {
            let once = store.update_medication_quantity(&rx, "m1", input).unwrap();
            let twice = store
                .update_medication_quantity(&rx, "m1", i64::from(once))
                .unwrap();
            assert_eq!(once, expected);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_order_total_arithmetic() {
        let mut store = store();
        let rx = store
            .add_in_app_prescription(
                prescription(vec![med("med-001", 12.5, 2, 5), med("med-003", 3.0, 3, 5)]),
                today(),
            )
            .unwrap();

        let id = store
            .create_order(&rx, "pharm-001", PaymentMethod::CashOnDelivery, "طرابلس")
            .unwrap();
        let totals = &store.order(&id).unwrap().totals;
        assert_eq!(totals.subtotal, 34.0);
        assert_eq!(totals.delivery_fee, 10.0);
        assert_eq!(totals.service_fee, 5.0);
        assert_eq!(totals.total_amount, 49.0);
    }

    #[test]
    fn test_cod_order_is_confirmed_immediately() {
        let mut store = store();
        let rx = store
            .add_in_app_prescription(prescription(vec![med("med-001", 4.5, 2, 5)]), today())
            .unwrap();

        let id = store
            .create_order(&rx, "pharm-002", PaymentMethod::CashOnDelivery, "طرابلس")
            .unwrap();
        let order = store.order(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Cod);
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.audit_log.len(), 1);
        assert_eq!(order.audit_log[0].actor_type, ActorType::Patient);
    }

    #[tokio::test]
    async fn test_declined_payment_leaves_order_untouched() {
        let mut store = store_with(
            Arc::new(MemorySliceStorage::new()),
            false,
            ScriptedReviewer::approving(),
        );
        let rx = store
            .add_in_app_prescription(prescription(vec![med("med-001", 4.5, 2, 5)]), today())
            .unwrap();
        let id = store
            .create_order(&rx, "pharm-001", PaymentMethod::Card, "طرابلس")
            .unwrap();
        let before = store.order(&id).unwrap().clone();

        assert!(!store.process_payment(&id).await.unwrap());
        assert_eq!(store.order(&id).unwrap(), &before);
        assert_eq!(before.status, OrderStatus::PaymentPending);
        assert_eq!(before.payment_status, PaymentStatus::Pending);
        assert!(!store.is_processing_payment());
    }

    #[tokio::test]
    async fn test_successful_payment_confirms_order() {
        let mut store = store();
        let rx = store
            .add_in_app_prescription(prescription(vec![med("med-001", 4.5, 2, 5)]), today())
            .unwrap();
        let id = store
            .create_order(&rx, "pharm-001", PaymentMethod::Card, "طرابلس")
            .unwrap();

        assert!(store.process_payment(&id).await.unwrap());
        let order = store.order(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.status_history.len(), 2);
        assert_eq!(order.audit_log.len(), 2);

        assert!(matches!(
            store.process_payment(&id).await,
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_create_order_rejections() {
        let mut store = store();
        let pending = store
            .upload_prescription(prescription(vec![med("m1", 1.0, 1, 1)]), today())
            .unwrap();
        assert!(matches!(
            store.create_order(&pending, "pharm-001", PaymentMethod::Card, "x"),
            Err(StoreError::PrescriptionNotApproved(_))
        ));

        let rx = store
            .add_in_app_prescription(prescription(vec![med("m2", 1.0, 1, 1)]), today())
            .unwrap();
        assert!(matches!(
            store.create_order(&rx, "pharm-999", PaymentMethod::Card, "x"),
            Err(StoreError::NotFound { .. })
        ));

        store.toggle_medication_selection(&rx, "m2").unwrap();
        assert!(matches!(
            store.create_order(&rx, "pharm-001", PaymentMethod::Card, "x"),
            Err(StoreError::NoMedicationsSelected(_))
        ));
    }

    #[test]
    fn test_upload_validation_flags() {
        let mut store = store();
        let mut stale = prescription(vec![med("m1", 1.0, 1, 1)]);
        stale.issued_on = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        stale.doctor_id = None;
        stale.doctor_name = None;

        let id = store.upload_prescription(stale, today()).unwrap();
        let rx = store.prescription(&id).unwrap();
        assert_eq!(rx.status, PrescriptionStatus::PendingValidation);
        assert!(!rx.is_auto_approved);
        assert!(rx.validation.is_expired);
        assert!(!rx.validation.doctor_verified);
        assert!(!rx.validation.is_valid);
        assert_eq!(rx.validation.issues.len(), 2);

        let again = store
            .upload_prescription(prescription(vec![med("m1", 1.0, 1, 1)]), today())
            .unwrap();
        let first_ok = store.prescription(&again).unwrap().validation.is_valid;
        let dup = store
            .upload_prescription(prescription(vec![med("m1", 1.0, 1, 1)]), today())
            .unwrap();
        assert!(first_ok);
        assert!(store.prescription(&dup).unwrap().validation.is_duplicate);
    }

    #[tokio::test]
    async fn test_review_approves_or_rejects() {
        let mut approving = store();
        let id = approving
            .upload_prescription(prescription(vec![med("m1", 1.0, 1, 1)]), today())
            .unwrap();
        assert_eq!(
            approving.review_prescription(&id).await.unwrap(),
            PrescriptionStatus::Approved
        );
        assert!(approving.prescription(&id).unwrap().pharmacist_approval.is_some());
        assert!(approving.review_prescription(&id).await.is_err());

        let mut rejecting = store_with(
            Arc::new(MemorySliceStorage::new()),
            true,
            ScriptedReviewer::rejecting("illegible"),
        );
        let id = rejecting
            .upload_prescription(prescription(vec![med("m1", 1.0, 1, 1)]), today())
            .unwrap();
        assert_eq!(
            rejecting.review_prescription(&id).await.unwrap(),
            PrescriptionStatus::Rejected
        );
        assert_eq!(
            rejecting.prescription(&id).unwrap().rejection_reason.as_deref(),
            Some("illegible")
        );
    }

    #[test]
    fn test_expire_stale_prescriptions() {
        let mut store = store();
        let rx = store
            .add_in_app_prescription(prescription(vec![med("m1", 1.0, 1, 1)]), today())
            .unwrap();

        assert_eq!(store.expire_stale_prescriptions(today()), 0);
        let later = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
        assert_eq!(store.expire_stale_prescriptions(later), 1);
        assert_eq!(
            store.prescription(&rx).unwrap().status,
            PrescriptionStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_cancel_paid_order_refunds_and_delivered_is_final() {
        let mut store = store();
        let rx = store
            .add_in_app_prescription(prescription(vec![med("med-001", 4.5, 2, 5)]), today())
            .unwrap();

        let paid = store
            .create_order(&rx, "pharm-001", PaymentMethod::Card, "طرابلس")
            .unwrap();
        store.process_payment(&paid).await.unwrap();
        store
            .cancel_order(&paid, "changed my mind", "user-1", ActorType::Patient)
            .unwrap();
        assert_eq!(
            store.order(&paid).unwrap().payment_status,
            PaymentStatus::Refunded
        );

        let cod = store
            .create_order(&rx, "pharm-001", PaymentMethod::CashOnDelivery, "طرابلس")
            .unwrap();
        store
            .update_order_status(&cod, OrderStatus::Delivered, None, "courier-1", ActorType::Courier)
            .unwrap();
        assert!(store
            .cancel_order(&cod, "late", "user-1", ActorType::Patient)
            .is_err());
    }

    #[tokio::test]
    async fn test_paid_order_cannot_move_back_or_be_charged_twice() {
        let mut store = store();
        let rx = store
            .add_in_app_prescription(prescription(vec![med("med-001", 4.5, 2, 5)]), today())
            .unwrap();
        let id = store
            .create_order(&rx, "pharm-001", PaymentMethod::Wallet, "طرابلس")
            .unwrap();
        assert!(store.process_payment(&id).await.unwrap());

        let back = store.update_order_status(
            &id,
            OrderStatus::PaymentPending,
            None,
            "ph-1",
            ActorType::Pharmacist,
        );
        assert!(matches!(back, Err(StoreError::InvalidTransition { .. })));
        assert!(store.process_payment(&id).await.is_err());

        let pharmacist = ActorType::Pharmacist;
        store
            .update_order_status(&id, OrderStatus::Preparing, None, "ph-1", pharmacist)
            .unwrap();
        assert!(store
            .update_order_status(&id, OrderStatus::Confirmed, None, "ph-1", pharmacist)
            .is_err());
        let order = store.order(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Preparing);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_unpaid_order_cannot_be_fulfilled() {
        let mut store = store_with(
            Arc::new(MemorySliceStorage::new()),
            false,
            ScriptedReviewer::approving(),
        );
        let rx = store
            .add_in_app_prescription(prescription(vec![med("med-001", 4.5, 2, 5)]), today())
            .unwrap();
        let id = store
            .create_order(&rx, "pharm-001", PaymentMethod::Card, "طرابلس")
            .unwrap();
        assert!(!store.process_payment(&id).await.unwrap());

        for status in [OrderStatus::Confirmed, OrderStatus::Delivered] {
            assert!(store
                .update_order_status(&id, status, None, "courier-1", ActorType::Courier)
                .is_err());
        }
        assert_eq!(store.order(&id).unwrap().status, OrderStatus::PaymentPending);
    }

    #[test]
    fn test_non_finite_medication_price_is_rejected() {
        let mut store = store();

        assert!(matches!(
            store.add_in_app_prescription(prescription(vec![med("m1", f64::NAN, 1, 1)]), today()),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            store.upload_prescription(prescription(vec![med("m1", f64::INFINITY, 1, 1)]), today()),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            store.upload_prescription(prescription(vec![med("m1", -2.0, 1, 1)]), today()),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(store.prescriptions().is_empty());
    }

    #[test]
    fn test_reload_keeps_orders_and_drops_selection() {
        let storage: Arc<dyn SliceStorage> = Arc::new(MemorySliceStorage::new());
        let mut store = store_with(storage.clone(), true, ScriptedReviewer::approving());
        let rx = store
            .add_in_app_prescription(prescription(vec![med("med-001", 4.5, 2, 5)]), today())
            .unwrap();
        store
            .create_order(&rx, "pharm-001", PaymentMethod::CashOnDelivery, "طرابلس")
            .unwrap();
        store.select_prescription(Some(rx));
        store.select_pharmacy(Some("pharm-001".into()));
        let saved = store.snapshot().clone();

        let reloaded = store_with(storage, true, ScriptedReviewer::approving());
        assert_eq!(reloaded.snapshot(), &saved);
        assert!(reloaded.selected_prescription_id().is_none());
        assert!(reloaded.selected_pharmacy_id().is_none());
    }
}
