//! Core booking store.
//!
//! Holds appointments, lab bookings, quick pharmacy orders, ambulance requests, the wallet,
//! notifications, ratings, favorites and the medication cart.
//!
//! Nothing here can fail: every operation is an in-memory mutation followed by a
//! fire-and-forget save of the slice. Update operations return `false` when the target does
//! not exist.
//!
//! Two pairs of writes are deliberately left independent at the primitive level:
//! - `add_rating` does not clear the matching pending rating (`submit_rating` does both);
//! - `add_transaction` does not move `wallet_balance` (`record_transaction` does both).
//!
//! Callers that use only the primitives can make those pairs drift; `wallet_drift` reports
//! the wallet discrepancy.

use crate::config::CoreConfig;
use crate::constants::{
    AMBULANCE_PREFIX, APPOINTMENT_PREFIX, BOOKING_SLICE, LAB_BOOKING_PREFIX, NOTIFICATION_PREFIX,
    QUICK_ORDER_PREFIX, RATING_PREFIX, TRANSACTION_PREFIX,
};
use crate::error::{StoreError, StoreResult};
use crate::models::booking::*;
use crate::persistence::{load_slice, save_slice, PersistedSlice, SliceStorage};
use chrono::{NaiveDate, Utc};
use sehati_ids::{EntityId, IdGenerator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Persisted fields of the booking store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingSlice {
    pub appointments: Vec<Appointment>,
    pub lab_bookings: Vec<LabBooking>,
    pub pharmacy_orders: Vec<PharmacyOrder>,
    pub ambulance_requests: Vec<AmbulanceRequest>,
    pub wallet_balance: f64,
    pub transactions: Vec<WalletTransaction>,
    pub notifications: Vec<Notification>,
    pub ratings: Vec<Rating>,
    pub pending_ratings: Vec<PendingRating>,
    pub favorites: Vec<Favorite>,
    pub cart: Vec<CartItem>,
}

impl PersistedSlice for BookingSlice {
    const NAME: &'static str = BOOKING_SLICE;
}

pub struct BookingStore {
    cfg: Arc<CoreConfig>,
    storage: Arc<dyn SliceStorage>,
    ids: IdGenerator,
    state: BookingSlice,
    is_processing_payment: bool,
}

impl BookingStore {
    /// Opens the store, restoring the persisted slice over defaults.
    pub fn open(cfg: Arc<CoreConfig>, storage: Arc<dyn SliceStorage>) -> Self {
        let state = load_slice::<BookingSlice>(storage.as_ref());
        Self {
            cfg,
            storage,
            ids: IdGenerator::new(),
            state,
            is_processing_payment: false,
        }
    }

    fn persist(&self) {
        save_slice(self.storage.as_ref(), &self.state);
    }

    pub fn snapshot(&self) -> &BookingSlice {
        &self.state
    }

    pub fn is_processing_payment(&self) -> bool {
        self.is_processing_payment
    }

    pub fn set_processing_payment(&mut self, processing: bool) {
        self.is_processing_payment = processing;
    }
}

// ============================================================================
// APPOINTMENTS
// ============================================================================

impl BookingStore {
    /// Adds a pending appointment. The fee must be a finite, non-negative amount.
    pub fn add_appointment(&mut self, new: NewAppointment) -> StoreResult<EntityId> {
        StoreError::check_amount("appointment fee", new.fee)?;
        let now = Utc::now();
        let id = self.ids.next(APPOINTMENT_PREFIX);

        self.state.appointments.push(Appointment {
            id: id.clone(),
            patient_id: new.patient_id,
            patient_name: new.patient_name,
            family_member_id: new.family_member_id,
            doctor_id: new.doctor_id,
            doctor_name: new.doctor_name,
            specialty: new.specialty,
            clinic_id: new.clinic_id,
            clinic_name: new.clinic_name,
            date: new.date,
            time: new.time,
            appointment_type: new.appointment_type,
            status: AppointmentStatus::Pending,
            fee: new.fee,
            payment_method: None,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        });
        self.persist();

        tracing::info!("appointment {} added", id);
        Ok(id)
    }

    pub fn update_appointment(&mut self, id: &EntityId, update: AppointmentUpdate) -> bool {
        let Some(appointment) = self.state.appointments.iter_mut().find(|a| &a.id == id) else {
            tracing::debug!("update ignored, no appointment {}", id);
            return false;
        };

        if let Some(date) = update.date {
            appointment.date = date;
        }
        if let Some(time) = update.time {
            appointment.time = time;
        }
        if let Some(kind) = update.appointment_type {
            appointment.appointment_type = kind;
        }
        if let Some(status) = update.status {
            appointment.status = status;
        }
        if let Some(method) = update.payment_method {
            appointment.payment_method = Some(method);
        }
        if let Some(notes) = update.notes {
            appointment.notes = Some(notes);
        }
        appointment.updated_at = Utc::now();

        self.persist();
        true
    }

    /// Cancels by status change; appointments are never removed.
    pub fn cancel_appointment(&mut self, id: &EntityId) -> bool {
        self.update_appointment(
            id,
            AppointmentUpdate {
                status: Some(AppointmentStatus::Cancelled),
                ..Default::default()
            },
        )
    }

    pub fn appointment(&self, id: &EntityId) -> Option<&Appointment> {
        self.state.appointments.iter().find(|a| &a.id == id)
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.state.appointments
    }

    pub fn appointments_for_family_member<'a>(
        &'a self,
        member_id: &'a EntityId,
    ) -> impl Iterator<Item = &'a Appointment> + 'a {
        self.state
            .appointments
            .iter()
            .filter(move |a| a.family_member_id.as_ref() == Some(member_id))
    }

    /// Pending or confirmed appointments on or after `today`, soonest first.
    pub fn upcoming_appointments(&self, today: NaiveDate) -> Vec<&Appointment> {
        let mut upcoming: Vec<&Appointment> = self
            .state
            .appointments
            .iter()
            .filter(|a| {
                a.date >= today
                    && matches!(
                        a.status,
                        AppointmentStatus::Pending | AppointmentStatus::Confirmed
                    )
            })
            .collect();
        upcoming.sort_by_key(|a| (a.date, a.time));
        upcoming
    }
}

// ============================================================================
// LAB BOOKINGS, QUICK ORDERS, AMBULANCE REQUESTS
// ============================================================================

impl BookingStore {
    pub fn add_lab_booking(&mut self, new: NewLabBooking) -> EntityId {
        let now = Utc::now();
        let id = self.ids.next(LAB_BOOKING_PREFIX);

        self.state.lab_bookings.push(LabBooking {
            id: id.clone(),
            patient_id: new.patient_id,
            lab_id: new.lab_id,
            lab_name: new.lab_name,
            tests: new.tests,
            date: new.date,
            time: new.time,
            home_collection: new.home_collection,
            status: LabBookingStatus::Pending,
            fees: new.fees,
            created_at: now,
            updated_at: now,
        });
        self.persist();
        id
    }

    pub fn update_lab_booking_status(&mut self, id: &EntityId, status: LabBookingStatus) -> bool {
        let Some(booking) = self.state.lab_bookings.iter_mut().find(|b| &b.id == id) else {
            return false;
        };
        booking.status = status;
        booking.updated_at = Utc::now();
        self.persist();
        true
    }

    pub fn lab_bookings(&self) -> &[LabBooking] {
        &self.state.lab_bookings
    }

    pub fn add_pharmacy_order(&mut self, new: NewPharmacyOrder) -> StoreResult<EntityId> {
        for item in &new.items {
            StoreError::check_amount("unit price", item.unit_price)?;
        }
        StoreError::check_amount("delivery fee", new.delivery_fee)?;
        StoreError::check_amount("service fee", new.service_fee)?;
        let now = Utc::now();
        let id = self.ids.next(QUICK_ORDER_PREFIX);
        let subtotal: f64 = new
            .items
            .iter()
            .map(|i| i.unit_price * f64::from(i.quantity))
            .sum();

        self.state.pharmacy_orders.push(PharmacyOrder {
            id: id.clone(),
            patient_id: new.patient_id,
            pharmacy_id: new.pharmacy_id,
            pharmacy_name: new.pharmacy_name,
            items: new.items,
            status: PharmacyOrderStatus::Pending,
            fees: FeeBreakdown::new(subtotal, new.delivery_fee, new.service_fee),
            payment_method: new.payment_method,
            delivery_address: new.delivery_address,
            created_at: now,
            updated_at: now,
        });
        self.persist();
        Ok(id)
    }

    pub fn update_pharmacy_order(&mut self, id: &EntityId, update: PharmacyOrderUpdate) -> bool {
        let Some(order) = self.state.pharmacy_orders.iter_mut().find(|o| &o.id == id) else {
            return false;
        };
        if let Some(status) = update.status {
            order.status = status;
        }
        if let Some(address) = update.delivery_address {
            order.delivery_address = address;
        }
        order.updated_at = Utc::now();
        self.persist();
        true
    }

    pub fn pharmacy_orders(&self) -> &[PharmacyOrder] {
        &self.state.pharmacy_orders
    }

    pub fn add_ambulance_request(&mut self, new: NewAmbulanceRequest) -> EntityId {
        let now = Utc::now();
        let id = self.ids.next(AMBULANCE_PREFIX);

        self.state.ambulance_requests.push(AmbulanceRequest {
            id: id.clone(),
            patient_id: new.patient_id,
            pickup_location: new.pickup_location,
            destination: new.destination,
            emergency_type: new.emergency_type,
            status: AmbulanceStatus::Requested,
            fees: new.fees,
            created_at: now,
            updated_at: now,
        });
        self.persist();

        tracing::info!("ambulance request {} added", id);
        id
    }

    pub fn update_ambulance_status(&mut self, id: &EntityId, status: AmbulanceStatus) -> bool {
        let Some(request) = self
            .state
            .ambulance_requests
            .iter_mut()
            .find(|r| &r.id == id)
        else {
            return false;
        };
        request.status = status;
        request.updated_at = Utc::now();
        self.persist();
        true
    }

    pub fn ambulance_requests(&self) -> &[AmbulanceRequest] {
        &self.state.ambulance_requests
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

impl BookingStore {
    /// Adds a notification for the session user, newest first.
    pub fn add_notification(
        &mut self,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> EntityId {
        let id = self.ids.next(NOTIFICATION_PREFIX);
        self.state.notifications.insert(
            0,
            Notification {
                id: id.clone(),
                user_id: self.cfg.user_id().to_owned(),
                kind,
                title: title.into(),
                message: message.into(),
                is_read: false,
                created_at: Utc::now(),
            },
        );
        self.persist();
        id
    }

    pub fn mark_notification_read(&mut self, id: &EntityId) -> bool {
        let Some(n) = self.state.notifications.iter_mut().find(|n| &n.id == id) else {
            return false;
        };
        n.is_read = true;
        self.persist();
        true
    }

    pub fn mark_all_notifications_read(&mut self) {
        for n in &mut self.state.notifications {
            n.is_read = true;
        }
        self.persist();
    }

    pub fn clear_notifications(&mut self) {
        self.state.notifications.clear();
        self.persist();
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.state.notifications
    }

    pub fn unread_count(&self) -> usize {
        self.state
            .notifications
            .iter()
            .filter(|n| !n.is_read)
            .count()
    }
}

// ============================================================================
// RATINGS
// ============================================================================

impl BookingStore {
    /// Records a rating. Does not touch the pending list.
    pub fn add_rating(&mut self, new: NewRating) -> EntityId {
        let id = self.ids.next(RATING_PREFIX);
        self.state.ratings.insert(
            0,
            Rating {
                id: id.clone(),
                user_id: self.cfg.user_id().to_owned(),
                service_type: new.service_type,
                service_id: new.service_id,
                service_name: new.service_name,
                stars: new.stars,
                comment: new.comment,
                verified: new.verified,
                created_at: Utc::now(),
            },
        );
        self.persist();
        id
    }

    /// Adds a rating obligation. A service already pending is not added twice.
    pub fn add_pending_rating(
        &mut self,
        service_type: ServiceType,
        service_id: &str,
        service_name: &str,
    ) -> bool {
        if self
            .state
            .pending_ratings
            .iter()
            .any(|p| p.service_id == service_id)
        {
            return false;
        }

        self.state.pending_ratings.push(PendingRating {
            service_type,
            service_id: service_id.to_owned(),
            service_name: service_name.to_owned(),
            created_at: Utc::now(),
        });
        self.persist();
        true
    }

    pub fn remove_pending_rating(&mut self, service_id: &str) -> bool {
        let before = self.state.pending_ratings.len();
        self.state
            .pending_ratings
            .retain(|p| p.service_id != service_id);
        let removed = self.state.pending_ratings.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Records a rating and clears the matching obligation in one step.
    pub fn submit_rating(&mut self, new: NewRating) -> EntityId {
        let service_id = new.service_id.clone();
        let id = self.add_rating(new);
        self.remove_pending_rating(&service_id);
        id
    }

    /// Records a rating obligation and tells the user about it.
    pub fn trigger_rating_notification(
        &mut self,
        service_type: ServiceType,
        service_id: &str,
        service_name: &str,
    ) {
        self.add_pending_rating(service_type, service_id, service_name);
        self.add_notification(
            NotificationType::Rating,
            "قيّم تجربتك",
            format!("كيف كانت تجربتك مع {service_name}؟ شاركنا رأيك"),
        );
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.state.ratings
    }

    pub fn pending_ratings(&self) -> &[PendingRating] {
        &self.state.pending_ratings
    }

    /// Mean stars for a service, if it has been rated.
    pub fn average_rating(&self, service_id: &str) -> Option<f64> {
        let stars: Vec<f64> = self
            .state
            .ratings
            .iter()
            .filter(|r| r.service_id == service_id)
            .map(|r| f64::from(r.stars.get()))
            .collect();
        if stars.is_empty() {
            None
        } else {
            Some(stars.iter().sum::<f64>() / stars.len() as f64)
        }
    }
}

// ============================================================================
// WALLET
// ============================================================================

impl BookingStore {
    /// Prepends a ledger entry. Does not move the balance.
    pub fn add_transaction(&mut self, new: NewTransaction) -> EntityId {
        let id = self.ids.next(TRANSACTION_PREFIX);
        self.state.transactions.insert(
            0,
            WalletTransaction {
                id: id.clone(),
                kind: new.kind,
                amount: new.amount.abs(),
                description: new.description,
                reference_id: new.reference_id,
                created_at: Utc::now(),
            },
        );
        self.persist();
        id
    }

    /// Adds `delta` to the running balance. Does not touch the ledger.
    pub fn update_wallet_balance(&mut self, delta: f64) {
        self.state.wallet_balance += delta;
        self.persist();
    }

    /// Writes a ledger entry and applies its signed amount to the balance.
    pub fn record_transaction(&mut self, new: NewTransaction) -> EntityId {
        let id = self.add_transaction(new);
        let delta = self
            .state
            .transactions
            .first()
            .map(WalletTransaction::signed_amount)
            .unwrap_or_default();
        self.update_wallet_balance(delta);
        id
    }

    pub fn wallet_balance(&self) -> f64 {
        self.state.wallet_balance
    }

    pub fn transactions(&self) -> &[WalletTransaction] {
        &self.state.transactions
    }

    /// `wallet_balance - Σ signed(transactions)`; zero when ledger and balance agree.
    pub fn wallet_drift(&self) -> f64 {
        let ledger: f64 = self
            .state
            .transactions
            .iter()
            .map(WalletTransaction::signed_amount)
            .sum();
        self.state.wallet_balance - ledger
    }
}

// ============================================================================
// FAVORITES AND CART
// ============================================================================

impl BookingStore {
    /// Adds or removes a favorite; returns whether it is now a favorite.
    pub fn toggle_favorite(&mut self, kind: FavoriteKind, target_id: &str) -> bool {
        let favorite = Favorite {
            kind,
            target_id: target_id.to_owned(),
        };
        let now_favorite = if let Some(pos) = self.state.favorites.iter().position(|f| f == &favorite)
        {
            self.state.favorites.remove(pos);
            false
        } else {
            self.state.favorites.push(favorite);
            true
        };
        self.persist();
        now_favorite
    }

    pub fn is_favorite(&self, kind: FavoriteKind, target_id: &str) -> bool {
        self.state
            .favorites
            .iter()
            .any(|f| f.kind == kind && f.target_id == target_id)
    }

    /// Adds to the cart, merging quantities for a medication already present.
    pub fn add_to_cart(&mut self, medication_id: &str, quantity: u32) {
        match self
            .state
            .cart
            .iter_mut()
            .find(|c| c.medication_id == medication_id)
        {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => self.state.cart.push(CartItem {
                medication_id: medication_id.to_owned(),
                quantity,
            }),
        }
        self.persist();
    }

    /// Overwrites a cart quantity; zero removes the line.
    pub fn update_cart_quantity(&mut self, medication_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove_from_cart(medication_id);
        }
        let Some(item) = self
            .state
            .cart
            .iter_mut()
            .find(|c| c.medication_id == medication_id)
        else {
            return false;
        };
        item.quantity = quantity;
        self.persist();
        true
    }

    pub fn remove_from_cart(&mut self, medication_id: &str) -> bool {
        let before = self.state.cart.len();
        self.state.cart.retain(|c| c.medication_id != medication_id);
        let removed = self.state.cart.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear_cart(&mut self) {
        self.state.cart.clear();
        self.persist();
    }

    pub fn cart(&self) -> &[CartItem] {
        &self.state.cart
    }

    pub fn cart_item_count(&self) -> u32 {
        self.state
            .cart
            .iter()
            .fold(0u32, |total, c| total.saturating_add(c.quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemorySliceStorage;
    use chrono::NaiveTime;
    use sehati_types::Stars;

    fn store_with(storage: Arc<dyn SliceStorage>) -> BookingStore {
        BookingStore::open(Arc::new(CoreConfig::default()), storage)
    }

    fn store() -> BookingStore {
        store_with(Arc::new(MemorySliceStorage::new()))
    }

    fn new_appointment() -> NewAppointment {
        NewAppointment {
            patient_id: "user-1".into(),
            patient_name: "أحمد".into(),
            family_member_id: None,
            doctor_id: "doc-1".into(),
            doctor_name: "د. خالد".into(),
            specialty: "cardiology".into(),
            clinic_id: None,
            clinic_name: None,
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            appointment_type: AppointmentType::InPerson,
            fee: 50.0,
            notes: None,
        }
    }

    fn rating(service_id: &str) -> NewRating {
        NewRating {
            service_type: ServiceType::Doctor,
            service_id: service_id.into(),
            service_name: "د. خالد".into(),
            stars: Stars::new(5).unwrap(),
            comment: None,
            verified: true,
        }
    }

    #[test]
    fn test_add_appointment_starts_pending() {
        let mut store = store();
        let id = store.add_appointment(new_appointment()).unwrap();

        let appointment = store.appointment(&id).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(id.prefix(), "apt");
    }

    #[test]
    fn test_cancel_flips_status_and_keeps_record() {
        let mut store = store();
        let id = store.add_appointment(new_appointment()).unwrap();

        assert!(store.cancel_appointment(&id));
        assert_eq!(store.appointments().len(), 1);
        assert_eq!(
            store.appointment(&id).unwrap().status,
            AppointmentStatus::Cancelled
        );
    }

    #[test]
    fn test_update_missing_appointment_is_noop() {
        let mut store = store();
        let missing = EntityId::parse("apt-1").unwrap();
        assert!(!store.cancel_appointment(&missing));
    }

    #[test]
    fn test_upcoming_excludes_cancelled_and_past() {
        let mut store = store();
        let keep = store.add_appointment(new_appointment()).unwrap();
        let cancelled = store.add_appointment(new_appointment()).unwrap();
        store.cancel_appointment(&cancelled);
        let mut past = new_appointment();
        past.date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        store.add_appointment(past).unwrap();

        let upcoming = store.upcoming_appointments(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].id, keep);
    }

    #[test]
    fn test_notifications_newest_first_and_read_flag() {
        let mut store = store();
        let first = store.add_notification(NotificationType::System, "a", "a");
        let second = store.add_notification(NotificationType::System, "b", "b");

        assert_eq!(store.notifications()[0].id, second);
        assert_eq!(store.unread_count(), 2);

        assert!(store.mark_notification_read(&first));
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.notifications()[0].user_id, "user-1");

        store.clear_notifications();
        assert!(store.notifications().is_empty());
    }

    #[test]
    fn test_add_rating_alone_leaves_pending_entry() {
        let mut store = store();
        store.add_pending_rating(ServiceType::Doctor, "doc-1", "د. خالد");
        store.add_rating(rating("doc-1"));

        assert_eq!(store.pending_ratings().len(), 1);
    }

    #[test]
    fn test_submit_rating_clears_pending_entry() {
        let mut store = store();
        store.add_pending_rating(ServiceType::Doctor, "doc-1", "د. خالد");
        store.submit_rating(rating("doc-1"));

        assert!(store.pending_ratings().is_empty());
        assert!(store.ratings().iter().any(|r| r.service_id == "doc-1" && r.verified));
        assert_eq!(store.average_rating("doc-1"), Some(5.0));
    }

    #[test]
    fn test_trigger_rating_notification_pairs_both_writes() {
        let mut store = store();
        store.trigger_rating_notification(ServiceType::Lab, "lab-9", "مختبر الأمل");

        assert_eq!(store.pending_ratings().len(), 1);
        assert_eq!(store.notifications().len(), 1);
        assert_eq!(store.notifications()[0].kind, NotificationType::Rating);
    }

    #[test]
    fn test_pending_rating_not_duplicated() {
        let mut store = store();
        assert!(store.add_pending_rating(ServiceType::Lab, "lab-9", "x"));
        assert!(!store.add_pending_rating(ServiceType::Lab, "lab-9", "x"));
        assert_eq!(store.pending_ratings().len(), 1);
    }

    #[test]
    fn test_wallet_primitives_can_drift() {
        let mut store = store();
        store.add_transaction(NewTransaction {
            kind: TransactionType::TopUp,
            amount: 100.0,
            description: "top up".into(),
            reference_id: None,
        });

        assert_eq!(store.wallet_balance(), 0.0);
        assert_eq!(store.wallet_drift(), -100.0);
    }

    #[test]
    fn test_record_transaction_keeps_ledger_and_balance_in_step() {
        let mut store = store();
        store.record_transaction(NewTransaction {
            kind: TransactionType::TopUp,
            amount: 100.0,
            description: "top up".into(),
            reference_id: None,
        });
        store.record_transaction(NewTransaction {
            kind: TransactionType::Payment,
            amount: 40.0,
            description: "visit".into(),
            reference_id: Some("apt-1".into()),
        });

        assert_eq!(store.wallet_balance(), 60.0);
        assert_eq!(store.wallet_drift(), 0.0);
        assert_eq!(store.transactions()[0].kind, TransactionType::Payment);
    }

    #[test]
    fn test_cart_merges_and_overwrites() {
        let mut store = store();
        store.add_to_cart("med-001", 2);
        store.add_to_cart("med-001", 3);
        store.add_to_cart("med-002", 1);

        assert_eq!(store.cart().len(), 2);
        assert_eq!(store.cart()[0].quantity, 5);

        assert!(store.update_cart_quantity("med-001", 1));
        assert_eq!(store.cart_item_count(), 2);

        assert!(store.update_cart_quantity("med-002", 0));
        assert_eq!(store.cart().len(), 1);

        store.clear_cart();
        assert!(store.cart().is_empty());
    }

    #[test]
    fn test_cart_quantities_saturate() {
        let mut store = store();
        store.add_to_cart("med-001", u32::MAX);
        store.add_to_cart("med-001", 1);
        store.add_to_cart("med-002", 5);

        assert_eq!(store.cart()[0].quantity, u32::MAX);
        assert_eq!(store.cart_item_count(), u32::MAX);
    }

    #[test]
    fn test_non_finite_fees_are_rejected_and_state_survives_reload() {
        let storage: Arc<dyn SliceStorage> = Arc::new(MemorySliceStorage::new());
        let mut store = store_with(storage.clone());
        let kept = store.add_appointment(new_appointment()).unwrap();

        for fee in [f64::NAN, f64::INFINITY, -1.0] {
            let mut bad = new_appointment();
            bad.fee = fee;
            assert!(matches!(
                store.add_appointment(bad),
                Err(StoreError::InvalidInput(_))
            ));
        }
        let bad_order = store.add_pharmacy_order(NewPharmacyOrder {
            patient_id: "user-1".into(),
            pharmacy_id: "pharm-001".into(),
            pharmacy_name: "صيدلية الشفاء".into(),
            items: Vec::new(),
            delivery_fee: f64::NAN,
            service_fee: 5.0,
            payment_method: PaymentMethod::CashOnDelivery,
            delivery_address: "طرابلس".into(),
        });
        assert!(bad_order.is_err());
        assert!(store.pharmacy_orders().is_empty());

        let reloaded = store_with(storage);
        assert_eq!(reloaded.appointments().len(), 1);
        assert!(reloaded.appointment(&kept).is_some());
    }

    #[test]
    fn test_toggle_favorite() {
        let mut store = store();
        assert!(store.toggle_favorite(FavoriteKind::Doctor, "doc-1"));
        assert!(store.is_favorite(FavoriteKind::Doctor, "doc-1"));
        assert!(!store.toggle_favorite(FavoriteKind::Doctor, "doc-1"));
        assert!(!store.is_favorite(FavoriteKind::Doctor, "doc-1"));
    }

    #[test]
    fn test_lab_order_and_ambulance_updates() {
        let mut store = store();
        let lab = store.add_lab_booking(NewLabBooking {
            patient_id: "user-1".into(),
            lab_id: "lab-1".into(),
            lab_name: "مختبر".into(),
            tests: vec!["cbc".into()],
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            home_collection: true,
            fees: FeeBreakdown::new(40.0, 15.0, 0.0),
        });
        assert!(store.update_lab_booking_status(&lab, LabBookingStatus::SampleCollected));
        assert_eq!(store.lab_bookings()[0].fees.total, 55.0);

        let order = store
            .add_pharmacy_order(NewPharmacyOrder {
                patient_id: "user-1".into(),
                pharmacy_id: "pharm-001".into(),
                pharmacy_name: "صيدلية الشفاء".into(),
                items: vec![OrderItem {
                    medication_id: "med-001".into(),
                    name: "Paracetamol".into(),
                    quantity: 2,
                    unit_price: 4.5,
                }],
                delivery_fee: 10.0,
                service_fee: 5.0,
                payment_method: PaymentMethod::CashOnDelivery,
                delivery_address: "طرابلس".into(),
            })
            .unwrap();
        assert_eq!(store.pharmacy_orders()[0].fees.total, 24.0);
        assert!(store.update_pharmacy_order(
            &order,
            PharmacyOrderUpdate {
                status: Some(PharmacyOrderStatus::Delivered),
                ..Default::default()
            }
        ));

        let amb = store.add_ambulance_request(NewAmbulanceRequest {
            patient_id: "user-1".into(),
            pickup_location: "حي الأندلس".into(),
            destination: None,
            emergency_type: "chest_pain".into(),
            fees: FeeBreakdown::new(0.0, 0.0, 0.0),
        });
        assert!(store.update_ambulance_status(&amb, AmbulanceStatus::Dispatched));
        assert_eq!(
            store.ambulance_requests()[0].status,
            AmbulanceStatus::Dispatched
        );
    }

    #[test]
    fn test_reload_restores_whitelist_and_resets_ephemeral() {
        let storage: Arc<dyn SliceStorage> = Arc::new(MemorySliceStorage::new());

        let mut store = store_with(storage.clone());
        store.add_appointment(new_appointment()).unwrap();
        store.record_transaction(NewTransaction {
            kind: TransactionType::TopUp,
            amount: 25.0,
            description: "top up".into(),
            reference_id: None,
        });
        store.add_to_cart("med-003", 2);
        store.set_processing_payment(true);
        let saved = store.snapshot().clone();

        let reloaded = store_with(storage);
        assert_eq!(reloaded.snapshot(), &saved);
        assert!(!reloaded.is_processing_payment());
    }
}
