//! Cross-store workflows.
//!
//! [`HealthApp`] owns the four stores and the external services and strings single store
//! operations into the user-facing flows: booking and paying for a visit, closing a visit
//! with a rating prompt and a follow-up, answering a follow-up, the prescription-to-delivery
//! pharmacy flow, and assistant questions that need data from several stores.
//!
//! Store operations stay single-purpose; every multi-store side effect (notifications,
//! wallet ledger entries, rating prompts) lives here.

use crate::assistant::AssistantContext;
use crate::config::CoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::models::assistant::AIMessage;
use crate::models::booking::*;
use crate::models::family::FamilyMember;
use crate::models::follow_up::{FollowUpStatus, MessageSender, NewFollowUp, PatientResponse};
use crate::models::pharmacy::{ActorType, NewPrescription, OrderStatus, PaymentStatus, PrescriptionStatus};
use crate::persistence::SliceStorage;
use crate::services::{
    PaymentOutcome, PaymentProcessor, PaymentRequest, PrescriptionReviewer,
    SimulatedPaymentProcessor, SimulatedPharmacistReview,
};
use crate::stores::{AssistantStore, BookingStore, EnhancedStore, PharmacyStore};
use chrono::{Days, NaiveDate, Utc};
use sehati_ids::EntityId;
use std::sync::Arc;

/// Days after a visit at which the follow-up is scheduled.
const FOLLOW_UP_AFTER_DAYS: u64 = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct BookingReceipt {
    pub appointment_id: EntityId,
    /// False when the payment was declined; the appointment then stays pending.
    pub confirmed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderReceipt {
    pub order_id: EntityId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

/// Patient fields pre-filled when booking on behalf of a family member.
#[derive(Clone, Debug, PartialEq)]
pub struct FamilyBookingDraft {
    pub patient_id: String,
    pub patient_name: String,
    pub family_member_id: EntityId,
}

pub struct HealthApp {
    cfg: Arc<CoreConfig>,
    payments: Arc<dyn PaymentProcessor>,
    booking: BookingStore,
    enhanced: EnhancedStore,
    pharmacy: PharmacyStore,
    assistant: AssistantStore,
}

impl HealthApp {
    pub fn open(
        cfg: Arc<CoreConfig>,
        storage: Arc<dyn SliceStorage>,
        payments: Arc<dyn PaymentProcessor>,
        reviewer: Arc<dyn PrescriptionReviewer>,
    ) -> Self {
        Self {
            booking: BookingStore::open(cfg.clone(), storage.clone()),
            enhanced: EnhancedStore::open(cfg.clone(), storage.clone()),
            pharmacy: PharmacyStore::open(cfg.clone(), storage.clone(), payments.clone(), reviewer),
            assistant: AssistantStore::open(cfg.clone(), storage),
            payments,
            cfg,
        }
    }

    /// Opens the app with the simulated payment gateway and pharmacist.
    pub fn with_simulated_services(cfg: Arc<CoreConfig>, storage: Arc<dyn SliceStorage>) -> Self {
        let payments = Arc::new(SimulatedPaymentProcessor::from_config(&cfg));
        let reviewer = Arc::new(SimulatedPharmacistReview::from_config(&cfg));
        Self::open(cfg, storage, payments, reviewer)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn booking(&self) -> &BookingStore {
        &self.booking
    }

    pub fn booking_mut(&mut self) -> &mut BookingStore {
        &mut self.booking
    }

    pub fn enhanced(&self) -> &EnhancedStore {
        &self.enhanced
    }

    pub fn enhanced_mut(&mut self) -> &mut EnhancedStore {
        &mut self.enhanced
    }

    pub fn pharmacy(&self) -> &PharmacyStore {
        &self.pharmacy
    }

    pub fn pharmacy_mut(&mut self) -> &mut PharmacyStore {
        &mut self.pharmacy
    }

    pub fn assistant(&self) -> &AssistantStore {
        &self.assistant
    }

    fn ensure_wallet_covers(&self, amount: f64) -> StoreResult<()> {
        let available = self.booking.wallet_balance();
        if available < amount {
            return Err(StoreError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        Ok(())
    }
}

// ============================================================================
// WALLET AND APPOINTMENTS
// ============================================================================

impl HealthApp {
    /// Charges `amount` to a card and credits the wallet. Returns `Ok(None)` when declined.
    pub async fn top_up_wallet(
        &mut self,
        amount: f64,
        method: PaymentMethod,
    ) -> StoreResult<Option<EntityId>> {
        if amount <= 0.0 || !amount.is_finite() {
            return Err(StoreError::InvalidInput(format!(
                "top-up amount must be positive, got {amount}"
            )));
        }
        if matches!(method, PaymentMethod::CashOnDelivery | PaymentMethod::Wallet) {
            return Err(StoreError::InvalidInput(
                "the wallet can only be topped up by card or mobile wallet".into(),
            ));
        }

        let request = PaymentRequest {
            reference_id: "wallet-top-up".into(),
            amount,
            method,
        };
        self.booking.set_processing_payment(true);
        let outcome = self.payments.charge(&request).await;
        self.booking.set_processing_payment(false);

        let PaymentOutcome::Approved { transaction_ref } = outcome else {
            self.booking.add_notification(
                NotificationType::Payment,
                "فشل شحن المحفظة",
                "تم رفض عملية الدفع، يرجى المحاولة مرة أخرى",
            );
            return Ok(None);
        };

        let id = self.booking.record_transaction(NewTransaction {
            kind: TransactionType::TopUp,
            amount,
            description: "شحن المحفظة".into(),
            reference_id: Some(transaction_ref),
        });
        self.booking.add_notification(
            NotificationType::Payment,
            "تم شحن المحفظة",
            format!("تمت إضافة {amount:.2} د.ل إلى محفظتك"),
        );
        Ok(Some(id))
    }

    /// Books a visit and settles its fee.
    ///
    /// Cash visits are confirmed without a charge. Wallet visits need enough balance and
    /// write one ledger entry. Card and mobile-wallet visits go through the payment gateway;
    /// a declined charge leaves the appointment pending.
    pub async fn book_appointment(
        &mut self,
        new: NewAppointment,
        method: PaymentMethod,
    ) -> StoreResult<BookingReceipt> {
        StoreError::check_amount("appointment fee", new.fee)?;
        if method == PaymentMethod::Wallet {
            self.ensure_wallet_covers(new.fee)?;
        }
        let fee = new.fee;
        let doctor_name = new.doctor_name.clone();
        let id = self.booking.add_appointment(new)?;

        let paid = match method {
            PaymentMethod::CashOnDelivery => true,
            PaymentMethod::Wallet => {
                self.booking.record_transaction(NewTransaction {
                    kind: TransactionType::Payment,
                    amount: fee,
                    description: format!("موعد مع {doctor_name}"),
                    reference_id: Some(id.to_string()),
                });
                true
            }
            PaymentMethod::Card | PaymentMethod::MobileWallet => {
                let request = PaymentRequest {
                    reference_id: id.to_string(),
                    amount: fee,
                    method,
                };
                self.booking.set_processing_payment(true);
                let outcome = self.payments.charge(&request).await;
                self.booking.set_processing_payment(false);
                outcome.is_approved()
            }
        };

        if !paid {
            self.booking.add_notification(
                NotificationType::Payment,
                "فشل الدفع",
                "لم يتم تأكيد موعدك بسبب فشل الدفع، يمكنك المحاولة مرة أخرى",
            );
            tracing::warn!("payment for appointment {} declined", id);
            return Ok(BookingReceipt {
                appointment_id: id,
                confirmed: false,
            });
        }

        self.booking.update_appointment(
            &id,
            AppointmentUpdate {
                status: Some(AppointmentStatus::Confirmed),
                payment_method: Some(method),
                ..Default::default()
            },
        );
        self.booking.add_notification(
            NotificationType::Appointment,
            "تم تأكيد الموعد",
            format!("تم تأكيد موعدك مع {doctor_name}"),
        );
        Ok(BookingReceipt {
            appointment_id: id,
            confirmed: true,
        })
    }

    /// Closes a confirmed visit: prompts for a rating and schedules a follow-up.
    pub fn complete_appointment(&mut self, id: &EntityId) -> StoreResult<EntityId> {
        let appointment = self
            .booking
            .appointment(id)
            .ok_or_else(|| StoreError::not_found("appointment", id))?
            .clone();
        if appointment.status != AppointmentStatus::Confirmed {
            return Err(StoreError::InvalidTransition {
                kind: "appointment",
                from: appointment.status.as_str().into(),
                to: AppointmentStatus::Completed.as_str().into(),
            });
        }

        self.booking.update_appointment(
            id,
            AppointmentUpdate {
                status: Some(AppointmentStatus::Completed),
                ..Default::default()
            },
        );
        self.booking.trigger_rating_notification(
            ServiceType::Doctor,
            &appointment.doctor_id,
            &appointment.doctor_name,
        );

        let scheduled_for = appointment
            .date
            .checked_add_days(Days::new(FOLLOW_UP_AFTER_DAYS))
            .unwrap_or(appointment.date)
            .and_time(appointment.time)
            .and_utc();
        let follow_up = self.enhanced.create_follow_up(NewFollowUp {
            appointment_id: id.clone(),
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            doctor_name: appointment.doctor_name.clone(),
            visit_date: appointment.date,
            scheduled_for,
            questions: vec![
                "كيف تشعر بعد الزيارة؟".into(),
                "هل تتناول الأدوية الموصوفة بانتظام؟".into(),
            ],
        });
        self.booking.add_notification(
            NotificationType::FollowUp,
            "متابعة بعد الزيارة",
            format!("سيتابع معك {} للاطمئنان على حالتك", appointment.doctor_name),
        );
        Ok(follow_up)
    }

    /// Records a rating and clears the matching prompt.
    pub fn submit_rating(&mut self, rating: NewRating) -> EntityId {
        self.booking.submit_rating(rating)
    }

    pub fn family_booking_draft(&self, member_id: &EntityId) -> StoreResult<FamilyBookingDraft> {
        let member = self
            .enhanced
            .family_member(member_id)
            .ok_or_else(|| StoreError::not_found("family member", member_id))?;
        Ok(FamilyBookingDraft {
            patient_id: member.head_user_id.clone(),
            patient_name: member.name.clone(),
            family_member_id: member.id.clone(),
        })
    }

    /// Removes a family member unless they have a confirmed appointment.
    pub fn remove_family_member(&mut self, id: &EntityId) -> StoreResult<FamilyMember> {
        let booked = self
            .booking
            .appointments_for_family_member(id)
            .any(|a| a.status == AppointmentStatus::Confirmed);
        if booked {
            return Err(StoreError::FamilyMemberHasConfirmedAppointment(
                id.to_string(),
            ));
        }
        self.enhanced.remove_family_member(id)
    }
}

// ============================================================================
// FOLLOW-UPS
// ============================================================================

impl HealthApp {
    /// Records the patient's answer; an escalation alerts the doctor and, after a short
    /// delay, posts a system message in the follow-up thread.
    pub async fn respond_to_follow_up(
        &mut self,
        id: &EntityId,
        response: PatientResponse,
        notes: Option<String>,
    ) -> StoreResult<FollowUpStatus> {
        let status = self.enhanced.submit_follow_up_response(id, response, notes)?;
        self.booking.add_notification(
            NotificationType::FollowUp,
            "شكراً لردك",
            "تم إرسال ردك إلى الطبيب",
        );

        if status == FollowUpStatus::Escalated {
            self.booking.add_notification(
                NotificationType::FollowUp,
                "تم إبلاغ الطبيب",
                "أبلغنا طبيبك بأن حالتك ساءت وسيتواصل معك قريباً",
            );
            tokio::time::sleep(self.cfg.simulated_delay()).await;
            self.enhanced.send_follow_up_message(
                id,
                MessageSender::System,
                "تم تصعيد حالتك إلى الطبيب. إذا شعرت بأعراض خطيرة اتصل بالإسعاف فوراً.",
            )?;
        }
        Ok(status)
    }
}

// ============================================================================
// PHARMACY
// ============================================================================

impl HealthApp {
    /// Uploads a paper prescription and waits for the pharmacist's decision.
    pub async fn submit_uploaded_prescription(
        &mut self,
        new: NewPrescription,
        today: NaiveDate,
    ) -> StoreResult<(EntityId, PrescriptionStatus)> {
        let id = self.pharmacy.upload_prescription(new, today)?;
        self.booking.add_notification(
            NotificationType::Pharmacy,
            "تم استلام الوصفة",
            "يراجع الصيدلي وصفتك الآن",
        );

        let status = self.pharmacy.review_prescription(&id).await?;
        let (title, message) = match status {
            PrescriptionStatus::Approved => ("تمت الموافقة على الوصفة", "يمكنك الآن اختيار الصيدلية"),
            _ => ("تعذر اعتماد الوصفة", "يرجى رفع صورة أوضح أو مراجعة طبيبك"),
        };
        self.booking
            .add_notification(NotificationType::Pharmacy, title, message);
        Ok((id, status))
    }

    /// Creates an order and, unless it is cash on delivery, pays for it.
    pub async fn place_pharmacy_order(
        &mut self,
        prescription_id: &EntityId,
        pharmacy_id: &str,
        method: PaymentMethod,
        delivery_address: &str,
    ) -> StoreResult<OrderReceipt> {
        if method == PaymentMethod::Wallet {
            let totals = self.pharmacy.quote_order(prescription_id, pharmacy_id)?;
            self.ensure_wallet_covers(totals.total_amount)?;
        }

        let order_id =
            self.pharmacy
                .create_order(prescription_id, pharmacy_id, method, delivery_address)?;

        if !method.is_cash() {
            self.pay_pharmacy_order(&order_id).await?;
        }

        let order = self
            .pharmacy
            .order(&order_id)
            .ok_or_else(|| StoreError::not_found("pharmacy order", &order_id))?;
        let receipt = OrderReceipt {
            order_id: order_id.clone(),
            status: order.status,
            payment_status: order.payment_status,
        };

        if receipt.status == OrderStatus::Confirmed {
            self.booking.add_notification(
                NotificationType::Pharmacy,
                "تم تأكيد طلبك",
                "تقوم الصيدلية بتجهيز طلبك الآن",
            );
        } else {
            self.booking.add_notification(
                NotificationType::Payment,
                "فشل الدفع",
                "طلبك بانتظار الدفع، يمكنك المحاولة مرة أخرى",
            );
        }
        Ok(receipt)
    }

    /// Charges an order awaiting payment. Wallet payments also debit the wallet ledger.
    ///
    /// Returns `Ok(false)` when the charge is declined; the order stays `payment_pending`.
    pub async fn pay_pharmacy_order(&mut self, order_id: &EntityId) -> StoreResult<bool> {
        let order = self
            .pharmacy
            .order(order_id)
            .ok_or_else(|| StoreError::not_found("pharmacy order", order_id))?;
        if order.payment_method == PaymentMethod::Wallet {
            let amount = order.totals.total_amount;
            self.ensure_wallet_covers(amount)?;
        }

        let paid = self.pharmacy.process_payment(order_id).await?;
        if paid {
            if let Some(order) = self.pharmacy.order(order_id) {
                if order.payment_method == PaymentMethod::Wallet {
                    let amount = order.totals.total_amount;
                    let description = format!("طلب صيدلية {}", order.pharmacy_name);
                    self.booking.record_transaction(NewTransaction {
                        kind: TransactionType::Payment,
                        amount,
                        description,
                        reference_id: Some(order_id.to_string()),
                    });
                }
            }
        }
        Ok(paid)
    }

    /// Marks an order delivered and asks the patient to rate the pharmacy.
    ///
    /// Only a confirmed order whose payment is settled can be delivered.
    pub fn mark_order_delivered(&mut self, order_id: &EntityId) -> StoreResult<()> {
        self.pharmacy.update_order_status(
            order_id,
            OrderStatus::Delivered,
            None,
            "courier",
            ActorType::Courier,
        )?;
        let order = self
            .pharmacy
            .order(order_id)
            .ok_or_else(|| StoreError::not_found("pharmacy order", order_id))?;
        let (pharmacy_id, pharmacy_name) = (order.pharmacy_id.clone(), order.pharmacy_name.clone());

        self.booking.add_notification(
            NotificationType::Pharmacy,
            "تم توصيل طلبك",
            format!("وصل طلبك من {pharmacy_name}"),
        );
        self.booking
            .trigger_rating_notification(ServiceType::Pharmacy, &pharmacy_id, &pharmacy_name);
        Ok(())
    }

    /// Cancels an order; a wallet-paid order is refunded to the wallet.
    pub fn cancel_pharmacy_order(&mut self, order_id: &EntityId, reason: &str) -> StoreResult<()> {
        let actor = self.cfg.user_id().to_owned();
        self.pharmacy
            .cancel_order(order_id, reason, &actor, ActorType::Patient)?;

        if let Some(order) = self.pharmacy.order(order_id) {
            if order.payment_status == PaymentStatus::Refunded
                && order.payment_method == PaymentMethod::Wallet
            {
                let amount = order.totals.total_amount;
                self.booking.record_transaction(NewTransaction {
                    kind: TransactionType::Refund,
                    amount,
                    description: "استرداد طلب صيدلية".into(),
                    reference_id: Some(order_id.to_string()),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// ASSISTANT
// ============================================================================

impl HealthApp {
    pub async fn ask_assistant(&mut self, text: &str) -> StoreResult<AIMessage> {
        let ctx = AssistantContext {
            appointments: self.booking.appointments(),
            reminders: self.enhanced.medication_reminders(),
            conditions: self.enhanced.chronic_conditions(),
            today: Utc::now().date_naive(),
        };
        self.assistant.send_message(text, &ctx).await
    }

    pub fn refresh_health_insights(&mut self, today: NaiveDate) {
        let ctx = AssistantContext {
            appointments: self.booking.appointments(),
            reminders: self.enhanced.medication_reminders(),
            conditions: self.enhanced.chronic_conditions(),
            today,
        };
        self.assistant.refresh_insights(&ctx);
    }

    pub fn dismiss_health_alert(&mut self, key: &str) -> bool {
        self.assistant.dismiss_alert(key)
    }

    pub fn clear_assistant_conversation(&mut self) {
        self.assistant.clear_conversation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::family::{Gender, NewFamilyMember, Relationship};
    use crate::models::pharmacy::NewPrescriptionMedication;
    use crate::persistence::MemorySliceStorage;
    use crate::services::{ScriptedPaymentProcessor, ScriptedReviewer};
    use chrono::NaiveTime;
    use sehati_types::Stars;
    use std::time::Duration;

    fn app_over(storage: Arc<dyn SliceStorage>, payments: ScriptedPaymentProcessor) -> HealthApp {
        let cfg = Arc::new(CoreConfig::default().with_simulated_delay(Duration::ZERO));
        HealthApp::open(
            cfg,
            storage,
            Arc::new(payments),
            Arc::new(ScriptedReviewer::approving()),
        )
    }

    fn app_with(payments: ScriptedPaymentProcessor, reviewer: ScriptedReviewer) -> HealthApp {
        let cfg = Arc::new(CoreConfig::default().with_simulated_delay(Duration::ZERO));
        HealthApp::open(
            cfg,
            Arc::new(MemorySliceStorage::new()),
            Arc::new(payments),
            Arc::new(reviewer),
        )
    }

    fn app() -> HealthApp {
        app_with(ScriptedPaymentProcessor::always(true), ScriptedReviewer::approving())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn visit(family_member_id: Option<EntityId>) -> NewAppointment {
        NewAppointment {
            patient_id: "user-1".into(),
            patient_name: "أحمد".into(),
            family_member_id,
            doctor_id: "doc-1".into(),
            doctor_name: "د. خالد".into(),
            specialty: "cardiology".into(),
            clinic_id: None,
            clinic_name: None,
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            appointment_type: AppointmentType::InPerson,
            fee: 40.0,
            notes: None,
        }
    }

    fn prescription() -> NewPrescription {
        NewPrescription {
            patient_id: "user-1".into(),
            doctor_id: None,
            doctor_name: Some("د. منى".into()),
            clinic_name: None,
            image_ref: Some("upload://rx.jpg".into()),
            issued_on: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            medications: vec![NewPrescriptionMedication {
                id: "med-003".into(),
                name: "Metformin".into(),
                dosage: "850mg".into(),
                instructions: None,
                quantity: 2,
                max_quantity: 3,
                price: 9.75,
            }],
        }
    }

    #[tokio::test]
    async fn test_card_booking_confirms_and_notifies() {
        let mut app = app();
        let receipt = app
            .book_appointment(visit(None), PaymentMethod::Card)
            .await
            .unwrap();

        assert!(receipt.confirmed);
        let appointment = app.booking().appointment(&receipt.appointment_id).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(appointment.payment_method, Some(PaymentMethod::Card));
        assert_eq!(app.booking().unread_count(), 1);
        assert!(app.booking().transactions().is_empty());
    }

    #[tokio::test]
    async fn test_declined_booking_stays_pending() {
        let mut app = app_with(
            ScriptedPaymentProcessor::always(false),
            ScriptedReviewer::approving(),
        );
        let receipt = app
            .book_appointment(visit(None), PaymentMethod::MobileWallet)
            .await
            .unwrap();

        assert!(!receipt.confirmed);
        assert_eq!(
            app.booking().appointment(&receipt.appointment_id).unwrap().status,
            AppointmentStatus::Pending
        );
        assert_eq!(app.booking().notifications()[0].kind, NotificationType::Payment);
    }

    #[tokio::test]
    async fn test_wallet_booking_needs_balance_and_keeps_ledger_in_step() {
        let mut app = app();
        let err = app
            .book_appointment(visit(None), PaymentMethod::Wallet)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));
        assert!(app.booking().appointments().is_empty());

        app.top_up_wallet(100.0, PaymentMethod::Card).await.unwrap();
        app.book_appointment(visit(None), PaymentMethod::Wallet)
            .await
            .unwrap();

        assert_eq!(app.booking().wallet_balance(), 60.0);
        assert_eq!(app.booking().wallet_drift(), 0.0);
    }

    #[tokio::test]
    async fn test_non_finite_fee_is_rejected_and_wallet_survives_reload() {
        let storage: Arc<dyn SliceStorage> = Arc::new(MemorySliceStorage::new());
        let mut app = app_over(storage.clone(), ScriptedPaymentProcessor::always(true));
        app.top_up_wallet(100.0, PaymentMethod::Card).await.unwrap();

        let mut nan = visit(None);
        nan.fee = f64::NAN;
        let err = app
            .book_appointment(nan, PaymentMethod::Wallet)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let mut infinite = visit(None);
        infinite.fee = f64::INFINITY;
        assert!(app
            .book_appointment(infinite, PaymentMethod::Card)
            .await
            .is_err());
        assert_eq!(app.booking().wallet_balance(), 100.0);
        assert!(app.booking().appointments().is_empty());

        let reopened = app_over(storage, ScriptedPaymentProcessor::always(true));
        assert_eq!(reopened.booking().wallet_balance(), 100.0);
        assert_eq!(reopened.booking().transactions().len(), 1);
        assert_eq!(reopened.booking().wallet_drift(), 0.0);
    }

    #[tokio::test]
    async fn test_completing_unconfirmed_visit_names_its_status() {
        let mut app = app_with(
            ScriptedPaymentProcessor::always(false),
            ScriptedReviewer::approving(),
        );
        let receipt = app
            .book_appointment(visit(None), PaymentMethod::Card)
            .await
            .unwrap();

        match app.complete_appointment(&receipt.appointment_id) {
            Err(StoreError::InvalidTransition { from, to, .. }) => {
                assert_eq!(from, "pending");
                assert_eq!(to, "completed");
            }
            other => panic!("expected an invalid transition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_appointment_prompts_rating_and_follow_up() {
        let mut app = app();
        let receipt = app
            .book_appointment(visit(None), PaymentMethod::CashOnDelivery)
            .await
            .unwrap();

        let follow_up = app.complete_appointment(&receipt.appointment_id).unwrap();
        assert_eq!(app.booking().pending_ratings().len(), 1);
        assert_eq!(
            app.enhanced().follow_up(&follow_up).unwrap().status,
            FollowUpStatus::PendingResponse
        );
        assert!(app.complete_appointment(&receipt.appointment_id).is_err());

        app.submit_rating(NewRating {
            service_type: ServiceType::Doctor,
            service_id: "doc-1".into(),
            service_name: "د. خالد".into(),
            stars: Stars::new(4).unwrap(),
            comment: Some("ممتاز".into()),
            verified: true,
        });
        assert!(app.booking().pending_ratings().is_empty());
    }

    #[tokio::test]
    async fn test_worsened_follow_up_posts_system_message() {
        let mut app = app();
        let receipt = app
            .book_appointment(visit(None), PaymentMethod::CashOnDelivery)
            .await
            .unwrap();
        let follow_up = app.complete_appointment(&receipt.appointment_id).unwrap();

        let status = app
            .respond_to_follow_up(&follow_up, PatientResponse::Worsened, Some("ألم أشد".into()))
            .await
            .unwrap();

        assert_eq!(status, FollowUpStatus::Escalated);
        let messages: Vec<_> = app.enhanced().messages_for_follow_up(&follow_up).collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, MessageSender::System);
    }

    #[tokio::test]
    async fn test_family_member_with_confirmed_visit_cannot_be_removed() {
        let mut app = app();
        let member = app
            .enhanced_mut()
            .add_family_member(
                NewFamilyMember {
                    head_user_id: "user-1".into(),
                    name: "ليلى".into(),
                    relationship: Relationship::Child,
                    date_of_birth: NaiveDate::from_ymd_opt(2015, 3, 4).unwrap(),
                    gender: Gender::Female,
                    blood_type: None,
                    allergies: vec![],
                    chronic_conditions: vec![],
                    phone: None,
                },
                today(),
            )
            .unwrap();

        let draft = app.family_booking_draft(&member).unwrap();
        assert_eq!(draft.patient_name, "ليلى");

        let mut new = visit(Some(draft.family_member_id.clone()));
        new.patient_name = draft.patient_name;
        app.book_appointment(new, PaymentMethod::CashOnDelivery)
            .await
            .unwrap();

        assert!(matches!(
            app.remove_family_member(&member),
            Err(StoreError::FamilyMemberHasConfirmedAppointment(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_to_delivery_flow() {
        let mut app = app();
        let (rx, status) = app
            .submit_uploaded_prescription(prescription(), today())
            .await
            .unwrap();
        assert_eq!(status, PrescriptionStatus::Approved);

        let receipt = app
            .place_pharmacy_order(&rx, "pharm-002", PaymentMethod::CashOnDelivery, "طرابلس")
            .await
            .unwrap();
        assert_eq!(receipt.status, OrderStatus::Confirmed);
        assert_eq!(receipt.payment_status, PaymentStatus::Cod);

        app.mark_order_delivered(&receipt.order_id).unwrap();
        assert!(app
            .booking()
            .pending_ratings()
            .iter()
            .any(|p| p.service_id == "pharm-002"));
    }

    #[tokio::test]
    async fn test_failed_card_order_stays_payment_pending() {
        let mut app = app_with(
            ScriptedPaymentProcessor::always(false),
            ScriptedReviewer::approving(),
        );
        let (rx, _) = app
            .submit_uploaded_prescription(prescription(), today())
            .await
            .unwrap();

        let receipt = app
            .place_pharmacy_order(&rx, "pharm-001", PaymentMethod::Card, "طرابلس")
            .await
            .unwrap();
        assert_eq!(receipt.status, OrderStatus::PaymentPending);
        assert_eq!(receipt.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_wallet_order_refunded_on_cancel() {
        let mut app = app();
        app.top_up_wallet(200.0, PaymentMethod::Card).await.unwrap();
        let (rx, _) = app
            .submit_uploaded_prescription(prescription(), today())
            .await
            .unwrap();

        let receipt = app
            .place_pharmacy_order(&rx, "pharm-001", PaymentMethod::Wallet, "طرابلس")
            .await
            .unwrap();
        // 2 × 9.75 + 10 delivery + 5 service
        assert_eq!(app.booking().wallet_balance(), 200.0 - 34.5);

        app.cancel_pharmacy_order(&receipt.order_id, "لم أعد بحاجة").unwrap();
        assert_eq!(app.booking().wallet_balance(), 200.0);
        assert_eq!(app.booking().wallet_drift(), 0.0);
    }

    #[tokio::test]
    async fn test_paid_wallet_order_is_not_charged_twice() {
        let mut app = app();
        app.top_up_wallet(200.0, PaymentMethod::Card).await.unwrap();
        let (rx, _) = app
            .submit_uploaded_prescription(prescription(), today())
            .await
            .unwrap();
        let receipt = app
            .place_pharmacy_order(&rx, "pharm-001", PaymentMethod::Wallet, "طرابلس")
            .await
            .unwrap();
        assert_eq!(receipt.status, OrderStatus::Confirmed);

        let rewind = app.pharmacy_mut().update_order_status(
            &receipt.order_id,
            OrderStatus::PaymentPending,
            None,
            "user-1",
            ActorType::Patient,
        );
        assert!(rewind.is_err());
        assert!(app.pay_pharmacy_order(&receipt.order_id).await.is_err());

        assert_eq!(app.booking().wallet_balance(), 200.0 - 34.5);
        assert_eq!(app.booking().wallet_drift(), 0.0);
    }

    #[tokio::test]
    async fn test_unpaid_order_cannot_be_delivered() {
        let mut app = app_with(
            ScriptedPaymentProcessor::always(false),
            ScriptedReviewer::approving(),
        );
        let (rx, _) = app
            .submit_uploaded_prescription(prescription(), today())
            .await
            .unwrap();
        let receipt = app
            .place_pharmacy_order(&rx, "pharm-001", PaymentMethod::Card, "طرابلس")
            .await
            .unwrap();

        assert!(matches!(
            app.mark_order_delivered(&receipt.order_id),
            Err(StoreError::InvalidTransition { .. })
        ));
        assert!(app.booking().pending_ratings().is_empty());
        assert_eq!(
            app.pharmacy().order(&receipt.order_id).unwrap().status,
            OrderStatus::PaymentPending
        );
    }

    #[tokio::test]
    async fn test_assistant_reply_and_insights() {
        let mut app = app();
        let reply = app.ask_assistant("ما هي الأدوية التي أتناولها؟").await.unwrap();
        assert_eq!(reply.message_type, crate::models::assistant::MessageType::MedicationInfo);
        assert!(reply.has_disclaimer);
        assert_eq!(app.assistant().conversations().len(), 1);

        app.refresh_health_insights(today());
        assert!(!app.assistant().health_alerts().is_empty());
    }
}
